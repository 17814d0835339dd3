//! Concurrent stress tests for high-contention scenarios
//! Token races, close-versus-import races and client bit uniqueness

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier, Mutex,
    },
    thread,
};

use bufferhub::{
    error::BufferHubStatus, BufferClient, BufferHubService,
    HardwareBufferDescription, HubConfig, PixelFormat,
};

fn shared_hub() -> Arc<BufferHubService> {
    Arc::new(
        BufferHubService::new(HubConfig::default()).unwrap(),
    )
}

fn request() -> HardwareBufferDescription {
    HardwareBufferDescription::new(128, 128, 1, PixelFormat::R8G8B8A8Unorm, 0)
}

#[cfg(test)]
mod concurrent_stress_tests {
    use super::*;

    /// Many threads race to import one token; exactly one wins
    #[test]
    fn stress_single_token_single_winner() {
        let hub = shared_hub();
        let (origin, _) = hub.allocate_buffer(&request(), 0).unwrap();

        for round in 0..20 {
            let token = Arc::new(origin.duplicate().unwrap());
            let thread_count = 8;
            let barrier = Arc::new(Barrier::new(thread_count));
            let winners = Arc::new(AtomicUsize::new(0));
            let invalid = Arc::new(AtomicUsize::new(0));
            let survivors = Arc::new(Mutex::new(Vec::new()));

            let handles: Vec<_> = (0..thread_count)
                .map(|_| {
                    let hub = hub.clone();
                    let token = token.clone();
                    let barrier = barrier.clone();
                    let winners = winners.clone();
                    let invalid = invalid.clone();
                    let survivors = survivors.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        match hub.import_buffer(Some(&token)) {
                            Ok((client, _)) => {
                                winners.fetch_add(1, Ordering::SeqCst);
                                survivors.lock().unwrap().push(client);
                            }
                            Err(e) => {
                                assert_eq!(e.status(), BufferHubStatus::InvalidToken);
                                invalid.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(winners.load(Ordering::SeqCst), 1, "round {}", round);
            assert_eq!(invalid.load(Ordering::SeqCst), thread_count - 1);
            survivors.lock().unwrap().clear();
        }

        assert_eq!(hub.live_client_count(), 1);
    }

    /// Import racing the origin's close: either a usable client or INVALID_TOKEN
    #[test]
    fn stress_import_races_close() {
        let hub = shared_hub();
        let mut imported = 0;
        let mut rejected = 0;

        for _ in 0..200 {
            let (origin, traits) = hub.allocate_buffer(&request(), 0).unwrap();
            let token = origin.duplicate().unwrap();
            let barrier = Arc::new(Barrier::new(2));

            let closer = {
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    origin.close().unwrap();
                })
            };

            let importer = {
                let hub = hub.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    hub.import_buffer(Some(&token))
                })
            };

            closer.join().unwrap();
            match importer.join().unwrap() {
                Ok((client, client_traits)) => {
                    // A winner is fully formed and owns the node on its own
                    assert_eq!(client_traits.buffer_info.buffer_id, traits.buffer_info.buffer_id);
                    assert!(!client.is_closed());
                    assert!(client.duplicate().is_ok());
                    client.close().unwrap();
                    imported += 1;
                }
                Err(e) => {
                    assert_eq!(e.status(), BufferHubStatus::InvalidToken);
                    rejected += 1;
                }
            }
        }

        println!("import/close race: {} imported, {} rejected", imported, rejected);
        assert_eq!(imported + rejected, 200);
        assert_eq!(hub.live_node_count(), 0);
        assert_eq!(hub.live_client_count(), 0);
        assert_eq!(hub.pending_token_count(), 0);
    }

    /// Concurrent import and close churn never hands out a bit twice
    #[test]
    fn stress_client_bits_stay_unique() {
        let hub = shared_hub();
        let (origin, traits) = hub.allocate_buffer(&request(), 0).unwrap();
        let origin = Arc::new(origin);
        let origin_mask = traits.buffer_info.client_bit.mask();

        let thread_count = 6;
        let rounds = 100;
        let held = Arc::new(Mutex::new(origin_mask));
        let barrier = Arc::new(Barrier::new(thread_count));

        let handles: Vec<_> = (0..thread_count)
            .map(|_| {
                let hub = hub.clone();
                let origin = origin.clone();
                let held = held.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..rounds {
                        let token = origin.duplicate().unwrap();
                        let (client, _) = hub.import_buffer(Some(&token)).unwrap();
                        let bit = client.client_bit().unwrap().mask();
                        {
                            let mut mask = held.lock().unwrap();
                            assert_eq!(*mask & bit, 0, "bit {:#x} live twice", bit);
                            *mask |= bit;
                        }
                        {
                            let mut mask = held.lock().unwrap();
                            *mask &= !bit;
                        }
                        client.close().unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*held.lock().unwrap(), origin_mask);
        assert_eq!(hub.live_client_count(), 1);
        assert_eq!(hub.stats().imports, (thread_count * rounds) as u64);
    }

    /// Independent buffers allocated and shared from many threads
    #[test]
    fn stress_parallel_allocations() {
        let hub = shared_hub();
        let thread_count = 4;
        let per_thread = 25;
        let barrier = Arc::new(Barrier::new(thread_count));
        let ids = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..thread_count)
            .map(|_| {
                let hub = hub.clone();
                let barrier = barrier.clone();
                let ids = ids.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let mut clients: Vec<BufferClient> = Vec::new();
                    for _ in 0..per_thread {
                        let (client, traits) = hub.allocate_buffer(&request(), 16).unwrap();
                        let token = client.duplicate().unwrap();
                        let (peer, _) = hub.import_buffer(Some(&token)).unwrap();
                        assert_eq!(peer.buffer_id(), traits.buffer_info.buffer_id);
                        ids.lock().unwrap().push(traits.buffer_info.buffer_id);
                        clients.push(client);
                        clients.push(peer);
                    }
                    clients
                })
            })
            .collect();

        let mut all_clients = Vec::new();
        for handle in handles {
            all_clients.extend(handle.join().unwrap());
        }

        let mut ids = ids.lock().unwrap().clone();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), thread_count * per_thread);
        assert_eq!(hub.live_node_count(), thread_count * per_thread);

        drop(all_clients);
        assert_eq!(hub.live_node_count(), 0);
    }
}
