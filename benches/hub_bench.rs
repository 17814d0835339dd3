use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use bufferhub::{
    token::TokenSigner, BufferHubService, HardwareBufferDescription, HubConfig,
    PixelFormat,
};
use std::{hint::black_box, sync::Arc, thread};

fn hub() -> BufferHubService {
    BufferHubService::new(HubConfig::default()).unwrap()
}

fn benchmark_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("Allocate");
    let hub = hub();

    for size in [64u32, 256, 1024].iter() {
        group.bench_with_input(BenchmarkId::new("allocate_close", size), size, |b, &size| {
            let request = HardwareBufferDescription::new(size, size, 1, PixelFormat::R8G8B8A8Unorm, 0);
            b.iter(|| {
                let (client, traits) = hub.allocate_buffer(&request, 64).unwrap();
                black_box(traits);
                client.close().unwrap();
            });
        });
    }

    group.finish();
}

fn benchmark_duplicate_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("Token");
    let hub = hub();
    let request = HardwareBufferDescription::new(64, 64, 1, PixelFormat::R8G8B8A8Unorm, 0);
    let (origin, _) = hub.allocate_buffer(&request, 0).unwrap();

    group.bench_function("duplicate_import_close", |b| {
        b.iter(|| {
            let token = origin.duplicate().unwrap();
            let (client, _) = hub.import_buffer(Some(&token)).unwrap();
            client.close().unwrap();
        });
    });

    group.bench_function("reject_forged", |b| {
        let forged = bufferhub::NativeHandle::from_ints(vec![1; bufferhub::TOKEN_NUM_INTS]);
        b.iter(|| {
            let _ = black_box(hub.import_buffer(Some(&forged)));
        });
    });

    let signer = TokenSigner::new();
    group.bench_function("sign_verify", |b| {
        b.iter(|| {
            let token = signer.sign(black_box(42), signer.nonce());
            assert!(signer.verify(&token));
        });
    });

    group.finish();
}

fn benchmark_contended_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("ContendedImport");
    group.sample_size(20);

    for threads in [2usize, 4, 8].iter() {
        group.bench_with_input(BenchmarkId::new("threads", threads), threads, |b, &threads| {
            let hub = Arc::new(hub());
            let request = HardwareBufferDescription::new(64, 64, 1, PixelFormat::R8G8B8A8Unorm, 0);
            let (origin, _) = hub.allocate_buffer(&request, 0).unwrap();
            let origin = Arc::new(origin);

            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let hub = hub.clone();
                        let origin = origin.clone();
                        thread::spawn(move || {
                            for _ in 0..50 {
                                let token = origin.duplicate().unwrap();
                                let (client, _) = hub.import_buffer(Some(&token)).unwrap();
                                client.close().unwrap();
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_allocate,
    benchmark_duplicate_import,
    benchmark_contended_import
);
criterion_main!(benches);
