//! The buffer hub service
//!
//! Owns the registry of live nodes and clients, the token table and the
//! allocator capability. Nodes are only reachable through `Weak` entries
//! here; open clients hold the strong references.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, Weak},
    time::Instant,
};

use log::{debug, info, warn};

use crate::{
    allocators::{GraphicsAllocator, SharedMemoryAllocator},
    buffers::{BufferId, BufferNode, HardwareBufferDescription},
    client::{BufferClient, ClientId, ClientShared},
    error::{BufferHubError, Result},
    handle::NativeHandle,
    token::{Token, TokenTable},
};

use super::{
    config::HubConfig,
    dump::{HubDump, NodeDump},
    stats::{HubStats, HubStatsSnapshot},
    traits::BufferTraits,
};

/// State shared by the service and every client it hands out
#[derive(Debug)]
pub(crate) struct HubShared {
    config: HubConfig,
    allocator: Arc<dyn GraphicsAllocator>,
    pub(crate) tokens: TokenTable,
    nodes: Mutex<HashMap<BufferId, Weak<BufferNode>>>,
    clients: Mutex<HashMap<ClientId, Weak<ClientShared>>>,
    pub(crate) stats: HubStats,
}

impl HubShared {
    fn register_node(&self, node: &Arc<BufferNode>) {
        self.nodes
            .lock()
            .unwrap()
            .insert(node.id(), Arc::downgrade(node));
    }

    fn register_client(&self, client: &Arc<ClientShared>) {
        self.clients
            .lock()
            .unwrap()
            .insert(client.id(), Arc::downgrade(client));
    }

    /// Bookkeeping after a client moved to CLOSED
    ///
    /// Called without the client lock held. Takes ownership of the node
    /// reference the client gave up so the node entry can be pruned once it
    /// was the last one.
    pub(crate) fn on_client_closed(&self, client: &ClientShared, node: Arc<BufferNode>) {
        let revoked = self.tokens.revoke_client(client.id());
        self.clients.lock().unwrap().remove(&client.id());
        self.stats.record_close();

        let buffer_id = node.id();
        drop(node);

        let mut nodes = self.nodes.lock().unwrap();
        let released = nodes
            .get(&buffer_id)
            .map_or(false, |weak| weak.strong_count() == 0);
        if released {
            nodes.remove(&buffer_id);
            self.stats.record_node_released();
        }

        debug!(
            "Closed client {} on buffer {} (revoked {} tokens{})",
            client.id(),
            buffer_id,
            revoked,
            if released { ", buffer released" } else { "" }
        );
    }
}

/// Broker that allocates buffers and lets processes share them by token
///
/// Cheap to clone; clones refer to the same hub.
#[derive(Debug, Clone)]
pub struct BufferHubService {
    shared: Arc<HubShared>,
}

impl BufferHubService {
    /// Create a hub backed by the shared-memory allocator
    pub fn new(config: HubConfig) -> Result<Self> {
        config.validate()?;
        let allocator = SharedMemoryAllocator::new(config.backing_type, config.stride_alignment)?;
        Self::with_allocator(config, Arc::new(allocator))
    }

    /// Create a hub around a caller-provided allocator
    pub fn with_allocator(config: HubConfig, allocator: Arc<dyn GraphicsAllocator>) -> Result<Self> {
        config.validate()?;

        info!(
            "Buffer hub started: allocator {}, backing {}, timeout {:?}",
            allocator.type_name(),
            config.backing_type.name(),
            config.allocation_timeout
        );

        Ok(Self {
            shared: Arc::new(HubShared {
                config,
                allocator,
                tokens: TokenTable::new(),
                nodes: Mutex::new(HashMap::new()),
                clients: Mutex::new(HashMap::new()),
                stats: HubStats::new(),
            }),
        })
    }

    /// Allocate a buffer and open its first client
    pub fn allocate_buffer(
        &self,
        description: &HardwareBufferDescription,
        user_metadata_size: u32,
    ) -> Result<(BufferClient, BufferTraits)> {
        match self.try_allocate(description, user_metadata_size) {
            Ok(result) => {
                self.shared.stats.record_allocation();
                Ok(result)
            }
            Err(e) => {
                self.shared.stats.record_allocation_failure();
                warn!("Buffer allocation failed: {}", e);
                Err(e)
            }
        }
    }

    fn try_allocate(
        &self,
        description: &HardwareBufferDescription,
        user_metadata_size: u32,
    ) -> Result<(BufferClient, BufferTraits)> {
        let config = &self.shared.config;
        let request = description.sanitized();
        request.validate()?;

        if user_metadata_size > config.max_user_metadata_size {
            return Err(BufferHubError::invalid_parameter(
                "user_metadata_size",
                format!(
                    "{} bytes exceeds the limit of {}",
                    user_metadata_size, config.max_user_metadata_size
                ),
            ));
        }

        let started = Instant::now();
        let storage = self.shared.allocator.allocate(&request).map_err(|e| match e {
            BufferHubError::Allocation { .. } => e,
            other => BufferHubError::allocation(other.to_string()),
        })?;

        if let Some(timeout) = config.allocation_timeout {
            let elapsed = started.elapsed();
            if elapsed > timeout {
                return Err(BufferHubError::allocation(format!(
                    "Allocator took {:?}, limit is {:?}",
                    elapsed, timeout
                )));
            }
        }

        if storage.stride < request.width {
            return Err(BufferHubError::allocation(format!(
                "Allocator returned stride {} for width {}",
                storage.stride, request.width
            )));
        }
        if config.backing_type.is_shareable() && storage.storage.fd().is_none() {
            return Err(BufferHubError::allocation(format!(
                "Allocator {} returned storage without a descriptor",
                self.shared.allocator.type_name()
            )));
        }
        let required = request.storage_size(storage.stride)?;
        if storage.storage.size() < required {
            return Err(BufferHubError::allocation(format!(
                "Allocator returned {} bytes, need {}",
                storage.storage.size(),
                required
            )));
        }

        let node = Arc::new(BufferNode::new(
            &request,
            storage,
            user_metadata_size,
            config.backing_type,
        )?);
        let client = ClientShared::open(&node)?;
        self.shared.register_node(&node);
        drop(node);

        self.open_client(client)
    }

    /// Redeem a token for a new client on the same buffer
    ///
    /// Every token failure reports `InvalidToken` and nothing else.
    pub fn import_buffer(&self, token: Option<&NativeHandle>) -> Result<(BufferClient, BufferTraits)> {
        match self.try_import(token) {
            Ok(result) => {
                self.shared.stats.record_import();
                Ok(result)
            }
            Err(e) => {
                self.shared.stats.record_import_rejection();
                warn!("Buffer import rejected: {}", e.status());
                Err(e)
            }
        }
    }

    fn try_import(&self, token: Option<&NativeHandle>) -> Result<(BufferClient, BufferTraits)> {
        let handle = token.ok_or(BufferHubError::InvalidToken)?;
        let token = Token::from_handle(handle)?;
        let pending = self.shared.tokens.consume(&token)?;

        let origin = pending.origin.upgrade().ok_or(BufferHubError::InvalidToken)?;
        let client = origin.open_sibling().map_err(|e| match e {
            BufferHubError::ClientClosed { .. } => BufferHubError::InvalidToken,
            other => other,
        })?;

        debug!(
            "Token {} from client {} imported as client {} on buffer {} after {:?}",
            token.id(),
            pending.client_id,
            client.id(),
            pending.buffer_id,
            pending.issued_at.elapsed()
        );

        self.open_client(client)
    }

    fn open_client(&self, client: Arc<ClientShared>) -> Result<(BufferClient, BufferTraits)> {
        self.shared.register_client(&client);
        let client = BufferClient::new(client, Arc::clone(&self.shared));
        let traits = client.traits()?;
        Ok((client, traits))
    }

    /// Snapshot of every live node, its clients and pending tokens
    pub fn dump(&self) -> HubDump {
        let nodes: Vec<Arc<BufferNode>> = self
            .shared
            .nodes
            .lock()
            .unwrap()
            .values()
            .filter_map(Weak::upgrade)
            .collect();

        let mut clients_by_buffer: HashMap<BufferId, Vec<ClientId>> = HashMap::new();
        for client in self.shared.clients.lock().unwrap().values().filter_map(Weak::upgrade) {
            clients_by_buffer
                .entry(client.buffer_id())
                .or_default()
                .push(client.id());
        }

        let tokens_by_buffer = self.shared.tokens.pending_by_buffer();

        let mut dump_nodes: Vec<NodeDump> = nodes
            .iter()
            .map(|node| {
                let mut client_ids = clients_by_buffer.remove(&node.id()).unwrap_or_default();
                client_ids.sort_unstable();
                NodeDump {
                    buffer_id: node.id(),
                    description: *node.description(),
                    user_metadata_size: node.user_metadata_size(),
                    active_clients_mask: node.active_clients_mask(),
                    client_ids,
                    pending_tokens: tokens_by_buffer.get(&node.id()).copied().unwrap_or(0),
                    age_seconds: node.age_seconds().unwrap_or(0),
                }
            })
            .collect();
        dump_nodes.sort_by_key(|n| n.buffer_id);

        HubDump {
            nodes: dump_nodes,
            pending_tokens: self.shared.tokens.len(),
            stats: self.shared.stats.snapshot(),
        }
    }

    /// Current counters
    pub fn stats(&self) -> HubStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Nodes with at least one open client
    pub fn live_node_count(&self) -> usize {
        self.shared
            .nodes
            .lock()
            .unwrap()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Open clients across all nodes
    pub fn live_client_count(&self) -> usize {
        self.shared
            .clients
            .lock()
            .unwrap()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Tokens minted and not yet consumed or revoked
    pub fn pending_token_count(&self) -> usize {
        self.shared.tokens.len()
    }

    pub fn config(&self) -> &HubConfig {
        &self.shared.config
    }

    pub fn allocator_name(&self) -> &'static str {
        self.shared.allocator.type_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffers::PixelFormat, error::BufferHubStatus};

    fn hub() -> BufferHubService {
        BufferHubService::new(HubConfig::default()).unwrap()
    }

    fn desc() -> HardwareBufferDescription {
        HardwareBufferDescription::new(64, 32, 1, PixelFormat::R8G8B8A8Unorm, 0x3)
    }

    #[test]
    fn test_allocate_registers_node() {
        let hub = hub();
        let (client, traits) = hub.allocate_buffer(&desc(), 16).unwrap();

        assert_eq!(hub.live_node_count(), 1);
        assert_eq!(hub.live_client_count(), 1);
        assert_eq!(traits.buffer_info.buffer_id, client.buffer_id());
        assert_eq!(traits.buffer_info.user_metadata_size, 16);
        assert!(traits.description.stride >= 64);

        client.close().unwrap();
        assert_eq!(hub.live_node_count(), 0);
        assert_eq!(hub.stats().nodes_released, 1);
    }

    #[test]
    fn test_metadata_limit_enforced() {
        let hub = BufferHubService::new(
            HubConfig::default().with_max_user_metadata_size(8),
        )
        .unwrap();

        let err = hub.allocate_buffer(&desc(), 9).unwrap_err();
        assert_eq!(err.status(), BufferHubStatus::AllocationFailed);
        assert_eq!(hub.stats().allocation_failures, 1);
    }

    #[test]
    fn test_dump_lists_clients_and_tokens() {
        let hub = hub();
        let (client, _) = hub.allocate_buffer(&desc(), 0).unwrap();
        let _token = client.duplicate().unwrap();

        let dump = hub.dump();
        let node = dump.node(client.buffer_id()).unwrap();
        assert_eq!(node.client_ids, vec![client.id()]);
        assert_eq!(node.pending_tokens, 1);
        assert_eq!(dump.pending_tokens, 1);
        assert!(dump.to_string().contains("Active buffers: 1"));
    }

    #[test]
    fn test_reports_allocator_and_config() {
        let config = HubConfig::default().with_timeout(None);
        let hub = BufferHubService::new(config.clone()).unwrap();

        assert_eq!(hub.config(), &config);
        assert!(hub.allocator_name().ends_with("SharedMemoryAllocator"));

        let (client, _) = hub.allocate_buffer(&desc(), 0).unwrap();
        let dump = hub.dump();
        assert_eq!(dump.node(client.buffer_id()).unwrap().age_seconds, 0);
        assert!(dump.to_string().contains("age"));
    }
}
