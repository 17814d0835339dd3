//! Buffer node: canonical identity and storage of an allocated buffer

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
    time::SystemTime,
};

use log::debug;

use crate::{
    allocators::AllocatedBuffer,
    error::{BufferHubError, Result},
    handle::NativeHandle,
    memory::BackingType,
};

use super::{
    client_bits::{ClientBit, ClientBitSet},
    description::HardwareBufferDescription,
    metadata::{MetadataHeader, MetadataRegion},
};

/// Unique identifier for buffer nodes
pub type BufferId = u32;

static NEXT_BUFFER_ID: AtomicU32 = AtomicU32::new(1);

/// Take the next id from `counter`. Ids are never reused; the last one is `u32::MAX - 1`.
fn next_id(counter: &AtomicU32) -> Result<BufferId> {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
        .map_err(|_| BufferHubError::allocation("Buffer ids exhausted"))
}

/// An allocated buffer shared by one or more clients
///
/// Held through `Arc` by open clients only. Storage and metadata are
/// released when the last client lets go.
#[derive(Debug)]
pub struct BufferNode {
    id: BufferId,
    description: HardwareBufferDescription,
    storage: AllocatedBuffer,
    metadata: MetadataRegion,
    clients: Mutex<ClientBitSet>,
    created_at: SystemTime,
}

impl BufferNode {
    /// Build a node around freshly allocated storage
    pub fn new(
        request: &HardwareBufferDescription,
        storage: AllocatedBuffer,
        user_metadata_size: u32,
        metadata_backing: BackingType,
    ) -> Result<Self> {
        let id = next_id(&NEXT_BUFFER_ID)?;
        let description = request.with_stride(storage.stride);
        let header = MetadataHeader::new(id, user_metadata_size, description);
        let metadata = MetadataRegion::create(&header, metadata_backing)?;

        debug!(
            "Created buffer node {} ({}x{}x{}, format {:#x}, {} bytes user metadata)",
            id,
            description.width,
            description.height,
            description.layers,
            description.format,
            user_metadata_size
        );

        Ok(Self {
            id,
            description,
            storage,
            metadata,
            clients: Mutex::new(ClientBitSet::new()),
            created_at: SystemTime::now(),
        })
    }

    /// Claim a client bit together with a strong reference to the node
    pub fn attach(self: &Arc<Self>) -> Result<(Arc<BufferNode>, ClientBit)> {
        let mut clients = self.clients.lock().unwrap();
        let bit = clients
            .acquire()
            .ok_or_else(|| BufferHubError::max_clients(self.id, ClientBitSet::CAPACITY))?;
        Ok((Arc::clone(self), bit))
    }

    /// Return a client bit
    pub fn release_client_bit(&self, bit: ClientBit) {
        let mut clients = self.clients.lock().unwrap();
        if !clients.release(bit) {
            debug!("Buffer {} released unheld client bit {:#x}", self.id, bit.mask());
        } else if clients.is_empty() {
            debug!("Buffer {} has no client bits held", self.id);
        }
    }

    /// Buffer id
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Finalized description (stride set, reserved words zero)
    pub fn description(&self) -> &HardwareBufferDescription {
        &self.description
    }

    /// User metadata capacity in bytes
    pub fn user_metadata_size(&self) -> u32 {
        self.metadata.user_metadata_size()
    }

    /// Shared metadata region
    pub fn metadata(&self) -> &MetadataRegion {
        &self.metadata
    }

    /// Handle to the backing storage
    pub fn buffer_handle(&self) -> NativeHandle {
        self.storage.native_handle(&self.description)
    }

    /// Mask of bits held by live clients
    pub fn active_clients_mask(&self) -> u32 {
        self.clients.lock().unwrap().active_mask()
    }

    /// Number of live clients
    pub fn client_count(&self) -> u32 {
        self.clients.lock().unwrap().len()
    }

    /// Node age in seconds
    pub fn age_seconds(&self) -> Option<u64> {
        self.created_at.elapsed().ok().map(|d| d.as_secs())
    }
}

impl Drop for BufferNode {
    fn drop(&mut self) {
        debug!(
            "Releasing buffer node {} ({} bytes storage)",
            self.id,
            self.storage.storage.size()
        );
    }
}
