//! Graphics allocator capability

use crate::{
    buffers::HardwareBufferDescription,
    error::Result,
    handle::NativeHandle,
    memory::SharedMemoryRegion,
};

/// Storage produced by a graphics allocator
#[derive(Debug)]
pub struct AllocatedBuffer {
    /// Row pitch in pixels chosen by the allocator
    pub stride: u32,
    /// Backing storage; released when the buffer is dropped
    pub storage: SharedMemoryRegion,
}

impl AllocatedBuffer {
    /// Handle describing the storage to a remote process
    ///
    /// Carries the storage descriptor (if any) and the finalized geometry.
    pub fn native_handle(&self, description: &HardwareBufferDescription) -> NativeHandle {
        let fds = self.storage.fd().into_iter().collect();
        let ints = vec![
            description.width as i32,
            description.height as i32,
            self.stride as i32,
            description.format as i32,
            description.layers as i32,
            description.usage as u32 as i32,
            (description.usage >> 32) as u32 as i32,
            self.storage.size() as i32,
        ];
        NativeHandle::new(fds, ints)
    }
}

/// Capability the hub calls through to obtain buffer storage
///
/// Implementations must return in bounded time; the hub never retries.
pub trait GraphicsAllocator: Send + Sync + std::fmt::Debug {
    /// Allocate storage for a validated, sanitized description
    fn allocate(&self, description: &HardwareBufferDescription) -> Result<AllocatedBuffer>;

    /// Get allocator type name for debugging
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
