//! Shared-memory graphics allocator

use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::{
    buffers::HardwareBufferDescription,
    error::{BufferHubError, Result},
    memory::{BackingType, RegionConfig, SharedMemoryRegion},
};

use super::traits::{AllocatedBuffer, GraphicsAllocator};

/// Allocates buffers as shared memory regions with an aligned stride
#[derive(Debug)]
pub struct SharedMemoryAllocator {
    backing_type: BackingType,
    stride_alignment: u32,
    allocations: AtomicU64,
}

impl SharedMemoryAllocator {
    /// Create an allocator; `stride_alignment` is in pixels and must be a power of two
    pub fn new(backing_type: BackingType, stride_alignment: u32) -> Result<Self> {
        if stride_alignment == 0 || !stride_alignment.is_power_of_two() {
            return Err(BufferHubError::invalid_parameter(
                "stride_alignment",
                "Stride alignment must be a power of two",
            ));
        }

        Ok(Self {
            backing_type,
            stride_alignment,
            allocations: AtomicU64::new(0),
        })
    }

    /// Stride for `width`, rounded up to the alignment
    pub fn stride_for(&self, width: u32) -> Result<u32> {
        let mask = self.stride_alignment - 1;
        width
            .checked_add(mask)
            .map(|w| w & !mask)
            .ok_or_else(|| BufferHubError::allocation("Stride overflows"))
    }

    /// Number of successful allocations so far
    pub fn allocation_count(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }
}

impl Default for SharedMemoryAllocator {
    fn default() -> Self {
        Self {
            backing_type: BackingType::default(),
            stride_alignment: crate::config::DEFAULT_STRIDE_ALIGNMENT,
            allocations: AtomicU64::new(0),
        }
    }
}

impl GraphicsAllocator for SharedMemoryAllocator {
    fn allocate(&self, description: &HardwareBufferDescription) -> Result<AllocatedBuffer> {
        let stride = self.stride_for(description.width)?;
        let size = description.storage_size(stride)?;
        let sequence = self.allocations.fetch_add(1, Ordering::Relaxed);

        let config = RegionConfig::new(format!("bufferhub-buffer-{}", sequence), size)
            .with_backing_type(self.backing_type);
        let storage = SharedMemoryRegion::new(config).map_err(|e| {
            self.allocations.fetch_sub(1, Ordering::Relaxed);
            BufferHubError::allocation(format!("Failed to create buffer storage: {}", e))
        })?;

        debug!(
            "Allocated {}x{}x{} buffer, stride {}, {} bytes ({})",
            description.width,
            description.height,
            description.layers,
            stride,
            size,
            self.backing_type.name()
        );

        Ok(AllocatedBuffer { stride, storage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::PixelFormat;

    #[test]
    fn test_stride_alignment() {
        let allocator = SharedMemoryAllocator::new(BackingType::Anonymous, 16).unwrap();
        assert_eq!(allocator.stride_for(640).unwrap(), 640);
        assert_eq!(allocator.stride_for(641).unwrap(), 656);
        assert_eq!(allocator.stride_for(1).unwrap(), 16);
        assert!(allocator.stride_for(u32::MAX).is_err());

        assert!(SharedMemoryAllocator::new(BackingType::Anonymous, 0).is_err());
        assert!(SharedMemoryAllocator::new(BackingType::Anonymous, 12).is_err());
    }

    #[test]
    fn test_allocate_sizes_storage_from_stride() {
        let allocator = SharedMemoryAllocator::new(BackingType::Anonymous, 64).unwrap();
        let desc = HardwareBufferDescription::new(100, 10, 2, PixelFormat::R5G6B5Unorm, 0);

        let buffer = allocator.allocate(&desc).unwrap();
        assert_eq!(buffer.stride, 128);
        assert_eq!(buffer.storage.size(), 128 * 10 * 2 * 2);
        assert_eq!(allocator.allocation_count(), 1);

        let handle = buffer.native_handle(&desc.with_stride(buffer.stride));
        assert_eq!(handle.num_fds(), 0);
        assert_eq!(handle.ints()[2], 128);
    }
}
