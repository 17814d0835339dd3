//! Shared memory region implementation

use std::{
    os::fd::{AsRawFd, OwnedFd, RawFd},
    sync::Mutex,
};

use memmap2::{MmapMut, MmapOptions};

use crate::error::{BufferHubError, Result};

use super::config::{BackingType, RegionConfig};

/// A mapped shared memory region
#[derive(Debug)]
pub struct SharedMemoryRegion {
    /// Size in bytes
    size: usize,
    /// Backing storage kind
    backing_type: BackingType,
    /// Memory mapping, serialized for writes
    mmap: Mutex<MmapMut>,
    /// Owned descriptor for memfd regions
    owned_fd: Option<OwnedFd>,
}

impl SharedMemoryRegion {
    /// Create a new zero-filled region
    pub fn new(config: RegionConfig) -> Result<Self> {
        config.validate()?;

        let (owned_fd, mmap) = match config.backing_type {
            #[cfg(target_os = "linux")]
            BackingType::MemFd => {
                let fd = Self::create_memfd_backing(&config)?;
                let mmap = unsafe {
                    MmapOptions::new()
                        .len(config.size)
                        .map_mut(&fd)
                        .map_err(|e| BufferHubError::from_io(e, "Failed to map memfd"))?
                };
                (Some(fd), mmap)
            }
            BackingType::Anonymous => {
                let mmap = MmapOptions::new()
                    .len(config.size)
                    .map_anon()
                    .map_err(|e| BufferHubError::from_io(e, "Failed to create anonymous mapping"))?;
                (None, mmap)
            }
        };

        Ok(Self {
            size: config.size,
            backing_type: config.backing_type,
            mmap: Mutex::new(mmap),
            owned_fd,
        })
    }

    /// Create memfd-backed storage
    #[cfg(target_os = "linux")]
    fn create_memfd_backing(config: &RegionConfig) -> Result<OwnedFd> {
        use nix::{
            sys::memfd::{memfd_create, MemFdCreateFlag},
            unistd::ftruncate,
        };
        use std::ffi::CString;

        let name_cstr = CString::new(config.name.clone())
            .map_err(|_| BufferHubError::invalid_parameter("name", "Name contains null bytes"))?;

        let owned_fd = memfd_create(&name_cstr, MemFdCreateFlag::MFD_CLOEXEC)
            .map_err(|e| BufferHubError::platform(format!("Failed to create memfd: {}", e)))?;

        ftruncate(&owned_fd, config.size as i64)
            .map_err(|e| BufferHubError::platform(format!("Failed to set memfd size: {}", e)))?;

        Ok(owned_fd)
    }

    /// Copy `data` into the region at `offset`
    pub fn write_at(&self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= self.size)
            .ok_or_else(|| {
                BufferHubError::invalid_parameter(
                    "offset",
                    format!(
                        "write of {} bytes at {} exceeds region size {}",
                        data.len(),
                        offset,
                        self.size
                    ),
                )
            })?;

        let mut mmap = self.mmap.lock().unwrap();
        mmap[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Read `len` bytes starting at `offset`
    pub fn read_at(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.size)
            .ok_or_else(|| {
                BufferHubError::invalid_parameter(
                    "offset",
                    format!(
                        "read of {} bytes at {} exceeds region size {}",
                        len, offset, self.size
                    ),
                )
            })?;

        let mmap = self.mmap.lock().unwrap();
        Ok(mmap[offset..end].to_vec())
    }

    /// Get the size of the region
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the backing type
    pub fn backing_type(&self) -> BackingType {
        self.backing_type
    }

    /// Get the file descriptor, if the backing has one
    pub fn fd(&self) -> Option<RawFd> {
        self.owned_fd.as_ref().map(|fd| fd.as_raw_fd())
    }
}
