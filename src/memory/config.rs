//! Configuration types for shared memory regions

use serde::{Deserialize, Serialize};

/// Types of shared memory backing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackingType {
    /// Anonymous memory file descriptor, shareable by fd (Linux-specific)
    #[cfg(target_os = "linux")]
    MemFd,
    /// Anonymous private mapping with no descriptor
    Anonymous,
}

impl Default for BackingType {
    fn default() -> Self {
        #[cfg(all(target_os = "linux", feature = "memfd"))]
        {
            Self::MemFd
        }
        #[cfg(not(all(target_os = "linux", feature = "memfd")))]
        {
            Self::Anonymous
        }
    }
}

impl BackingType {
    /// Check if this backing type can hand out a file descriptor
    pub fn is_shareable(&self) -> bool {
        match self {
            #[cfg(target_os = "linux")]
            BackingType::MemFd => true,
            BackingType::Anonymous => false,
        }
    }

    /// Get a human-readable name for the backing type
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(target_os = "linux")]
            BackingType::MemFd => "memfd",
            BackingType::Anonymous => "anonymous",
        }
    }
}

/// Configuration for creating shared memory regions
#[derive(Debug, Clone)]
pub struct RegionConfig {
    /// Name of the region, visible in /proc for memfd backings
    pub name: String,
    /// Total size of the region in bytes
    pub size: usize,
    /// Backing type for the region
    pub backing_type: BackingType,
}

impl RegionConfig {
    /// Create a new region configuration
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            backing_type: BackingType::default(),
        }
    }

    /// Set the backing type
    pub fn with_backing_type(mut self, backing_type: BackingType) -> Self {
        self.backing_type = backing_type;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        use crate::error::BufferHubError;

        if self.name.is_empty() {
            return Err(BufferHubError::invalid_parameter(
                "name",
                "Region name cannot be empty",
            ));
        }

        if self.name.as_bytes().contains(&0) {
            return Err(BufferHubError::invalid_parameter(
                "name",
                "Region name contains null bytes",
            ));
        }

        if self.size == 0 {
            return Err(BufferHubError::invalid_parameter(
                "size",
                "Region size must be greater than 0",
            ));
        }

        Ok(())
    }
}
