//! Buffer hub service configuration

use std::time::Duration;

use crate::{
    config::{DEFAULT_ALLOCATION_TIMEOUT, DEFAULT_MAX_USER_METADATA_SIZE, DEFAULT_STRIDE_ALIGNMENT},
    error::{BufferHubError, Result},
    memory::BackingType,
};

/// Configuration for the buffer hub service
#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    /// Backing for buffer storage and metadata regions
    pub backing_type: BackingType,
    /// Stride alignment in pixels for the default allocator
    pub stride_alignment: u32,
    /// Largest user metadata area a caller may request
    pub max_user_metadata_size: u32,
    /// Upper bound on a single allocator call
    pub allocation_timeout: Option<Duration>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            backing_type: BackingType::default(),
            stride_alignment: DEFAULT_STRIDE_ALIGNMENT,
            max_user_metadata_size: DEFAULT_MAX_USER_METADATA_SIZE,
            allocation_timeout: Some(DEFAULT_ALLOCATION_TIMEOUT),
        }
    }
}

impl HubConfig {
    /// Set the backing type
    pub fn with_backing_type(mut self, backing_type: BackingType) -> Self {
        self.backing_type = backing_type;
        self
    }

    /// Set stride alignment
    pub fn with_stride_alignment(mut self, alignment: u32) -> Self {
        self.stride_alignment = alignment;
        self
    }

    /// Set the user metadata limit
    pub fn with_max_user_metadata_size(mut self, size: u32) -> Self {
        self.max_user_metadata_size = size;
        self
    }

    /// Set allocation timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.allocation_timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Buffer handles must carry the storage fd wherever memfd is available
        #[cfg(all(target_os = "linux", feature = "memfd"))]
        if !self.backing_type.is_shareable() {
            return Err(BufferHubError::invalid_parameter(
                "backing_type",
                format!(
                    "{} backing cannot be shared by handle",
                    self.backing_type.name()
                ),
            ));
        }

        if self.stride_alignment == 0 || !self.stride_alignment.is_power_of_two() {
            return Err(BufferHubError::invalid_parameter(
                "stride_alignment",
                "Stride alignment must be a power of two",
            ));
        }

        if let Some(timeout) = self.allocation_timeout {
            if timeout.is_zero() {
                return Err(BufferHubError::invalid_parameter(
                    "allocation_timeout",
                    "Timeout must be non-zero; use None for unbounded",
                ));
            }
        }

        Ok(())
    }
}

/// Builder pattern for hub configuration
pub struct HubConfigBuilder {
    config: HubConfig,
}

impl HubConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: HubConfig::default(),
        }
    }

    /// Set backing type
    pub fn backing_type(mut self, backing_type: BackingType) -> Self {
        self.config.backing_type = backing_type;
        self
    }

    /// Set stride alignment
    pub fn stride_alignment(mut self, alignment: u32) -> Self {
        self.config.stride_alignment = alignment;
        self
    }

    /// Set user metadata limit
    pub fn max_user_metadata_size(mut self, size: u32) -> Self {
        self.config.max_user_metadata_size = size;
        self
    }

    /// Set timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.allocation_timeout = Some(timeout);
        self
    }

    /// No timeout
    pub fn no_timeout(mut self) -> Self {
        self.config.allocation_timeout = None;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<HubConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for HubConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
