//! Per-node shared metadata region
//!
//! Layout: a length-prefixed bincode header in the first
//! [`METADATA_HEADER_CAPACITY`] bytes, followed by the user metadata area.

use serde::{Deserialize, Serialize};

use crate::{
    error::{BufferHubError, Result},
    memory::{BackingType, RegionConfig, SharedMemoryRegion},
};

use super::{description::HardwareBufferDescription, node::BufferId};

/// Bytes reserved at the start of the region for the header
pub const METADATA_HEADER_CAPACITY: usize = 128;

const LENGTH_PREFIX: usize = std::mem::size_of::<u32>();

/// Identity header stored at the start of every metadata region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataHeader {
    pub magic: u64,
    pub version: u32,
    pub buffer_id: BufferId,
    pub user_metadata_size: u32,
    pub description: HardwareBufferDescription,
}

impl MetadataHeader {
    /// Magic number ("BUFHUB" + layout version)
    pub const MAGIC: u64 = 0x4255_4648_5542_0001;
    /// Current layout version
    pub const VERSION: u32 = 1;

    /// Create a header for a node
    pub fn new(
        buffer_id: BufferId,
        user_metadata_size: u32,
        description: HardwareBufferDescription,
    ) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            buffer_id,
            user_metadata_size,
            description,
        }
    }

    /// Check magic and version
    pub fn is_valid(&self) -> bool {
        self.magic == Self::MAGIC && self.version == Self::VERSION
    }
}

/// Shared region holding a node's header and user metadata
#[derive(Debug)]
pub struct MetadataRegion {
    region: SharedMemoryRegion,
    user_metadata_size: u32,
}

impl MetadataRegion {
    /// Create the region and write the header into it
    pub fn create(header: &MetadataHeader, backing_type: BackingType) -> Result<Self> {
        let encoded = bincode::serialize(header)?;
        if LENGTH_PREFIX + encoded.len() > METADATA_HEADER_CAPACITY {
            return Err(BufferHubError::serialization(format!(
                "Metadata header of {} bytes exceeds capacity {}",
                encoded.len(),
                METADATA_HEADER_CAPACITY - LENGTH_PREFIX
            )));
        }

        let size = METADATA_HEADER_CAPACITY + header.user_metadata_size as usize;
        let config = RegionConfig::new(format!("bufferhub-metadata-{}", header.buffer_id), size)
            .with_backing_type(backing_type);
        let region = SharedMemoryRegion::new(config)?;

        region.write_at(0, &(encoded.len() as u32).to_le_bytes())?;
        region.write_at(LENGTH_PREFIX, &encoded)?;

        Ok(Self {
            region,
            user_metadata_size: header.user_metadata_size,
        })
    }

    /// Decode the header currently stored in the region
    pub fn read_header(&self) -> Result<MetadataHeader> {
        let prefix = self.region.read_at(0, LENGTH_PREFIX)?;
        let mut len_bytes = [0u8; LENGTH_PREFIX];
        len_bytes.copy_from_slice(&prefix);
        let len = u32::from_le_bytes(len_bytes) as usize;

        if len == 0 || LENGTH_PREFIX + len > METADATA_HEADER_CAPACITY {
            return Err(BufferHubError::serialization("Corrupt metadata header length"));
        }

        let header: MetadataHeader = bincode::deserialize(&self.region.read_at(LENGTH_PREFIX, len)?)?;
        if !header.is_valid() {
            return Err(BufferHubError::serialization("Metadata header magic mismatch"));
        }
        Ok(header)
    }

    /// Write into the user metadata area
    pub fn write_user_metadata(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.check_user_range(offset, data.len())?;
        self.region.write_at(METADATA_HEADER_CAPACITY + offset, data)
    }

    /// Read from the user metadata area
    pub fn read_user_metadata(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        self.check_user_range(offset, len)?;
        self.region.read_at(METADATA_HEADER_CAPACITY + offset, len)
    }

    /// Capacity of the user metadata area
    pub fn user_metadata_size(&self) -> u32 {
        self.user_metadata_size
    }

    /// Underlying shared region
    pub fn region(&self) -> &SharedMemoryRegion {
        &self.region
    }

    fn check_user_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.user_metadata_size as usize => Ok(()),
            _ => Err(BufferHubError::invalid_parameter(
                "offset",
                format!(
                    "{} bytes at {} exceed user metadata size {}",
                    len, offset, self.user_metadata_size
                ),
            )),
        }
    }
}
