//! Shared memory regions backing buffers and their metadata

pub mod config;
pub mod regions;

pub use config::{BackingType, RegionConfig};
pub use regions::SharedMemoryRegion;
