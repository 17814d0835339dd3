//! Buffer nodes, their descriptions and client bookkeeping
//!
//! A node is the canonical state of one allocated buffer. Clients hold
//! strong references to it and one bit each in its client mask.

pub mod client_bits;
pub mod description;
pub mod metadata;
pub mod node;

// Re-export main types
pub use client_bits::{ClientBit, ClientBitSet};
pub use description::{HardwareBufferDescription, PixelFormat};
pub use metadata::{MetadataHeader, MetadataRegion, METADATA_HEADER_CAPACITY};
pub use node::{BufferId, BufferNode};
