//! # BufferHub - Shared Graphics Buffer Broker
//!
//! BufferHub allocates graphics buffers once and lets several processes
//! share them. Each process holds its own client on a shared buffer node;
//! a client can mint a one-shot token that another process redeems for a
//! client of its own.
//!
//! ## Features
//!
//! - **Buffer nodes**: Canonical storage, description and user metadata
//! - **Clients**: Per-consumer handles with a unique client-state bit
//! - **Tokens**: Unforgeable, single-use, revoked when their origin closes
//! - **Pluggable allocators**: Shared memory by default, memfd on Linux
//! - **Thread-safe**: Every operation may be called from any thread
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              BufferHubService                   │
//! ├─────────────────────────────────────────────────┤
//! │  Token table            │  Node registry        │
//! │  - one-shot tokens      │  - BufferNode (Arc)   │
//! │  - signed, revocable    │  - client bits        │
//! └─────────────────────────────────────────────────┘
//!           │                         │
//!           ▼                         ▼
//! ┌─────────────────┐    ┌─────────────────────────┐
//! │  BufferClient   │───▶│   GraphicsAllocator     │
//! │  (per consumer) │    │   (storage capability)  │
//! └─────────────────┘    └─────────────────────────┘
//! ```

// Core modules
pub mod error;
pub mod handle;
pub mod memory;
pub mod allocators;
pub mod buffers;
pub mod token;
pub mod client;
pub mod service;

// Main API re-exports
pub use service::{
    BufferHubService, BufferInfo, BufferTraits, HubConfig, HubConfigBuilder, HubDump, NodeDump,
    HubStatsSnapshot,
};
pub use client::{BufferClient, ClientId};
pub use error::{BufferHubError, BufferHubStatus, Result};
pub use handle::NativeHandle;
pub use allocators::{AllocatedBuffer, GraphicsAllocator, SharedMemoryAllocator};
pub use buffers::{BufferId, ClientBit, HardwareBufferDescription, PixelFormat};
pub use memory::{BackingType, RegionConfig, SharedMemoryRegion};
pub use token::{Token, TOKEN_NUM_INTS};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants
pub mod config {
    use std::time::Duration;

    /// Default stride alignment in pixels
    pub const DEFAULT_STRIDE_ALIGNMENT: u32 = 16;

    /// Maximum number of simultaneously open clients per buffer
    pub const MAX_CLIENTS_PER_BUFFER: u32 = 32;

    /// Default limit on user metadata (1MB)
    pub const DEFAULT_MAX_USER_METADATA_SIZE: u32 = 1024 * 1024;

    /// Default bound on a single allocator call
    pub const DEFAULT_ALLOCATION_TIMEOUT: Duration = Duration::from_secs(2);
}
