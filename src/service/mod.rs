//! Buffer hub service and its configuration, statistics and diagnostics

pub mod config;
pub mod dump;
pub mod hub;
pub mod stats;
pub mod traits;

pub use config::{HubConfig, HubConfigBuilder};
pub use dump::{HubDump, NodeDump};
pub use hub::BufferHubService;
pub use stats::{HubStats, HubStatsSnapshot};
pub use traits::{BufferInfo, BufferTraits};
