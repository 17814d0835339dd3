//! Diagnostic snapshot of the hub

use std::fmt;

use crate::{
    buffers::{BufferId, HardwareBufferDescription},
    client::ClientId,
};

use super::stats::HubStatsSnapshot;

/// One live node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDump {
    pub buffer_id: BufferId,
    pub description: HardwareBufferDescription,
    pub user_metadata_size: u32,
    pub active_clients_mask: u32,
    pub client_ids: Vec<ClientId>,
    pub pending_tokens: usize,
    /// Seconds since allocation
    pub age_seconds: u64,
}

/// Every live node plus global counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubDump {
    pub nodes: Vec<NodeDump>,
    pub pending_tokens: usize,
    pub stats: HubStatsSnapshot,
}

impl HubDump {
    /// Dump entry for `buffer_id`
    pub fn node(&self, buffer_id: BufferId) -> Option<&NodeDump> {
        self.nodes.iter().find(|n| n.buffer_id == buffer_id)
    }
}

impl fmt::Display for HubDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Active buffers: {}", self.nodes.len())?;
        writeln!(
            f,
            "{:>6} {:>8} {:>10} {:>8} {:>8} {:>8} {:>10} {:>8} {:>8} {:>6}",
            "id", "clients", "mask", "width", "height", "layers", "format", "usage", "tokens", "age"
        )?;
        for node in &self.nodes {
            writeln!(
                f,
                "{:>6} {:>8} {:>#10x} {:>8} {:>8} {:>8} {:>#10x} {:>#8x} {:>8} {:>5}s",
                node.buffer_id,
                node.client_ids.len(),
                node.active_clients_mask,
                node.description.width,
                node.description.height,
                node.description.layers,
                node.description.format,
                node.description.usage,
                node.pending_tokens,
                node.age_seconds
            )?;
        }
        writeln!(f, "Pending tokens: {}", self.pending_tokens)?;
        write!(f, "{}", self.stats.summary())
    }
}
