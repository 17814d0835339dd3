//! Buffer hub statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the hub counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStatsSnapshot {
    /// Successful allocations
    pub allocations: u64,
    /// Failed allocations
    pub allocation_failures: u64,
    /// Tokens minted
    pub duplicates: u64,
    /// Successful imports
    pub imports: u64,
    /// Rejected imports
    pub import_rejections: u64,
    /// Clients closed, explicitly or by drop
    pub closes: u64,
    /// Nodes released after their last client closed
    pub nodes_released: u64,
}

impl HubStatsSnapshot {
    /// Nodes allocated and not yet released
    pub fn live_nodes(&self) -> u64 {
        self.allocations.saturating_sub(self.nodes_released)
    }

    /// Get a summary string of the statistics
    pub fn summary(&self) -> String {
        format!(
            "HubStats {{ allocations: {}, failures: {}, duplicates: {}, imports: {}, \
             rejected: {}, closes: {}, released: {} }}",
            self.allocations,
            self.allocation_failures,
            self.duplicates,
            self.imports,
            self.import_rejections,
            self.closes,
            self.nodes_released
        )
    }
}

/// Thread-safe counters for the hub
#[derive(Debug, Default)]
pub struct HubStats {
    allocations: AtomicU64,
    allocation_failures: AtomicU64,
    duplicates: AtomicU64,
    imports: AtomicU64,
    import_rejections: AtomicU64,
    closes: AtomicU64,
    nodes_released: AtomicU64,
}

impl HubStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_allocation(&self) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_allocation_failure(&self) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_import(&self) {
        self.imports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_import_rejection(&self) {
        self.import_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_close(&self) {
        self.closes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_node_released(&self) {
        self.nodes_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> HubStatsSnapshot {
        HubStatsSnapshot {
            allocations: self.allocations.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            imports: self.imports.load(Ordering::Relaxed),
            import_rejections: self.import_rejections.load(Ordering::Relaxed),
            closes: self.closes.load(Ordering::Relaxed),
            nodes_released: self.nodes_released.load(Ordering::Relaxed),
        }
    }
}
