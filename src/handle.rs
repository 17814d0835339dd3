//! Transport-neutral native handle
//!
//! A handle is what crosses the process boundary: a list of file descriptors
//! followed by a list of integers. The transport duplicates the descriptors;
//! the hub only ever validates the shape before reading fields.

use std::os::fd::RawFd;

/// File descriptors plus inline integers, as marshalled between processes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeHandle {
    fds: Vec<RawFd>,
    ints: Vec<i32>,
}

impl NativeHandle {
    /// Create a handle from its parts
    pub fn new(fds: Vec<RawFd>, ints: Vec<i32>) -> Self {
        Self { fds, ints }
    }

    /// Create a handle carrying only integers
    pub fn from_ints(ints: Vec<i32>) -> Self {
        Self {
            fds: Vec::new(),
            ints,
        }
    }

    /// Number of file descriptors
    pub fn num_fds(&self) -> usize {
        self.fds.len()
    }

    /// Number of integers
    pub fn num_ints(&self) -> usize {
        self.ints.len()
    }

    /// File descriptors carried by the handle
    pub fn fds(&self) -> &[RawFd] {
        &self.fds
    }

    /// Integers carried by the handle
    pub fn ints(&self) -> &[i32] {
        &self.ints
    }

    /// True if the handle carries nothing
    pub fn is_empty(&self) -> bool {
        self.fds.is_empty() && self.ints.is_empty()
    }

    /// Check the handle has exactly the expected layout
    pub fn has_shape(&self, num_fds: usize, num_ints: usize) -> bool {
        self.fds.len() == num_fds && self.ints.len() == num_ints
    }
}
