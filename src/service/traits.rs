//! Buffer traits returned by allocate and import

use std::os::fd::RawFd;

use crate::{
    buffers::{BufferId, BufferNode, ClientBit, HardwareBufferDescription},
    error::{BufferHubError, Result},
    handle::NativeHandle,
};

/// Out-of-band info channel: identity of the buffer as seen by one client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub buffer_id: BufferId,
    pub client_bit: ClientBit,
    pub user_metadata_size: u32,
    /// Descriptor of the shared metadata region, if it has one
    pub metadata_fd: Option<RawFd>,
}

impl BufferInfo {
    /// Integers in an info handle: buffer id, client bit mask, metadata size
    pub const NUM_INTS: usize = 3;

    /// Encode as a native handle
    pub fn to_handle(&self) -> NativeHandle {
        NativeHandle::new(
            self.metadata_fd.into_iter().collect(),
            vec![
                self.buffer_id as i32,
                self.client_bit.mask() as i32,
                self.user_metadata_size as i32,
            ],
        )
    }

    /// Decode a handle, checking shape and field sanity first
    pub fn from_handle(handle: &NativeHandle) -> Result<Self> {
        if handle.num_fds() > 1 || handle.num_ints() != Self::NUM_INTS {
            return Err(BufferHubError::invalid_parameter(
                "buffer_info",
                format!(
                    "Unexpected handle shape ({} fds, {} ints)",
                    handle.num_fds(),
                    handle.num_ints()
                ),
            ));
        }

        let ints = handle.ints();
        let buffer_id = ints[0] as u32;
        if buffer_id == 0 {
            return Err(BufferHubError::invalid_parameter("buffer_id", "Buffer id must be non-zero"));
        }
        let client_bit = ClientBit::from_mask(ints[1] as u32).ok_or_else(|| {
            BufferHubError::invalid_parameter("client_bit", "Client bit must have exactly one bit set")
        })?;

        Ok(Self {
            buffer_id,
            client_bit,
            user_metadata_size: ints[2] as u32,
            metadata_fd: handle.fds().first().copied(),
        })
    }
}

/// Everything a client needs to use a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferTraits {
    /// Finalized description, stride included
    pub description: HardwareBufferDescription,
    /// Handle to the backing storage
    pub buffer_handle: NativeHandle,
    /// Identity info for this client
    pub buffer_info: BufferInfo,
}

impl BufferTraits {
    pub(crate) fn new(node: &BufferNode, bit: ClientBit) -> Self {
        Self {
            description: *node.description(),
            buffer_handle: node.buffer_handle(),
            buffer_info: BufferInfo {
                buffer_id: node.id(),
                client_bit: bit,
                user_metadata_size: node.user_metadata_size(),
                metadata_fd: node.metadata().region().fd(),
            },
        }
    }

    /// Info channel encoded for transfer
    pub fn info_handle(&self) -> NativeHandle {
        self.buffer_info.to_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> BufferInfo {
        BufferInfo {
            buffer_id: 12,
            client_bit: ClientBit::from_index(31).unwrap(),
            user_metadata_size: 64,
            metadata_fd: Some(9),
        }
    }

    #[test]
    fn test_info_handle_round_trip() {
        let handle = info().to_handle();
        assert!(handle.has_shape(1, BufferInfo::NUM_INTS));
        assert_eq!(BufferInfo::from_handle(&handle).unwrap(), info());
    }

    #[test]
    fn test_info_handle_shape_checked() {
        assert!(BufferInfo::from_handle(&NativeHandle::from_ints(vec![1])).is_err());
        assert!(BufferInfo::from_handle(&NativeHandle::new(vec![1, 2], vec![1, 1, 0])).is_err());
        // Zero id and multi-bit masks are not valid identities
        assert!(BufferInfo::from_handle(&NativeHandle::from_ints(vec![0, 1, 0])).is_err());
        assert!(BufferInfo::from_handle(&NativeHandle::from_ints(vec![1, 3, 0])).is_err());
    }
}
