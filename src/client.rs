//! Per-consumer buffer client handles
//!
//! A client is OPEN while it holds a node reference and a client bit, and
//! CLOSED forever after. Every state transition happens under the client's
//! own lock; bit and token bookkeeping nest inside it (client, then node or
//! token table), never the other way round.

use std::{
    mem,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use log::debug;

use crate::{
    buffers::{BufferId, BufferNode, ClientBit},
    error::{BufferHubError, Result},
    handle::NativeHandle,
    service::{hub::HubShared, traits::BufferTraits},
};

/// Unique identifier for clients
pub type ClientId = u64;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
enum ClientState {
    Open { node: Arc<BufferNode>, bit: ClientBit },
    Closed,
}

/// Client state shared between the handle, the hub and pending tokens
#[derive(Debug)]
pub(crate) struct ClientShared {
    id: ClientId,
    buffer_id: BufferId,
    state: Mutex<ClientState>,
}

impl ClientShared {
    /// Open a new client on `node`, claiming a bit
    pub(crate) fn open(node: &Arc<BufferNode>) -> Result<Arc<Self>> {
        let (node, bit) = node.attach()?;
        let shared = Arc::new(Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            buffer_id: node.id(),
            state: Mutex::new(ClientState::Open { node, bit }),
        });
        debug!(
            "Opened client {} on buffer {} with bit {:#x}",
            shared.id,
            shared.buffer_id,
            bit.mask()
        );
        Ok(shared)
    }

    pub(crate) fn id(&self) -> ClientId {
        self.id
    }

    pub(crate) fn buffer_id(&self) -> BufferId {
        self.buffer_id
    }

    /// Run `f` against the node while holding this client's lock
    pub(crate) fn with_open_node<R>(
        &self,
        f: impl FnOnce(&Arc<BufferNode>, ClientBit) -> Result<R>,
    ) -> Result<R> {
        let state = self.state.lock().unwrap();
        match &*state {
            ClientState::Open { node, bit } => f(node, *bit),
            ClientState::Closed => Err(BufferHubError::client_closed(self.id)),
        }
    }

    /// Open another client on the same node, atomically with respect to `close`
    pub(crate) fn open_sibling(&self) -> Result<Arc<ClientShared>> {
        self.with_open_node(|node, _| ClientShared::open(node))
    }

    /// Transition to CLOSED, returning the node reference it held
    ///
    /// The bit is released before the lock is dropped.
    fn close(&self) -> Result<Arc<BufferNode>> {
        let mut state = self.state.lock().unwrap();
        match mem::replace(&mut *state, ClientState::Closed) {
            ClientState::Open { node, bit } => {
                node.release_client_bit(bit);
                Ok(node)
            }
            ClientState::Closed => Err(BufferHubError::client_closed(self.id)),
        }
    }

    fn client_bit(&self) -> Option<ClientBit> {
        match &*self.state.lock().unwrap() {
            ClientState::Open { bit, .. } => Some(*bit),
            ClientState::Closed => None,
        }
    }

    fn is_closed(&self) -> bool {
        matches!(&*self.state.lock().unwrap(), ClientState::Closed)
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            buffer_id: 0,
            state: Mutex::new(ClientState::Closed),
        })
    }
}

/// A consumer's handle to a shared buffer
///
/// Dropping the handle closes it, the same as a client process going away.
#[derive(Debug)]
pub struct BufferClient {
    shared: Arc<ClientShared>,
    hub: Arc<HubShared>,
}

impl BufferClient {
    pub(crate) fn new(shared: Arc<ClientShared>, hub: Arc<HubShared>) -> Self {
        Self { shared, hub }
    }

    /// Client id
    pub fn id(&self) -> ClientId {
        self.shared.id()
    }

    /// Id of the buffer this client refers to
    pub fn buffer_id(&self) -> BufferId {
        self.shared.buffer_id()
    }

    /// Bit held in the node's client mask, or `None` once closed
    pub fn client_bit(&self) -> Option<ClientBit> {
        self.shared.client_bit()
    }

    /// Whether the client has been closed
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Close the client
    ///
    /// Releases the client bit and revokes every token minted from this
    /// client. Fails with `ClientClosed` on every call after the first.
    pub fn close(&self) -> Result<()> {
        let node = self.shared.close()?;
        self.hub.on_client_closed(&self.shared, node);
        Ok(())
    }

    /// Mint a one-shot token another process can import
    pub fn duplicate(&self) -> Result<NativeHandle> {
        let token = self
            .shared
            .with_open_node(|node, _| Ok(self.hub.tokens.issue(&self.shared, node.id())))?;
        self.hub.stats.record_duplicate();
        Ok(token.to_handle())
    }

    /// Traits describing the buffer as seen by this client
    pub fn traits(&self) -> Result<BufferTraits> {
        self.shared
            .with_open_node(|node, bit| Ok(BufferTraits::new(node, bit)))
    }

    /// Write into the buffer's shared user metadata
    pub fn write_user_metadata(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.shared
            .with_open_node(|node, _| node.metadata().write_user_metadata(offset, data))
    }

    /// Read from the buffer's shared user metadata
    pub fn read_user_metadata(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        self.shared
            .with_open_node(|node, _| node.metadata().read_user_metadata(offset, len))
    }
}

impl Drop for BufferClient {
    fn drop(&mut self) {
        if let Ok(node) = self.shared.close() {
            debug!("Client {} dropped while open, closing", self.shared.id());
            self.hub.on_client_closed(&self.shared, node);
        }
    }
}
