//! Registry of pending imports keyed by token

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, Weak},
    time::Instant,
};

use log::debug;
use rand::{rngs::OsRng, RngCore};

use crate::{
    buffers::BufferId,
    client::{ClientId, ClientShared},
    error::{BufferHubError, Result},
};

use super::credential::{constant_time_eq, Token, TokenId, TokenNonce, TokenSigner};

/// A duplicate waiting to be imported
#[derive(Debug)]
pub(crate) struct PendingImport {
    /// Client the token was minted from; weak so tokens never keep it alive
    pub origin: Weak<ClientShared>,
    pub client_id: ClientId,
    pub buffer_id: BufferId,
    pub issued_at: Instant,
    nonce: TokenNonce,
}

/// Process-wide token table with remove-on-read semantics
#[derive(Debug)]
pub struct TokenTable {
    signer: TokenSigner,
    pending: Mutex<HashMap<TokenId, PendingImport>>,
}

impl TokenTable {
    /// Create an empty table with a fresh signing key
    pub fn new() -> Self {
        Self {
            signer: TokenSigner::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Mint a token for `origin` and record it as pending
    pub(crate) fn issue(&self, origin: &Arc<ClientShared>, buffer_id: BufferId) -> Token {
        let mut pending = self.pending.lock().unwrap();

        let id = loop {
            let candidate = OsRng.next_u32();
            if candidate != 0 && !pending.contains_key(&candidate) {
                break candidate;
            }
        };

        let token = self.register(&mut pending, id, origin, buffer_id);
        debug!(
            "Issued token for client {} on buffer {} ({} pending)",
            origin.id(),
            buffer_id,
            pending.len()
        );
        token
    }

    /// Record a pending entry under `id` with a fresh nonce
    fn register(
        &self,
        pending: &mut HashMap<TokenId, PendingImport>,
        id: TokenId,
        origin: &Arc<ClientShared>,
        buffer_id: BufferId,
    ) -> Token {
        let nonce = self.signer.nonce();
        pending.insert(
            id,
            PendingImport {
                origin: Arc::downgrade(origin),
                client_id: origin.id(),
                buffer_id,
                issued_at: Instant::now(),
                nonce,
            },
        );
        self.signer.sign(id, nonce)
    }

    /// Consume a token. Succeeds at most once per issued token.
    ///
    /// Ids are reused once freed, so the entry is only taken when the token
    /// carries the nonce it was issued with. A mismatch leaves the entry pending.
    pub(crate) fn consume(&self, token: &Token) -> Result<PendingImport> {
        if !self.signer.verify(token) {
            return Err(BufferHubError::InvalidToken);
        }

        let mut pending = self.pending.lock().unwrap();
        let matches = pending.get(&token.id()).map_or(false, |entry| {
            constant_time_eq(&entry.nonce.to_le_bytes(), &token.nonce().to_le_bytes())
        });
        if !matches {
            return Err(BufferHubError::InvalidToken);
        }

        pending.remove(&token.id()).ok_or(BufferHubError::InvalidToken)
    }

    /// Drop every token minted by `client_id`; returns how many were pending
    pub(crate) fn revoke_client(&self, client_id: ClientId) -> usize {
        let mut pending = self.pending.lock().unwrap();
        let before = pending.len();
        pending.retain(|_, entry| entry.client_id != client_id);
        before - pending.len()
    }

    /// Number of pending tokens
    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// True if no token is pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending token count per buffer, for diagnostics
    pub fn pending_by_buffer(&self) -> HashMap<BufferId, usize> {
        let pending = self.pending.lock().unwrap();
        let mut counts = HashMap::new();
        for entry in pending.values() {
            *counts.entry(entry.buffer_id).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for TokenTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{handle::NativeHandle, token::TOKEN_NUM_INTS};

    #[test]
    fn test_consume_is_one_shot() {
        let table = TokenTable::new();
        let origin = ClientShared::detached();
        let token = table.issue(&origin, 9);

        assert_eq!(table.len(), 1);
        let pending = table.consume(&token).unwrap();
        assert_eq!(pending.buffer_id, 9);
        assert_eq!(pending.client_id, origin.id());
        assert!(table.is_empty());

        assert!(matches!(table.consume(&token), Err(BufferHubError::InvalidToken)));
    }

    #[test]
    fn test_forged_token_rejected() {
        let table = TokenTable::new();
        let origin = ClientShared::detached();
        let token = table.issue(&origin, 1);

        let mut ints = token.to_handle().ints().to_vec();
        ints[TOKEN_NUM_INTS - 1] ^= 1;
        let forged = Token::from_handle(&NativeHandle::from_ints(ints)).unwrap();

        assert!(table.consume(&forged).is_err());
        // The genuine token is still pending
        assert_eq!(table.len(), 1);
        assert!(table.consume(&token).is_ok());
    }

    #[test]
    fn test_revoke_client() {
        let table = TokenTable::new();
        let a = ClientShared::detached();
        let b = ClientShared::detached();

        let ta1 = table.issue(&a, 1);
        let _ta2 = table.issue(&a, 1);
        let tb = table.issue(&b, 2);

        assert_eq!(table.pending_by_buffer().get(&1), Some(&2));
        assert_eq!(table.revoke_client(a.id()), 2);
        assert_eq!(table.len(), 1);
        assert!(table.consume(&ta1).is_err());
        assert!(table.consume(&tb).is_ok());
    }

    #[test]
    fn test_consumed_token_cannot_take_reused_id() {
        let table = TokenTable::new();
        let first = ClientShared::detached();
        let second = ClientShared::detached();

        let stale = table.issue(&first, 1);
        table.consume(&stale).unwrap();

        // Same id handed out again, as a random draw can do once it is free
        let fresh = {
            let mut pending = table.pending.lock().unwrap();
            table.register(&mut pending, stale.id(), &second, 2)
        };
        assert_eq!(fresh.id(), stale.id());
        assert_ne!(fresh, stale);

        assert!(matches!(table.consume(&stale), Err(BufferHubError::InvalidToken)));
        assert_eq!(table.len(), 1);
        assert_eq!(table.pending_by_buffer().get(&2), Some(&1));

        let redeemed = table.consume(&fresh).unwrap();
        assert_eq!(redeemed.client_id, second.id());
        assert_eq!(redeemed.buffer_id, 2);
        assert!(table.is_empty());
    }

    #[test]
    fn test_revoked_token_cannot_take_reused_id() {
        let table = TokenTable::new();
        let first = ClientShared::detached();
        let second = ClientShared::detached();

        let revoked = table.issue(&first, 1);
        assert_eq!(table.revoke_client(first.id()), 1);

        let _fresh = {
            let mut pending = table.pending.lock().unwrap();
            table.register(&mut pending, revoked.id(), &second, 3)
        };

        assert!(table.consume(&revoked).is_err());
        assert_eq!(table.len(), 1);
    }
}
