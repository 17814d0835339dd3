//! Single-use import tokens and their integrity tags

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::{
    error::{BufferHubError, Result},
    handle::NativeHandle,
};

/// Random token identifier, the table key
pub type TokenId = u32;

/// Per-issue secret; ids are recycled, nonces are not
pub type TokenNonce = u128;

/// Integrity tag length in bytes
pub const TOKEN_TAG_LEN: usize = 32;

const WORD: usize = std::mem::size_of::<i32>();
const NONCE_WORDS: usize = std::mem::size_of::<TokenNonce>() / WORD;

/// Integers in a token handle: the id, the nonce words, then the tag words
pub const TOKEN_NUM_INTS: usize = 1 + NONCE_WORDS + TOKEN_TAG_LEN / WORD;

const TAG_DOMAIN: &[u8] = b"bufferhub-token-v2";

/// An import token as held by the service
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    id: TokenId,
    nonce: TokenNonce,
    tag: [u8; TOKEN_TAG_LEN],
}

impl Token {
    /// Token id
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Nonce the token was issued with
    pub fn nonce(&self) -> TokenNonce {
        self.nonce
    }

    /// Encode for transfer: zero fds, id then nonce words then tag words
    pub fn to_handle(&self) -> NativeHandle {
        let mut ints = Vec::with_capacity(TOKEN_NUM_INTS);
        ints.push(self.id as i32);
        ints.extend(words(&self.nonce.to_le_bytes()));
        ints.extend(words(&self.tag));
        NativeHandle::from_ints(ints)
    }

    /// Decode a caller-supplied handle; any shape other than the token layout is rejected
    pub fn from_handle(handle: &NativeHandle) -> Result<Self> {
        if !handle.has_shape(0, TOKEN_NUM_INTS) {
            return Err(BufferHubError::InvalidToken);
        }

        let ints = handle.ints();
        let (nonce_words, tag_words) = ints[1..].split_at(NONCE_WORDS);

        let mut nonce = [0u8; NONCE_WORDS * WORD];
        unpack(&mut nonce, nonce_words);
        let mut tag = [0u8; TOKEN_TAG_LEN];
        unpack(&mut tag, tag_words);

        Ok(Self {
            id: ints[0] as u32,
            nonce: TokenNonce::from_le_bytes(nonce),
            tag,
        })
    }
}

fn words(bytes: &[u8]) -> impl Iterator<Item = i32> + '_ {
    bytes
        .chunks_exact(WORD)
        .map(|w| i32::from_le_bytes([w[0], w[1], w[2], w[3]]))
}

fn unpack(out: &mut [u8], words: &[i32]) {
    for (chunk, word) in out.chunks_exact_mut(WORD).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

/// Compare without short-circuiting on the first mismatch
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("nonce", &"<redacted>")
            .field("tag", &"<redacted>")
            .finish()
    }
}

/// Mints and verifies tokens with a per-service secret
pub struct TokenSigner {
    key: [u8; 32],
}

impl TokenSigner {
    /// Create a signer with a fresh random key
    pub fn new() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Fresh random nonce for one issue
    pub fn nonce(&self) -> TokenNonce {
        let mut bytes = [0u8; NONCE_WORDS * WORD];
        OsRng.fill_bytes(&mut bytes);
        TokenNonce::from_le_bytes(bytes)
    }

    /// Tag over `id` and `nonce`. The message is fixed-length, so a prefix-keyed hash suffices.
    fn tag(&self, id: TokenId, nonce: TokenNonce) -> [u8; TOKEN_TAG_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(TAG_DOMAIN);
        hasher.update(self.key);
        hasher.update(id.to_le_bytes());
        hasher.update(nonce.to_le_bytes());

        let mut tag = [0u8; TOKEN_TAG_LEN];
        tag.copy_from_slice(&hasher.finalize());
        tag
    }

    /// Create the signed token for `id` issued with `nonce`
    pub fn sign(&self, id: TokenId, nonce: TokenNonce) -> Token {
        Token {
            id,
            nonce,
            tag: self.tag(id, nonce),
        }
    }

    /// Check the tag against the id and nonce the token carries
    pub fn verify(&self, token: &Token) -> bool {
        constant_time_eq(&self.tag(token.id, token.nonce), &token.tag)
    }
}

impl Default for TokenSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}
