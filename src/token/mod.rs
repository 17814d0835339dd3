//! One-shot import tokens
//!
//! A token is a random id, a per-issue nonce and an integrity tag keyed with
//! a per-service secret. The table maps live ids to the client they were
//! minted from and removes an entry the moment it is read.

pub mod credential;
pub mod table;

pub use credential::{Token, TokenId, TokenNonce, TokenSigner, TOKEN_NUM_INTS, TOKEN_TAG_LEN};
pub use table::TokenTable;
