//! # Ledger Engine
//!
//! The append-only, hash-chained record behind the voting service.
//!
//! ```text
//! block.rs — block structure, tagged payload, canonical hashing form,
//!            permissive payload decoder
//! chain.rs — chain container: proof-of-work mining, append, integrity
//!            verification, export and fail-closed rehydration
//! ```
//!
//! The engine knows nothing about voting rules. It seals whatever payload
//! the state machine hands it and guarantees three things: indices are
//! dense, every block links to its predecessor by hash, and every hash
//! carries the difficulty prefix.

pub mod block;
pub mod chain;

pub use block::{Block, BlockPayload, GENESIS_MESSAGE, GENESIS_PREVIOUS_HASH};
pub use chain::{Chain, ChainError};
