//! # Persistence Layer
//!
//! Durable mirrors of the in-memory state, both optional, both strictly
//! downstream of the voting machine:
//!
//! ```text
//! relational.rs — Postgres tables (blocks, voters, polls, votes),
//!                 idempotent upserts, startup loaders
//! cache.rs      — Redis key/value blobs (chain, polls, voters),
//!                 last-write-wins, never read back
//! reconciler.rs — the periodic mirror tasks, cooperative shutdown,
//!                 and fail-closed startup rehydration
//! ```
//!
//! The cardinal rule: a persistence failure is the reconciler's problem,
//! never the caller's. In-memory operations commit regardless; the mirror
//! catches up on its next tick.

pub mod cache;
pub mod reconciler;
pub mod relational;

pub use cache::{CacheStore, CHAIN_KEY, POLLS_KEY, VOTERS_KEY};
pub use reconciler::{rehydrate, Reconciler, ReconcilerConfig, RehydrateError};
pub use relational::{RelationalStore, StoreError};
