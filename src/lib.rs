// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Ballotchain — Blockchain-Backed Voting Core
//!
//! An append-only, hash-chained ledger that records voter registrations,
//! poll definitions, and signed ballots, wrapped in the state machine that
//! enforces the voting rules and mirrored asynchronously into durable
//! stores. Single node by design: proof-of-work is a tamper-evidence
//! seal, not a consensus mechanism.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of the
//! service:
//!
//! - **crypto** — SHA-256 digests, RSA-2048/PSS ballot signatures,
//!   voter-id derivation. Thin wrappers over audited implementations.
//! - **identity** — Seeded admin store (Argon2id) and HS256 bearer tokens.
//! - **ledger** — Block structure, canonical hashing, proof-of-work
//!   mining, chain verification, fail-closed rehydration.
//! - **voting** — The state machine: registries, eligibility, at most one
//!   vote per poll, anonymity stripping, batched mining, tallying.
//! - **gate** — Sliding-window rate limiting (three tiers) and the
//!   bearer-token authentication stage with role enforcement.
//! - **validation** — Per-field format rules and the canonicalising
//!   sanitiser every request passes through.
//! - **persistence** — The background reconciler mirroring state into
//!   Postgres and Redis, plus startup rehydration.
//! - **contract** — Typed operation inputs, result shapes, and the
//!   uniform success/error envelopes.
//! - **config** / **error** / **logging** — The ambient plumbing.
//!
//! ## Pipeline
//!
//! Every mutating operation runs the same gauntlet, each stage
//! short-circuiting the rest:
//!
//! ```text
//! caller -> rate limiter -> auth gate -> role check -> validation
//!        -> voting state machine -> ledger (under the write lock)
//!        -> persistence reconciler (async, best-effort)
//! ```
//!
//! Reads bypass the reconciler entirely and serve from memory.
//!
//! ## Design Philosophy
//!
//! 1. One owner for all mutable voting state, one lock around it.
//! 2. One canonical JSON encoding at rest; permissive decoding at the
//!    boundary, typed data everywhere else.
//! 3. The ledger never truncates and never guesses: a reloaded chain that
//!    fails verification stops the boot.
//! 4. Persistence failures are logged and retried, never surfaced.

pub mod config;
pub mod contract;
pub mod crypto;
pub mod error;
pub mod gate;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod persistence;
pub mod validation;
pub mod voting;

pub use config::Config;
pub use error::{Result, VotingError};
pub use voting::VotingMachine;
