//! # Request Gate
//!
//! The two stages every mutating request passes before the validator and
//! the state machine see it:
//!
//! ```text
//! caller -> rate limiter (limiter.rs) -> auth gate (auth.rs) -> role check
//! ```
//!
//! Rejections short-circuit: a rate-limited caller never reaches token
//! validation, an unauthenticated caller never reaches the role check.

pub mod auth;
pub mod limiter;

pub use auth::{authorize_history_access, bearer_token, require_role, AuthGate};
pub use limiter::RateLimiter;
