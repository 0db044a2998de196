//! # Identity Module
//!
//! Who is calling, and how do we know.
//!
//! Two credential systems coexist:
//!
//! 1. **Admins** authenticate with username/password against the seeded
//!    [`AdminStore`] (Argon2id hashes, constant-time verification).
//! 2. **Voters** authenticate by proving possession of the private key
//!    whose public half was registered with them (see
//!    `crypto::verify_private_key_ownership`).
//!
//! Both paths end in the same place: an HS256 bearer token from
//! [`TokenManager`] carrying the role and, for voters, the voter-id claim.

pub mod admin;
pub mod tokens;

pub use admin::{Admin, AdminStore};
pub use tokens::{Claims, Role, TokenManager};
