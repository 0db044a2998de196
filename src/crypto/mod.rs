//! # Cryptographic Primitives
//!
//! Everything security-related in the voting core flows through here:
//!
//! - **SHA-256** for block hashing, chain linkage, and voter-id derivation.
//! - **RSA-2048 / PSS-SHA256** for ballot signatures and the private-key
//!   ownership proof used by voter login. PSS rather than PKCS#1 v1.5:
//!   randomized padding closes the malleability gap.
//! - PEM (PKCS#8 private, SPKI public) as the only key interchange format.
//!
//! Every function here is a thin, type-safe wrapper over audited
//! implementations from the `sha2` and `rsa` crates. Nothing in this
//! module invents cryptography.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{sha256_hex, voter_id};
pub use keys::{generate_keypair, KeyError, PemKeypair};
pub use signatures::{
    ballot_signing_bytes, sign, verify, verify_private_key_ownership, OwnershipError, SignError,
};
