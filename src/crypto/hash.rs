//! # Hashing Utilities
//!
//! SHA-256 is the only hash in this system: it seals blocks, links the
//! chain, and derives voter identifiers. All digests travel as lowercase
//! hex strings.

use sha2::{Digest, Sha256};

/// Salt appended to an email before hashing into a voter id. Fixed so that
/// registration stays idempotent across restarts and deployments.
const VOTER_ID_SALT: &str = "voting-system";

/// Number of leading hex characters of the digest kept as the voter id
/// (64 bits of the SHA-256 output).
const VOTER_ID_HEX_LEN: usize = 16;

/// Compute the SHA-256 digest of the input and return it as lowercase hex.
///
/// # Example
///
/// ```
/// use ballotchain::crypto::sha256_hex;
///
/// let h = sha256_hex(b"ballot");
/// assert_eq!(h.len(), 64);
/// assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Derive the stable voter id for an email address.
///
/// The id is the first 16 hex characters of `SHA-256(email ∥ "voting-system")`.
/// Deterministic by construction: registering the same email twice yields
/// the same id, which is how duplicate registration is detected.
pub fn voter_id(email: &str) -> String {
    let mut input = String::with_capacity(email.len() + VOTER_ID_SALT.len());
    input.push_str(email);
    input.push_str(VOTER_ID_SALT);
    sha256_hex(input.as_bytes())[..VOTER_ID_HEX_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_known_vector() {
        // FIPS 180-4 test vector for "abc".
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn voter_id_is_deterministic() {
        assert_eq!(voter_id("alice@x.io"), voter_id("alice@x.io"));
    }

    #[test]
    fn voter_id_distinguishes_emails() {
        assert_ne!(voter_id("alice@x.io"), voter_id("bob@x.io"));
    }

    #[test]
    fn voter_id_shape() {
        let id = voter_id("alice@x.io");
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, id.to_lowercase());
    }

    #[test]
    fn voter_id_matches_full_digest_prefix() {
        let full = sha256_hex("alice@x.iovoting-system".as_bytes());
        assert_eq!(voter_id("alice@x.io"), full[..16]);
    }
}
