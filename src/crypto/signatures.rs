//! # Ballot Signatures
//!
//! RSA-PSS over SHA-256, salt length equal to the digest length. PSS is
//! randomized, so two signatures over the same ballot differ; verification
//! is the only meaningful equality.
//!
//! Signatures travel as standard base64. Verification returns `false` on
//! any structural failure (bad base64, bad PEM, wrong key type) rather
//! than an error: from the caller's point of view every one of those is
//! "this signature does not verify", and distinguishing them would only
//! build an oracle for attackers.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rsa::Pss;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::keys::{private_key_from_pem, public_key_from_pem};

/// PSS salt length: equal to the SHA-256 digest length.
const PSS_SALT_LEN: usize = 32;

/// Errors during signing. Verification never errors, it returns `false`.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("invalid private key PEM")]
    InvalidPrivateKey,

    #[error("signing operation failed")]
    SigningFailed,
}

/// Sign `data` with a PKCS#8 PEM private key; returns base64(PSS signature).
pub fn sign(data: &[u8], private_pem: &str) -> Result<String, SignError> {
    let key = private_key_from_pem(private_pem).map_err(|_| SignError::InvalidPrivateKey)?;
    let digest = Sha256::digest(data);
    let mut rng = rand::thread_rng();
    let signature = key
        .sign_with_rng(&mut rng, Pss::new_with_salt::<Sha256>(PSS_SALT_LEN), &digest)
        .map_err(|_| SignError::SigningFailed)?;
    Ok(BASE64.encode(signature))
}

/// Verify a base64 PSS signature over `data` with an SPKI PEM public key.
pub fn verify(data: &[u8], signature_b64: &str, public_pem: &str) -> bool {
    let Ok(signature) = BASE64.decode(signature_b64) else {
        return false;
    };
    let Ok(key) = public_key_from_pem(public_pem) else {
        return false;
    };
    let digest = Sha256::digest(data);
    key.verify(Pss::new_with_salt::<Sha256>(PSS_SALT_LEN), &digest, &signature)
        .is_ok()
}

/// Canonical signed bytes for a ballot: the UTF-8 of
/// `poll_id|voter_id|choice`. One encoding, used by signer and verifier,
/// so there is no ambiguity about what a ballot signature covers.
pub fn ballot_signing_bytes(poll_id: &str, voter_id: &str, choice: &str) -> Vec<u8> {
    format!("{poll_id}|{voter_id}|{choice}").into_bytes()
}

/// Prove ownership of the private key matching a registered public key.
///
/// The presenter signs a challenge bound to the voter id; we verify with
/// the public key on file. Used by voter login: holding the private key
/// PEM *is* the credential.
pub fn verify_private_key_ownership(
    private_pem: &str,
    public_pem: &str,
    voter_id: &str,
) -> Result<(), OwnershipError> {
    let challenge = format!("voter-ownership:{voter_id}");
    let signature =
        sign(challenge.as_bytes(), private_pem).map_err(|_| OwnershipError::InvalidPrivateKey)?;
    if verify(challenge.as_bytes(), &signature, public_pem) {
        Ok(())
    } else {
        Err(OwnershipError::Mismatch)
    }
}

/// Outcome of a failed ownership proof.
#[derive(Debug, Error)]
pub enum OwnershipError {
    #[error("presented private key is not valid key material")]
    InvalidPrivateKey,

    #[error("private key does not match the registered public key")]
    Mismatch,
}
