//! # Bearer Tokens
//!
//! HS256-signed JWTs carrying the caller identity the rest of the core
//! consumes: user id, email, role, and, for voters, the voter id claim
//! that scopes history access.
//!
//! Tokens are issued at login, validated on every authenticated call, and
//! refreshable: a refresh validates the presented token and re-issues the
//! same claims with a fresh expiry. The issuer claim is pinned; a token
//! minted by anything else, however well signed, does not validate.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::TOKEN_ISSUER;
use crate::error::{Result, VotingError};

/// Caller role carried in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Voter,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Voter => write!(f, "voter"),
        }
    }
}

/// The claim set of every token this service issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_id: Option<String>,
    /// Expiry, unix seconds.
    pub exp: i64,
    /// Not-before, unix seconds.
    pub nbf: i64,
    /// Issued-at, unix seconds.
    pub iat: i64,
    pub iss: String,
    pub sub: String,
}

/// Issues and validates bearer tokens over one HMAC secret.
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenManager {
    pub fn new(secret: &str, lifetime_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime: Duration::hours(lifetime_hours),
        }
    }

    /// Issue a token for the given identity. `voter_id` is set for voter
    /// tokens and absent for admin tokens.
    pub fn issue(
        &self,
        user_id: &str,
        email: &str,
        role: Role,
        voter_id: Option<&str>,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            role,
            voter_id: voter_id.map(str::to_string),
            exp: (now + self.lifetime).timestamp(),
            nbf: now.timestamp(),
            iat: now.timestamp(),
            iss: TOKEN_ISSUER.to_string(),
            sub: user_id.to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| VotingError::Internal(format!("token encoding failed: {e}")))
    }

    /// Validate a token and return its claims. Every failure mode, from a
    /// bad signature to an expired `exp` to a foreign issuer, is the same
    /// `UNAUTHORIZED` to the caller.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| VotingError::Unauthorized("invalid or expired token".to_string()))
    }

    /// Validate, then re-issue the same identity with a fresh expiry.
    pub fn refresh(&self, token: &str) -> Result<String> {
        let claims = self.validate(token)?;
        self.issue(
            &claims.user_id,
            &claims.email,
            claims.role,
            claims.voter_id.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> TokenManager {
        TokenManager::new("unit-test-secret", 24)
    }

    #[test]
    fn issue_validate_round_trip() {
        let m = manager();
        let token = m
            .issue("admin-1", "admin@voting.local", Role::Admin, None)
            .unwrap();
        let claims = m.validate(&token).unwrap();
        assert_eq!(claims.user_id, "admin-1");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iss, TOKEN_ISSUER);
        assert_eq!(claims.sub, "admin-1");
        assert!(claims.voter_id.is_none());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn voter_tokens_carry_voter_id() {
        let m = manager();
        let token = m
            .issue(
                "a1b2c3d4e5f60718",
                "alice@x.io",
                Role::Voter,
                Some("a1b2c3d4e5f60718"),
            )
            .unwrap();
        let claims = m.validate(&token).unwrap();
        assert_eq!(claims.role, Role::Voter);
        assert_eq!(claims.voter_id.as_deref(), Some("a1b2c3d4e5f60718"));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = manager()
            .issue("admin-1", "a@voting.local", Role::Admin, None)
            .unwrap();
        let other = TokenManager::new("different-secret", 24);
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let err = manager().validate("not.a.token").unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn refresh_preserves_identity() {
        let m = manager();
        let token = m
            .issue("voter-1", "alice@x.io", Role::Voter, Some("a1b2c3d4e5f60718"))
            .unwrap();
        let refreshed = m.refresh(&token).unwrap();
        let claims = m.validate(&refreshed).unwrap();
        assert_eq!(claims.user_id, "voter-1");
        assert_eq!(claims.voter_id.as_deref(), Some("a1b2c3d4e5f60718"));
    }
}
