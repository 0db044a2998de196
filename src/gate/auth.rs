//! # Authentication Gate
//!
//! Turns an `Authorization` header into validated [`Claims`] and enforces
//! role and subject checks on top. For mutating endpoints the gate runs
//! after the rate limiter and before input validation; any rejection
//! short-circuits the rest of the pipeline.

use std::sync::Arc;

use crate::error::{Result, VotingError};
use crate::identity::{Claims, Role, TokenManager};

/// Extract the token from an `Authorization: Bearer <token>` header value.
/// The scheme is matched case-insensitively; anything else is rejected.
pub fn bearer_token(header: Option<&str>) -> Result<&str> {
    let header = header
        .ok_or_else(|| VotingError::Unauthorized("missing authorization header".to_string()))?;
    let (scheme, token) = header.split_once(' ').ok_or_else(|| {
        VotingError::Unauthorized("malformed authorization header".to_string())
    })?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(VotingError::Unauthorized(
            "authorization scheme must be Bearer".to_string(),
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(VotingError::Unauthorized("empty bearer token".to_string()));
    }
    Ok(token)
}

/// The authentication stage: header in, claims out.
pub struct AuthGate {
    tokens: Arc<TokenManager>,
}

impl AuthGate {
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self { tokens }
    }

    /// Validate the bearer token in `header` and return its claims.
    pub fn authenticate(&self, header: Option<&str>) -> Result<Claims> {
        let token = bearer_token(header)?;
        self.tokens.validate(token)
    }
}

/// Reject with `FORBIDDEN` unless the claims carry the required role.
pub fn require_role(claims: &Claims, role: Role) -> Result<()> {
    if claims.role == role {
        Ok(())
    } else {
        Err(VotingError::Forbidden(format!(
            "requires {role} role"
        )))
    }
}

/// History access control: admins may read any voter's history, voters
/// only their own.
pub fn authorize_history_access(claims: &Claims, subject_voter_id: &str) -> Result<()> {
    match claims.role {
        Role::Admin => Ok(()),
        Role::Voter if claims.voter_id.as_deref() == Some(subject_voter_id) => Ok(()),
        Role::Voter => Err(VotingError::Forbidden(
            "voters may only access their own history".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> (AuthGate, Arc<TokenManager>) {
        let tokens = Arc::new(TokenManager::new("gate-test-secret", 24));
        (AuthGate::new(Arc::clone(&tokens)), tokens)
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(bearer_token(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token(Some("bearer abc")).unwrap(), "abc");
        assert!(bearer_token(None).is_err());
        assert!(bearer_token(Some("Basic dXNlcg==")).is_err());
        assert!(bearer_token(Some("Bearer ")).is_err());
        assert!(bearer_token(Some("justatoken")).is_err());
    }

    #[test]
    fn authenticate_accepts_own_tokens_only() {
        let (gate, tokens) = gate();
        let token = tokens
            .issue("admin-1", "admin@voting.local", Role::Admin, None)
            .unwrap();
        let header = format!("Bearer {token}");
        let claims = gate.authenticate(Some(&header)).unwrap();
        assert_eq!(claims.role, Role::Admin);

        assert!(gate.authenticate(Some("Bearer bogus")).is_err());
        assert!(gate.authenticate(None).is_err());
    }

    #[test]
    fn role_enforcement() {
        let (_, tokens) = gate();
        let token = tokens
            .issue("v1", "alice@x.io", Role::Voter, Some("a1b2c3d4e5f60718"))
            .unwrap();
        let claims = tokens.validate(&token).unwrap();

        assert!(require_role(&claims, Role::Voter).is_ok());
        let err = require_role(&claims, Role::Admin).unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[test]
    fn history_access_scoping() {
        let (_, tokens) = gate();
        let voter = tokens
            .issue("v1", "alice@x.io", Role::Voter, Some("a1b2c3d4e5f60718"))
            .unwrap();
        let voter_claims = tokens.validate(&voter).unwrap();
        assert!(authorize_history_access(&voter_claims, "a1b2c3d4e5f60718").is_ok());
        assert!(authorize_history_access(&voter_claims, "ffffffffffffffff").is_err());

        let admin = tokens
            .issue("admin-1", "admin@voting.local", Role::Admin, None)
            .unwrap();
        let admin_claims = tokens.validate(&admin).unwrap();
        assert!(authorize_history_access(&admin_claims, "a1b2c3d4e5f60718").is_ok());
    }
}
