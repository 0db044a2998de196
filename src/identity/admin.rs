//! # Admin Store
//!
//! In-process registry of administrator accounts. Passwords are hashed
//! with Argon2id (memory-hard, salted) and validated with the library's
//! constant-time comparison; the plaintext never outlives the call that
//! carried it.
//!
//! Writes happen only at boot (the seed admin) and through explicit
//! creation, so the store is a plain map behind its own lock, independent
//! of the voting-state lock.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Result, VotingError};

/// An administrator account.
///
/// The password hash is deliberately not serializable: `Admin` appears in
/// login responses, and a PHC hash string in a JSON body is one
/// copy-paste away from an incident.
#[derive(Debug, Clone, Serialize)]
pub struct Admin {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Registry of admin accounts, keyed by username.
pub struct AdminStore {
    admins: RwLock<HashMap<String, Admin>>,
}

impl Default for AdminStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminStore {
    pub fn new() -> Self {
        Self {
            admins: RwLock::new(HashMap::new()),
        }
    }

    /// Create an admin account with a freshly hashed password.
    ///
    /// Fails if the username is taken or the password cannot be hashed.
    pub fn create_admin(&self, username: &str, email: &str, password: &str) -> Result<Admin> {
        let mut admins = self.admins.write();
        if admins.contains_key(username) {
            return Err(VotingError::BadRequest(format!(
                "admin with username {username} already exists"
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| VotingError::Internal(format!("password hashing failed: {e}")))?
            .to_string();

        let admin = Admin {
            id: format!("admin-{}", Uuid::new_v4()),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role: "admin".to_string(),
            created_at: Utc::now(),
        };
        admins.insert(username.to_string(), admin.clone());
        Ok(admin)
    }

    /// Validate credentials. The failure reason is the same for an unknown
    /// username and a wrong password: no account-enumeration oracle.
    pub fn validate_credentials(&self, username: &str, password: &str) -> Result<Admin> {
        let invalid = || VotingError::Unauthorized("invalid username or password".to_string());

        let admins = self.admins.read();
        let admin = admins.get(username).ok_or_else(invalid)?;

        let parsed = PasswordHash::new(&admin.password_hash)
            .map_err(|e| VotingError::Internal(format!("stored hash unparsable: {e}")))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| invalid())?;

        Ok(admin.clone())
    }

    /// Look up an admin by username.
    pub fn get(&self, username: &str) -> Option<Admin> {
        self.admins.read().get(username).cloned()
    }

    /// Build a store holding the boot-time seed admin. Every deployment
    /// has at least this one account; the warning about default
    /// credentials happens at config load, not here.
    pub fn with_seed(username: &str, email: &str, password: &str) -> Result<Self> {
        let store = Self::new();
        let admin = store.create_admin(username, email, password)?;
        tracing::info!(username = %admin.username, "seed admin created");
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_validate() {
        let store = AdminStore::new();
        let created = store.create_admin("admin", "admin@voting.local", "admin123").unwrap();
        assert_eq!(created.role, "admin");
        assert!(created.id.starts_with("admin-"));

        let validated = store.validate_credentials("admin", "admin123").unwrap();
        assert_eq!(validated.username, "admin");
    }

    #[test]
    fn wrong_password_and_unknown_user_fail_identically() {
        let store = AdminStore::new();
        store.create_admin("admin", "admin@voting.local", "admin123").unwrap();

        let wrong = store.validate_credentials("admin", "nope12345").unwrap_err();
        let unknown = store.validate_credentials("ghost", "admin123").unwrap_err();
        assert_eq!(wrong, unknown);
        assert_eq!(wrong.code(), "UNAUTHORIZED");
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let store = AdminStore::new();
        store.create_admin("admin", "a@voting.local", "admin123").unwrap();
        assert!(store.create_admin("admin", "b@voting.local", "other456").is_err());
    }

    #[test]
    fn password_hash_never_serializes() {
        let store = AdminStore::new();
        let admin = store.create_admin("admin", "admin@voting.local", "admin123").unwrap();
        let json = serde_json::to_value(&admin).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }
}
