//! # Operation Contract
//!
//! The typed inputs and outputs of every core operation, plus the uniform
//! success/error envelopes. The transport layer (out of scope here) does
//! nothing but deserialize into these requests, run the pipeline, and
//! serialize the envelopes back out.
//!
//! Each request owns its canonicalisation: `validated()` sanitises the
//! free-text fields and applies the field rules, returning the cleaned
//! request or the first `BAD_REQUEST`. The state machine only ever sees
//! requests that came out of `validated()`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VotingError};
use crate::identity::Admin;
use crate::validation;
use crate::voting::types::{Poll, PollStatus};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Input of the voter-registration operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterVoterRequest {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl RegisterVoterRequest {
    /// Sanitise and validate. Department is optional, but when present it
    /// must satisfy the same bounds as a name.
    pub fn validated(self) -> Result<Self> {
        let email = validation::sanitize(&self.email);
        let name = validation::sanitize(&self.name);
        let department = self
            .department
            .map(|d| validation::sanitize(&d))
            .filter(|d| !d.is_empty());

        validation::validate_email(&email)?;
        validation::validate_name(&name)?;
        if let Some(d) = &department {
            validation::validate_department(d)?;
        }
        Ok(Self {
            email,
            name,
            department,
        })
    }
}

/// Input of the poll-creation operation (admin only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePollRequest {
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    pub creator: String,
    pub duration_hours: u32,
    #[serde(default)]
    pub eligible_voters: Vec<String>,
    #[serde(default)]
    pub allow_multiple_votes: bool,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl CreatePollRequest {
    pub fn validated(self) -> Result<Self> {
        let title = validation::sanitize(&self.title);
        let description = validation::sanitize(&self.description);
        let creator = validation::sanitize(&self.creator);
        let options: Vec<String> = self
            .options
            .iter()
            .map(|o| validation::sanitize(o))
            .collect();

        validation::validate_poll_title(&title)?;
        validation::validate_poll_description(&description)?;
        validation::validate_poll_options(&options)?;
        validation::validate_duration_hours(self.duration_hours)?;
        validation::validate_name(&creator)?;
        for voter_id in &self.eligible_voters {
            validation::validate_voter_id(voter_id)?;
        }

        Ok(Self {
            title,
            description,
            options,
            creator,
            ..self
        })
    }

    /// Build the poll record: the window opens now and runs for the
    /// requested number of hours. The poll id is assigned by the state
    /// machine, not here.
    pub fn into_poll(self, now: DateTime<Utc>) -> Poll {
        Poll {
            poll_id: Uuid::nil(),
            title: self.title,
            description: self.description,
            options: self.options,
            creator: self.creator,
            start_time: now,
            end_time: now + Duration::hours(self.duration_hours as i64),
            eligible_voters: self.eligible_voters,
            allow_multiple_votes: self.allow_multiple_votes,
            is_anonymous: self.is_anonymous,
        }
    }
}

/// Input of the vote-casting operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVoteRequest {
    pub poll_id: String,
    pub voter_id: String,
    pub choice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl CastVoteRequest {
    pub fn validated(self) -> Result<Self> {
        let poll_id = validation::sanitize(&self.poll_id);
        let voter_id = validation::sanitize(&self.voter_id);
        let choice = validation::sanitize(&self.choice);

        validation::validate_poll_id(&poll_id)?;
        validation::validate_voter_id(&voter_id)?;
        if choice.is_empty() {
            return Err(VotingError::BadRequest("choice is required".to_string()));
        }
        Ok(Self {
            poll_id,
            voter_id,
            choice,
            ..self
        })
    }

    /// The poll id as a UUID. `validated()` has already pinned the format.
    pub fn poll_uuid(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.poll_id)
            .map_err(|_| VotingError::BadRequest("invalid poll ID format".to_string()))
    }
}

/// Admin username/password login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginRequest {
    pub username: String,
    pub password: String,
}

impl AdminLoginRequest {
    pub fn validated(self) -> Result<Self> {
        let username = validation::sanitize(&self.username);
        validation::validate_username(&username)?;
        validation::validate_password(&self.password)?;
        Ok(Self {
            username,
            password: self.password,
        })
    }
}

/// Voter login: proof of private-key possession.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterLoginRequest {
    pub voter_id: String,
    pub private_key: String,
}

impl VoterLoginRequest {
    pub fn validated(self) -> Result<Self> {
        let voter_id = validation::sanitize(&self.voter_id);
        validation::validate_voter_id(&voter_id)?;
        if self.private_key.trim().is_empty() {
            return Err(VotingError::BadRequest("private key is required".to_string()));
        }
        Ok(Self {
            voter_id,
            private_key: self.private_key,
        })
    }
}

/// Token refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What a successful registration returns. The private key appears here
/// and nowhere else, ever again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationCredentials {
    pub voter_id: String,
    pub private_key: String,
    pub public_key: String,
}

/// A successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Admin>,
}

/// Poll as shown in public listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSummary {
    pub poll_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: PollStatus,
    pub options: Vec<String>,
    pub creator: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_anonymous: bool,
}

impl From<&Poll> for PollSummary {
    fn from(poll: &Poll) -> Self {
        Self {
            poll_id: poll.poll_id,
            title: poll.title.clone(),
            description: poll.description.clone(),
            status: poll.status(),
            options: poll.options.clone(),
            creator: poll.creator.clone(),
            start_time: poll.start_time,
            end_time: poll.end_time,
            is_anonymous: poll.is_anonymous,
        }
    }
}

/// Single-poll view. Exposes the eligible-voter and cast counts, never
/// the participation set itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollDetail {
    #[serde(flatten)]
    pub summary: PollSummary,
    pub eligible_voters_count: usize,
    pub allow_multiple_votes: bool,
    pub votes_cast: usize,
}

impl PollDetail {
    pub fn new(poll: &Poll, votes_cast: usize) -> Self {
        Self {
            summary: PollSummary::from(poll),
            eligible_voters_count: poll.eligible_voters.len(),
            allow_multiple_votes: poll.allow_multiple_votes,
            votes_cast,
        }
    }
}

/// Result of a chain verification pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub is_valid: bool,
    pub chain_length: usize,
    pub message: String,
}

impl VerificationReport {
    pub fn new(is_valid: bool, chain_length: usize) -> Self {
        let message = if is_valid {
            "Blockchain is valid and secure".to_string()
        } else {
            "Blockchain integrity compromised!".to_string()
        };
        Self {
            is_valid,
            chain_length,
            message,
        }
    }
}

/// Result of a manual mining request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MineReport {
    pub votes_mined: usize,
    pub new_block_index: u64,
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Uniform success envelope: `{success: true, data?, message?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> SuccessEnvelope<T> {
    pub fn of(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

/// Uniform error envelope:
/// `{success: false, error, error_code?, request_id?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorEnvelope {
    /// Build the envelope for an error, tagging it with the request id
    /// the transport layer generated for this call.
    pub fn of(error: &VotingError, request_id: Option<&str>) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            error_code: error.code().to_string(),
            request_id: request_id.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_sanitises_and_validates() {
        let req = RegisterVoterRequest {
            email: "  alice@x.io  ".to_string(),
            name: " Alice\u{0} Liddell ".to_string(),
            department: Some("   ".to_string()),
        };
        let cleaned = req.validated().unwrap();
        assert_eq!(cleaned.email, "alice@x.io");
        assert_eq!(cleaned.name, "Alice Liddell");
        assert!(cleaned.department.is_none());

        let bad = RegisterVoterRequest {
            email: "nope".to_string(),
            name: "Alice".to_string(),
            department: None,
        };
        assert!(bad.validated().is_err());
    }

    #[test]
    fn poll_request_builds_the_window() {
        let req = CreatePollRequest {
            title: "Favourite language".to_string(),
            description: "pick one, defend nothing".to_string(),
            options: vec!["Go".to_string(), "Rust".to_string()],
            creator: "admin".to_string(),
            duration_hours: 2,
            eligible_voters: vec![],
            allow_multiple_votes: false,
            is_anonymous: false,
        };
        let now = Utc::now();
        let poll = req.validated().unwrap().into_poll(now);
        assert_eq!(poll.start_time, now);
        assert_eq!(poll.end_time, now + Duration::hours(2));
        assert!(poll.poll_id.is_nil());
    }

    #[test]
    fn poll_request_rejects_bad_fields() {
        let base = CreatePollRequest {
            title: "Favourite language".to_string(),
            description: "pick one, defend nothing".to_string(),
            options: vec!["Go".to_string(), "Rust".to_string()],
            creator: "admin".to_string(),
            duration_hours: 2,
            eligible_voters: vec![],
            allow_multiple_votes: false,
            is_anonymous: false,
        };

        let mut short_title = base.clone();
        short_title.title = "hi".to_string();
        assert!(short_title.validated().is_err());

        let mut zero_hours = base.clone();
        zero_hours.duration_hours = 0;
        assert!(zero_hours.validated().is_err());

        let mut bad_eligible = base;
        bad_eligible.eligible_voters = vec!["not-hex".to_string()];
        assert!(bad_eligible.validated().is_err());
    }

    #[test]
    fn cast_request_pins_id_formats() {
        let req = CastVoteRequest {
            poll_id: "123e4567-e89b-42d3-a456-426614174000".to_string(),
            voter_id: "a1b2c3d4e5f60718".to_string(),
            choice: "Go".to_string(),
            signature: None,
        };
        let cleaned = req.validated().unwrap();
        assert!(cleaned.poll_uuid().is_ok());

        let bad = CastVoteRequest {
            poll_id: "not-a-uuid".to_string(),
            voter_id: "a1b2c3d4e5f60718".to_string(),
            choice: "Go".to_string(),
            signature: None,
        };
        assert!(bad.validated().is_err());
    }

    #[test]
    fn envelopes_serialize_to_the_wire_contract() {
        let ok = SuccessEnvelope::with_message(
            serde_json::json!({"vote_id": "x"}),
            "Vote cast successfully",
        );
        let ok_json = serde_json::to_value(&ok).unwrap();
        assert_eq!(ok_json["success"], true);
        assert_eq!(ok_json["data"]["vote_id"], "x");

        let err = ErrorEnvelope::of(&VotingError::DoubleVote, Some("req-42"));
        let err_json = serde_json::to_value(&err).unwrap();
        assert_eq!(err_json["success"], false);
        assert_eq!(err_json["error_code"], "DOUBLE_VOTE");
        assert_eq!(err_json["request_id"], "req-42");
    }
}
