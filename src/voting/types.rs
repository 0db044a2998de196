//! Core type definitions for the voting domain.
//!
//! These types form the vocabulary of every operation in the system and
//! double as the JSON wire shapes: the serde field names below are the
//! at-rest and on-the-wire contract. Deserialization additionally accepts
//! the capitalized key variants that older exports used, so a record
//! written by any historical encoder decodes through the same path.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Voter
// ---------------------------------------------------------------------------

/// A registered voter.
///
/// The voter id is derived from the email (see `crypto::voter_id`), which
/// makes registration idempotent: the same email always collides with its
/// own earlier registration. The private key is never stored anywhere;
/// only the SPKI public key PEM lives in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(alias = "VoterID")]
    pub voter_id: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Email")]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "Department")]
    pub department: Option<String>,
    /// SPKI PEM. Ballot signatures are verified against this key.
    #[serde(alias = "PublicKey")]
    pub public_key: String,
    #[serde(alias = "RegisteredAt")]
    pub registered_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

/// A poll definition. Created once, never removed; "active" is purely a
/// function of the clock and the `[start_time, end_time)` window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    #[serde(alias = "PollID")]
    pub poll_id: Uuid,
    #[serde(alias = "Title")]
    pub title: String,
    #[serde(alias = "Description")]
    pub description: String,
    /// Ordered, pairwise-distinct option strings. A ballot's choice must
    /// match one of these exactly.
    #[serde(alias = "Options")]
    pub options: Vec<String>,
    #[serde(alias = "Creator")]
    pub creator: String,
    #[serde(alias = "StartTime")]
    pub start_time: DateTime<Utc>,
    #[serde(alias = "EndTime")]
    pub end_time: DateTime<Utc>,
    /// Voter ids allowed to vote. An empty list at creation time is
    /// rewritten to a snapshot of all currently registered voters.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        alias = "EligibleVoters"
    )]
    pub eligible_voters: Vec<String>,
    #[serde(default, alias = "AllowMultipleVotes")]
    pub allow_multiple_votes: bool,
    #[serde(default, alias = "IsAnonymous")]
    pub is_anonymous: bool,
}

impl Poll {
    /// Whether the poll is active at the given instant:
    /// `start_time <= now < end_time`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time && now < self.end_time
    }

    /// Whether the poll is active right now.
    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// Current lifecycle label.
    pub fn status(&self) -> PollStatus {
        if self.is_active() {
            PollStatus::Active
        } else {
            PollStatus::Closed
        }
    }
}

/// Lifecycle label surfaced in poll listings and tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Active,
    Closed,
}

// ---------------------------------------------------------------------------
// Ballot
// ---------------------------------------------------------------------------

/// A single cast choice by one voter in one poll.
///
/// For anonymous polls the stored `voter_id` is the literal `"anonymous"`;
/// the true id lives only in the poll's participation set, which keeps
/// double-vote detection working without tying the ballot to a person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(alias = "VoteID")]
    pub vote_id: Uuid,
    #[serde(alias = "PollID")]
    pub poll_id: Uuid,
    #[serde(alias = "VoterID")]
    pub voter_id: String,
    #[serde(alias = "Choice")]
    pub choice: String,
    #[serde(alias = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    /// base64 RSA-PSS signature over `poll_id|voter_id|choice`. Absent on
    /// ballots cast into anonymous polls.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "Signature")]
    pub signature: Option<String>,
}

/// Sentinel written into the stored ballot of an anonymous poll.
pub const ANONYMOUS_VOTER: &str = "anonymous";

// ---------------------------------------------------------------------------
// Read-model shapes
// ---------------------------------------------------------------------------

/// Tally of a single poll across the whole ledger plus the pending buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResults {
    pub poll_id: Uuid,
    pub title: String,
    pub status: PollStatus,
    /// Option string to vote count. Every option appears, zero or not.
    pub results: HashMap<String, u64>,
    pub total_votes: u64,
    /// Participation over eligibility as a percentage string with one
    /// decimal, or `"N/A"` when the eligible set is empty.
    pub voter_turnout: String,
}

/// One entry of a voter's history: a ballot plus where it landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoterHistoryEntry {
    pub vote_id: Uuid,
    pub poll_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_title: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub block_index: u64,
}

/// Point-in-time statistics over the whole system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub chain_length: usize,
    pub total_votes: usize,
    pub pending_votes: usize,
    pub total_voters: usize,
    pub total_polls: usize,
    pub active_polls: usize,
    pub blockchain_valid: bool,
    pub mining_difficulty: usize,
    pub mining_threshold: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn poll_with_window(start_offset_min: i64, end_offset_min: i64) -> Poll {
        let now = Utc::now();
        Poll {
            poll_id: Uuid::new_v4(),
            title: "Window test".to_string(),
            description: "checks the activity window".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            creator: "tests".to_string(),
            start_time: now + Duration::minutes(start_offset_min),
            end_time: now + Duration::minutes(end_offset_min),
            eligible_voters: vec![],
            allow_multiple_votes: false,
            is_anonymous: false,
        }
    }

    #[test]
    fn activity_window_is_half_open() {
        let p = poll_with_window(0, 60);
        assert!(p.is_active_at(p.start_time));
        assert!(!p.is_active_at(p.end_time));
        assert!(p.is_active_at(p.end_time - Duration::seconds(1)));
    }

    #[test]
    fn future_and_past_polls_are_closed() {
        assert!(!poll_with_window(10, 60).is_active());
        assert!(!poll_with_window(-60, -10).is_active());
    }

    #[test]
    fn ballot_decodes_capitalized_legacy_keys() {
        let raw = serde_json::json!({
            "VoteID": "123e4567-e89b-42d3-a456-426614174000",
            "PollID": "223e4567-e89b-42d3-a456-426614174000",
            "VoterID": "a1b2c3d4e5f60718",
            "Choice": "Go",
            "Timestamp": "2026-03-01T12:00:00Z",
        });
        let ballot: Ballot = serde_json::from_value(raw).unwrap();
        assert_eq!(ballot.choice, "Go");
        assert_eq!(ballot.voter_id, "a1b2c3d4e5f60718");
        assert!(ballot.signature.is_none());
    }

    #[test]
    fn ballot_round_trips_snake_case() {
        let ballot = Ballot {
            vote_id: Uuid::new_v4(),
            poll_id: Uuid::new_v4(),
            voter_id: "a1b2c3d4e5f60718".to_string(),
            choice: "Rust".to_string(),
            timestamp: Utc::now(),
            signature: Some("c2ln".to_string()),
        };
        let json = serde_json::to_value(&ballot).unwrap();
        assert!(json.get("vote_id").is_some());
        assert!(json.get("VoteID").is_none());
        let back: Ballot = serde_json::from_value(json).unwrap();
        assert_eq!(back, ballot);
    }
}
