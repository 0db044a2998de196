//! # Block Structure
//!
//! A block is the atomic unit of the ledger: a payload, a link to the
//! previous block by hash, and a proof-of-work seal.
//!
//! ## Block layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  index: u64            (0-based, dense)      │
//! │  timestamp: DateTime   (hashed as unix secs) │
//! │  data: BlockPayload    (tagged union)        │
//! │  previous_hash: String ("0" for genesis)     │
//! │  nonce: u64            (incremented by PoW)  │
//! │  hash: String          (SHA-256 hex)         │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Canonical hashing form
//!
//! The hash covers `{data, index, nonce, previous_hash, timestamp}` where
//! `timestamp` is whole seconds since the epoch. The object is serialized
//! through `serde_json` with its default map representation, which keeps
//! keys in sorted order, and without insignificant whitespace. That gives
//! one byte-exact encoding per block regardless of which code path built
//! the value, so hashes recompute identically after any store/reload cycle.
//!
//! ## Payload forms
//!
//! Freshly appended payloads are typed. Payloads that travelled through
//! the cache or the relational store come back as untyped JSON. Both meet
//! in [`BlockPayload::from_value`], the one permissive decoder: the serde
//! aliases on the domain types accept the capitalized legacy keys as well
//! as the canonical snake_case ones, so every consumer downstream of the
//! decode boundary only ever sees the typed form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::crypto::sha256_hex;
use crate::voting::types::{Ballot, Poll};

/// Message sealed into the genesis block. A timestamped birth certificate
/// for the ledger; changing it would invalidate every chain ever exported.
pub const GENESIS_MESSAGE: &str = "Genesis Block - Voting Blockchain Initialized";

/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

// ---------------------------------------------------------------------------
// BlockPayload
// ---------------------------------------------------------------------------

/// The tagged payload of a block. Exactly one event kind per block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockPayload {
    /// Marker payload of block 0.
    Genesis {
        #[serde(alias = "Message")]
        message: String,
    },

    /// A voter joined the registry. The ballot-free proof that the voter
    /// existed before any poll they participate in.
    VoterRegistration {
        #[serde(alias = "VoterID")]
        voter_id: String,
        /// Unix seconds at registration time.
        #[serde(alias = "Timestamp")]
        timestamp: i64,
    },

    /// A poll was defined. The full poll record is embedded so the chain
    /// alone can reconstruct the poll registry.
    PollCreation {
        #[serde(alias = "Poll")]
        poll: Poll,
    },

    /// A batch of ballots sealed out of the pending buffer.
    Votes {
        #[serde(alias = "Votes")]
        votes: Vec<Ballot>,
        #[serde(alias = "Count")]
        count: usize,
    },
}

impl BlockPayload {
    /// Decode a payload from untyped JSON, accepting both the canonical
    /// snake_case keys and the capitalized variants of older exports.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Short tag string, matching the serde `type` discriminant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Genesis { .. } => "genesis",
            Self::VoterRegistration { .. } => "voter_registration",
            Self::PollCreation { .. } => "poll_creation",
            Self::Votes { .. } => "votes",
        }
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// An immutable ledger entry. Construct via [`Block::genesis`] or
/// [`Block::next`], then seal with the chain's miner; a block's fields are
/// never touched after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub data: BlockPayload,
    pub previous_hash: String,
    pub nonce: u64,
    pub hash: String,
}

impl Block {
    /// Build the unmined genesis block.
    pub fn genesis() -> Self {
        Self {
            index: 0,
            timestamp: Utc::now(),
            data: BlockPayload::Genesis {
                message: GENESIS_MESSAGE.to_string(),
            },
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            nonce: 0,
            hash: String::new(),
        }
    }

    /// Build the unmined successor of `previous` carrying `payload`.
    pub fn next(previous: &Block, payload: BlockPayload) -> Self {
        Self {
            index: previous.index + 1,
            timestamp: Utc::now(),
            data: payload,
            previous_hash: previous.hash.clone(),
            nonce: 0,
            hash: String::new(),
        }
    }

    /// SHA-256 over the canonical serialization of everything except the
    /// hash itself.
    pub fn compute_hash(&self) -> String {
        let canonical = json!({
            "index": self.index,
            "timestamp": self.timestamp.timestamp(),
            "data": self.data,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce,
        });
        sha256_hex(canonical.to_string().as_bytes())
    }

    /// Whether the stored hash starts with `difficulty` zero hex chars.
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.hash.len() >= difficulty && self.hash.bytes().take(difficulty).all(|b| b == b'0')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use uuid::Uuid;

    #[test]
    fn hash_is_stable_for_identical_fields() {
        let block = Block::genesis();
        assert_eq!(block.compute_hash(), block.compute_hash());
    }

    #[test]
    fn hash_covers_every_field() {
        let base = Block::genesis();
        let base_hash = base.compute_hash();

        let mut b = base.clone();
        b.nonce += 1;
        assert_ne!(b.compute_hash(), base_hash);

        let mut b = base.clone();
        b.index += 1;
        assert_ne!(b.compute_hash(), base_hash);

        let mut b = base.clone();
        b.previous_hash = "f".repeat(64);
        assert_ne!(b.compute_hash(), base_hash);

        let mut b = base.clone();
        b.data = BlockPayload::VoterRegistration {
            voter_id: "a1b2c3d4e5f60718".to_string(),
            timestamp: 0,
        };
        assert_ne!(b.compute_hash(), base_hash);
    }

    #[test]
    fn subsecond_timestamp_precision_does_not_move_the_hash() {
        let base = Block::genesis();
        let mut truncated = base.clone();
        // A round trip through a store that keeps only microseconds must
        // not invalidate the seal; only whole seconds are hashed.
        truncated.timestamp = base
            .timestamp
            .with_nanosecond(base.timestamp.timestamp_subsec_micros() * 1000)
            .unwrap();
        assert_eq!(truncated.compute_hash(), base.compute_hash());
    }

    #[test]
    fn payload_tag_round_trip() {
        let payload = BlockPayload::VoterRegistration {
            voter_id: "a1b2c3d4e5f60718".to_string(),
            timestamp: 1_750_000_000,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "voter_registration");
        assert_eq!(BlockPayload::from_value(value).unwrap(), payload);
    }

    #[test]
    fn permissive_decoder_accepts_capitalized_ballot_keys() {
        let value = json!({
            "type": "votes",
            "count": 1,
            "votes": [{
                "VoteID": Uuid::new_v4().to_string(),
                "PollID": Uuid::new_v4().to_string(),
                "VoterID": "a1b2c3d4e5f60718",
                "Choice": "Go",
                "Timestamp": "2026-03-01T12:00:00Z",
            }],
        });
        let payload = BlockPayload::from_value(value).unwrap();
        match payload {
            BlockPayload::Votes { votes, count } => {
                assert_eq!(count, 1);
                assert_eq!(votes[0].choice, "Go");
            }
            other => panic!("expected votes payload, got {other:?}"),
        }
    }

    #[test]
    fn genesis_recodes_identically_through_untyped_json() {
        // Typed -> Value -> typed -> hash must equal the original hash:
        // this is the round trip every cache-rehydrated block takes.
        let mut block = Block::genesis();
        block.hash = block.compute_hash();

        let value = serde_json::to_value(&block.data).unwrap();
        let decoded = BlockPayload::from_value(value).unwrap();
        let mut reloaded = block.clone();
        reloaded.data = decoded;
        assert_eq!(reloaded.compute_hash(), block.compute_hash());
    }
}
