//! # Voting State Machine
//!
//! The single owner of all mutable voting state: the voter registry, the
//! poll registry, the per-poll participation sets, the pending-ballot
//! buffer, and the chain itself. Nothing else in the crate touches these
//! structures; every handler and every background task goes through
//! [`VotingMachine`].
//!
//! ## Locking discipline
//!
//! One `parking_lot::RwLock` guards the whole bundle. Mutating operations
//! (register, create poll, cast, flush) take the write lock; reads (tally,
//! history, stats, export, verify) take the read lock. Mining happens
//! inside the write lock, which serializes appends and keeps block indices
//! dense. The persistence reconciler snapshots under the read lock and
//! releases it before any network I/O.
//!
//! ## Anonymity bookkeeping
//!
//! For anonymous polls the stored ballot carries the literal voter id
//! `"anonymous"` and no signature, while the participation set records the
//! true id. Double voting stays detectable; the ballot itself stays
//! unlinkable. The participation set is never exposed through any read
//! operation, only its cardinality.

pub mod types;

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::crypto::{ballot_signing_bytes, verify};
use crate::error::{Result, VotingError};
use crate::ledger::{Block, BlockPayload, Chain};
use types::{
    Ballot, LedgerStats, Poll, PollResults, Voter, VoterHistoryEntry, ANONYMOUS_VOTER,
};

// ---------------------------------------------------------------------------
// Machine state
// ---------------------------------------------------------------------------

/// The bundle behind the lock.
struct MachineState {
    chain: Chain,
    voters: HashMap<String, Voter>,
    polls: HashMap<Uuid, Poll>,
    /// poll id -> voter ids that have voted, in cast order. One entry per
    /// accepted ballot, so the length is the poll's cast count even when
    /// multiple votes are allowed.
    participation: HashMap<Uuid, Vec<String>>,
    /// Ballots accepted but not yet sealed into a block, in cast order.
    pending: Vec<Ballot>,
}

/// Consistent point-in-time copy of the mirrorable state, taken under the
/// read lock. The reconciler serializes this after the lock is gone.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub chain: Vec<Block>,
    pub voters: HashMap<String, Voter>,
    pub polls: HashMap<Uuid, Poll>,
}

// ---------------------------------------------------------------------------
// VotingMachine
// ---------------------------------------------------------------------------

/// The voting state machine. Cheap to share behind an `Arc`; all methods
/// take `&self`.
pub struct VotingMachine {
    state: RwLock<MachineState>,
    mining_threshold: usize,
}

impl VotingMachine {
    /// Create a machine with a freshly mined genesis block and empty
    /// registries.
    pub fn new(difficulty: usize, mining_threshold: usize) -> Self {
        Self {
            state: RwLock::new(MachineState {
                chain: Chain::new(difficulty),
                voters: HashMap::new(),
                polls: HashMap::new(),
                participation: HashMap::new(),
                pending: Vec::new(),
            }),
            mining_threshold,
        }
    }

    /// Rebuild a machine from rehydrated parts.
    ///
    /// `voters` and `polls` come from the relational store; `chain` is the
    /// verified reloaded ledger. Polls embedded in `poll_creation` blocks
    /// that the store does not know are recovered from the chain, and the
    /// participation sets are replayed from every `votes` payload. The
    /// pending buffer starts empty: ballots that never reached a block
    /// did not survive the restart.
    pub fn from_parts(
        chain: Chain,
        voters: HashMap<String, Voter>,
        polls: HashMap<Uuid, Poll>,
        mining_threshold: usize,
    ) -> Self {
        let mut polls = polls;
        let mut participation: HashMap<Uuid, Vec<String>> = HashMap::new();

        for block in chain.blocks() {
            match &block.data {
                BlockPayload::PollCreation { poll } => {
                    polls.entry(poll.poll_id).or_insert_with(|| poll.clone());
                    participation.entry(poll.poll_id).or_default();
                }
                BlockPayload::Votes { votes, .. } => {
                    for ballot in votes {
                        participation
                            .entry(ballot.poll_id)
                            .or_default()
                            .push(ballot.voter_id.clone());
                    }
                }
                _ => {}
            }
        }
        for poll_id in polls.keys() {
            participation.entry(*poll_id).or_default();
        }

        info!(
            blocks = chain.len(),
            voters = voters.len(),
            polls = polls.len(),
            "voting machine rehydrated"
        );

        Self {
            state: RwLock::new(MachineState {
                chain,
                voters,
                polls,
                participation,
                pending: Vec::new(),
            }),
            mining_threshold,
        }
    }

    // -----------------------------------------------------------------------
    // Mutating operations
    // -----------------------------------------------------------------------

    /// Register a voter and seal a `voter_registration` block.
    ///
    /// The voter id is derived from the email, so a duplicate email and a
    /// duplicate id are the same failure: `ALREADY_REGISTERED`.
    pub fn register_voter(&self, mut voter: Voter) -> Result<()> {
        let mut state = self.state.write();

        if state.voters.contains_key(&voter.voter_id) {
            return Err(VotingError::AlreadyRegistered);
        }

        let now = Utc::now();
        voter.registered_at = now;

        let payload = BlockPayload::VoterRegistration {
            voter_id: voter.voter_id.clone(),
            timestamp: now.timestamp(),
        };
        state.voters.insert(voter.voter_id.clone(), voter);
        state.chain.append(payload);
        Ok(())
    }

    /// Create a poll and seal a `poll_creation` block. Assigns the poll id;
    /// an empty eligible-voters list is rewritten to a snapshot of every
    /// currently registered voter.
    pub fn create_poll(&self, mut poll: Poll) -> Result<Uuid> {
        if poll.start_time > poll.end_time {
            return Err(VotingError::BadRequest(
                "poll start time must not be after its end time".to_string(),
            ));
        }

        let mut state = self.state.write();

        poll.poll_id = Uuid::new_v4();
        if poll.eligible_voters.is_empty() {
            poll.eligible_voters = state.voters.keys().cloned().collect();
        }

        let poll_id = poll.poll_id;
        state.participation.insert(poll_id, Vec::new());
        state.polls.insert(poll_id, poll.clone());
        state.chain.append(BlockPayload::PollCreation { poll });
        Ok(poll_id)
    }

    /// Cast a ballot. The checks run in a fixed order and the first
    /// failure wins, each with its own error kind:
    ///
    /// 1. poll exists, 2. poll active, 3. voter registered, 4. voter
    /// eligible, 5. no double vote, 6. choice valid, 7. signature valid
    /// (non-anonymous polls only).
    ///
    /// Returns the assigned ballot id. When the pending buffer reaches
    /// the mining threshold the buffer is flushed into a block inline.
    pub fn cast_vote(
        &self,
        poll_id: Uuid,
        voter_id: &str,
        choice: &str,
        signature: Option<&str>,
    ) -> Result<Uuid> {
        let mut state = self.state.write();
        let now = Utc::now();

        let poll = state.polls.get(&poll_id).ok_or(VotingError::PollNotFound)?;
        if !poll.is_active_at(now) {
            return Err(VotingError::PollInactive);
        }

        let voter = state
            .voters
            .get(voter_id)
            .ok_or(VotingError::VoterNotRegistered)?;

        if !poll.eligible_voters.iter().any(|v| v == voter_id) {
            return Err(VotingError::VoterNotEligible);
        }

        if !poll.allow_multiple_votes {
            let voted = state
                .participation
                .get(&poll_id)
                .map(|p| p.iter().any(|v| v == voter_id))
                .unwrap_or(false);
            if voted {
                return Err(VotingError::DoubleVote);
            }
        }

        if !poll.options.iter().any(|o| o == choice) {
            return Err(VotingError::InvalidChoice);
        }

        let is_anonymous = poll.is_anonymous;
        if !is_anonymous {
            let signature = signature.ok_or(VotingError::InvalidSignature)?;
            let signed = ballot_signing_bytes(&poll_id.to_string(), voter_id, choice);
            if !verify(&signed, signature, &voter.public_key) {
                return Err(VotingError::InvalidSignature);
            }
        }

        let vote_id = Uuid::new_v4();
        let ballot = Ballot {
            vote_id,
            poll_id,
            voter_id: if is_anonymous {
                ANONYMOUS_VOTER.to_string()
            } else {
                voter_id.to_string()
            },
            choice: choice.to_string(),
            timestamp: now,
            signature: if is_anonymous {
                None
            } else {
                signature.map(str::to_string)
            },
        };

        state.pending.push(ballot);
        // The participation set always records the true id, anonymous poll
        // or not: this is what keeps double voting detectable.
        state
            .participation
            .entry(poll_id)
            .or_default()
            .push(voter_id.to_string());

        if state.pending.len() >= self.mining_threshold {
            flush_pending(&mut state);
        }

        Ok(vote_id)
    }

    /// Flush the pending buffer into a `votes` block regardless of the
    /// threshold. Returns the number of ballots sealed; an empty buffer is
    /// a no-op returning 0.
    pub fn mine_pending(&self) -> usize {
        let mut state = self.state.write();
        flush_pending(&mut state)
    }

    // -----------------------------------------------------------------------
    // Read operations
    // -----------------------------------------------------------------------

    /// Tally one poll: every ballot in every sealed `votes` block plus the
    /// pending buffer, counted per option.
    pub fn tally(&self, poll_id: Uuid) -> Result<PollResults> {
        let state = self.state.read();
        let poll = state
            .polls
            .get(&poll_id)
            .ok_or_else(|| VotingError::NotFound("poll not found".to_string()))?;

        let mut results: HashMap<String, u64> =
            poll.options.iter().map(|o| (o.clone(), 0)).collect();
        let mut total: u64 = 0;

        let mut count = |ballot: &Ballot| {
            if ballot.poll_id == poll_id {
                if let Some(n) = results.get_mut(&ballot.choice) {
                    *n += 1;
                    total += 1;
                }
            }
        };
        for block in state.chain.blocks() {
            if let BlockPayload::Votes { votes, .. } = &block.data {
                votes.iter().for_each(&mut count);
            }
        }
        state.pending.iter().for_each(&mut count);

        let participation = state
            .participation
            .get(&poll_id)
            .map(Vec::len)
            .unwrap_or(0);
        let voter_turnout = if poll.eligible_voters.is_empty() {
            "N/A".to_string()
        } else {
            let pct = participation as f64 / poll.eligible_voters.len() as f64 * 100.0;
            format!("{pct:.1}%")
        };

        Ok(PollResults {
            poll_id,
            title: poll.title.clone(),
            status: poll.status(),
            results,
            total_votes: total,
            voter_turnout,
        })
    }

    /// Ballots sealed in the chain whose stored voter id equals the
    /// subject. Ballots cast into anonymous polls never appear: their
    /// stored id is `"anonymous"`.
    pub fn voter_history(&self, voter_id: &str) -> Result<Vec<VoterHistoryEntry>> {
        let state = self.state.read();
        if !state.voters.contains_key(voter_id) {
            return Err(VotingError::NotFound("voter not found".to_string()));
        }

        let mut history = Vec::new();
        for block in state.chain.blocks() {
            if let BlockPayload::Votes { votes, .. } = &block.data {
                for ballot in votes.iter().filter(|b| b.voter_id == voter_id) {
                    history.push(VoterHistoryEntry {
                        vote_id: ballot.vote_id,
                        poll_id: ballot.poll_id,
                        poll_title: state.polls.get(&ballot.poll_id).map(|p| p.title.clone()),
                        timestamp: ballot.timestamp,
                        block_index: block.index,
                    });
                }
            }
        }
        Ok(history)
    }

    /// Point-in-time statistics. Total votes is the sum of participation
    /// counts plus the pending buffer length.
    pub fn stats(&self) -> LedgerStats {
        let state = self.state.read();
        let recorded: usize = state.participation.values().map(Vec::len).sum();
        let active_polls = state.polls.values().filter(|p| p.is_active()).count();

        LedgerStats {
            chain_length: state.chain.len(),
            total_votes: recorded + state.pending.len(),
            pending_votes: state.pending.len(),
            total_voters: state.voters.len(),
            total_polls: state.polls.len(),
            active_polls,
            blockchain_valid: state.chain.verify(),
            mining_difficulty: state.chain.difficulty(),
            mining_threshold: self.mining_threshold,
        }
    }

    /// Re-run full chain verification.
    pub fn verify_chain(&self) -> bool {
        self.state.read().chain.verify()
    }

    /// Owned copy of the whole chain.
    pub fn export_chain(&self) -> Vec<Block> {
        self.state.read().chain.export()
    }

    /// The last `limit` blocks, oldest first.
    pub fn last_blocks(&self, limit: usize) -> Vec<Block> {
        self.state.read().chain.last_n(limit).to_vec()
    }

    /// All polls, optionally only the currently active ones.
    pub fn polls(&self, active_only: bool) -> Vec<Poll> {
        let state = self.state.read();
        state
            .polls
            .values()
            .filter(|p| !active_only || p.is_active())
            .cloned()
            .collect()
    }

    /// One poll plus its cast count (the participation-set cardinality,
    /// never its members).
    pub fn poll_with_votes(&self, poll_id: Uuid) -> Result<(Poll, usize)> {
        let state = self.state.read();
        let poll = state
            .polls
            .get(&poll_id)
            .ok_or_else(|| VotingError::NotFound("poll not found".to_string()))?;
        let cast = state
            .participation
            .get(&poll_id)
            .map(Vec::len)
            .unwrap_or(0);
        Ok((poll.clone(), cast))
    }

    /// Look up a registered voter, for login and registration flows.
    pub fn voter(&self, voter_id: &str) -> Option<Voter> {
        self.state.read().voters.get(voter_id).cloned()
    }

    /// Consistent snapshot of chain, voters, and polls for the mirrors.
    /// The read lock is held only while cloning, never across I/O.
    pub fn snapshot(&self) -> StateSnapshot {
        let state = self.state.read();
        StateSnapshot {
            chain: state.chain.export(),
            voters: state.voters.clone(),
            polls: state.polls.clone(),
        }
    }

    /// The configured auto-flush threshold.
    pub fn mining_threshold(&self) -> usize {
        self.mining_threshold
    }
}

/// Seal the pending buffer into a `votes` block. Caller holds the write
/// lock. No-op on an empty buffer.
fn flush_pending(state: &mut MachineState) -> usize {
    if state.pending.is_empty() {
        return 0;
    }
    let votes = std::mem::take(&mut state.pending);
    let count = votes.len();
    let block = state.chain.append(BlockPayload::Votes { votes, count });
    debug!(count, index = block.index, "pending ballots sealed into block");
    count
}
