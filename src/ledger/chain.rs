//! # Chain Management
//!
//! The ordered sequence of blocks starting at genesis, together with the
//! proof-of-work miner and the integrity verifier.
//!
//! Proof-of-work here is a tamper-evidence seal, not a consensus
//! mechanism: the ledger is single-node, and difficulty only controls how
//! expensive it is to silently rewrite history. Mining runs inline on the
//! caller's thread; at the default difficulty it finishes in milliseconds.
//!
//! The chain is append-only. There is no truncation path and no block
//! mutation path; rehydrating from a durable store goes through
//! [`Chain::from_blocks`], which refuses any block set that fails
//! verification rather than guessing at missing history.

use thiserror::Error;
use tracing::debug;

use super::block::{Block, BlockPayload};

/// Errors raised when reconstructing a chain from persisted blocks.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("persisted chain is empty")]
    Empty,

    #[error("persisted chain failed integrity verification")]
    IntegrityFailure,
}

/// Ordered chain of mined blocks. Owns the difficulty parameter so every
/// append and every verification uses the same target.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: usize,
}

impl Chain {
    /// Create a fresh chain containing a newly mined genesis block.
    pub fn new(difficulty: usize) -> Self {
        let mut genesis = Block::genesis();
        mine(&mut genesis, difficulty);
        Self {
            blocks: vec![genesis],
            difficulty,
        }
    }

    /// Reconstruct a chain from blocks loaded out of a durable store.
    ///
    /// Blocks must already be in index order. The reconstructed chain is
    /// verified before it is accepted; a store holding a tampered or
    /// torn chain produces an error, never a silently wrong ledger.
    pub fn from_blocks(blocks: Vec<Block>, difficulty: usize) -> Result<Self, ChainError> {
        if blocks.is_empty() {
            return Err(ChainError::Empty);
        }
        let chain = Self { blocks, difficulty };
        if !chain.verify() {
            return Err(ChainError::IntegrityFailure);
        }
        Ok(chain)
    }

    /// Mine and append a new block carrying `payload`. Returns a reference
    /// to the appended block.
    ///
    /// The caller provides mutual exclusion; the chain itself is not
    /// internally synchronized.
    pub fn append(&mut self, payload: BlockPayload) -> &Block {
        let tip = self
            .blocks
            .last()
            .expect("chain always contains at least the genesis block");
        let mut block = Block::next(tip, payload);
        mine(&mut block, self.difficulty);
        self.blocks.push(block);
        self.blocks
            .last()
            .expect("block was just pushed")
    }

    /// Verify the whole chain: for every block after genesis, the stored
    /// hash must recompute, the previous-hash link must hold, and the
    /// proof-of-work prefix must be present.
    pub fn verify(&self) -> bool {
        for i in 1..self.blocks.len() {
            let current = &self.blocks[i];
            let previous = &self.blocks[i - 1];

            if current.hash != current.compute_hash() {
                return false;
            }
            if current.previous_hash != previous.hash {
                return false;
            }
            if !current.meets_difficulty(self.difficulty) {
                return false;
            }
        }
        true
    }

    /// All blocks, oldest first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The most recent block.
    pub fn tip(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain always contains at least the genesis block")
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// A chain is never empty; this exists for the conventional pairing.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The last `n` blocks, oldest first.
    pub fn last_n(&self, n: usize) -> &[Block] {
        let start = self.blocks.len().saturating_sub(n);
        &self.blocks[start..]
    }

    /// Owned copy of the full chain, for export and mirroring.
    pub fn export(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    /// The hex-zero prefix length every hash in this chain must carry.
    pub fn difficulty(&self) -> usize {
        self.difficulty
    }
}

/// Increment the nonce until the block hash meets the difficulty target.
fn mine(block: &mut Block, difficulty: usize) {
    loop {
        block.hash = block.compute_hash();
        if block.meets_difficulty(difficulty) {
            debug!(index = block.index, nonce = block.nonce, hash = %block.hash, "block mined");
            return;
        }
        block.nonce += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_DIFFICULTY: usize = 2;

    fn registration_payload(n: u8) -> BlockPayload {
        BlockPayload::VoterRegistration {
            voter_id: format!("{:016x}", n as u64),
            timestamp: 1_750_000_000 + n as i64,
        }
    }

    #[test]
    fn new_chain_has_mined_genesis() {
        let chain = Chain::new(TEST_DIFFICULTY);
        assert_eq!(chain.len(), 1);
        let genesis = chain.tip();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, "0");
        assert!(genesis.meets_difficulty(TEST_DIFFICULTY));
        assert_eq!(genesis.hash, genesis.compute_hash());
    }

    #[test]
    fn append_links_and_seals() {
        let mut chain = Chain::new(TEST_DIFFICULTY);
        let genesis_hash = chain.tip().hash.clone();

        chain.append(registration_payload(1));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.tip().index, 1);
        assert_eq!(chain.tip().previous_hash, genesis_hash);
        assert!(chain.verify());
    }

    #[test]
    fn indices_stay_dense() {
        let mut chain = Chain::new(TEST_DIFFICULTY);
        for n in 1..=5 {
            chain.append(registration_payload(n));
        }
        let indices: Vec<u64> = chain.blocks().iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let mut chain = Chain::new(TEST_DIFFICULTY);
        chain.append(registration_payload(1));
        assert!(chain.verify());

        chain.blocks[1].data = registration_payload(2);
        assert!(!chain.verify());
    }

    #[test]
    fn broken_link_fails_verification() {
        let mut chain = Chain::new(TEST_DIFFICULTY);
        chain.append(registration_payload(1));
        chain.blocks[1].previous_hash = "f".repeat(64);
        assert!(!chain.verify());
    }

    #[test]
    fn export_rehydrate_preserves_hashes() {
        let mut chain = Chain::new(TEST_DIFFICULTY);
        chain.append(registration_payload(1));
        chain.append(registration_payload(2));

        let exported = chain.export();
        let reloaded = Chain::from_blocks(exported.clone(), TEST_DIFFICULTY).unwrap();
        assert!(reloaded.verify());

        let original: Vec<&str> = chain.blocks().iter().map(|b| b.hash.as_str()).collect();
        let restored: Vec<&str> = reloaded.blocks().iter().map(|b| b.hash.as_str()).collect();
        assert_eq!(original, restored);
    }

    #[test]
    fn rehydrate_through_json_preserves_hashes() {
        let mut chain = Chain::new(TEST_DIFFICULTY);
        chain.append(registration_payload(1));

        let json = serde_json::to_string(&chain.export()).unwrap();
        let blocks: Vec<Block> = serde_json::from_str(&json).unwrap();
        let reloaded = Chain::from_blocks(blocks, TEST_DIFFICULTY).unwrap();
        assert!(reloaded.verify());
        assert_eq!(reloaded.tip().hash, chain.tip().hash);
    }

    #[test]
    fn rehydrate_fails_closed_on_tampering() {
        let mut chain = Chain::new(TEST_DIFFICULTY);
        chain.append(registration_payload(1));

        let mut exported = chain.export();
        exported[1].nonce += 1;
        assert!(matches!(
            Chain::from_blocks(exported, TEST_DIFFICULTY),
            Err(ChainError::IntegrityFailure)
        ));

        assert!(matches!(
            Chain::from_blocks(Vec::new(), TEST_DIFFICULTY),
            Err(ChainError::Empty)
        ));
    }

    #[test]
    fn last_n_clamps_to_length() {
        let mut chain = Chain::new(TEST_DIFFICULTY);
        chain.append(registration_payload(1));
        assert_eq!(chain.last_n(10).len(), 2);
        assert_eq!(chain.last_n(1)[0].index, 1);
    }
}
