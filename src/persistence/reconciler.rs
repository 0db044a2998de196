//! # Persistence Reconciler
//!
//! The background mirror from in-memory state to the durable sinks, and
//! the startup path that rebuilds in-memory state from them.
//!
//! ## How it works
//!
//! Two independent periodic tasks, one per sink:
//!
//! 1. **Cache task** (every 30 s): snapshot chain, polls, and voters under
//!    the read lock, drop the lock, serialize, upsert the three fixed
//!    keys. Last write wins.
//! 2. **Relational task** (every 60 s): snapshot once, then insert every
//!    block past the last persisted index, every voter and poll not yet
//!    marked persisted, and every ballot found in any `votes` block. All
//!    inserts are idempotent on their natural keys, so a crash between
//!    ticks costs nothing but a retry.
//!
//! Neither task ever holds the voting lock across I/O, and neither
//! surfaces an error to request handlers: failures are logged and retried
//! on the next tick.
//!
//! ## Shutdown
//!
//! Both tasks watch a `tokio::sync::watch` channel. When the sender flips
//! it to `true` (or drops), the task finishes its current tick and exits.
//!
//! ## Rehydration
//!
//! [`rehydrate`] is the inverse path, run once at boot: voters and polls
//! come back from their tables, and when the store holds any blocks the
//! chain itself is reloaded in index order, verified (fail closed, never
//! guess at missing history), and the participation sets are replayed
//! from the `votes` payloads. A store with no blocks yields a fresh
//! genesis chain.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, CACHE_MIRROR_INTERVAL, RELATIONAL_MIRROR_INTERVAL};
use crate::ledger::{BlockPayload, Chain, ChainError};
use crate::voting::{StateSnapshot, VotingMachine};

use super::cache::CacheStore;
use super::relational::{RelationalStore, StoreError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Mirror cadences. Defaults match the service contract; tests shrink
/// them to keep the suite fast.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub cache_interval: Duration,
    pub relational_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            cache_interval: CACHE_MIRROR_INTERVAL,
            relational_interval: RELATIONAL_MIRROR_INTERVAL,
        }
    }
}

// ---------------------------------------------------------------------------
// Rehydration
// ---------------------------------------------------------------------------

/// Errors that abort startup rehydration. Unlike mirror-tick failures,
/// these are fatal: booting on a ledger that fails verification would
/// silently serve corrupt history.
#[derive(Debug, Error)]
pub enum RehydrateError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("persisted chain rejected: {0}")]
    Chain(#[from] ChainError),
}

/// Rebuild a [`VotingMachine`] from the relational store.
pub async fn rehydrate(
    store: &RelationalStore,
    difficulty: usize,
    mining_threshold: usize,
) -> Result<VotingMachine, RehydrateError> {
    let voters: HashMap<_, _> = store
        .load_voters()
        .await?
        .into_iter()
        .map(|v| (v.voter_id.clone(), v))
        .collect();
    let polls: HashMap<_, _> = store
        .load_polls()
        .await?
        .into_iter()
        .map(|p| (p.poll_id, p))
        .collect();
    let blocks = store.load_blocks().await?;

    info!(
        voters = voters.len(),
        polls = polls.len(),
        blocks = blocks.len(),
        "rehydrating from relational store"
    );

    let chain = if blocks.is_empty() {
        Chain::new(difficulty)
    } else {
        Chain::from_blocks(blocks, difficulty)?
    };
    Ok(VotingMachine::from_parts(
        chain,
        voters,
        polls,
        mining_threshold,
    ))
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Owns the sinks and the machine reference, and turns them into the two
/// background mirror tasks.
pub struct Reconciler {
    machine: Arc<VotingMachine>,
    relational: Option<Arc<RelationalStore>>,
    cache: Option<CacheStore>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        machine: Arc<VotingMachine>,
        relational: Option<RelationalStore>,
        cache: Option<CacheStore>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            machine,
            relational: relational.map(Arc::new),
            cache,
            config,
        }
    }

    /// Connect whichever sinks the configuration names. A sink that fails
    /// to connect is disabled with a warning; the core never refuses to
    /// start because a mirror is down.
    pub async fn connect(machine: Arc<VotingMachine>, config: &Config) -> Self {
        let relational = match &config.database_url {
            Some(url) => match RelationalStore::connect(url).await {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!(url = %Config::masked(url), error = %e, "relational store unavailable, sink disabled");
                    None
                }
            },
            None => None,
        };

        let cache = match &config.redis_url {
            Some(url) => match CacheStore::connect(url).await {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!(url = %Config::masked(url), error = %e, "cache store unavailable, sink disabled");
                    None
                }
            },
            None => None,
        };

        Self::new(machine, relational, cache, ReconcilerConfig::default())
    }

    /// Direct access to the relational store, for startup rehydration.
    pub fn relational(&self) -> Option<&Arc<RelationalStore>> {
        self.relational.as_ref()
    }

    /// Spawn one background task per configured sink. Returns the handles
    /// so the host can join them after signalling shutdown.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        if let Some(cache) = self.cache.clone() {
            let machine = Arc::clone(&self.machine);
            let interval = self.config.cache_interval;
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if let Err(e) = cache_tick(&machine, &cache).await {
                                warn!(error = %e, "cache mirror tick failed, will retry");
                            }
                        }
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                info!("cache mirror shutting down");
                                return;
                            }
                        }
                    }
                }
            }));
        }

        if let Some(store) = self.relational.clone() {
            let machine = Arc::clone(&self.machine);
            let interval = self.config.relational_interval;
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                ticker.tick().await;
                let mut sync = SyncState::default();
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            relational_tick(&machine, &store, &mut sync).await;
                        }
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                store.close().await;
                                info!("relational mirror shut down, pool closed");
                                return;
                            }
                        }
                    }
                }
            }));
        }

        handles
    }
}

/// Per-task memory of what the relational mirror has already pushed.
/// Purely an optimization: every insert is idempotent, so losing this
/// state (restart, crash) only costs re-sent no-op rows.
#[derive(Default)]
struct SyncState {
    next_block: u64,
    saved_voters: HashSet<String>,
    saved_polls: HashSet<Uuid>,
}

/// One cache-mirror pass: snapshot, release the lock, serialize, upsert.
async fn cache_tick(
    machine: &VotingMachine,
    cache: &CacheStore,
) -> Result<(), serde_json::Error> {
    let StateSnapshot {
        chain,
        voters,
        polls,
    } = machine.snapshot();

    let chain_json = serde_json::to_string(&chain)?;
    let polls_json = serde_json::to_string(&polls)?;
    let voters_json = serde_json::to_string(&voters)?;

    if let Err(e) = cache
        .write_snapshot(&chain_json, &polls_json, &voters_json)
        .await
    {
        warn!(error = %e, "cache snapshot write failed, will retry");
    } else {
        debug!(blocks = chain.len(), "cache snapshot written");
    }
    Ok(())
}

/// One relational-mirror pass. Each row failure is logged and left for
/// the next tick; a failure never blocks the remaining rows.
async fn relational_tick(machine: &VotingMachine, store: &RelationalStore, sync: &mut SyncState) {
    let snapshot = machine.snapshot();

    for block in snapshot.chain.iter().skip(sync.next_block as usize) {
        match store.insert_block(block).await {
            Ok(()) => sync.next_block = block.index + 1,
            Err(e) => {
                warn!(index = block.index, error = %e, "failed to persist block");
                break;
            }
        }
    }

    for (voter_id, voter) in &snapshot.voters {
        if sync.saved_voters.contains(voter_id) {
            continue;
        }
        match store.insert_voter(voter).await {
            Ok(()) => {
                sync.saved_voters.insert(voter_id.clone());
                debug!(voter_id = %voter_id, "voter mirrored");
            }
            Err(e) => warn!(voter_id = %voter_id, error = %e, "failed to persist voter"),
        }
    }

    for (poll_id, poll) in &snapshot.polls {
        if sync.saved_polls.contains(poll_id) {
            continue;
        }
        match store.insert_poll(poll).await {
            Ok(()) => {
                sync.saved_polls.insert(*poll_id);
                debug!(poll_id = %poll_id, "poll mirrored");
            }
            Err(e) => warn!(poll_id = %poll_id, error = %e, "failed to persist poll"),
        }
    }

    // Ballots live inside votes blocks; the walk re-sends everything and
    // relies on the vote-id conflict clause for idempotence.
    for block in &snapshot.chain {
        if let BlockPayload::Votes { votes, .. } = &block.data {
            for ballot in votes {
                if let Err(e) = store.insert_ballot(ballot, block.index).await {
                    warn!(vote_id = %ballot.vote_id, error = %e, "failed to persist ballot");
                }
            }
        }
    }

    debug!(
        blocks = sync.next_block,
        voters = sync.saved_voters.len(),
        polls = sync.saved_polls.len(),
        "relational mirror tick complete"
    );
}
