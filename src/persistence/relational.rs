//! # Relational Mirror
//!
//! Postgres-backed durable copy of the ledger and the registries. Four
//! tables (`blocks`, `voters`, `polls`, `votes`) plus three supporting
//! indices, created idempotently at connect time.
//!
//! Every insert is `ON CONFLICT DO NOTHING` on its natural key, so the
//! reconciler can replay the same rows on every tick without ever
//! duplicating a block, a voter, a poll, or a ballot. Block payloads are
//! stored as JSONB in their canonical encoding; the loaders hand them to
//! the ledger's permissive decoder, which is what lets rows written by
//! any historical encoder come back as typed payloads.

use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use thiserror::Error;
use tracing::info;

use crate::ledger::{Block, BlockPayload};
use crate::voting::types::{Ballot, Poll, Voter};

/// Errors from the relational sink. These stay inside the persistence
/// layer: the reconciler logs them and retries on the next tick.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("payload encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS blocks (
        id BIGSERIAL PRIMARY KEY,
        block_index BIGINT UNIQUE NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        data JSONB NOT NULL,
        previous_hash VARCHAR(64) NOT NULL,
        hash VARCHAR(64) UNIQUE NOT NULL,
        nonce BIGINT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS voters (
        voter_id VARCHAR(64) PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        email VARCHAR(255) UNIQUE NOT NULL,
        department VARCHAR(100),
        public_key TEXT NOT NULL,
        registered_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS polls (
        poll_id UUID PRIMARY KEY,
        title VARCHAR(255) NOT NULL,
        description TEXT,
        options JSONB NOT NULL,
        creator VARCHAR(255) NOT NULL,
        start_time TIMESTAMPTZ NOT NULL,
        end_time TIMESTAMPTZ NOT NULL,
        eligible_voters JSONB,
        allow_multiple_votes BOOLEAN DEFAULT FALSE,
        is_anonymous BOOLEAN DEFAULT FALSE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS votes (
        vote_id UUID PRIMARY KEY,
        poll_id UUID NOT NULL,
        voter_id VARCHAR(64) NOT NULL,
        choice VARCHAR(255) NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        signature TEXT,
        block_index BIGINT
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_votes_poll ON votes(poll_id)",
    "CREATE INDEX IF NOT EXISTS idx_votes_voter ON votes(voter_id)",
    "CREATE INDEX IF NOT EXISTS idx_blocks_index ON blocks(block_index)",
];

/// Handle to the Postgres mirror.
pub struct RelationalStore {
    pool: PgPool,
}

impl RelationalStore {
    /// Connect and ensure the schema exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.create_schema().await?;
        info!("relational store connected, schema ensured");
        Ok(store)
    }

    async fn create_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert a block; a row with the same index is left untouched.
    pub async fn insert_block(&self, block: &Block) -> Result<(), StoreError> {
        let data: Value = serde_json::to_value(&block.data)?;
        sqlx::query(
            r#"INSERT INTO blocks (block_index, timestamp, data, previous_hash, hash, nonce)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (block_index) DO NOTHING"#,
        )
        .bind(block.index as i64)
        .bind(block.timestamp)
        .bind(data)
        .bind(&block.previous_hash)
        .bind(&block.hash)
        .bind(block.nonce as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a voter, idempotent on voter id.
    pub async fn insert_voter(&self, voter: &Voter) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO voters (voter_id, name, email, department, public_key, registered_at)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (voter_id) DO NOTHING"#,
        )
        .bind(&voter.voter_id)
        .bind(&voter.name)
        .bind(&voter.email)
        .bind(voter.department.as_deref())
        .bind(&voter.public_key)
        .bind(voter.registered_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a poll, idempotent on poll id. Option and eligible-voter
    /// lists are stored JSON-encoded.
    pub async fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        let options: Value = serde_json::to_value(&poll.options)?;
        let eligible: Value = serde_json::to_value(&poll.eligible_voters)?;
        sqlx::query(
            r#"INSERT INTO polls (poll_id, title, description, options, creator,
                                  start_time, end_time, eligible_voters,
                                  allow_multiple_votes, is_anonymous)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               ON CONFLICT (poll_id) DO NOTHING"#,
        )
        .bind(poll.poll_id)
        .bind(&poll.title)
        .bind(&poll.description)
        .bind(options)
        .bind(&poll.creator)
        .bind(poll.start_time)
        .bind(poll.end_time)
        .bind(eligible)
        .bind(poll.allow_multiple_votes)
        .bind(poll.is_anonymous)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a ballot together with the index of its containing block,
    /// idempotent on vote id.
    pub async fn insert_ballot(&self, ballot: &Ballot, block_index: u64) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO votes (vote_id, poll_id, voter_id, choice, timestamp, signature, block_index)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (vote_id) DO NOTHING"#,
        )
        .bind(ballot.vote_id)
        .bind(ballot.poll_id)
        .bind(&ballot.voter_id)
        .bind(&ballot.choice)
        .bind(ballot.timestamp)
        .bind(ballot.signature.as_deref())
        .bind(block_index as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Load every registered voter.
    pub async fn load_voters(&self) -> Result<Vec<Voter>, StoreError> {
        let rows = sqlx::query(
            "SELECT voter_id, name, email, department, public_key, registered_at FROM voters",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut voters = Vec::with_capacity(rows.len());
        for row in rows {
            voters.push(Voter {
                voter_id: row.try_get("voter_id")?,
                name: row.try_get("name")?,
                email: row.try_get("email")?,
                department: row.try_get("department")?,
                public_key: row.try_get("public_key")?,
                registered_at: row.try_get("registered_at")?,
            });
        }
        Ok(voters)
    }

    /// Load every poll, decoding the JSON-encoded lists.
    pub async fn load_polls(&self) -> Result<Vec<Poll>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT poll_id, title, description, options, creator, start_time, end_time,
                      eligible_voters, allow_multiple_votes, is_anonymous
               FROM polls"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut polls = Vec::with_capacity(rows.len());
        for row in rows {
            let options: Value = row.try_get("options")?;
            let eligible: Option<Value> = row.try_get("eligible_voters")?;
            polls.push(Poll {
                poll_id: row.try_get("poll_id")?,
                title: row.try_get("title")?,
                description: row.try_get::<Option<String>, _>("description")?.unwrap_or_default(),
                options: serde_json::from_value(options)?,
                creator: row.try_get("creator")?,
                start_time: row.try_get("start_time")?,
                end_time: row.try_get("end_time")?,
                eligible_voters: eligible
                    .map(serde_json::from_value)
                    .transpose()?
                    .unwrap_or_default(),
                allow_multiple_votes: row.try_get("allow_multiple_votes")?,
                is_anonymous: row.try_get("is_anonymous")?,
            });
        }
        Ok(polls)
    }

    /// Load the whole persisted chain in index order. Payloads go through
    /// the permissive decoder, so rows holding either the canonical or the
    /// legacy key variants come back typed.
    pub async fn load_blocks(&self) -> Result<Vec<Block>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT block_index, timestamp, data, previous_hash, hash, nonce
               FROM blocks ORDER BY block_index"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut blocks = Vec::with_capacity(rows.len());
        for row in rows {
            let data: Value = row.try_get("data")?;
            blocks.push(Block {
                index: row.try_get::<i64, _>("block_index")? as u64,
                timestamp: row.try_get("timestamp")?,
                data: BlockPayload::from_value(data)?,
                previous_hash: row.try_get("previous_hash")?,
                hash: row.try_get("hash")?,
                nonce: row.try_get::<i64, _>("nonce")? as u64,
            });
        }
        Ok(blocks)
    }

    /// Close the pool, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
