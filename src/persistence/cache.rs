//! # Cache Mirror
//!
//! Redis-backed hot copy of the in-memory state: three opaque JSON blobs
//! under fixed keys, rewritten wholesale on every tick. Last write wins;
//! nothing ever reads these keys back into the core. They exist for
//! dashboards and external consumers that want the current state without
//! touching the service.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

/// Key holding the JSON-encoded chain.
pub const CHAIN_KEY: &str = "blockchain:chain";
/// Key holding the JSON-encoded poll registry.
pub const POLLS_KEY: &str = "blockchain:polls";
/// Key holding the JSON-encoded voter registry.
pub const VOTERS_KEY: &str = "blockchain:voters";

/// Handle to the cache sink. Cheap to clone; the connection manager
/// multiplexes and reconnects internally.
#[derive(Clone)]
pub struct CacheStore {
    conn: ConnectionManager,
}

impl CacheStore {
    /// Connect. `ConnectionManager::new` establishes the first connection
    /// eagerly, so an unreachable server fails here, not on the first tick.
    pub async fn connect(url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("cache store connected");
        Ok(Self { conn })
    }

    /// Upsert the three snapshot blobs. No TTL: the next tick overwrites.
    pub async fn write_snapshot(
        &self,
        chain_json: &str,
        polls_json: &str,
        voters_json: &str,
    ) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(CHAIN_KEY, chain_json).await?;
        conn.set::<_, _, ()>(POLLS_KEY, polls_json).await?;
        conn.set::<_, _, ()>(VOTERS_KEY, voters_json).await?;
        Ok(())
    }
}
