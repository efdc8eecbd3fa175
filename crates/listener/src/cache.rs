//! Best-effort cache of the most recent read per zone.
//!
//! The dashboard polls `last_tag:{zone_id}` to preview a read before its
//! batch is drained. Nothing in the listener reads the cache back.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use stockroom_core::reading::Reading;
use stockroom_core::types::{DbId, Timestamp};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Value stored under [`cache_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedReading {
    pub tag_id: String,
    pub captured_at: Timestamp,
}

impl From<&Reading> for CachedReading {
    fn from(reading: &Reading) -> Self {
        Self {
            tag_id: reading.tag_id.clone(),
            captured_at: reading.captured_at,
        }
    }
}

pub fn cache_key(zone_id: DbId) -> String {
    format!("last_tag:{zone_id}")
}

#[async_trait]
pub trait LastReadingCache: Send + Sync {
    async fn set(&self, reading: &Reading) -> Result<(), CacheError>;
}

/// Redis-backed cache; entries expire after `ttl_secs`.
#[derive(Clone)]
pub struct RedisReadingCache {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisReadingCache {
    pub async fn connect(url: &str, ttl_secs: u64) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn, ttl_secs })
    }
}

#[async_trait]
impl LastReadingCache for RedisReadingCache {
    async fn set(&self, reading: &Reading) -> Result<(), CacheError> {
        let value = serde_json::to_string(&CachedReading::from(reading))?;
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(cache_key(reading.zone_id))
            .arg(value)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
