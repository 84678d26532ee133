// Hot-tier dispatch: remote store first, in-memory fallback when the
// environment allows it.
//
// In development a remote outage flips the tier into degraded mode and every
// primitive runs against the in-memory map; a later successful probe folds
// the accumulated statistics and leaderboard deltas back into the remote
// store (additive merge / set union) and clears the map. Outside
// development there is no fallback and errors propagate to the caller.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use log::{info, warn};
use pyre_common::environment::Environment;

use super::{
    backend::{KvBackend, KvError, KvResult},
    keys,
    memory::MemoryBackend,
    redis::RedisBackend,
};

pub struct HotTier {
    redis: Option<RedisBackend>,
    memory: MemoryBackend,
    degraded: AtomicBool,
    env: Environment,
}

// Try the remote store; on failure fall back to memory when permitted.
// Arguments must be cheap references so the call can be replayed.
macro_rules! tiered {
    ($self:ident, $method:ident ( $($arg:expr),* )) => {{
        match $self.redis_if_active() {
            Some(redis) => match redis.$method($($arg),*).await {
                Ok(value) => Ok(value),
                Err(error) => $self.degrade_or_fail(error, $self.memory.$method($($arg),*)).await,
            },
            None => $self.memory.$method($($arg),*).await,
        }
    }};
}

impl HotTier {
    pub async fn connect(url: Option<&str>, env: Environment) -> KvResult<Self> {
        let redis = match url {
            Some(url) => match RedisBackend::connect(url).await {
                Ok(backend) => Some(backend),
                Err(error) if env.allows_hot_fallback() => {
                    warn!(
                        "hot store unreachable, starting in memory fallback mode: {}",
                        error
                    );
                    None
                }
                Err(error) => return Err(error),
            },
            None if env.allows_hot_fallback() => {
                info!("no hot store configured, using the in-memory fallback");
                None
            }
            None => {
                return Err(KvError::Unavailable(
                    "hot store connection string is required".to_string(),
                ))
            }
        };

        Ok(Self {
            redis,
            memory: MemoryBackend::new(),
            degraded: AtomicBool::new(false),
            env,
        })
    }

    // Pure in-memory tier, used by tests and tooling
    pub fn memory_only() -> Self {
        Self {
            redis: None,
            memory: MemoryBackend::new(),
            degraded: AtomicBool::new(false),
            env: Environment::Development,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn redis_if_active(&self) -> Option<&RedisBackend> {
        if self.is_degraded() {
            return None;
        }
        self.redis.as_ref()
    }

    async fn degrade_or_fail<T>(
        &self,
        error: KvError,
        fallback: impl std::future::Future<Output = KvResult<T>>,
    ) -> KvResult<T> {
        if !self.env.allows_hot_fallback() {
            return Err(error);
        }
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!("hot store degraded, switching to memory fallback: {}", error);
        }
        fallback.await
    }

    pub async fn sweep_memory(&self) {
        self.memory.sweep().await;
    }

    /// Probe the remote store while degraded; on recovery fold the fallback
    /// deltas back in. Statistics merge additively, the leaderboard merges
    /// as a union of increments. Short-lived keys (quotes, rate windows,
    /// anti-replay slots) are deliberately left behind.
    pub async fn resync_if_recovered(&self) -> KvResult<bool> {
        if !self.is_degraded() {
            return Ok(false);
        }
        let Some(redis) = self.redis.as_ref() else {
            return Ok(false);
        };
        if redis.ping().await.is_err() {
            return Ok(false);
        }

        let stats: Vec<(String, i64)> = self
            .memory
            .hash_get_all(&keys::stats())
            .await?
            .into_iter()
            .collect();
        if !stats.is_empty() {
            redis.hash_incr(&keys::stats(), &stats, None).await?;
        }

        let board = self
            .memory
            .zset_rev_range(&keys::leaderboard(), usize::MAX)
            .await?;
        for (member, score) in &board {
            redis.zset_incr(&keys::leaderboard(), member, *score).await?;
        }

        self.memory.clear().await;
        self.degraded.store(false, Ordering::Relaxed);
        info!(
            "hot store recovered, folded {} stat fields and {} leaderboard entries",
            stats.len(),
            board.len()
        );
        Ok(true)
    }
}

#[async_trait]
impl KvBackend for HotTier {
    async fn ping(&self) -> KvResult<()> {
        match self.redis.as_ref() {
            Some(redis) if !self.is_degraded() => redis.ping().await,
            _ => self.memory.ping().await,
        }
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        tiered!(self, get(key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        tiered!(self, set_ex(key, value, ttl))
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        tiered!(self, set_nx_ex(key, value, ttl))
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        tiered!(self, delete(key))
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> KvResult<bool> {
        tiered!(self, delete_if_equals(key, expected))
    }

    async fn incr_ex(&self, key: &str, ttl: Duration) -> KvResult<u64> {
        tiered!(self, incr_ex(key, ttl))
    }

    async fn hash_incr(
        &self,
        key: &str,
        fields: &[(String, i64)],
        ttl: Option<Duration>,
    ) -> KvResult<()> {
        tiered!(self, hash_incr(key, fields, ttl))
    }

    async fn hash_set(&self, key: &str, field: &str, value: i64) -> KvResult<()> {
        tiered!(self, hash_set(key, field, value))
    }

    async fn hash_get_all(&self, key: &str) -> KvResult<HashMap<String, i64>> {
        tiered!(self, hash_get_all(key))
    }

    async fn hash_get_all_many(&self, keys: &[String]) -> KvResult<Vec<HashMap<String, i64>>> {
        tiered!(self, hash_get_all_many(keys))
    }

    async fn zset_incr(&self, key: &str, member: &str, delta: u64) -> KvResult<()> {
        tiered!(self, zset_incr(key, member, delta))
    }

    async fn zset_rev_rank(&self, key: &str, member: &str) -> KvResult<Option<u64>> {
        tiered!(self, zset_rev_rank(key, member))
    }

    async fn zset_score(&self, key: &str, member: &str) -> KvResult<Option<u64>> {
        tiered!(self, zset_score(key, member))
    }

    async fn zset_rev_range(&self, key: &str, limit: usize) -> KvResult<Vec<(String, u64)>> {
        tiered!(self, zset_rev_range(key, limit))
    }

    async fn list_push_trim(
        &self,
        key: &str,
        value: &str,
        cap: usize,
        ttl: Option<Duration>,
    ) -> KvResult<()> {
        tiered!(self, list_push_trim(key, value, cap, ttl))
    }

    async fn list_range(&self, key: &str, limit: usize) -> KvResult<Vec<String>> {
        tiered!(self, list_range(key, limit))
    }

    async fn set_add_ex(&self, key: &str, member: &str, ttl: Duration) -> KvResult<u64> {
        tiered!(self, set_add_ex(key, member, ttl))
    }

    async fn scan_keys(&self, pattern: &str) -> KvResult<Vec<String>> {
        tiered!(self, scan_keys(pattern))
    }

    async fn rename(&self, from: &str, to: &str) -> KvResult<bool> {
        tiered!(self, rename(from, to))
    }
}
