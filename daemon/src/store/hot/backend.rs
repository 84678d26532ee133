// Primitive key-value surface the hot tier is built on.
//
// The domain layer (HotStore) composes these into quotes, locks, counters
// and leaderboards; the tier wrapper decides per call whether they run
// against the remote store or the in-memory fallback. Keeping the surface
// primitive means the fallback only has to mirror a dozen commands, not the
// whole domain.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

pub type KvResult<T> = Result<T, KvError>;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("Hot store unavailable: {0}")]
    Unavailable(String),

    #[error("Hot store returned corrupt data for {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn ping(&self) -> KvResult<()>;

    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()>;

    // Atomic set-if-absent with TTL; true when this caller created the key
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool>;

    async fn delete(&self, key: &str) -> KvResult<()>;

    // Compare-and-delete, the release half of a fenced lock
    async fn delete_if_equals(&self, key: &str, expected: &str) -> KvResult<bool>;

    // Increment with the TTL re-applied on every call (rolling window)
    async fn incr_ex(&self, key: &str, ttl: Duration) -> KvResult<u64>;

    async fn hash_incr(
        &self,
        key: &str,
        fields: &[(String, i64)],
        ttl: Option<Duration>,
    ) -> KvResult<()>;

    async fn hash_set(&self, key: &str, field: &str, value: i64) -> KvResult<()>;

    async fn hash_get_all(&self, key: &str) -> KvResult<HashMap<String, i64>>;

    // Bulk read of several hashes in one round trip
    async fn hash_get_all_many(&self, keys: &[String]) -> KvResult<Vec<HashMap<String, i64>>>;

    async fn zset_incr(&self, key: &str, member: &str, delta: u64) -> KvResult<()>;

    async fn zset_rev_rank(&self, key: &str, member: &str) -> KvResult<Option<u64>>;

    async fn zset_score(&self, key: &str, member: &str) -> KvResult<Option<u64>>;

    async fn zset_rev_range(&self, key: &str, limit: usize) -> KvResult<Vec<(String, u64)>>;

    async fn list_push_trim(
        &self,
        key: &str,
        value: &str,
        cap: usize,
        ttl: Option<Duration>,
    ) -> KvResult<()>;

    async fn list_range(&self, key: &str, limit: usize) -> KvResult<Vec<String>>;

    // Add to a set with TTL, returning the resulting cardinality
    async fn set_add_ex(&self, key: &str, member: &str, ttl: Duration) -> KvResult<u64>;

    async fn scan_keys(&self, pattern: &str) -> KvResult<Vec<String>>;

    async fn rename(&self, from: &str, to: &str) -> KvResult<bool>;
}
