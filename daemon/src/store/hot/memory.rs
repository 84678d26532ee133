// In-process fallback for the hot tier, development only.
//
// A single map with per-entry TTL. Expired entries are dropped lazily on
// access, amortized every N writes, and by the periodic sweep tick so an
// idle process does not leak. Stats and leaderboard contents double as the
// deltas folded back into the remote store on reconnect.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use log::debug;
use pyre_common::time::{get_current_time_in_millis, TimestampMillis};
use tokio::sync::Mutex;

use crate::config::MEMORY_SWEEP_EVERY_WRITES;

use super::backend::{KvBackend, KvError, KvResult};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Int(i64),
    Hash(HashMap<String, i64>),
    ZSet(HashMap<String, u64>),
    List(VecDeque<String>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<TimestampMillis>,
}

impl Entry {
    fn persistent(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: TimestampMillis) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

type Entries = HashMap<String, Entry>;

#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<Entries>,
    writes: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn deadline(ttl: Duration) -> Option<TimestampMillis> {
        Some(get_current_time_in_millis() + ttl.as_millis() as u64)
    }

    // Remove the entry if its TTL has elapsed, so the caller observes
    // absence exactly like on the remote store
    fn purge_expired(entries: &mut Entries, key: &str) {
        let now = get_current_time_in_millis();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
    }

    // Drop every expired entry; called by the background tick and amortized
    // from the write path
    pub async fn sweep(&self) {
        let now = get_current_time_in_millis();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let dropped = before - entries.len();
        if dropped > 0 {
            debug!("memory fallback sweep dropped {} expired entries", dropped);
        }
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    async fn maybe_amortized_sweep(&self) {
        if self.writes.fetch_add(1, Ordering::Relaxed) % MEMORY_SWEEP_EVERY_WRITES == 0 {
            self.sweep().await;
        }
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn ping(&self) -> KvResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        match entries.get(key).map(|e| &e.value) {
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(Value::Int(i)) => Ok(Some(i.to_string())),
            Some(_) => Err(KvError::Corrupt(key.to_string())),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        self.maybe_amortized_sweep().await;
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Self::deadline(ttl),
            },
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        self.maybe_amortized_sweep().await;
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Self::deadline(ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> KvResult<bool> {
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        let matches = matches!(
            entries.get(key).map(|e| &e.value),
            Some(Value::Str(s)) if s == expected
        );
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn incr_ex(&self, key: &str, ttl: Duration) -> KvResult<u64> {
        self.maybe_amortized_sweep().await;
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(Value::Int(0)));
        let Value::Int(count) = &mut entry.value else {
            return Err(KvError::Corrupt(key.to_string()));
        };
        *count += 1;
        entry.expires_at = Self::deadline(ttl);
        Ok(*count as u64)
    }

    async fn hash_incr(
        &self,
        key: &str,
        fields: &[(String, i64)],
        ttl: Option<Duration>,
    ) -> KvResult<()> {
        self.maybe_amortized_sweep().await;
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(Value::Hash(HashMap::new())));
        let Value::Hash(hash) = &mut entry.value else {
            return Err(KvError::Corrupt(key.to_string()));
        };
        for (field, delta) in fields {
            *hash.entry(field.clone()).or_insert(0) += delta;
        }
        if let Some(ttl) = ttl {
            entry.expires_at = Self::deadline(ttl);
        }
        Ok(())
    }

    async fn hash_set(&self, key: &str, field: &str, value: i64) -> KvResult<()> {
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(Value::Hash(HashMap::new())));
        let Value::Hash(hash) = &mut entry.value else {
            return Err(KvError::Corrupt(key.to_string()));
        };
        hash.insert(field.to_string(), value);
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> KvResult<HashMap<String, i64>> {
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        match entries.get(key).map(|e| &e.value) {
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(KvError::Corrupt(key.to_string())),
            None => Ok(HashMap::new()),
        }
    }

    async fn hash_get_all_many(&self, keys: &[String]) -> KvResult<Vec<HashMap<String, i64>>> {
        let mut result = Vec::with_capacity(keys.len());
        for key in keys {
            result.push(self.hash_get_all(key).await?);
        }
        Ok(result)
    }

    async fn zset_incr(&self, key: &str, member: &str, delta: u64) -> KvResult<()> {
        self.maybe_amortized_sweep().await;
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(Value::ZSet(HashMap::new())));
        let Value::ZSet(zset) = &mut entry.value else {
            return Err(KvError::Corrupt(key.to_string()));
        };
        *zset.entry(member.to_string()).or_insert(0) += delta;
        Ok(())
    }

    async fn zset_rev_rank(&self, key: &str, member: &str) -> KvResult<Option<u64>> {
        let ranked = self.zset_rev_range(key, usize::MAX).await?;
        Ok(ranked
            .iter()
            .position(|(m, _)| m == member)
            .map(|position| position as u64))
    }

    async fn zset_score(&self, key: &str, member: &str) -> KvResult<Option<u64>> {
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        match entries.get(key).map(|e| &e.value) {
            Some(Value::ZSet(zset)) => Ok(zset.get(member).copied()),
            Some(_) => Err(KvError::Corrupt(key.to_string())),
            None => Ok(None),
        }
    }

    async fn zset_rev_range(&self, key: &str, limit: usize) -> KvResult<Vec<(String, u64)>> {
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        let mut ranked: Vec<(String, u64)> = match entries.get(key).map(|e| &e.value) {
            Some(Value::ZSet(zset)) => zset.iter().map(|(m, s)| (m.clone(), *s)).collect(),
            Some(_) => return Err(KvError::Corrupt(key.to_string())),
            None => Vec::new(),
        };
        // Score descending, member ascending for a stable order
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn list_push_trim(
        &self,
        key: &str,
        value: &str,
        cap: usize,
        ttl: Option<Duration>,
    ) -> KvResult<()> {
        self.maybe_amortized_sweep().await;
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(Value::List(VecDeque::new())));
        let Value::List(list) = &mut entry.value else {
            return Err(KvError::Corrupt(key.to_string()));
        };
        list.push_front(value.to_string());
        list.truncate(cap);
        if let Some(ttl) = ttl {
            entry.expires_at = Self::deadline(ttl);
        }
        Ok(())
    }

    async fn list_range(&self, key: &str, limit: usize) -> KvResult<Vec<String>> {
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        match entries.get(key).map(|e| &e.value) {
            Some(Value::List(list)) => Ok(list.iter().take(limit).cloned().collect()),
            Some(_) => Err(KvError::Corrupt(key.to_string())),
            None => Ok(Vec::new()),
        }
    }

    async fn set_add_ex(&self, key: &str, member: &str, ttl: Duration) -> KvResult<u64> {
        self.maybe_amortized_sweep().await;
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(Value::Set(HashSet::new())));
        let Value::Set(set) = &mut entry.value else {
            return Err(KvError::Corrupt(key.to_string()));
        };
        set.insert(member.to_string());
        entry.expires_at = Self::deadline(ttl);
        Ok(set.len() as u64)
    }

    async fn scan_keys(&self, pattern: &str) -> KvResult<Vec<String>> {
        // Only prefix patterns are used by the relay
        let prefix = pattern.trim_end_matches('*');
        let now = get_current_time_in_millis();
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn rename(&self, from: &str, to: &str) -> KvResult<bool> {
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, from);
        match entries.remove(from) {
            Some(entry) => {
                entries.insert(to.to_string(), entry);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
