// Hot key-value tier: quotes, anti-replay slots, rolling counters,
// leaderboard, bounded event lists, statistics, distributed locks, velocity
// buckets and short-TTL caches.
//
// Coordination state (reservations, slots, locks) lives only here so
// several relay instances can share one store.

mod backend;
pub mod keys;
mod memory;
mod redis;
mod tier;

pub use backend::{KvBackend, KvError as HotError};
pub use memory::MemoryBackend;
pub use tier::HotTier;

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use log::warn;
use pyre_common::{crypto::Pubkey, time::current_day_key, utils::random_token};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    config::{
        AUDIT_LOG_CAP, AUDIT_TTL_SECS, BURN_PROOF_CAP, TREASURY_EVENT_CAP,
    },
    types::{AuditEntry, BurnProof, Quote},
};

pub type HotResult<T> = Result<T, HotError>;

// Statistics hash fields
pub const STAT_BURN_TOTAL: &str = "burn_total";
pub const STAT_TX_COUNT: &str = "tx_count";
pub const STAT_TREASURY_BALANCE: &str = "treasury_balance";
pub const STAT_FEES_NATIVE: &str = "fees_native";
pub const STAT_BURNS_COUNT: &str = "burns_count";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub burn_total: u64,
    pub tx_count: u64,
    pub treasury_balance: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub payer: Pubkey,
    pub amount: u64,
}

/// Outcome of a lock-guarded critical section.
#[derive(Debug)]
pub enum LockOutcome<T> {
    // Another holder owns the lock; nothing ran
    HeldElsewhere,
    Completed(T),
    ExecutionError(anyhow::Error),
}

#[derive(Clone)]
pub struct HotStore {
    kv: Arc<dyn KvBackend>,
}

impl HotStore {
    pub fn new(kv: Arc<dyn KvBackend>) -> Self {
        Self { kv }
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(tier::HotTier::memory_only()))
    }

    pub async fn ping(&self) -> bool {
        self.kv.ping().await.is_ok()
    }

    // ===== Quotes =====

    pub async fn set_quote(&self, quote: &Quote, ttl: Duration) -> HotResult<()> {
        let json = serde_json::to_string(quote)
            .map_err(|e| HotError::Corrupt(format!("quote encode: {}", e)))?;
        self.kv.set_ex(&keys::quote(&quote.id), &json, ttl).await
    }

    pub async fn get_quote(&self, id: &str) -> HotResult<Option<Quote>> {
        match self.kv.get(&keys::quote(id)).await? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| HotError::Corrupt(format!("quote decode: {}", e))),
            None => Ok(None),
        }
    }

    pub async fn delete_quote(&self, id: &str) -> HotResult<()> {
        self.kv.delete(&keys::quote(id)).await
    }

    // ===== Anti-replay slots =====

    /// Atomic set-if-absent on the transaction fingerprint. True means this
    /// caller claimed the slot; false means the same bytes were seen within
    /// the blockhash validity window.
    pub async fn claim_slot(&self, fingerprint: &str, ttl: Duration) -> HotResult<bool> {
        self.kv
            .set_nx_ex(&keys::slot(fingerprint), "1", ttl)
            .await
    }

    // Only failure paths release a slot, so the submitter may retry
    pub async fn release_slot(&self, fingerprint: &str) -> HotResult<()> {
        self.kv.delete(&keys::slot(fingerprint)).await
    }

    // ===== Rolling-window counters =====

    pub async fn window_count(
        &self,
        scope: &str,
        id: &str,
        window: Duration,
    ) -> HotResult<u64> {
        self.kv.incr_ex(&keys::rate(scope, id), window).await
    }

    pub async fn anomaly_count(
        &self,
        scope: &str,
        id: &str,
        kind: &str,
        window: Duration,
    ) -> HotResult<u64> {
        self.kv.incr_ex(&keys::anomaly(scope, id, kind), window).await
    }

    // ===== Leaderboard =====

    pub async fn leaderboard_add(&self, wallet: &str, amount: u64) -> HotResult<()> {
        self.kv.zset_incr(&keys::leaderboard(), wallet, amount).await
    }

    // Zero-based rank, best first
    pub async fn leaderboard_rank(&self, wallet: &str) -> HotResult<Option<u64>> {
        self.kv.zset_rev_rank(&keys::leaderboard(), wallet).await
    }

    pub async fn leaderboard_score(&self, wallet: &str) -> HotResult<Option<u64>> {
        self.kv.zset_score(&keys::leaderboard(), wallet).await
    }

    pub async fn leaderboard_top(&self, limit: usize) -> HotResult<Vec<(String, u64)>> {
        self.kv.zset_rev_range(&keys::leaderboard(), limit).await
    }

    // ===== Bounded event lists =====

    pub async fn push_audit(&self, entry: &AuditEntry) -> HotResult<()> {
        let json = serde_json::to_string(entry)
            .map_err(|e| HotError::Corrupt(format!("audit encode: {}", e)))?;
        self.kv
            .list_push_trim(
                &keys::audit_log(),
                &json,
                AUDIT_LOG_CAP,
                Some(Duration::from_secs(AUDIT_TTL_SECS)),
            )
            .await
    }

    pub async fn recent_audit(&self, limit: usize) -> HotResult<Vec<AuditEntry>> {
        Ok(self.decode_list(&keys::audit_log(), limit).await?)
    }

    pub async fn push_burn_proof(&self, proof: &BurnProof) -> HotResult<()> {
        let json = serde_json::to_string(proof)
            .map_err(|e| HotError::Corrupt(format!("proof encode: {}", e)))?;
        self.kv
            .list_push_trim(&keys::burn_proofs(), &json, BURN_PROOF_CAP, None)
            .await
    }

    pub async fn recent_burn_proofs(&self, limit: usize) -> HotResult<Vec<BurnProof>> {
        Ok(self.decode_list(&keys::burn_proofs(), limit).await?)
    }

    pub async fn push_treasury_event(&self, event: &serde_json::Value) -> HotResult<()> {
        self.kv
            .list_push_trim(
                &keys::treasury_events(),
                &event.to_string(),
                TREASURY_EVENT_CAP,
                None,
            )
            .await
    }

    pub async fn recent_treasury_events(
        &self,
        limit: usize,
    ) -> HotResult<Vec<serde_json::Value>> {
        Ok(self.decode_list(&keys::treasury_events(), limit).await?)
    }

    async fn decode_list<T: DeserializeOwned>(
        &self,
        key: &str,
        limit: usize,
    ) -> HotResult<Vec<T>> {
        let raw = self.kv.list_range(key, limit).await?;
        // Skip entries that no longer decode rather than fail the whole read
        Ok(raw
            .iter()
            .filter_map(|json| match serde_json::from_str(json) {
                Ok(value) => Some(value),
                Err(error) => {
                    warn!("dropping undecodable entry in {}: {}", key, error);
                    None
                }
            })
            .collect())
    }

    // ===== Statistics =====

    pub async fn stats_add(&self, fields: &[(&str, i64)]) -> HotResult<()> {
        let owned: Vec<(String, i64)> = fields
            .iter()
            .map(|(field, delta)| (field.to_string(), *delta))
            .collect();
        self.kv.hash_incr(&keys::stats(), &owned, None).await
    }

    pub async fn stats_set(&self, field: &str, value: i64) -> HotResult<()> {
        self.kv.hash_set(&keys::stats(), field, value).await
    }

    pub async fn stats_raw(&self) -> HotResult<HashMap<String, i64>> {
        self.kv.hash_get_all(&keys::stats()).await
    }

    pub async fn stats_snapshot(&self) -> HotResult<StatsSnapshot> {
        let raw = self.stats_raw().await?;
        let field = |name: &str| raw.get(name).copied().unwrap_or(0).max(0) as u64;
        Ok(StatsSnapshot {
            burn_total: field(STAT_BURN_TOTAL),
            tx_count: field(STAT_TX_COUNT),
            treasury_balance: field(STAT_TREASURY_BALANCE),
        })
    }

    // ===== Distributed locks =====

    pub async fn lock_acquire(&self, name: &str, ttl: Duration) -> HotResult<Option<String>> {
        let token = random_token();
        let claimed = self.kv.set_nx_ex(&keys::lock(name), &token, ttl).await?;
        Ok(claimed.then_some(token))
    }

    // Compare-and-delete: only the holder of `token` releases
    pub async fn lock_release(&self, name: &str, token: &str) -> HotResult<bool> {
        self.kv.delete_if_equals(&keys::lock(name), token).await
    }

    pub async fn with_lock<T, F, Fut>(
        &self,
        name: &str,
        ttl: Duration,
        critical_section: F,
    ) -> HotResult<LockOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let Some(token) = self.lock_acquire(name, ttl).await? else {
            return Ok(LockOutcome::HeldElsewhere);
        };
        let outcome = critical_section().await;
        if !self.lock_release(name, &token).await? {
            // TTL expired mid-section; the work ran unprotected at the tail
            warn!("lock '{}' expired before release", name);
        }
        Ok(match outcome {
            Ok(value) => LockOutcome::Completed(value),
            Err(error) => LockOutcome::ExecutionError(error),
        })
    }

    // ===== Fee-payer reservations =====

    pub async fn reservation_put(
        &self,
        quote_id: &str,
        reservation: &Reservation,
        ttl: Duration,
    ) -> HotResult<()> {
        let json = serde_json::to_string(reservation)
            .map_err(|e| HotError::Corrupt(format!("reservation encode: {}", e)))?;
        self.kv
            .set_ex(&keys::reservation(quote_id), &json, ttl)
            .await
    }

    pub async fn reservation_get(&self, quote_id: &str) -> HotResult<Option<Reservation>> {
        match self.kv.get(&keys::reservation(quote_id)).await? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| HotError::Corrupt(format!("reservation decode: {}", e))),
            None => Ok(None),
        }
    }

    pub async fn reservation_delete(&self, quote_id: &str) -> HotResult<()> {
        self.kv.delete(&keys::reservation(quote_id)).await
    }

    // ===== Velocity buckets =====

    pub async fn velocity_record(
        &self,
        minute: u64,
        cost: u64,
        ttl: Duration,
    ) -> HotResult<()> {
        let fields = vec![
            ("count".to_string(), 1i64),
            ("cost".to_string(), cost as i64),
        ];
        self.kv
            .hash_incr(&keys::velocity(minute), &fields, Some(ttl))
            .await
    }

    // One bulk read for the whole window, oldest bucket first
    pub async fn velocity_buckets(&self, minutes: &[u64]) -> HotResult<Vec<(u64, u64)>> {
        let keys: Vec<String> = minutes.iter().map(|m| keys::velocity(*m)).collect();
        let maps = self.kv.hash_get_all_many(&keys).await?;
        Ok(maps
            .into_iter()
            .map(|map| {
                let count = map.get("count").copied().unwrap_or(0).max(0) as u64;
                let cost = map.get("cost").copied().unwrap_or(0).max(0) as u64;
                (count, cost)
            })
            .collect())
    }

    // ===== Short-TTL caches =====

    pub async fn cache_put<T: Serialize>(
        &self,
        kind: &str,
        id: &str,
        value: &T,
        ttl: Duration,
    ) -> HotResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| HotError::Corrupt(format!("cache encode: {}", e)))?;
        self.kv.set_ex(&keys::cache(kind, id), &json, ttl).await
    }

    pub async fn cache_get<T: DeserializeOwned>(
        &self,
        kind: &str,
        id: &str,
    ) -> HotResult<Option<T>> {
        match self.kv.get(&keys::cache(kind, id)).await? {
            Some(json) => Ok(serde_json::from_str(&json).ok()),
            None => Ok(None),
        }
    }

    // ===== Daily unique wallets =====

    pub async fn note_wallet_today(&self, wallet: &str) -> HotResult<u64> {
        let day = current_day_key();
        self.kv
            .set_add_ex(
                &keys::day_wallets(&day),
                wallet,
                Duration::from_secs(48 * 3_600),
            )
            .await
    }

    // ===== Legacy key migration =====

    /// One-shot migration: move every key under `legacy_prefix` into the
    /// current namespace, keeping the suffix. Returns how many keys moved.
    pub async fn migrate_keys(&self, legacy_prefix: &str) -> HotResult<u64> {
        let pattern = format!("{}*", legacy_prefix);
        let found = self.kv.scan_keys(&pattern).await?;
        let mut moved = 0;
        for key in found {
            let suffix = &key[legacy_prefix.len()..];
            let target = keys::namespaced(suffix);
            if target == key {
                continue;
            }
            if self.kv.rename(&key, &target).await? {
                moved += 1;
            }
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuditSeverity, HolderTierSnapshot, PaymentTokenMeta, QuoteKind};
    use pyre_common::{crypto::Keypair, time::get_current_time_in_seconds};

    fn store() -> HotStore {
        HotStore::memory()
    }

    fn quote(id: &str) -> Quote {
        let user = Keypair::from_seed([1; 32]);
        let payer = Keypair::from_seed([2; 32]);
        let mint = *Keypair::from_seed([3; 32]).pubkey();
        Quote {
            id: id.to_string(),
            user_account: *user.pubkey(),
            payment_token: mint,
            fee_payer_account: *payer.pubkey(),
            fee_amount: 5_000,
            fee_native: 50_200,
            reserved_native: 60_200,
            expires_at: get_current_time_in_seconds() + 60,
            payment_token_meta: PaymentTokenMeta {
                mint,
                symbol: "X".into(),
                decimals: 6,
                tier: "diamond".into(),
                score: 100,
            },
            holder_tier: HolderTierSnapshot {
                share_pct: 0.0,
                discount: 0.0,
                is_at_break_even: false,
                tier_label: "none".into(),
            },
            dual_burn_pct: 0.0,
            kind: QuoteKind::Standard,
        }
    }

    #[tokio::test]
    async fn test_quote_set_get_delete() {
        let store = store();
        let q = quote("q1");
        store.set_quote(&q, Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get_quote("q1").await.unwrap(), Some(q));
        store.delete_quote("q1").await.unwrap();
        assert_eq!(store.get_quote("q1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quote_respects_ttl() {
        let store = store();
        store
            .set_quote(&quote("q2"), Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(store.get_quote("q2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_claim_release_claim() {
        let store = store();
        let ttl = Duration::from_secs(90);
        assert!(store.claim_slot("fp", ttl).await.unwrap());
        assert!(!store.claim_slot("fp", ttl).await.unwrap());
        store.release_slot("fp").await.unwrap();
        assert!(store.claim_slot("fp", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_with_lock_serializes() {
        let store = store();
        let ttl = Duration::from_secs(30);
        let token = store.lock_acquire("burn", ttl).await.unwrap();
        assert!(token.is_some());

        let outcome = store
            .with_lock("burn", ttl, || async { Ok(1) })
            .await
            .unwrap();
        assert!(matches!(outcome, LockOutcome::HeldElsewhere));

        assert!(store
            .lock_release("burn", token.as_deref().unwrap())
            .await
            .unwrap());
        let outcome = store
            .with_lock("burn", ttl, || async { Ok(2) })
            .await
            .unwrap();
        assert!(matches!(outcome, LockOutcome::Completed(2)));
    }

    #[tokio::test]
    async fn test_with_lock_reports_execution_error() {
        let store = store();
        let outcome: LockOutcome<()> = store
            .with_lock("x", Duration::from_secs(5), || async {
                anyhow::bail!("boom")
            })
            .await
            .unwrap();
        assert!(matches!(outcome, LockOutcome::ExecutionError(_)));
        // And the lock is free again afterwards
        assert!(store
            .lock_acquire("x", Duration::from_secs(5))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_lock_release_requires_token() {
        let store = store();
        let token = store
            .lock_acquire("l", Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert!(!store.lock_release("l", "wrong").await.unwrap());
        assert!(store.lock_release("l", &token).await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_roundtrip() {
        let store = store();
        store
            .stats_add(&[(STAT_BURN_TOTAL, 100), (STAT_TX_COUNT, 1)])
            .await
            .unwrap();
        store
            .stats_add(&[(STAT_BURN_TOTAL, 23), (STAT_TX_COUNT, 1)])
            .await
            .unwrap();
        store.stats_set(STAT_TREASURY_BALANCE, 777).await.unwrap();
        let snapshot = store.stats_snapshot().await.unwrap();
        assert_eq!(snapshot.burn_total, 123);
        assert_eq!(snapshot.tx_count, 2);
        assert_eq!(snapshot.treasury_balance, 777);
    }

    #[tokio::test]
    async fn test_reservation_roundtrip() {
        let store = store();
        let reservation = Reservation {
            payer: *Keypair::from_seed([7; 32]).pubkey(),
            amount: 60_000,
        };
        store
            .reservation_put("q", &reservation, Duration::from_secs(90))
            .await
            .unwrap();
        assert_eq!(
            store.reservation_get("q").await.unwrap(),
            Some(reservation)
        );
        store.reservation_delete("q").await.unwrap();
        assert_eq!(store.reservation_get("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_velocity_buckets_bulk_read() {
        let store = store();
        let ttl = Duration::from_secs(3_900);
        store.velocity_record(100, 5_000, ttl).await.unwrap();
        store.velocity_record(100, 7_000, ttl).await.unwrap();
        store.velocity_record(101, 1_000, ttl).await.unwrap();
        let buckets = store.velocity_buckets(&[99, 100, 101]).await.unwrap();
        assert_eq!(buckets, vec![(0, 0), (2, 12_000), (1, 1_000)]);
    }

    #[tokio::test]
    async fn test_audit_list_caps_and_decodes() {
        let store = store();
        for i in 0..5 {
            store
                .push_audit(
                    &AuditEntry::new(format!("kind-{}", i), AuditSeverity::Info),
                )
                .await
                .unwrap();
        }
        let entries = store.recent_audit(3).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, "kind-4");
    }

    #[tokio::test]
    async fn test_migrate_keys() {
        let store = store();
        store
            .kv
            .set_ex("legacy:quote:a", "{}", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .kv
            .set_ex("legacy:stats", "{}", Duration::from_secs(60))
            .await
            .unwrap();
        let moved = store.migrate_keys("legacy:").await.unwrap();
        assert_eq!(moved, 2);
        assert!(store
            .kv
            .get(&keys::namespaced("quote:a"))
            .await
            .unwrap()
            .is_some());
    }
}
