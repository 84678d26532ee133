// Hot-to-cold data sync.
//
// Every few minutes the additive statistics counters are diffed against the
// last synced snapshot and folded into the daily aggregates; on boot an
// empty hot tier is reseeded from the cold store's lifetime totals so a
// wipe never resets the public counters; and while the development fallback
// is active, a recovered remote store gets the accumulated deltas merged
// back in. Short-lived keys (quotes, rate windows, anti-replay slots) are
// never synced.

use std::{collections::HashMap, sync::Arc, time::Duration};

use log::{info, warn};
use pyre_common::time::current_day_key;

use crate::{
    config::{MEMORY_SWEEP_INTERVAL_SECS, SYNC_INTERVAL_SECS},
    store::cold::ColdStore,
    store::hot::{
        HotStore, HotTier, StatsSnapshot, STAT_BURNS_COUNT, STAT_BURN_TOTAL, STAT_FEES_NATIVE,
        STAT_TX_COUNT,
    },
    types::DailyDeltas,
};

// Last-synced snapshot retention; re-created on every successful sync
const SYNC_STATE_TTL_SECS: u64 = 30 * 24 * 3_600;

/// Values to seed into an empty hot tier, None when seeding is not needed.
pub fn plan_seed(
    hot: &StatsSnapshot,
    cold_totals: Option<(u64, u64)>,
) -> Option<(u64, u64)> {
    if hot.burn_total != 0 || hot.tx_count != 0 {
        return None;
    }
    match cold_totals {
        Some((burn_total, tx_count)) if burn_total > 0 || tx_count > 0 => {
            Some((burn_total, tx_count))
        }
        _ => None,
    }
}

// Additive daily deltas between two raw stats snapshots
pub fn stats_deltas(
    current: &HashMap<String, i64>,
    last: &HashMap<String, i64>,
) -> DailyDeltas {
    let delta = |field: &str| -> u64 {
        let now = current.get(field).copied().unwrap_or(0);
        let then = last.get(field).copied().unwrap_or(0);
        (now - then).max(0) as u64
    };
    DailyDeltas {
        burns: delta(STAT_BURNS_COUNT),
        transactions: delta(STAT_TX_COUNT),
        fees_native: delta(STAT_FEES_NATIVE),
        unique_wallets: 0,
        treasury_balance: None,
    }
}

pub struct DataSyncWorker {
    hot: HotStore,
    tier: Arc<HotTier>,
    cold: Arc<ColdStore>,
}

impl DataSyncWorker {
    pub fn new(hot: HotStore, tier: Arc<HotTier>, cold: Arc<ColdStore>) -> Self {
        Self { hot, tier, cold }
    }

    /// Boot-time restore: an empty hot tier inherits the cold store's
    /// lifetime aggregates before the first request is served.
    pub async fn seed_from_cold(&self) -> anyhow::Result<()> {
        let snapshot = self.hot.stats_snapshot().await?;
        let Some((burn_total, tx_count)) =
            plan_seed(&snapshot, self.cold.lifetime_totals().await)
        else {
            return Ok(());
        };
        info!(
            "seeding hot statistics from cold store: burn_total={} tx_count={}",
            burn_total, tx_count
        );
        self.hot
            .stats_set(STAT_BURN_TOTAL, burn_total.min(i64::MAX as u64) as i64)
            .await?;
        self.hot
            .stats_set(STAT_TX_COUNT, tx_count.min(i64::MAX as u64) as i64)
            .await?;
        // The freshly seeded values are the new sync baseline, otherwise the
        // next delta pass would recount the whole lifetime into today
        let raw = self.hot.stats_raw().await?;
        self.store_baseline(&raw).await;
        Ok(())
    }

    async fn store_baseline(&self, raw: &HashMap<String, i64>) {
        if let Err(error) = self
            .hot
            .cache_put(
                "sync",
                "last",
                raw,
                Duration::from_secs(SYNC_STATE_TTL_SECS),
            )
            .await
        {
            warn!("sync baseline not stored: {}", error);
        }
    }

    pub async fn sync_once(&self) {
        // Fold development-fallback deltas back into a recovered remote
        match self.tier.resync_if_recovered().await {
            Ok(true) => info!("fallback deltas folded into the recovered hot store"),
            Ok(false) => {}
            Err(error) => warn!("fallback resync failed: {}", error),
        }

        let current = match self.hot.stats_raw().await {
            Ok(raw) => raw,
            Err(error) => {
                warn!("stats read failed during sync: {}", error);
                return;
            }
        };
        let last: HashMap<String, i64> = match self.hot.cache_get("sync", "last").await {
            Ok(Some(last)) => last,
            Ok(None) => {
                // First run on this deployment: set the baseline, sync next tick
                self.store_baseline(&current).await;
                return;
            }
            Err(error) => {
                warn!("sync baseline read failed: {}", error);
                return;
            }
        };

        let deltas = stats_deltas(&current, &last);
        if deltas.is_empty() {
            return;
        }
        if self.cold.upsert_daily(&current_day_key(), &deltas).await {
            self.store_baseline(&current).await;
        }
    }

    pub fn spawn(
        self: Arc<Self>,
        mut shutdown: tokio::sync::broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sync_ticker =
                tokio::time::interval(Duration::from_secs(SYNC_INTERVAL_SECS));
            let mut sweep_ticker =
                tokio::time::interval(Duration::from_secs(MEMORY_SWEEP_INTERVAL_SECS));
            // The first interval tick fires immediately; skip it so boot
            // seeding settles before the first delta pass
            sync_ticker.tick().await;
            sweep_ticker.tick().await;
            loop {
                tokio::select! {
                    _ = sync_ticker.tick() => self.sync_once().await,
                    _ = sweep_ticker.tick() => self.tier.sweep_memory().await,
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_seed_only_on_empty_hot() {
        let empty = StatsSnapshot::default();
        let busy = StatsSnapshot {
            burn_total: 10,
            tx_count: 2,
            treasury_balance: 0,
        };
        assert_eq!(plan_seed(&empty, Some((123_456, 42))), Some((123_456, 42)));
        assert_eq!(plan_seed(&busy, Some((123_456, 42))), None);
        assert_eq!(plan_seed(&empty, Some((0, 0))), None);
        assert_eq!(plan_seed(&empty, None), None);
    }

    #[test]
    fn test_stats_deltas() {
        let mut last = HashMap::new();
        last.insert(STAT_TX_COUNT.to_string(), 10);
        last.insert(STAT_BURNS_COUNT.to_string(), 2);
        let mut current = last.clone();
        current.insert(STAT_TX_COUNT.to_string(), 15);
        current.insert(STAT_BURNS_COUNT.to_string(), 3);
        current.insert(STAT_FEES_NATIVE.to_string(), 9_000);

        let deltas = stats_deltas(&current, &last);
        assert_eq!(deltas.transactions, 5);
        assert_eq!(deltas.burns, 1);
        assert_eq!(deltas.fees_native, 9_000);
    }

    #[test]
    fn test_stats_deltas_never_negative() {
        let mut last = HashMap::new();
        last.insert(STAT_TX_COUNT.to_string(), 10);
        let current = HashMap::new();
        assert_eq!(stats_deltas(&current, &last).transactions, 0);
    }

    #[tokio::test]
    async fn test_seed_sets_counters() {
        // The cold store is unreachable here, so lifetime_totals resolves to
        // its fallback and seeding is a no-op; the call must still succeed
        let tier = Arc::new(HotTier::memory_only());
        let hot = HotStore::new(tier.clone());
        let cold = Arc::new(
            ColdStore::connect_lazy("postgres://127.0.0.1:1/pyre").unwrap(),
        );
        let worker = DataSyncWorker::new(hot, tier, cold);
        worker.seed_from_cold().await.unwrap();
    }
}
