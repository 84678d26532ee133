// Fee-payer pool: the signing accounts that front gas for users.
//
// Selection walks the accounts in priority order and picks the first
// healthy one whose unreserved balance covers the quote. Healthy means the
// account's circuit is not open, its unreserved balance clears the floor
// and its last balance read is fresh. Reservations are mirrored into the
// hot store keyed by quote id so multiple relay instances account against
// the same capacity, and so a crashed instance's reservations die by TTL.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::{stream, StreamExt};
use log::{debug, info, warn};
use pyre_common::{
    circuit::{CircuitBreaker, CircuitConfig, CircuitState},
    crypto::{Keypair, Pubkey},
    time::{get_current_time_in_millis, TimestampMillis},
};

use crate::{
    chain::{ChainError, ChainRpc},
    config::{
        BALANCE_MAX_AGE_SECS, BALANCE_REFRESH_CONCURRENCY, MIN_HEALTHY_BALANCE,
        PAYER_FAILURE_THRESHOLD, PAYER_HALF_OPEN_TRIALS, PAYER_RESET_TIMEOUT_SECS,
    },
    store::hot::{HotResult, HotStore, Reservation},
};

struct PayerState {
    reserved: HashMap<String, u64>,
    capacity_reserved: u64,
    last_balance: u64,
    last_balance_at: TimestampMillis,
    breaker: CircuitBreaker,
}

pub struct FeePayer {
    keypair: Keypair,
    priority: u32,
    state: Mutex<PayerState>,
}

impl FeePayer {
    fn new(keypair: Keypair, priority: u32) -> Self {
        Self {
            keypair,
            priority,
            state: Mutex::new(PayerState {
                reserved: HashMap::new(),
                capacity_reserved: 0,
                last_balance: 0,
                last_balance_at: 0,
                breaker: CircuitBreaker::new(CircuitConfig {
                    failure_threshold: PAYER_FAILURE_THRESHOLD,
                    reset_timeout: Duration::from_secs(PAYER_RESET_TIMEOUT_SECS),
                    half_open_trials: PAYER_HALF_OPEN_TRIALS,
                    max_reset_timeout: Duration::from_secs(PAYER_RESET_TIMEOUT_SECS * 8),
                }),
            }),
        }
    }

    pub fn pubkey(&self) -> &Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    fn unreserved_balance(state: &PayerState) -> u64 {
        state.last_balance.saturating_sub(state.capacity_reserved)
    }

    fn is_healthy(state: &mut PayerState) -> bool {
        if state.breaker.state() == CircuitState::Open {
            return false;
        }
        if Self::unreserved_balance(state) < MIN_HEALTHY_BALANCE {
            return false;
        }
        let age = get_current_time_in_millis().saturating_sub(state.last_balance_at);
        state.last_balance_at != 0 && age < BALANCE_MAX_AGE_SECS * 1_000
    }
}

#[derive(Debug, Clone)]
pub struct PayerSnapshot {
    pub pubkey: Pubkey,
    pub priority: u32,
    pub last_balance: u64,
    pub capacity_reserved: u64,
    pub healthy: bool,
    pub circuit: CircuitState,
}

pub struct FeePayerPool {
    payers: Vec<Arc<FeePayer>>,
    hot: HotStore,
}

impl FeePayerPool {
    pub fn new(keypairs: Vec<Keypair>, hot: HotStore) -> Self {
        let payers: Vec<Arc<FeePayer>> = keypairs
            .into_iter()
            .enumerate()
            .map(|(index, keypair)| Arc::new(FeePayer::new(keypair, index as u32)))
            .collect();
        info!(
            "fee payer pool initialized with {} accounts: {}",
            payers.len(),
            payers
                .iter()
                .map(|p| p.pubkey().to_base58())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Self { payers, hot }
    }

    pub fn primary(&self) -> Option<&Arc<FeePayer>> {
        self.payers.first()
    }

    pub fn len(&self) -> usize {
        self.payers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payers.is_empty()
    }

    /// Reserve `amount` of native capacity for `quote_id`. Idempotent: a
    /// repeat call for a quote that already holds a reservation returns the
    /// same account without double counting.
    pub async fn reserve(
        &self,
        quote_id: &str,
        amount: u64,
        ttl: Duration,
    ) -> HotResult<Option<Pubkey>> {
        // Idempotency: an existing reservation wins
        for payer in &self.payers {
            let state = payer.state.lock().expect("payer state poisoned");
            if state.reserved.contains_key(quote_id) {
                return Ok(Some(*payer.pubkey()));
            }
        }

        // Priority order, tiebreak by largest unreserved balance
        let mut candidates: Vec<(u32, u64, &Arc<FeePayer>)> = self
            .payers
            .iter()
            .filter_map(|payer| {
                let mut state = payer.state.lock().expect("payer state poisoned");
                if !FeePayer::is_healthy(&mut state) {
                    return None;
                }
                let unreserved = FeePayer::unreserved_balance(&state);
                (unreserved >= amount).then_some((payer.priority, unreserved, payer))
            })
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let Some((_, _, payer)) = candidates.first() else {
            debug!("no payer has {} unreserved units for {}", amount, quote_id);
            return Ok(None);
        };

        {
            let mut state = payer.state.lock().expect("payer state poisoned");
            state.reserved.insert(quote_id.to_string(), amount);
            state.capacity_reserved += amount;
        }

        let reservation = Reservation {
            payer: *payer.pubkey(),
            amount,
        };
        if let Err(error) = self.hot.reservation_put(quote_id, &reservation, ttl).await {
            // Roll the local accounting back so capacity is not stranded
            let mut state = payer.state.lock().expect("payer state poisoned");
            if state.reserved.remove(quote_id).is_some() {
                state.capacity_reserved = state.capacity_reserved.saturating_sub(amount);
            }
            return Err(error);
        }

        Ok(Some(*payer.pubkey()))
    }

    // Idempotent: releasing an unknown quote is a no-op
    pub async fn release(&self, quote_id: &str) -> HotResult<()> {
        for payer in &self.payers {
            let mut state = payer.state.lock().expect("payer state poisoned");
            if let Some(amount) = state.reserved.remove(quote_id) {
                state.capacity_reserved = state.capacity_reserved.saturating_sub(amount);
                break;
            }
        }
        self.hot.reservation_delete(quote_id).await
    }

    // Must only be called after a successful reserve for this pubkey
    pub fn get_for_signing(&self, pubkey: &Pubkey) -> Option<Arc<FeePayer>> {
        self.payers
            .iter()
            .find(|payer| payer.pubkey() == pubkey)
            .cloned()
    }

    pub fn report_failure(&self, pubkey: &Pubkey, error: &ChainError) {
        if !error.trips_circuit() {
            return;
        }
        if let Some(payer) = self.get_for_signing(pubkey) {
            let mut state = payer.state.lock().expect("payer state poisoned");
            state.breaker.record_failure();
            if state.breaker.state() == CircuitState::Open {
                warn!("fee payer {} circuit opened", pubkey);
            }
        }
    }

    pub fn report_success(&self, pubkey: &Pubkey) {
        if let Some(payer) = self.get_for_signing(pubkey) {
            payer
                .state
                .lock()
                .expect("payer state poisoned")
                .breaker
                .record_success();
        }
    }

    /// Refresh every account's balance with bounded concurrency.
    pub async fn refresh_balances(&self, rpc: &dyn ChainRpc) {
        let results: Vec<(Pubkey, Result<u64, ChainError>)> =
            stream::iter(self.payers.iter().cloned())
                .map(|payer| async move {
                    let pubkey = *payer.pubkey();
                    (pubkey, rpc.get_balance(&pubkey).await)
                })
                .buffer_unordered(BALANCE_REFRESH_CONCURRENCY)
                .collect()
                .await;

        for (pubkey, result) in results {
            match result {
                Ok(balance) => {
                    if let Some(payer) = self.get_for_signing(&pubkey) {
                        let mut state = payer.state.lock().expect("payer state poisoned");
                        state.last_balance = balance;
                        state.last_balance_at = get_current_time_in_millis();
                    }
                }
                Err(error) => {
                    warn!("balance refresh failed for {}: {}", pubkey, error);
                    self.report_failure(&pubkey, &error);
                }
            }
        }
    }

    pub fn is_circuit_open_all(&self) -> bool {
        !self.payers.is_empty()
            && self.payers.iter().all(|payer| {
                payer
                    .state
                    .lock()
                    .expect("payer state poisoned")
                    .breaker
                    .state()
                    == CircuitState::Open
            })
    }

    // Seconds until the earliest breaker admits a probe again
    pub fn seconds_until_first_half_open(&self) -> u64 {
        self.payers
            .iter()
            .filter_map(|payer| {
                payer
                    .state
                    .lock()
                    .expect("payer state poisoned")
                    .breaker
                    .time_until_half_open()
            })
            .map(|remaining| remaining.as_secs() + 1)
            .min()
            .unwrap_or(30)
    }

    pub fn any_healthy(&self) -> bool {
        self.payers.iter().any(|payer| {
            let mut state = payer.state.lock().expect("payer state poisoned");
            FeePayer::is_healthy(&mut state)
        })
    }

    pub fn snapshots(&self) -> Vec<PayerSnapshot> {
        self.payers
            .iter()
            .map(|payer| {
                let mut state = payer.state.lock().expect("payer state poisoned");
                let healthy = FeePayer::is_healthy(&mut state);
                PayerSnapshot {
                    pubkey: *payer.pubkey(),
                    priority: payer.priority,
                    last_balance: state.last_balance,
                    capacity_reserved: state.capacity_reserved,
                    healthy,
                    circuit: state.breaker.state(),
                }
            })
            .collect()
    }

    // Test and bootstrap hook: stamp a balance without a chain read
    pub fn set_balance(&self, pubkey: &Pubkey, balance: u64) {
        if let Some(payer) = self.get_for_signing(pubkey) {
            let mut state = payer.state.lock().expect("payer state poisoned");
            state.last_balance = balance;
            state.last_balance_at = get_current_time_in_millis();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(balances: &[u64]) -> FeePayerPool {
        let keypairs: Vec<Keypair> = (0..balances.len())
            .map(|i| Keypair::from_seed([i as u8 + 1; 32]))
            .collect();
        let pool = FeePayerPool::new(keypairs, HotStore::memory());
        for (i, balance) in balances.iter().enumerate() {
            let pubkey = *Keypair::from_seed([i as u8 + 1; 32]).pubkey();
            pool.set_balance(&pubkey, *balance);
        }
        pool
    }

    const TTL: Duration = Duration::from_secs(90);

    #[tokio::test]
    async fn test_reserve_prefers_priority_order() {
        let pool = pool_with(&[1_000_000_000, 2_000_000_000]);
        let picked = pool.reserve("q1", 100_000, TTL).await.unwrap().unwrap();
        assert_eq!(picked, *Keypair::from_seed([1; 32]).pubkey());
    }

    #[tokio::test]
    async fn test_reserve_skips_exhausted_payer() {
        let pool = pool_with(&[MIN_HEALTHY_BALANCE + 10_000, 2_000_000_000]);
        // First payer cannot cover this amount while staying healthy
        let picked = pool
            .reserve("q1", MIN_HEALTHY_BALANCE + 50_000, TTL)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked, *Keypair::from_seed([2; 32]).pubkey());
    }

    #[tokio::test]
    async fn test_reserve_is_idempotent() {
        let pool = pool_with(&[1_000_000_000]);
        let first = pool.reserve("q1", 100_000, TTL).await.unwrap().unwrap();
        let second = pool.reserve("q1", 100_000, TTL).await.unwrap().unwrap();
        assert_eq!(first, second);
        let snapshot = &pool.snapshots()[0];
        assert_eq!(snapshot.capacity_reserved, 100_000);
    }

    #[tokio::test]
    async fn test_reserve_release_is_noop_on_capacity() {
        let pool = pool_with(&[1_000_000_000]);
        pool.reserve("q1", 100_000, TTL).await.unwrap().unwrap();
        pool.release("q1").await.unwrap();
        pool.release("q1").await.unwrap();
        let snapshot = &pool.snapshots()[0];
        assert_eq!(snapshot.capacity_reserved, 0);
    }

    #[tokio::test]
    async fn test_reservations_reduce_capacity() {
        let pool = pool_with(&[MIN_HEALTHY_BALANCE + 300_000]);
        assert!(pool.reserve("q1", 400_000, TTL).await.unwrap().is_some());
        // Remaining unreserved balance is below the healthy floor now
        assert!(pool.reserve("q2", 200_000, TTL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_circuit_opens_after_qualifying_failures() {
        let pool = pool_with(&[1_000_000_000]);
        let pubkey = *Keypair::from_seed([1; 32]).pubkey();
        for _ in 0..PAYER_FAILURE_THRESHOLD {
            pool.report_failure(&pubkey, &ChainError::Timeout);
        }
        assert!(pool.is_circuit_open_all());
        assert!(pool.reserve("q1", 1_000, TTL).await.unwrap().is_none());
        assert!(pool.seconds_until_first_half_open() > 0);
    }

    #[tokio::test]
    async fn test_non_qualifying_failures_do_not_trip() {
        let pool = pool_with(&[1_000_000_000]);
        let pubkey = *Keypair::from_seed([1; 32]).pubkey();
        for _ in 0..20 {
            pool.report_failure(&pubkey, &ChainError::Rejected("program error".into()));
        }
        assert!(!pool.is_circuit_open_all());
    }

    #[tokio::test]
    async fn test_reservation_accounting_conserves_balance() {
        let pool = pool_with(&[5_000_000_000]);
        let amounts = [100_000u64, 250_000, 60_200, 999_999];
        for (i, amount) in amounts.iter().enumerate() {
            pool.reserve(&format!("q{}", i), *amount, TTL)
                .await
                .unwrap()
                .unwrap();
        }
        let snapshot = &pool.snapshots()[0];
        assert_eq!(snapshot.capacity_reserved, amounts.iter().sum::<u64>());

        for i in 0..amounts.len() {
            pool.release(&format!("q{}", i)).await.unwrap();
        }
        let snapshot = &pool.snapshots()[0];
        assert_eq!(snapshot.capacity_reserved, 0);
        assert_eq!(snapshot.last_balance, 5_000_000_000);
    }

    #[tokio::test]
    async fn test_stale_balance_is_unhealthy() {
        let keypairs = vec![Keypair::from_seed([1; 32])];
        let pool = FeePayerPool::new(keypairs, HotStore::memory());
        // Never refreshed: no reserve possible
        assert!(pool.reserve("q1", 1_000, TTL).await.unwrap().is_none());
    }
}
