// Burn/treasury worker.
//
// A periodic, lock-guarded pipeline: top up the signer from ecosystem-token
// reserves when velocity says the runway is short, scan treasury token
// balances, funnel everything above the dust floor into ecosystem-token
// burns, and retain the treasury's share as ecosystem tokens. Routing all
// non-ecosystem value through a single swap per token halves aggregator
// cost; retaining ecosystem tokens means the only ecotoken->native swaps
// are the refills actually driven by signing velocity.
//
// The distributed lock serializes cycles across relay instances; proofs are
// written to the cold store before hot statistics move, so a hot-tier wipe
// can never lose a confirmed burn.

use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use pyre_common::{
    crypto::{Pubkey, Signature},
    fee,
    time::{current_day_key, get_current_time_in_seconds},
    transaction::{build_transaction, burn_instruction, derive_token_account, Transaction},
    utils::RetryPolicy,
};
use serde_json::json;

use crate::{
    audit::AuditLogger,
    chain::{ChainError, ChainRpc},
    config::{
        Config, BURN_BATCH_MAX_INSTRUCTIONS, BURN_FIRST_DELAY_SECS, BURN_INTERVAL_SECS,
        BURN_LOCK_NAME, BURN_LOCK_TTL_SECS, CONFIRM_TIMEOUT_SECS, MIN_TOKEN_VALUE_USD,
        REFILL_MIN_FLOOR, REFILL_RUNWAY_HOURS, SUBMIT_MAX_RETRIES, SUBMIT_RETRY_BASE_MS,
        SUBMIT_RETRY_JITTER_MS, SUBMIT_RETRY_MAX_MS,
    },
    error::RelayError,
    oracle::{DexAggregator, HolderOracle},
    payer::FeePayerPool,
    services::velocity::VelocityTracker,
    store::cold::ColdStore,
    store::hot::{
        HotStore, LockOutcome, STAT_BURNS_COUNT, STAT_BURN_TOTAL, STAT_TREASURY_BALANCE,
        STAT_TX_COUNT,
    },
    types::{AuditEntry, AuditSeverity, BurnKind, BurnProof, DailyDeltas},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub token_account: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
    pub decimals: u8,
    pub usd_value: f64,
}

/// One burn instruction waiting to be landed on chain.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedBurn {
    pub mint: Pubkey,
    pub token_account: Pubkey,
    pub amount: u64,
    pub kind: BurnKind,
    pub source_token: Option<Pubkey>,
    // Ecosystem tokens kept by the treasury out of the same swap
    pub retained: u64,
}

/// Split one non-ecosystem holding into its dual-burn part and the amount
/// left for the swap leg. Pure so the arithmetic is testable.
pub fn dual_burn_split(amount: u64, dual_burn_pct: f64) -> (u64, u64) {
    if !(0.0..=1.0).contains(&dual_burn_pct) || amount == 0 {
        return (0, amount);
    }
    let eco_burn = (amount as f64 * dual_burn_pct).floor() as u64;
    let eco_burn = eco_burn.min(amount);
    (eco_burn, amount - eco_burn)
}

#[derive(Debug, Default)]
pub struct BurnCycleReport {
    pub executed: bool,
    pub proofs: Vec<BurnProof>,
    pub refilled_native: Option<u64>,
}

pub struct BurnWorker {
    hot: HotStore,
    cold: Arc<ColdStore>,
    chain: Arc<dyn ChainRpc>,
    dex: Arc<dyn DexAggregator>,
    oracle: Arc<dyn HolderOracle>,
    payers: Arc<FeePayerPool>,
    velocity: Arc<VelocityTracker>,
    audit: Arc<AuditLogger>,
    config: Arc<Config>,
    treasury: Pubkey,
    ecotoken: Option<Pubkey>,
}

impl BurnWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hot: HotStore,
        cold: Arc<ColdStore>,
        chain: Arc<dyn ChainRpc>,
        dex: Arc<dyn DexAggregator>,
        oracle: Arc<dyn HolderOracle>,
        payers: Arc<FeePayerPool>,
        velocity: Arc<VelocityTracker>,
        audit: Arc<AuditLogger>,
        config: Arc<Config>,
        treasury: Pubkey,
        ecotoken: Option<Pubkey>,
    ) -> Self {
        Self {
            hot,
            cold,
            chain,
            dex,
            oracle,
            payers,
            velocity,
            audit,
            config,
            treasury,
            ecotoken,
        }
    }

    pub fn spawn(
        self: Arc<Self>,
        mut shutdown: tokio::sync::broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(BURN_FIRST_DELAY_SECS)) => {}
                _ = shutdown.recv() => return,
            }
            let mut ticker =
                tokio::time::interval(Duration::from_secs(BURN_INTERVAL_SECS));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.recv() => break,
                }
                match self.run_cycle().await {
                    Ok(report) if report.executed => info!(
                        "burn cycle complete: {} proofs, refill {:?}",
                        report.proofs.len(),
                        report.refilled_native
                    ),
                    Ok(_) => debug!("burn cycle skipped (lock held or nothing to do)"),
                    Err(error) => warn!("burn cycle failed: {:#}", error),
                }
            }
        })
    }

    /// One full cycle; also the admin-triggered entry point.
    pub async fn run_cycle(&self) -> anyhow::Result<BurnCycleReport> {
        let mut report = BurnCycleReport::default();

        // 1. Refill the signer before anything else so a burst of submits
        //    during the cycle cannot starve it
        match self.refill_if_needed().await {
            Ok(refilled) => report.refilled_native = refilled,
            Err(error) => warn!("refill pre-check failed: {}", error),
        }

        // 2. Cheap pre-check outside the lock
        let holdings = self.scan_treasury().await?;
        if holdings.is_empty() {
            return Ok(report);
        }

        // 3-6. The critical section re-scans and burns
        let outcome = self
            .hot
            .with_lock(
                BURN_LOCK_NAME,
                Duration::from_secs(BURN_LOCK_TTL_SECS),
                || async {
                    // Double-check: another instance may have just drained
                    let holdings = self.scan_treasury().await?;
                    self.process_holdings(holdings).await
                },
            )
            .await?;

        match outcome {
            LockOutcome::HeldElsewhere => {
                debug!("burn lock held elsewhere, exiting quietly");
                return Ok(report);
            }
            LockOutcome::ExecutionError(error) => return Err(error),
            LockOutcome::Completed(proofs) => {
                report.executed = true;
                report.proofs = proofs;
            }
        }

        // 7. Ending treasury balance for the dashboard counters
        if let Ok(balance) = self.chain.get_balance(&self.treasury).await {
            let _ = self
                .hot
                .stats_set(STAT_TREASURY_BALANCE, balance.min(i64::MAX as u64) as i64)
                .await;
            self.cold
                .upsert_daily(
                    &current_day_key(),
                    &DailyDeltas {
                        treasury_balance: Some(balance),
                        ..Default::default()
                    },
                )
                .await;
        }

        Ok(report)
    }

    fn retry_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: SUBMIT_MAX_RETRIES,
            base_delay: Duration::from_millis(SUBMIT_RETRY_BASE_MS),
            max_delay: Duration::from_millis(SUBMIT_RETRY_MAX_MS),
            jitter: Duration::from_millis(SUBMIT_RETRY_JITTER_MS),
        }
    }

    async fn send_and_confirm(&self, tx: &Transaction) -> Result<Signature, ChainError> {
        let signature = Self::retry_policy()
            .run(
                "burn_send",
                || {
                    let tx = tx.clone();
                    let chain = Arc::clone(&self.chain);
                    async move { chain.send_transaction(&tx).await }
                },
                |error| error.is_retryable(),
            )
            .await?;
        self.chain
            .confirm(&signature, Duration::from_secs(CONFIRM_TIMEOUT_SECS))
            .await?;
        Ok(signature)
    }

    /// Treasury token balances worth processing: above the USD dust floor,
    /// most valuable first. Also serves the admin treasury view.
    pub async fn scan_treasury(&self) -> anyhow::Result<Vec<Holding>> {
        let accounts = self
            .chain
            .get_token_accounts(&self.treasury)
            .await
            .map_err(|e| anyhow::anyhow!("treasury scan failed: {}", e))?;

        let mut holdings = Vec::new();
        for account in accounts {
            if account.amount == 0 {
                continue;
            }
            let price = match self.dex.token_price_usd(&account.mint).await {
                Ok(price) => price,
                Err(error) => {
                    debug!("no price for {}: {}", account.mint, error);
                    continue;
                }
            };
            let usd_value =
                account.amount as f64 / 10f64.powi(account.decimals as i32) * price;
            // Swapping dust costs more than it recovers
            if usd_value < MIN_TOKEN_VALUE_USD {
                continue;
            }
            holdings.push(Holding {
                token_account: account.token_account,
                mint: account.mint,
                amount: account.amount,
                decimals: account.decimals,
                usd_value,
            });
        }
        holdings.sort_by(|a, b| {
            b.usd_value
                .partial_cmp(&a.usd_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(holdings)
    }

    /// Turn holdings into burn instructions: ecosystem tokens burn whole,
    /// everything else splits into the dual-burn part (burned in place) and
    /// a swap leg whose proceeds split into swap-burn and retained.
    async fn process_holdings(&self, holdings: Vec<Holding>) -> anyhow::Result<Vec<BurnProof>> {
        let Some(ecotoken) = self.ecotoken else {
            debug!("no ecosystem token configured, skipping burns");
            return Ok(Vec::new());
        };
        let Some(authority) = self.payers.primary().cloned() else {
            anyhow::bail!("no signing authority for burns");
        };

        let dual_burn_pct = self.oracle.dual_burn_pct(None).await.unwrap_or(0.0);
        let eco_token_account = holdings
            .iter()
            .find(|holding| holding.mint == ecotoken)
            .map(|holding| holding.token_account)
            .unwrap_or_else(|| derive_token_account(&self.treasury, &ecotoken));

        let mut planned: Vec<PlannedBurn> = Vec::new();
        for holding in &holdings {
            if holding.mint == ecotoken {
                planned.push(PlannedBurn {
                    mint: ecotoken,
                    token_account: holding.token_account,
                    amount: holding.amount,
                    kind: BurnKind::Direct,
                    source_token: None,
                    retained: 0,
                });
                continue;
            }

            let (eco_burn, to_swap) = dual_burn_split(holding.amount, dual_burn_pct);
            if eco_burn > 0 {
                planned.push(PlannedBurn {
                    mint: holding.mint,
                    token_account: holding.token_account,
                    amount: eco_burn,
                    kind: BurnKind::Ecosystem,
                    source_token: Some(holding.mint),
                    retained: 0,
                });
            }
            if to_swap == 0 {
                continue;
            }

            // One swap per token funnels all value into the ecosystem token
            match self
                .swap_to_ecotoken(&authority, holding, to_swap, &ecotoken)
                .await
            {
                Ok(proceeds) => {
                    let split = fee::split_fee(proceeds, self.config.burn_ratio)
                        .ok_or_else(|| anyhow::anyhow!("burn split overflow"))?;
                    if split.burn > 0 {
                        planned.push(PlannedBurn {
                            mint: ecotoken,
                            token_account: eco_token_account,
                            amount: split.burn,
                            kind: BurnKind::Swap,
                            source_token: Some(holding.mint),
                            retained: split.treasury,
                        });
                    }
                }
                Err(error) => {
                    warn!("swap leg failed for {}: {}", holding.mint, error);
                    self.audit
                        .record(
                            AuditEntry::new("burn_swap_failed", AuditSeverity::Warn)
                                .with_payload(json!({
                                    "mint": holding.mint.to_base58(),
                                    "amount": to_swap.to_string(),
                                    "error": error.to_string(),
                                })),
                        )
                        .await;
                }
            }
        }

        self.execute_burns(&authority, &ecotoken, planned).await
    }

    async fn swap_to_ecotoken(
        &self,
        authority: &Arc<crate::payer::FeePayer>,
        holding: &Holding,
        amount: u64,
        ecotoken: &Pubkey,
    ) -> Result<u64, RelayError> {
        let quote = self
            .dex
            .quote(&holding.mint, ecotoken, amount)
            .await
            .map_err(RelayError::from)?;
        let mut swap_tx = self
            .dex
            .swap_transaction(&quote, authority.pubkey())
            .await
            .map_err(RelayError::from)?;
        swap_tx
            .co_sign(authority.keypair())
            .map_err(|e| RelayError::Internal(anyhow::anyhow!(e)))?;
        let signature = self
            .send_and_confirm(&swap_tx)
            .await
            .map_err(RelayError::from)?;

        let _ = self
            .hot
            .push_treasury_event(&json!({
                "type": "swap",
                "signature": signature.to_base58(),
                "sourceMint": holding.mint.to_base58(),
                "inAmount": amount.to_string(),
                "outAmount": quote.out_amount.to_string(),
                "timestamp": get_current_time_in_seconds(),
            }))
            .await;
        Ok(quote.out_amount)
    }

    /// Land the planned burns, batched up to the instruction cap, with
    /// per-instruction fallback so one bad burn cannot block the rest.
    async fn execute_burns(
        &self,
        authority: &Arc<crate::payer::FeePayer>,
        ecotoken: &Pubkey,
        planned: Vec<PlannedBurn>,
    ) -> anyhow::Result<Vec<BurnProof>> {
        let mut proofs = Vec::new();

        for chunk in planned.chunks(BURN_BATCH_MAX_INSTRUCTIONS) {
            match self.submit_burn_chunk(authority, chunk).await {
                Ok(signature) => {
                    let proof = Self::proof_for_chunk(signature, chunk, ecotoken);
                    self.persist_proof(&proof).await;
                    proofs.push(proof);
                }
                Err(batch_error) => {
                    // Partial progress beats none: retry each burn alone
                    warn!(
                        "burn batch of {} failed ({}), falling back to individual burns",
                        chunk.len(),
                        batch_error
                    );
                    for plan in chunk {
                        match self
                            .submit_burn_chunk(authority, std::slice::from_ref(plan))
                            .await
                        {
                            Ok(signature) => {
                                let proof = Self::proof_for_chunk(
                                    signature,
                                    std::slice::from_ref(plan),
                                    ecotoken,
                                );
                                self.persist_proof(&proof).await;
                                proofs.push(proof);
                            }
                            Err(error) => {
                                warn!("individual burn failed for {}: {}", plan.mint, error);
                                self.audit
                                    .record(
                                        AuditEntry::new("burn_failed", AuditSeverity::Warn)
                                            .with_payload(json!({
                                                "mint": plan.mint.to_base58(),
                                                "amount": plan.amount.to_string(),
                                                "kind": plan.kind.to_string(),
                                                "error": error.to_string(),
                                            })),
                                    )
                                    .await;
                            }
                        }
                    }
                }
            }
        }

        Ok(proofs)
    }

    async fn submit_burn_chunk(
        &self,
        authority: &Arc<crate::payer::FeePayer>,
        chunk: &[PlannedBurn],
    ) -> Result<Signature, ChainError> {
        let blockhash = self.chain.latest_blockhash().await?;
        let instructions: Vec<_> = chunk
            .iter()
            .map(|plan| {
                burn_instruction(
                    &plan.token_account,
                    &plan.mint,
                    authority.pubkey(),
                    plan.amount,
                )
            })
            .collect();
        let mut tx = build_transaction(authority.pubkey(), &instructions, blockhash);
        tx.co_sign(authority.keypair())
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;
        self.send_and_confirm(&tx).await
    }

    // One proof spanning a landed chunk. Ecosystem-token units and
    // in-place source burns are accounted separately: burn_total counts
    // only ecosystem units.
    fn proof_for_chunk(
        signature: Signature,
        chunk: &[PlannedBurn],
        ecotoken: &Pubkey,
    ) -> BurnProof {
        let kind = if chunk.len() == 1 {
            chunk[0].kind
        } else {
            BurnKind::Batch
        };
        let amount_ecotoken: u64 = chunk
            .iter()
            .filter(|plan| plan.mint == *ecotoken)
            .map(|plan| plan.amount)
            .sum();
        let treasury_retained: u64 = chunk.iter().map(|plan| plan.retained).sum();
        let source_token = match chunk {
            [only] => only.source_token,
            _ => None,
        };
        BurnProof {
            signature,
            kind,
            amount_ecotoken,
            // Non-ecosystem units burned in place land here for visibility
            amount_native: chunk
                .iter()
                .filter(|plan| plan.mint != *ecotoken)
                .map(|plan| plan.amount)
                .sum(),
            treasury_retained,
            source_token,
            timestamp: get_current_time_in_seconds(),
            explorer_url: BurnProof::explorer_url_for(&signature),
        }
    }

    // Cold first: a confirmed burn must survive a hot-tier wipe
    async fn persist_proof(&self, proof: &BurnProof) {
        self.cold.record_burn(proof).await;
        if let Err(error) = self.hot.push_burn_proof(proof).await {
            warn!("burn proof dropped from hot stream: {}", error);
        }
        if let Err(error) = self
            .hot
            .stats_add(&[
                (STAT_BURN_TOTAL, proof.amount_ecotoken.min(i64::MAX as u64) as i64),
                (STAT_BURNS_COUNT, 1),
                (STAT_TX_COUNT, 1),
            ])
            .await
        {
            warn!("burn stats update failed: {}", error);
        }
        metrics::counter!("pyre_burns_executed").increment(1);
        metrics::counter!("pyre_ecotoken_burned").increment(proof.amount_ecotoken);
    }

    /// Pre-check refill: when the signer's native balance dips under the
    /// velocity-derived requirement, swap treasury ecosystem tokens back to
    /// native until the target buffer is met, or as far as reserves allow.
    async fn refill_if_needed(&self) -> anyhow::Result<Option<u64>> {
        let Some(ecotoken) = self.ecotoken else {
            return Ok(None);
        };
        let Some(payer) = self.payers.primary().cloned() else {
            return Ok(None);
        };

        let balance = self
            .chain
            .get_balance(payer.pubkey())
            .await
            .map_err(|e| anyhow::anyhow!("signer balance read failed: {}", e))?;
        let metrics = self.velocity.metrics().await?;
        let buffers =
            VelocityTracker::buffers(&metrics, REFILL_RUNWAY_HOURS, REFILL_MIN_FLOOR);
        if balance >= buffers.required {
            return Ok(None);
        }
        info!(
            "signer balance {} under required buffer {} ({}), refilling towards {}",
            balance, buffers.required, buffers.basis, buffers.target
        );

        let eco_balance = self
            .chain
            .get_token_balance(&self.treasury, &ecotoken)
            .await
            .map_err(|e| anyhow::anyhow!("treasury reserve read failed: {}", e))?;
        if eco_balance == 0 {
            warn!("refill needed but treasury holds no ecosystem tokens");
            return Ok(None);
        }

        // Price the full reserve once, then take the proportional slice
        let need = buffers.target.saturating_sub(balance);
        let full_quote = self
            .dex
            .quote(&ecotoken, &pyre_common::transaction::NATIVE_MINT, eco_balance)
            .await;
        let full_quote = match full_quote {
            Ok(quote) => quote,
            Err(error) => {
                warn!("refill quote failed: {}", error);
                return Ok(None);
            }
        };

        let (eco_amount, quote) = if full_quote.out_amount <= need {
            // Target unattainable: swap everything, next cycle continues
            (eco_balance, full_quote)
        } else {
            let slice = ((eco_balance as u128 * need as u128)
                / full_quote.out_amount.max(1) as u128) as u64;
            let slice = slice.clamp(1, eco_balance);
            match self
                .dex
                .quote(&ecotoken, &pyre_common::transaction::NATIVE_MINT, slice)
                .await
            {
                Ok(quote) => (slice, quote),
                Err(error) => {
                    warn!("refill slice quote failed: {}", error);
                    return Ok(None);
                }
            }
        };

        let mut swap_tx = match self.dex.swap_transaction(&quote, payer.pubkey()).await {
            Ok(tx) => tx,
            Err(error) => {
                warn!("refill swap construction failed: {}", error);
                return Ok(None);
            }
        };
        swap_tx
            .co_sign(payer.keypair())
            .map_err(|e| anyhow::anyhow!("refill signing failed: {}", e))?;
        let signature = self
            .send_and_confirm(&swap_tx)
            .await
            .map_err(|e| anyhow::anyhow!("refill swap failed: {}", e))?;

        info!(
            "refilled signer with ~{} native from {} ecosystem tokens ({})",
            quote.out_amount, eco_amount, signature
        );
        let _ = self
            .hot
            .push_treasury_event(&json!({
                "type": "refill",
                "signature": signature.to_base58(),
                "ecoAmount": eco_amount.to_string(),
                "nativeAmount": quote.out_amount.to_string(),
                "timestamp": get_current_time_in_seconds(),
            }))
            .await;
        self.audit
            .record(
                AuditEntry::new("signer_refilled", AuditSeverity::Info).with_payload(json!({
                    "nativeAmount": quote.out_amount.to_string(),
                    "required": buffers.required.to_string(),
                    "target": buffers.target.to_string(),
                })),
            )
            .await;
        Ok(Some(quote.out_amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dual_burn_split_conserves_amount() {
        for (amount, pct) in [(1_000u64, 0.1), (999, 0.381966), (1, 0.5), (0, 0.3)] {
            let (eco_burn, to_swap) = dual_burn_split(amount, pct);
            assert_eq!(eco_burn + to_swap, amount);
            assert!(eco_burn as f64 <= amount as f64 * pct + 1.0);
        }
    }

    #[test]
    fn test_dual_burn_split_handles_degenerate_pct() {
        assert_eq!(dual_burn_split(1_000, -0.5), (0, 1_000));
        assert_eq!(dual_burn_split(1_000, 2.0), (0, 1_000));
        assert_eq!(dual_burn_split(1_000, 0.0), (0, 1_000));
        assert_eq!(dual_burn_split(1_000, 1.0), (1_000, 0));
    }

    #[test]
    fn test_proof_for_single_keeps_kind_and_source() {
        let eco = *pyre_common::crypto::Keypair::from_seed([9; 32]).pubkey();
        let source = *pyre_common::crypto::Keypair::from_seed([8; 32]).pubkey();
        let plan = PlannedBurn {
            mint: eco,
            token_account: *pyre_common::crypto::Keypair::from_seed([7; 32]).pubkey(),
            amount: 500,
            kind: BurnKind::Swap,
            source_token: Some(source),
            retained: 154,
        };
        let signature = Signature::zero();
        let proof =
            BurnWorker::proof_for_chunk(signature, std::slice::from_ref(&plan), &eco);
        assert_eq!(proof.kind, BurnKind::Swap);
        assert_eq!(proof.amount_ecotoken, 500);
        assert_eq!(proof.treasury_retained, 154);
        assert_eq!(proof.source_token, Some(source));
    }

    #[test]
    fn test_proof_for_batch_aggregates() {
        let eco = *pyre_common::crypto::Keypair::from_seed([9; 32]).pubkey();
        let other = *pyre_common::crypto::Keypair::from_seed([8; 32]).pubkey();
        let account = *pyre_common::crypto::Keypair::from_seed([7; 32]).pubkey();
        let plans = vec![
            PlannedBurn {
                mint: eco,
                token_account: account,
                amount: 300,
                kind: BurnKind::Direct,
                source_token: None,
                retained: 0,
            },
            PlannedBurn {
                mint: eco,
                token_account: account,
                amount: 700,
                kind: BurnKind::Swap,
                source_token: Some(other),
                retained: 216,
            },
            PlannedBurn {
                mint: other,
                token_account: account,
                amount: 50,
                kind: BurnKind::Ecosystem,
                source_token: Some(other),
                retained: 0,
            },
        ];
        let proof = BurnWorker::proof_for_chunk(Signature::zero(), &plans, &eco);
        assert_eq!(proof.kind, BurnKind::Batch);
        // Only ecosystem-token units count towards the burn total
        assert_eq!(proof.amount_ecotoken, 1_000);
        assert_eq!(proof.amount_native, 50);
        assert_eq!(proof.treasury_retained, 216);
        assert_eq!(proof.source_token, None);
    }
}
