// Submit pipeline: validate the signed transaction against its quote, claim
// the anti-replay slot, co-sign, push through the RPC pool with classified
// retries, then settle the books.
//
// The slot is claimed before any chain I/O and released on failure paths
// where a retry of the same bytes is legitimate. A confirmation timeout
// keeps the slot: the transaction may still land, and the slot's TTL equals
// the blockhash validity window anyway.

use std::{str::FromStr, sync::Arc, time::Duration};

use log::{debug, info, warn};
use pyre_common::{
    api::{SubmitRequest, SubmitResponse},
    config::BLOCKHASH_TTL_SECS,
    crypto::{Pubkey, Signature},
    fee,
    time::get_current_time_in_seconds,
    transaction::{transfer_instruction, build_transaction, Transaction},
    utils::RetryPolicy,
};
use serde_json::json;

use crate::{
    audit::AuditLogger,
    chain::{ChainError, ChainRpc},
    config::{
        Config, CONFIRM_TIMEOUT_SECS, SUBMIT_MAX_RETRIES, SUBMIT_RETRY_BASE_MS,
        SUBMIT_RETRY_JITTER_MS, SUBMIT_RETRY_MAX_MS,
    },
    error::RelayError,
    payer::FeePayerPool,
    services::velocity::VelocityTracker,
    store::cold::ColdStore,
    store::hot::{HotStore, STAT_FEES_NATIVE, STAT_TX_COUNT},
    types::{AuditEntry, AuditSeverity, BurnProof, Quote, QuoteKind, TransactionRecord},
};

pub struct SubmitService {
    hot: HotStore,
    cold: Arc<ColdStore>,
    payers: Arc<FeePayerPool>,
    chain: Arc<dyn ChainRpc>,
    velocity: Arc<VelocityTracker>,
    audit: Arc<AuditLogger>,
    config: Arc<Config>,
}

impl SubmitService {
    pub fn new(
        hot: HotStore,
        cold: Arc<ColdStore>,
        payers: Arc<FeePayerPool>,
        chain: Arc<dyn ChainRpc>,
        velocity: Arc<VelocityTracker>,
        audit: Arc<AuditLogger>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            hot,
            cold,
            payers,
            chain,
            velocity,
            audit,
            config,
        }
    }

    fn retry_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: SUBMIT_MAX_RETRIES,
            base_delay: Duration::from_millis(SUBMIT_RETRY_BASE_MS),
            max_delay: Duration::from_millis(SUBMIT_RETRY_MAX_MS),
            jitter: Duration::from_millis(SUBMIT_RETRY_JITTER_MS),
        }
    }

    /// Structural checks of the user's transaction against the quote.
    /// Every violated rule is reported, not just the first.
    fn validate_transaction(tx: &Transaction, quote: &Quote, user: &Pubkey) -> Vec<String> {
        let mut problems = Vec::new();
        if *user != quote.user_account {
            problems.push("userPubkey does not match the quoted account".to_string());
        }
        match tx.fee_payer() {
            Some(fee_payer) if *fee_payer == quote.fee_payer_account => {}
            Some(fee_payer) => problems.push(format!(
                "fee payer {} does not match the assigned payer",
                fee_payer
            )),
            None => problems.push("transaction has no fee payer".to_string()),
        }
        if !tx.is_signer(&quote.user_account) {
            problems.push("quoted user is not a required signer".to_string());
        } else if !tx.verify_signature_of(&quote.user_account) {
            problems.push("user signature is missing or invalid".to_string());
        }
        if tx.has_signature_of(&quote.fee_payer_account) {
            problems.push("fee payer slot is already signed".to_string());
        }
        problems
    }

    pub async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, RelayError> {
        let user = Pubkey::from_str(&request.user_pubkey)
            .map_err(|_| RelayError::validation("userPubkey is not a valid account"))?;

        // Quote lookup and expiry
        let quote = self
            .hot
            .get_quote(&request.quote_id)
            .await?
            .ok_or(RelayError::QuoteNotFound)?;
        if get_current_time_in_seconds() > quote.expires_at {
            self.payers.release(&quote.id).await?;
            self.hot.delete_quote(&quote.id).await?;
            return Err(RelayError::QuoteExpired);
        }

        // Transaction structure against the quote
        let mut tx = Transaction::from_base64(&request.signed_transaction)
            .map_err(|error| RelayError::validation(format!("transaction rejected: {}", error)))?;
        let problems = Self::validate_transaction(&tx, &quote, &user);
        if !problems.is_empty() {
            return Err(RelayError::validation_with(
                "transaction does not satisfy the quote",
                problems,
            ));
        }

        // Anti-replay: claim before any chain I/O
        let fingerprint = tx.fingerprint().to_hex();
        let slot_ttl = Duration::from_secs(BLOCKHASH_TTL_SECS);
        if !self.hot.claim_slot(&fingerprint, slot_ttl).await? {
            metrics::counter!("pyre_replays_detected").increment(1);
            return Err(RelayError::ReplayDetected);
        }

        // Co-sign with the reserved fee payer
        let Some(payer) = self.payers.get_for_signing(&quote.fee_payer_account) else {
            self.hot.release_slot(&fingerprint).await?;
            return Err(RelayError::Internal(anyhow::anyhow!(
                "reserved fee payer {} is gone",
                quote.fee_payer_account
            )));
        };
        tx.co_sign(payer.keypair())
            .map_err(|error| RelayError::validation(error.to_string()))?;

        let signature = match self.send_with_retries(&tx).await {
            Ok(signature) => signature,
            Err(error) => {
                // Allow a legitimate retry of the same bytes
                self.hot.release_slot(&fingerprint).await?;
                self.payers.release(&quote.id).await?;
                self.payers.report_failure(&quote.fee_payer_account, &error);
                return Err(error.into());
            }
        };

        if let Err(error) = self
            .chain
            .confirm(&signature, Duration::from_secs(CONFIRM_TIMEOUT_SECS))
            .await
        {
            // The transaction may still land; the slot stays claimed so the
            // same bytes cannot be double-submitted inside the window
            warn!("confirmation failed for {}: {}", signature, error);
            self.payers.release(&quote.id).await?;
            self.payers.report_failure(&quote.fee_payer_account, &error);
            return Err(RelayError::Transaction(error.to_string()));
        }

        self.payers.report_success(&quote.fee_payer_account);
        info!(
            "relayed {} for {} (quote {}, fee {} {})",
            signature,
            quote.user_account,
            quote.id,
            quote.fee_amount,
            quote.payment_token_meta.symbol
        );

        // Ignition payout after the user's payment confirmed
        let ignition_signature = match &quote.kind {
            QuoteKind::Ignition {
                destination,
                amount,
            } => self.run_ignition(&quote, destination, *amount).await,
            QuoteKind::Standard => None,
        };

        self.settle(&quote, &signature).await;

        Ok(SubmitResponse {
            signature: signature.to_base58(),
            ignition_signature: ignition_signature.map(|sig| sig.to_base58()),
            explorer_url: BurnProof::explorer_url_for(&signature),
        })
    }

    async fn send_with_retries(&self, tx: &Transaction) -> Result<Signature, ChainError> {
        let tx = tx.clone();
        Self::retry_policy()
            .run(
                "send_transaction",
                || {
                    let tx = tx.clone();
                    let chain = Arc::clone(&self.chain);
                    async move { chain.send_transaction(&tx).await }
                },
                |error| error.is_retryable(),
            )
            .await
    }

    /// Second leg of the ignition variant: a fixed transfer from the fee
    /// payer to the configured destination. Failure is soft; the user's
    /// transaction already landed.
    async fn run_ignition(
        &self,
        quote: &Quote,
        destination: &Pubkey,
        amount: u64,
    ) -> Option<Signature> {
        let payer = self.payers.get_for_signing(&quote.fee_payer_account)?;
        let result: Result<Signature, RelayError> = async {
            let blockhash = self.chain.latest_blockhash().await.map_err(RelayError::from)?;
            let instruction = transfer_instruction(payer.pubkey(), destination, amount);
            let mut transfer = build_transaction(payer.pubkey(), &[instruction], blockhash);
            transfer
                .co_sign(payer.keypair())
                .map_err(|e| RelayError::Internal(anyhow::anyhow!(e)))?;
            let signature = self
                .send_with_retries(&transfer)
                .await
                .map_err(RelayError::from)?;
            self.chain
                .confirm(&signature, Duration::from_secs(CONFIRM_TIMEOUT_SECS))
                .await
                .map_err(RelayError::from)?;
            Ok(signature)
        }
        .await;

        match result {
            Ok(signature) => {
                debug!("ignition payout {} -> {}", signature, destination);
                Some(signature)
            }
            Err(error) => {
                warn!("ignition payout failed for quote {}: {}", quote.id, error);
                self.audit
                    .record(
                        AuditEntry::new("ignition_failed", AuditSeverity::Warn)
                            .with_wallet(quote.user_account.to_base58())
                            .with_payload(json!({ "quoteId": quote.id })),
                    )
                    .await;
                None
            }
        }
    }

    // Book-keeping after confirmation. Failures here must not fail the
    // submit: the user's transaction is on chain either way.
    async fn settle(&self, quote: &Quote, signature: &Signature) {
        let record = TransactionRecord {
            quote_id: quote.id.clone(),
            signature: *signature,
            user_account: quote.user_account,
            payment_token: quote.payment_token,
            fee_amount: quote.fee_amount,
            fee_native: quote.fee_native,
            fee_payer: quote.fee_payer_account,
            timestamp: get_current_time_in_seconds(),
        };
        self.cold.record_transaction(&record).await;
        self.cold
            .record_token_fee(&quote.payment_token, quote.fee_amount)
            .await;

        if let Err(error) = self
            .hot
            .stats_add(&[
                (STAT_TX_COUNT, 1),
                (STAT_FEES_NATIVE, quote.fee_native as i64),
            ])
            .await
        {
            warn!("stats update failed for {}: {}", quote.id, error);
        }

        // Wallet burn contribution: the share of this fee that will be
        // routed into burns by the treasury worker
        let contribution = fee::split_fee(quote.fee_native, self.config.burn_ratio)
            .map(|split| split.burn)
            .unwrap_or(0);
        if contribution > 0 {
            if let Err(error) = self
                .hot
                .leaderboard_add(&quote.user_account.to_base58(), contribution)
                .await
            {
                warn!("leaderboard update failed: {}", error);
            }
        }

        match self
            .hot
            .note_wallet_today(&quote.user_account.to_base58())
            .await
        {
            Ok(unique_wallets) => {
                let deltas = crate::types::DailyDeltas {
                    unique_wallets,
                    ..Default::default()
                };
                self.cold
                    .upsert_daily(&pyre_common::time::current_day_key(), &deltas)
                    .await;
            }
            Err(error) => warn!("unique wallet tracking failed: {}", error),
        }

        self.audit
            .record(
                AuditEntry::new("transaction_relayed", AuditSeverity::Info)
                    .with_wallet(quote.user_account.to_base58())
                    .with_payload(json!({
                        "quoteId": quote.id,
                        "signature": signature.to_base58(),
                        "feeNative": quote.fee_native.to_string(),
                    })),
            )
            .await;

        if let Err(error) = self.payers.release(&quote.id).await {
            warn!("reservation release failed for {}: {}", quote.id, error);
        }
        if let Err(error) = self.hot.delete_quote(&quote.id).await {
            warn!("quote cleanup failed for {}: {}", quote.id, error);
        }

        // Cost the payer actually bore: chain fee, plus the payout leg
        let mut cost = self.config.network_fee_lamports;
        if let QuoteKind::Ignition { amount, .. } = &quote.kind {
            cost = cost.saturating_add(*amount);
        }
        if let Err(error) = self.velocity.record(cost).await {
            warn!("velocity sample dropped: {}", error);
        }

        metrics::counter!("pyre_submits_confirmed").increment(1);
    }
}
