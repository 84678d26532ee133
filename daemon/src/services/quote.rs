// Quote pipeline: token gate, price discovery, multipliers and discounts,
// capacity reservation, persistence.
//
// The discount is a function of the user's share of the ecosystem token's
// circulating supply; it can never push the fee below the break-even floor
// where the treasury share stops covering the chain cost.

use std::{str::FromStr, sync::Arc, time::Duration};

use log::{debug, warn};
use pyre_common::{
    api::{HolderTierView, IgnitionView, QuoteRequest, QuoteResponse, TokenMetaView},
    config::MAX_HOLDER_DISCOUNT,
    crypto::{is_valid_account_str, Pubkey},
    fee,
    time::get_current_time_in_seconds,
    utils::random_id,
};
use serde_json::json;

use crate::{
    audit::AuditLogger,
    config::{Config, DEFAULT_COMPUTE_UNITS, RESERVATION_FEE_BUFFER, RESERVATION_TTL_MARGIN_SECS},
    error::RelayError,
    oracle::{DexAggregator, HolderOracle},
    payer::FeePayerPool,
    store::hot::HotStore,
    tokens::score_multiplier,
    types::{AuditEntry, AuditSeverity, HolderTierSnapshot, PaymentTokenMeta, Quote, QuoteKind},
};

/// Supply-share logarithmic discount: clamp(0, 0.95, (log10(share)+5)/3).
/// A holder of 0.001% of supply sits at the zero point; 1% of supply hits
/// the cap.
pub fn discount_for_share(share: f64) -> f64 {
    if share <= 0.0 {
        return 0.0;
    }
    ((share.log10() + 5.0) / 3.0).clamp(0.0, MAX_HOLDER_DISCOUNT)
}

// Display-only labels derived from the share percentage
pub fn tier_label(share_pct: f64) -> &'static str {
    if share_pct >= 1.0 {
        "whale"
    } else if share_pct >= 0.1 {
        "shark"
    } else if share_pct >= 0.01 {
        "dolphin"
    } else if share_pct >= 0.001 {
        "fish"
    } else if share_pct > 0.0 {
        "shrimp"
    } else {
        "none"
    }
}

pub struct QuoteService {
    hot: HotStore,
    payers: Arc<FeePayerPool>,
    dex: Arc<dyn DexAggregator>,
    oracle: Arc<dyn HolderOracle>,
    audit: Arc<AuditLogger>,
    config: Arc<Config>,
    treasury: Pubkey,
    native_mint: Pubkey,
}

impl QuoteService {
    pub fn new(
        hot: HotStore,
        payers: Arc<FeePayerPool>,
        dex: Arc<dyn DexAggregator>,
        oracle: Arc<dyn HolderOracle>,
        audit: Arc<AuditLogger>,
        config: Arc<Config>,
        treasury: Pubkey,
    ) -> Self {
        Self {
            hot,
            payers,
            dex,
            oracle,
            audit,
            config,
            treasury,
            native_mint: *pyre_common::transaction::NATIVE_MINT,
        }
    }

    fn ignition_kind(&self) -> Result<QuoteKind, RelayError> {
        if !self.config.ignition_enabled {
            return Err(RelayError::IgnitionDisabled);
        }
        let destination = self
            .config
            .ignition_destination
            .as_deref()
            .and_then(|d| Pubkey::from_str(d).ok());
        match (destination, self.config.ignition_lamports) {
            (Some(destination), amount) if amount > 0 => Ok(QuoteKind::Ignition {
                destination,
                amount,
            }),
            _ => Err(RelayError::IgnitionNotConfigured),
        }
    }

    pub async fn create_quote(
        &self,
        request: &QuoteRequest,
        ignition: bool,
    ) -> Result<QuoteResponse, RelayError> {
        // Request shape first
        if !is_valid_account_str(&request.user_pubkey) {
            return Err(RelayError::validation("userPubkey is not a valid account"));
        }
        if !is_valid_account_str(&request.payment_token) {
            return Err(RelayError::validation("paymentToken is not a valid account"));
        }
        let user = Pubkey::from_str(&request.user_pubkey)
            .map_err(|_| RelayError::validation("userPubkey is not a valid account"))?;
        let payment_token = Pubkey::from_str(&request.payment_token)
            .map_err(|_| RelayError::validation("paymentToken is not a valid account"))?;

        let kind = if ignition {
            self.ignition_kind()?
        } else {
            QuoteKind::Standard
        };

        // A fully open pool cannot honor any quote
        if self.payers.is_circuit_open_all() {
            return Err(RelayError::CircuitBreakerOpen {
                retry_after: self.payers.seconds_until_first_half_open(),
            });
        }

        // Token gate
        let acceptance = self.oracle.token_acceptance(&payment_token).await?;
        if !acceptance.accepted {
            return Err(RelayError::TierRejected(acceptance.info.symbol.clone()));
        }

        // Base fee with the protocol clamp, then the risk multiplier
        let compute_units = request
            .estimated_compute_units
            .unwrap_or(DEFAULT_COMPUTE_UNITS);
        let base_native = fee::calculate_fee(
            compute_units,
            self.config.base_fee_lamports,
            self.config.fee_markup,
        )
        .ok_or(RelayError::FeeOverflow)?;
        let risk_native =
            fee::apply_multiplier(base_native, score_multiplier(acceptance.info.score))
                .ok_or(RelayError::FeeOverflow)?;

        // Holder discount, floored at break-even
        let share = match self.oracle.holder_share(&user).await {
            Ok(share) => share,
            Err(error) => {
                warn!("holder share lookup failed for {}: {}", user, error);
                0.0
            }
        };
        let discount = discount_for_share(share);
        let discounted =
            fee::apply_discount(risk_native, discount).ok_or(RelayError::FeeOverflow)?;
        let floor = fee::break_even_floor(
            self.config.network_fee_lamports,
            self.config.treasury_ratio,
        )
        .ok_or(RelayError::FeeOverflow)?;
        let is_at_break_even = discounted < floor;
        let fee_native = discounted.max(floor);
        // Discount the caller actually received, for display
        let effective_discount = if risk_native > 0 {
            1.0 - (fee_native as f64 / risk_native as f64)
        } else {
            0.0
        }
        .max(0.0);

        let dual_burn_pct = self.oracle.dual_burn_pct(Some(&user)).await.unwrap_or(0.0);

        // Payment-token amount via the cached swap oracle
        let fee_amount = if payment_token == self.native_mint {
            fee_native
        } else {
            let dex_quote = self
                .dex
                .quote(&self.native_mint, &payment_token, fee_native)
                .await
                .map_err(|error| {
                    warn!("price discovery failed for {}: {}", payment_token, error);
                    RelayError::ServiceUnavailable { retry_after: 5 }
                })?;
            dex_quote.out_amount
        };
        if fee_amount == 0 {
            return Err(RelayError::FeeOverflow);
        }

        // Reserve fee-payer capacity before the quote becomes visible
        let quote_id = random_id();
        let mut reserve_amount = fee_native
            .checked_add(RESERVATION_FEE_BUFFER)
            .ok_or(RelayError::FeeOverflow)?;
        if let QuoteKind::Ignition { amount, .. } = &kind {
            reserve_amount = reserve_amount
                .checked_add(*amount)
                .ok_or(RelayError::FeeOverflow)?;
        }
        let ttl = Duration::from_secs(self.config.quote_ttl_seconds);
        let reservation_ttl = ttl + Duration::from_secs(RESERVATION_TTL_MARGIN_SECS);
        let fee_payer = self
            .payers
            .reserve(&quote_id, reserve_amount, reservation_ttl)
            .await?
            .ok_or(RelayError::NoPayerCapacity)?;

        let share_pct = share * 100.0;
        let quote = Quote {
            id: quote_id.clone(),
            user_account: user,
            payment_token,
            fee_payer_account: fee_payer,
            fee_amount,
            fee_native,
            reserved_native: reserve_amount,
            expires_at: get_current_time_in_seconds() + self.config.quote_ttl_seconds,
            payment_token_meta: PaymentTokenMeta {
                mint: payment_token,
                symbol: acceptance.info.symbol.clone(),
                decimals: acceptance.info.decimals,
                tier: acceptance.info.tier.to_string(),
                score: acceptance.info.score,
            },
            holder_tier: HolderTierSnapshot {
                share_pct,
                discount: effective_discount,
                is_at_break_even,
                tier_label: tier_label(share_pct).to_string(),
            },
            dual_burn_pct,
            kind: kind.clone(),
        };

        if let Err(error) = self.hot.set_quote(&quote, ttl).await {
            // A reservation without a quote is useless; undo it now instead
            // of waiting for the TTL cleanup
            let _ = self.payers.release(&quote_id).await;
            return Err(error.into());
        }

        debug!(
            "quote {} for {}: {} native -> {} {} (discount {:.1}%)",
            quote_id,
            user,
            fee_native,
            fee_amount,
            quote.payment_token_meta.symbol,
            effective_discount * 100.0
        );
        metrics::counter!("pyre_quotes_created").increment(1);
        self.audit
            .record(
                AuditEntry::new("quote_created", AuditSeverity::Info)
                    .with_wallet(user.to_base58())
                    .with_payload(json!({
                        "quoteId": quote_id,
                        "paymentToken": payment_token.to_base58(),
                        "feeNative": fee_native.to_string(),
                    })),
            )
            .await;

        Ok(self.response_for(&quote))
    }

    fn response_for(&self, quote: &Quote) -> QuoteResponse {
        let ignition = match &quote.kind {
            QuoteKind::Ignition {
                destination,
                amount,
            } => Some(IgnitionView {
                destination: destination.to_base58(),
                amount: amount.to_string(),
            }),
            QuoteKind::Standard => None,
        };
        QuoteResponse {
            quote_id: quote.id.clone(),
            kind: match quote.kind {
                QuoteKind::Standard => "standard".to_string(),
                QuoteKind::Ignition { .. } => "ignition".to_string(),
            },
            payment_token: quote.payment_token.to_base58(),
            fee_amount: quote.fee_amount.to_string(),
            fee_formatted: quote.fee_formatted(),
            fee_native: quote.fee_native.to_string(),
            fee_payer: quote.fee_payer_account.to_base58(),
            treasury: self.treasury.to_base58(),
            treasury_token_account: pyre_common::transaction::derive_token_account(
                &self.treasury,
                &quote.payment_token,
            )
            .to_base58(),
            expires_at: quote.expires_at,
            ttl_seconds: self.config.quote_ttl_seconds,
            token: TokenMetaView {
                mint: quote.payment_token_meta.mint.to_base58(),
                symbol: quote.payment_token_meta.symbol.clone(),
                decimals: quote.payment_token_meta.decimals,
                tier: quote.payment_token_meta.tier.clone(),
                score: quote.payment_token_meta.score,
            },
            holder_tier: HolderTierView {
                tier_label: quote.holder_tier.tier_label.clone(),
                share_pct: quote.holder_tier.share_pct,
                discount_pct: quote.holder_tier.discount * 100.0,
                is_at_break_even: quote.holder_tier.is_at_break_even,
            },
            dual_burn_pct: quote.dual_burn_pct,
            ignition,
        }
    }
}
