// Domain records shared between the services, the stores and the workers.

use pyre_common::{
    crypto::{Pubkey, Signature},
    time::{get_current_time_in_seconds, TimestampSeconds},
    utils::format_units,
};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::config::EXPLORER_TX_URL;

// ===== Quotes =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum QuoteKind {
    Standard,
    // Experimental: after the user's payment lands, the relay pays a fixed
    // amount from the fee payer to a fixed destination
    Ignition {
        destination: Pubkey,
        amount: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentTokenMeta {
    pub mint: Pubkey,
    pub symbol: String,
    pub decimals: u8,
    pub tier: String,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HolderTierSnapshot {
    pub share_pct: f64,
    pub discount: f64,
    pub is_at_break_even: bool,
    pub tier_label: String,
}

/// A server-issued, time-bounded offer to co-sign one transaction.
///
/// Exactly one hot-store entry exists per id; while it lives, exactly one
/// fee payer carries a matching pending reservation of `reserved_native`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub id: String,
    pub user_account: Pubkey,
    pub payment_token: Pubkey,
    pub fee_payer_account: Pubkey,
    // Owed by the user, smallest units of the payment token
    pub fee_amount: u64,
    // Fee actually charged, native smallest units; this is what settlement
    // books into statistics, the leaderboard and the durable record
    pub fee_native: u64,
    // Capacity held against the fee payer: the fee plus the chain-cost
    // buffer, plus the payout amount for ignition quotes
    pub reserved_native: u64,
    pub expires_at: TimestampSeconds,
    pub payment_token_meta: PaymentTokenMeta,
    pub holder_tier: HolderTierSnapshot,
    // Ecosystem burn fraction granted on top of the swap burn, 0..1/phi^2
    pub dual_burn_pct: f64,
    #[serde(flatten)]
    pub kind: QuoteKind,
}

impl Quote {
    pub fn is_expired(&self) -> bool {
        get_current_time_in_seconds() > self.expires_at
    }

    pub fn fee_formatted(&self) -> String {
        format!(
            "{} {}",
            format_units(self.fee_amount, self.payment_token_meta.decimals),
            self.payment_token_meta.symbol
        )
    }
}

// ===== Burns =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BurnKind {
    // Ecosystem tokens burned without a swap leg
    Direct,
    // Ecosystem tokens bought back by a swap, then burned
    Swap,
    // A non-ecosystem token burned in place (dual-burn bonus)
    Ecosystem,
    // Several burns landed in one chain transaction
    Batch,
}

/// Append-only proof of a completed burn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BurnProof {
    pub signature: Signature,
    pub kind: BurnKind,
    // Ecosystem token units destroyed
    pub amount_ecotoken: u64,
    // Native-coin value routed through the burn, 0 when unknown
    pub amount_native: u64,
    // Ecosystem token units retained by the treasury out of swap proceeds
    pub treasury_retained: u64,
    pub source_token: Option<Pubkey>,
    pub timestamp: TimestampSeconds,
    pub explorer_url: String,
}

impl BurnProof {
    pub fn explorer_url_for(signature: &Signature) -> String {
        format!("{}{}", EXPLORER_TX_URL, signature)
    }
}

// ===== Relayed transactions =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub quote_id: String,
    pub signature: Signature,
    pub user_account: Pubkey,
    pub payment_token: Pubkey,
    pub fee_amount: u64,
    pub fee_native: u64,
    pub fee_payer: Pubkey,
    pub timestamp: TimestampSeconds,
}

// ===== Audit =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum AuditSeverity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: TimestampSeconds,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub severity: AuditSeverity,
    pub payload: serde_json::Value,
}

impl AuditEntry {
    pub fn new(kind: impl Into<String>, severity: AuditSeverity) -> Self {
        Self {
            timestamp: get_current_time_in_seconds(),
            kind: kind.into(),
            wallet: None,
            ip: None,
            severity,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_wallet(mut self, wallet: impl Into<String>) -> Self {
        self.wallet = Some(wallet.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ===== Daily aggregates =====

/// Per-UTC-day deltas folded into the cold store.
#[derive(Debug, Clone, Default)]
pub struct DailyDeltas {
    pub burns: u64,
    pub transactions: u64,
    // Maximum observed distinct wallets for the day, merged with MAX
    pub unique_wallets: u64,
    pub fees_native: u64,
    // Last observed treasury balance, merged by overwrite
    pub treasury_balance: Option<u64>,
}

impl DailyDeltas {
    pub fn is_empty(&self) -> bool {
        self.burns == 0
            && self.transactions == 0
            && self.unique_wallets == 0
            && self.fees_native == 0
            && self.treasury_balance.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyre_common::crypto::Keypair;
    use std::str::FromStr;

    fn sample_quote(kind: QuoteKind) -> Quote {
        Quote {
            id: "abc123".into(),
            user_account: *Keypair::from_seed([1; 32]).pubkey(),
            payment_token: Pubkey::from_str("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA")
                .unwrap(),
            fee_payer_account: *Keypair::from_seed([2; 32]).pubkey(),
            fee_amount: 5_000,
            fee_native: 50_200,
            reserved_native: 60_200,
            expires_at: get_current_time_in_seconds() + 60,
            payment_token_meta: PaymentTokenMeta {
                mint: Pubkey::from_str("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA").unwrap(),
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
            kind,
        }
    }

    #[test]
    fn test_quote_serde_round_trip() {
        for kind in [
            QuoteKind::Standard,
            QuoteKind::Ignition {
                destination: *Keypair::from_seed([9; 32]).pubkey(),
                amount: 1_000_000,
            },
        ] {
            let quote = sample_quote(kind);
            let json = serde_json::to_string(&quote).unwrap();
            let restored: Quote = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, quote);
        }
    }

    #[test]
    fn test_quote_kind_tag() {
        let json = serde_json::to_string(&sample_quote(QuoteKind::Standard)).unwrap();
        assert!(json.contains("\"type\":\"standard\""));
    }

    #[test]
    fn test_fee_formatted() {
        let quote = sample_quote(QuoteKind::Standard);
        assert_eq!(quote.fee_formatted(), "0.005000 X");
    }

    #[test]
    fn test_burn_kind_display() {
        assert_eq!(BurnKind::Swap.to_string(), "swap");
        assert_eq!(BurnKind::Ecosystem.to_string(), "ecosystem");
    }
}
