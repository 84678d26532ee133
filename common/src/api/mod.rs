// HTTP wire schemas.
//
// Every amount crosses the wire as a decimal string: fee values are 64-bit
// integers in smallest units and JSON numbers would truncate them past 2^53.
// Request bodies reject unknown fields so typos fail loudly instead of being
// silently ignored.

use serde::{Deserialize, Serialize};

// Correlation id propagated on every response
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
// Admin surface authentication header
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

// ===== Quote =====

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QuoteRequest {
    pub user_pubkey: String,
    pub payment_token: String,
    #[serde(default)]
    pub estimated_compute_units: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetaView {
    pub mint: String,
    pub symbol: String,
    pub decimals: u8,
    pub tier: String,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderTierView {
    pub tier_label: String,
    // Share of circulating supply held by the user, percent
    pub share_pct: f64,
    // Discount actually applied, percent, after the break-even clamp
    pub discount_pct: f64,
    pub is_at_break_even: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnitionView {
    pub destination: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub quote_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payment_token: String,
    // Amount owed in the payment token, smallest units
    pub fee_amount: String,
    pub fee_formatted: String,
    // Native-coin equivalent reserved against the fee payer
    pub fee_native: String,
    pub fee_payer: String,
    pub treasury: String,
    pub treasury_token_account: String,
    pub expires_at: u64,
    pub ttl_seconds: u64,
    pub token: TokenMetaView,
    pub holder_tier: HolderTierView,
    pub dual_burn_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignition: Option<IgnitionView>,
}

// ===== Submit =====

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubmitRequest {
    pub quote_id: String,
    // Base64-encoded signed transaction
    pub signed_transaction: String,
    pub user_pubkey: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignition_signature: Option<String>,
    pub explorer_url: String,
}

// ===== Public statistics =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub burn_total: String,
    pub tx_count: u64,
    pub treasury_balance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStatsResponse {
    pub wallet: String,
    pub burn_contribution: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u64,
    pub wallet: String,
    pub burned: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnProofView {
    pub signature: String,
    pub kind: String,
    pub amount_ecotoken: String,
    pub amount_native: String,
    pub treasury_retained: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_token: Option<String>,
    pub timestamp: u64,
    pub explorer_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensResponse {
    pub tokens: Vec<TokenMetaView>,
}

// ===== Health =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    pub hot_store: bool,
    pub cold_store: bool,
    pub rpc_pool: bool,
    pub fee_payer_pool: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HealthChecks,
}

// ===== Admin =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryTokenView {
    pub mint: String,
    pub token_account: String,
    pub amount: String,
    pub usd_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryView {
    pub address: String,
    pub native_balance: String,
    pub tokens: Vec<TreasuryTokenView>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MigrateKeysRequest {
    pub legacy_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateKeysResponse {
    pub migrated: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnTriggerResponse {
    pub executed: bool,
    pub proofs: Vec<BurnProofView>,
}
