use anyhow::{bail, Context, Result};
use clap::Parser;
use log::warn;
use pyre_common::{
    config::{
        DEFAULT_BASE_FEE_UNITS, DEFAULT_FEE_MARKUP, DEFAULT_NETWORK_FEE_UNITS,
        DEFAULT_QUOTE_TTL_SECS, MAX_QUOTE_TTL_SECS, TREASURY_RATIO_DEFAULT, VERSION,
    },
    crypto::{is_valid_account_str, is_valid_keypair_str, Keypair, Pubkey},
    environment::Environment,
};
use std::str::FromStr;

// ===== Hot-store layout =====

// Process-wide namespace prefix for every hot-store key
pub const KEY_PREFIX: &str = "pyre:";
// Bounded list caps
pub const AUDIT_LOG_CAP: usize = 10_000;
pub const BURN_PROOF_CAP: usize = 1_000;
pub const TREASURY_EVENT_CAP: usize = 1_000;
// Audit tail retention
pub const AUDIT_TTL_SECS: u64 = 7 * 24 * 3_600;
// Rolling windows
pub const RATE_WINDOW_SECS: u64 = 60;
pub const ANOMALY_WINDOW_SECS: u64 = 300;
// DEX aggregator quote cache
pub const DEX_CACHE_TTL_SECS: u64 = 10;
// Circulating-supply cache for holder tiers
pub const SUPPLY_CACHE_TTL_SECS: u64 = 300;
// In-memory fallback sweep cadence
pub const MEMORY_SWEEP_INTERVAL_SECS: u64 = 30;
// Amortized sweep: one pass every N mutating operations
pub const MEMORY_SWEEP_EVERY_WRITES: u64 = 256;

// ===== Burn worker =====

pub const BURN_INTERVAL_SECS: u64 = 60;
pub const BURN_FIRST_DELAY_SECS: u64 = 10;
// Must cover the worst-case burn cycle duration
pub const BURN_LOCK_TTL_SECS: u64 = 120;
pub const BURN_LOCK_NAME: &str = "burn-cycle";
// Batched burns per chain transaction
pub const BURN_BATCH_MAX_INSTRUCTIONS: usize = 8;
// Economic-efficiency gate: swapping dust costs more than it recovers
pub const MIN_TOKEN_VALUE_USD: f64 = 5.0;

// ===== Velocity & refill =====

pub const VELOCITY_WINDOW_MINUTES: u64 = 60;
// Window plus margin so a bucket never expires mid-read
pub const VELOCITY_BUCKET_TTL_SECS: u64 = 65 * 60;
// Below this much observed data the floor applies verbatim
pub const VELOCITY_MIN_OBSERVED_MINUTES: u64 = 6;
pub const REFILL_RUNWAY_HOURS: f64 = 1.68;
// target = required * 100, roughly a week of runway at steady state
pub const REFILL_TARGET_MULTIPLIER: u64 = 100;
// 0.1 native coin
pub const REFILL_MIN_FLOOR: u64 = 100_000_000;

// ===== Fee payers =====

pub const BALANCE_REFRESH_INTERVAL_SECS: u64 = 30;
// A balance older than this makes the account unhealthy
pub const BALANCE_MAX_AGE_SECS: u64 = 120;
// 0.05 native coin of unreserved balance required for health
pub const MIN_HEALTHY_BALANCE: u64 = 50_000_000;
pub const PAYER_FAILURE_THRESHOLD: u32 = 5;
pub const PAYER_RESET_TIMEOUT_SECS: u64 = 30;
pub const PAYER_HALF_OPEN_TRIALS: u32 = 2;
pub const BALANCE_REFRESH_CONCURRENCY: usize = 4;
// Reservations outlive their quote by this margin before TTL cleanup
pub const RESERVATION_TTL_MARGIN_SECS: u64 = 30;
// Extra native units reserved on top of the fee for the chain tx cost
pub const RESERVATION_FEE_BUFFER: u64 = 10_000;
// Hint returned with NO_PAYER_CAPACITY
pub const PAYER_CAPACITY_RETRY_AFTER_SECS: u64 = 30;

// Compute units priced when the caller does not estimate
pub const DEFAULT_COMPUTE_UNITS: u64 = 200_000;

// ===== Chain RPC =====

pub const RPC_TIMEOUT_SECS: u64 = 30;
pub const RPC_FAILURE_THRESHOLD: u32 = 5;
pub const RPC_RESET_TIMEOUT_SECS: u64 = 20;
pub const RPC_HALF_OPEN_TRIALS: u32 = 2;
// Sliding latency window per endpoint
pub const RPC_LATENCY_WINDOW: usize = 50;
pub const BLOCKHASH_CACHE_MS: u64 = 2_000;
pub const CONFIRM_TIMEOUT_SECS: u64 = 30;
pub const CONFIRM_POLL_MS: u64 = 500;
pub const PUBLIC_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

// ===== Submit retries =====

pub const SUBMIT_MAX_RETRIES: u32 = 3;
pub const SUBMIT_RETRY_BASE_MS: u64 = 500;
pub const SUBMIT_RETRY_MAX_MS: u64 = 4_000;
pub const SUBMIT_RETRY_JITTER_MS: u64 = 250;

// ===== Cold store =====

pub const DB_FAILURE_THRESHOLD: u32 = 3;
pub const DB_RESET_TIMEOUT_SECS: u64 = 30;
pub const DB_HALF_OPEN_TRIALS: u32 = 2;
pub const DB_MAX_RETRIES: u32 = 3;
pub const DB_RECONNECT_INTERVAL_SECS: u64 = 15;

// ===== Data sync =====

pub const SYNC_INTERVAL_SECS: u64 = 300;

// ===== Anomaly detection =====

pub const ANOMALY_WARMUP_SAMPLES: usize = 50;
pub const ANOMALY_SIGMA: f64 = 3.0;
pub const ANOMALY_MIN_THRESHOLD: f64 = 20.0;

// Display metadata for the configured ecosystem token
pub const ECOTOKEN_SYMBOL: &str = "ECO";
pub const ECOTOKEN_DECIMALS: u8 = 6;

// ===== Collaborators =====

pub const DEFAULT_JUPITER_BASE_URL: &str = "https://quote-api.jup.ag/v6";
pub const EXPLORER_TX_URL: &str = "https://solscan.io/tx/";

// Placeholder mint values that must never reach production
const PLACEHOLDER_MINTS: [&str; 3] = ["", "REPLACE_ME", "TODO"];

/// Relay configuration, read from CLI flags or the matching environment keys.
///
/// Validation is fatal at boot: a misconfigured relay must not come up
/// half-working and discover the problem at first use.
#[derive(Parser, Debug, Clone)]
#[clap(version = VERSION, about = "Pyre gasless relay daemon")]
pub struct Config {
    /// Deployment environment (development, staging, production)
    #[clap(long, env = "ENV", default_value_t = Environment::Development)]
    pub env: Environment,
    /// HTTP bind port
    #[clap(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
    /// Comma-separated list of allowed browser origins
    #[clap(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,
    /// Custom RPC endpoint, highest priority when set
    #[clap(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,
    /// Helius provider API key
    #[clap(long, env = "HELIUS_API_KEY", hide_env_values = true)]
    pub helius_api_key: Option<String>,
    /// Triton provider API key
    #[clap(long, env = "TRITON_API_KEY", hide_env_values = true)]
    pub triton_api_key: Option<String>,
    /// Hot store connection string
    #[clap(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,
    /// Cold store connection string
    #[clap(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
    /// Primary fee payer signing key, base58
    #[clap(long, env = "FEE_PAYER_PRIVATE_KEY", hide_env_values = true)]
    pub fee_payer_private_key: Option<String>,
    /// Additional fee payer signing keys, comma-separated base58
    #[clap(long, env = "FEE_PAYER_KEYS", hide_env_values = true, value_delimiter = ',')]
    pub fee_payer_keys: Vec<String>,
    /// Ecosystem token mint address
    #[clap(long, env = "ECOTOKEN_MINT")]
    pub ecotoken_mint: Option<String>,
    /// Treasury wallet; defaults to the primary fee payer
    #[clap(long, env = "TREASURY_ADDRESS")]
    pub treasury_address: Option<String>,
    /// Fraction of collected value burned (0, 1)
    #[clap(long, env = "BURN_RATIO", default_value_t = 1.0 - TREASURY_RATIO_DEFAULT)]
    pub burn_ratio: f64,
    /// Fraction of collected value retained by the treasury (0, 1)
    #[clap(long, env = "TREASURY_RATIO", default_value_t = TREASURY_RATIO_DEFAULT)]
    pub treasury_ratio: f64,
    /// Base fee in native smallest units
    #[clap(long, env = "BASE_FEE_LAMPORTS", default_value_t = DEFAULT_BASE_FEE_UNITS)]
    pub base_fee_lamports: u64,
    /// Fee markup multiplier
    #[clap(long, env = "FEE_MARKUP", default_value_t = DEFAULT_FEE_MARKUP)]
    pub fee_markup: f64,
    /// Chain cost of landing one transaction, native smallest units
    #[clap(long, env = "NETWORK_FEE_LAMPORTS", default_value_t = DEFAULT_NETWORK_FEE_UNITS)]
    pub network_fee_lamports: u64,
    /// Quote lifetime in seconds
    #[clap(long, env = "QUOTE_TTL_SECONDS", default_value_t = DEFAULT_QUOTE_TTL_SECS)]
    pub quote_ttl_seconds: u64,
    /// Per-wallet quotes per minute
    #[clap(long, env = "WALLET_QUOTE_LIMIT", default_value_t = 10)]
    pub wallet_quote_limit: u64,
    /// Per-wallet submits per minute
    #[clap(long, env = "WALLET_SUBMIT_LIMIT", default_value_t = 10)]
    pub wallet_submit_limit: u64,
    /// Admin surface API key
    #[clap(long, env = "ADMIN_API_KEY", hide_env_values = true)]
    pub admin_api_key: Option<String>,
    /// DEX aggregator API key
    #[clap(long, env = "JUPITER_API_KEY", hide_env_values = true)]
    pub jupiter_api_key: Option<String>,
    /// DEX aggregator base URL
    #[clap(long, env = "JUPITER_BASE_URL", default_value = DEFAULT_JUPITER_BASE_URL)]
    pub jupiter_base_url: String,
    /// Holder-verification oracle base URL
    #[clap(long, env = "VERIFIER_BASE_URL")]
    pub verifier_base_url: Option<String>,
    /// Block-engine bundle endpoint
    #[clap(long, env = "JITO_BUNDLE_URL")]
    pub jito_bundle_url: Option<String>,
    /// Tip attached to bundled submissions, native smallest units
    #[clap(long, env = "JITO_TIP_LAMPORTS", default_value_t = 0)]
    pub jito_tip_lamports: u64,
    /// Enable the experimental ignition pipeline
    #[clap(long, env = "IGNITION_ENABLED")]
    pub ignition_enabled: bool,
    /// Fixed ignition payout destination
    #[clap(long, env = "IGNITION_DESTINATION")]
    pub ignition_destination: Option<String>,
    /// Fixed ignition payout amount, native smallest units
    #[clap(long, env = "IGNITION_LAMPORTS", default_value_t = 0)]
    pub ignition_lamports: u64,
    /// Expose Prometheus metrics on /metrics
    #[clap(long, env = "METRICS_ENABLED")]
    pub metrics_enabled: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !(self.burn_ratio > 0.0 && self.burn_ratio < 1.0) {
            bail!("BURN_RATIO must be in (0, 1), got {}", self.burn_ratio);
        }
        if !(self.treasury_ratio > 0.0 && self.treasury_ratio < 1.0) {
            bail!(
                "TREASURY_RATIO must be in (0, 1), got {}",
                self.treasury_ratio
            );
        }
        if (self.burn_ratio + self.treasury_ratio - 1.0).abs() > 1e-9 {
            warn!(
                "BURN_RATIO + TREASURY_RATIO = {}, expected 1.0",
                self.burn_ratio + self.treasury_ratio
            );
        }
        if self.quote_ttl_seconds == 0 || self.quote_ttl_seconds > MAX_QUOTE_TTL_SECS {
            bail!(
                "QUOTE_TTL_SECONDS must be in 1..={}, got {}",
                MAX_QUOTE_TTL_SECS,
                self.quote_ttl_seconds
            );
        }
        if self.fee_markup < 1.0 || !self.fee_markup.is_finite() {
            bail!("FEE_MARKUP must be a finite value >= 1.0");
        }

        for key in self.raw_signing_keys() {
            if !is_valid_keypair_str(&key) {
                bail!("fee payer key does not look like a base58 64-byte keypair");
            }
        }

        if let Some(mint) = self.ecotoken_mint.as_deref() {
            if !PLACEHOLDER_MINTS.contains(&mint) && !is_valid_account_str(mint) {
                bail!("ECOTOKEN_MINT is not a valid base58 account");
            }
        }

        if self.ignition_enabled {
            // Missing ignition config is surfaced per-request, not at boot,
            // so the flag can be staged ahead of the destination rollout
            if self.ignition_destination.is_none() || self.ignition_lamports == 0 {
                warn!("ignition enabled without destination/amount; requests will fail with IGNITION_NOT_CONFIGURED");
            }
        }

        if self.env.requires_remote_stores() {
            if self.redis_url.is_none() {
                bail!("REDIS_URL is required outside development");
            }
            if self.database_url.is_none() {
                bail!("DATABASE_URL is required outside development");
            }
            if self.raw_signing_keys().is_empty() {
                bail!("fee payer signing material is required outside development");
            }
        }

        if self.env.is_production() {
            if self.allowed_origins.iter().all(|o| o.trim().is_empty()) {
                bail!("ALLOWED_ORIGINS must not be empty in production");
            }
            match self.ecotoken_mint.as_deref() {
                None => bail!("ECOTOKEN_MINT is required in production"),
                Some(mint) if PLACEHOLDER_MINTS.contains(&mint) => {
                    bail!("ECOTOKEN_MINT holds a placeholder value in production")
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    fn raw_signing_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(primary) = self.fee_payer_private_key.as_ref() {
            keys.push(primary.clone());
        }
        for key in &self.fee_payer_keys {
            let trimmed = key.trim();
            if !trimmed.is_empty() && !keys.iter().any(|k| k == trimmed) {
                keys.push(trimmed.to_string());
            }
        }
        keys
    }

    // Signing material in priority order, primary key first
    pub fn signing_keys(&self) -> Result<Vec<Keypair>> {
        self.raw_signing_keys()
            .iter()
            .map(|key| {
                Keypair::from_base58_string(key).context("failed to decode fee payer key")
            })
            .collect()
    }

    pub fn ecotoken(&self) -> Result<Pubkey> {
        let mint = self
            .ecotoken_mint
            .as_deref()
            .context("ECOTOKEN_MINT is not configured")?;
        Pubkey::from_str(mint).context("ECOTOKEN_MINT is not a valid account")
    }

    // Treasury wallet: explicit address or the primary fee payer
    pub fn treasury(&self, primary_payer: &Pubkey) -> Result<Pubkey> {
        match self.treasury_address.as_deref() {
            Some(address) => Pubkey::from_str(address).context("TREASURY_ADDRESS is invalid"),
            None => Ok(*primary_payer),
        }
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.allowed_origins
            .iter()
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config::parse_from(["pyre_daemon"])
    }

    #[test]
    fn test_defaults_are_valid_in_development() {
        let config = base_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_origins_and_mint() {
        let mut config = base_config();
        config.env = Environment::Production;
        config.redis_url = Some("redis://127.0.0.1/".into());
        config.database_url = Some("postgres://localhost/pyre".into());
        config.fee_payer_private_key =
            Some(Keypair::from_seed([3; 32]).to_base58_string());
        assert!(config.validate().is_err());

        config.allowed_origins = vec!["https://app.example.com".into()];
        assert!(config.validate().is_err());

        config.ecotoken_mint = Some("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_ratio_is_fatal() {
        let mut config = base_config();
        config.burn_ratio = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_signer_key_is_fatal() {
        let mut config = base_config();
        config.fee_payer_private_key = Some("not-base58!!".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_signing_keys_deduplicate_and_order() {
        let primary = Keypair::from_seed([1; 32]).to_base58_string();
        let secondary = Keypair::from_seed([2; 32]).to_base58_string();
        let mut config = base_config();
        config.fee_payer_private_key = Some(primary.clone());
        config.fee_payer_keys = vec![primary.clone(), secondary];
        let keys = config.signing_keys().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].pubkey(), Keypair::from_seed([1; 32]).pubkey());
    }
}
