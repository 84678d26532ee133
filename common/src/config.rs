use crate::static_assert;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 9 decimals for the native coin, amounts are carried in its smallest unit
pub const NATIVE_DECIMALS: u8 = 9;
// 1 000 000 000 smallest units per native coin
pub const COIN_VALUE: u64 = 10u64.pow(NATIVE_DECIMALS as u32);

// ===== Golden-ratio economics =====
//
// The default fee split derives from phi. The treasury keeps 1/phi^3 of every
// fee, the rest is burned; the dual-burn bonus for non-ecosystem tokens is
// capped at 1/phi^2. Operators may override the split via BURN_RATIO /
// TREASURY_RATIO but the validated range stays (0, 1).
pub const PHI: f64 = 1.618033988749895;
// 1 / phi^3
pub const TREASURY_RATIO_DEFAULT: f64 = 0.2360679774997897;
// 1 - 1 / phi^3
pub const BURN_RATIO_DEFAULT: f64 = 1.0 - TREASURY_RATIO_DEFAULT;
// 1 / phi^2, hard cap for the dual-burn bonus
pub const DUAL_BURN_CAP: f64 = 0.3819660112501051;

// Holder discount can never remove more than 95% of the fee
pub const MAX_HOLDER_DISCOUNT: f64 = 0.95;

// ===== Protocol limits =====

// Compute units are clamped to the protocol maximum before pricing
pub const MAX_COMPUTE_UNITS: u64 = 1_400_000;
// Priority fee component: 1 smallest unit per 1000 compute units (0.001/unit)
pub const PRIORITY_FEE_UNITS_PER_CU: u64 = 1_000;
// Serialized transaction hard cap in bytes
pub const MAX_TRANSACTION_SIZE: usize = 1_232;
// A blockhash stays valid for roughly this long; anti-replay slots use it
pub const BLOCKHASH_TTL_SECS: u64 = 90;

// ===== Quote rules =====

pub const DEFAULT_QUOTE_TTL_SECS: u64 = 60;
// No quote may outlive this bound regardless of configuration
pub const MAX_QUOTE_TTL_SECS: u64 = 300;

// ===== Default economic knobs (overridable via environment) =====

pub const DEFAULT_BASE_FEE_UNITS: u64 = 50_000;
pub const DEFAULT_FEE_MARKUP: f64 = 1.0;
// Cost of landing one transaction on chain, used for the break-even floor
pub const DEFAULT_NETWORK_FEE_UNITS: u64 = 5_000;

// ===== Well-known program identifiers =====

pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
// The native coin in its wrapped-token form, used for price discovery
pub const NATIVE_MINT_ID: &str = "So11111111111111111111111111111111111111112";

// Static checks
static_assert!(MAX_QUOTE_TTL_SECS >= DEFAULT_QUOTE_TTL_SECS, "Quote TTL bound must cover the default TTL");
static_assert!(MAX_COMPUTE_UNITS > 0, "Compute unit clamp must be positive");
static_assert!(PRIORITY_FEE_UNITS_PER_CU > 0, "Priority fee divisor must be positive");
