// External collaborators the core consumes through traits: the DEX
// aggregator (price discovery and swap legs) and the holder-verification
// oracle (token acceptance, holder share, dual-burn bonus).

mod jupiter;
mod verifier;

pub use jupiter::{amount_bucket, JupiterClient};
pub use verifier::VerificationClient;

use async_trait::async_trait;
use pyre_common::{crypto::Pubkey, transaction::Transaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tokens::TokenInfo;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle transport error: {0}")]
    Transport(String),

    #[error("Oracle returned status {0}")]
    Status(u16),

    #[error("Oracle response could not be parsed: {0}")]
    Parse(String),

    #[error("No route available for this pair")]
    NoRoute,
}

impl From<reqwest::Error> for OracleError {
    fn from(error: reqwest::Error) -> Self {
        OracleError::Transport(error.to_string())
    }
}

/// A priced swap route. `raw` is the aggregator's own quote payload,
/// carried verbatim because the swap-transaction endpoint wants it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexQuote {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
    pub raw: serde_json::Value,
}

impl DexQuote {
    /// Rescale a cached quote to a different input amount. Amounts inside a
    /// magnitude bucket share one route, so the output scales linearly.
    pub fn rescaled_to(&self, in_amount: u64) -> DexQuote {
        if self.in_amount == 0 || in_amount == self.in_amount {
            return self.clone();
        }
        let out_amount =
            (self.out_amount as u128 * in_amount as u128 / self.in_amount as u128) as u64;
        DexQuote {
            in_amount,
            out_amount,
            ..self.clone()
        }
    }
}

#[async_trait]
pub trait DexAggregator: Send + Sync {
    async fn quote(
        &self,
        input: &Pubkey,
        output: &Pubkey,
        amount: u64,
    ) -> Result<DexQuote, OracleError>;

    // Build the unsigned swap transaction for `signer` to co-sign and send
    async fn swap_transaction(
        &self,
        quote: &DexQuote,
        signer: &Pubkey,
    ) -> Result<Transaction, OracleError>;

    async fn token_price_usd(&self, mint: &Pubkey) -> Result<f64, OracleError>;
}

/// Verdict of the token-acceptance predicate. The current score is the
/// K-score; a future unified score slots in behind the same surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAcceptance {
    pub accepted: bool,
    pub info: TokenInfo,
}

#[async_trait]
pub trait HolderOracle: Send + Sync {
    async fn token_acceptance(&self, mint: &Pubkey) -> Result<TokenAcceptance, OracleError>;

    // Share of the ecosystem token's circulating supply held by `wallet`,
    // as a fraction in [0, 1]
    async fn holder_share(&self, wallet: &Pubkey) -> Result<f64, OracleError>;

    // Ecosystem-burn bonus fraction; None asks for the global default
    async fn dual_burn_pct(&self, wallet: Option<&Pubkey>) -> Result<f64, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyre_common::crypto::Keypair;

    #[test]
    fn test_rescale_is_proportional() {
        let quote = DexQuote {
            input_mint: *Keypair::from_seed([1; 32]).pubkey(),
            output_mint: *Keypair::from_seed([2; 32]).pubkey(),
            in_amount: 50_000,
            out_amount: 5_000,
            raw: serde_json::Value::Null,
        };
        let scaled = quote.rescaled_to(100_000);
        assert_eq!(scaled.out_amount, 10_000);
        assert_eq!(scaled.in_amount, 100_000);
        // Same amount short-circuits
        assert_eq!(quote.rescaled_to(50_000).out_amount, 5_000);
    }
}
