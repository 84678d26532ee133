// Holder-verification oracle client.
//
// Three concerns share the client: the token-acceptance predicate (diamond
// set answered locally from the registry, everything else K-scored by the
// external service), the holder's share of ecosystem supply (chain reads
// with a cached circulating supply), and the dual-burn bonus percentage.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use log::{debug, warn};
use pyre_common::{config::DUAL_BURN_CAP, crypto::Pubkey};
use serde_json::Value;

use crate::{
    chain::ChainRpc,
    config::SUPPLY_CACHE_TTL_SECS,
    store::hot::HotStore,
    tokens::{AcceptanceTier, TokenInfo, TokenRegistry},
};

use super::{HolderOracle, OracleError, TokenAcceptance};

// Acceptance verdicts barely change; cache them for a few minutes
const ACCEPTANCE_CACHE_TTL_SECS: u64 = 300;

pub struct VerificationClient {
    http: reqwest::Client,
    base_url: Option<String>,
    registry: TokenRegistry,
    chain: Arc<dyn ChainRpc>,
    hot: HotStore,
    ecotoken: Option<Pubkey>,
}

impl VerificationClient {
    pub fn new(
        http: reqwest::Client,
        base_url: Option<String>,
        registry: TokenRegistry,
        chain: Arc<dyn ChainRpc>,
        hot: HotStore,
        ecotoken: Option<Pubkey>,
    ) -> Self {
        Self {
            http,
            base_url,
            registry,
            chain,
            hot,
            ecotoken,
        }
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, OracleError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))
    }

    // Circulating supply in smallest units, cached
    async fn circulating_supply(&self, mint: &Pubkey) -> Result<u64, OracleError> {
        let cache_id = mint.to_base58();
        if let Ok(Some(supply)) = self.hot.cache_get::<u64>("supply", &cache_id).await {
            return Ok(supply);
        }
        let supply = self
            .chain
            .get_token_supply(mint)
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        let _ = self
            .hot
            .cache_put(
                "supply",
                &cache_id,
                &supply.amount,
                Duration::from_secs(SUPPLY_CACHE_TTL_SECS),
            )
            .await;
        Ok(supply.amount)
    }
}

#[async_trait]
impl HolderOracle for VerificationClient {
    async fn token_acceptance(&self, mint: &Pubkey) -> Result<TokenAcceptance, OracleError> {
        // Diamond set: accepted locally, no network call
        if let Some(info) = self.registry.lookup(mint) {
            return Ok(TokenAcceptance {
                accepted: true,
                info: info.clone(),
            });
        }

        let cache_id = mint.to_base58();
        if let Ok(Some(cached)) = self
            .hot
            .cache_get::<TokenAcceptance>("token", &cache_id)
            .await
        {
            return Ok(cached);
        }

        let Some(base) = self.base_url.as_deref() else {
            // No oracle configured: only the local set is accepted
            debug!("no verifier configured, rejecting unknown token {}", mint);
            return Ok(TokenAcceptance {
                accepted: false,
                info: TokenInfo {
                    mint: *mint,
                    symbol: "UNKNOWN".to_string(),
                    decimals: 0,
                    tier: AcceptanceTier::Rejected,
                    score: 0,
                },
            });
        };

        let payload = self.fetch_json(&format!("{}/v1/tokens/{}", base, mint)).await?;
        // K-score path; a unified score would be read here instead
        let score = payload
            .get("kscore")
            .or_else(|| payload.get("score"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        let tier = AcceptanceTier::for_score(score);
        let acceptance = TokenAcceptance {
            accepted: tier.accepted(),
            info: TokenInfo {
                mint: *mint,
                symbol: payload
                    .get("symbol")
                    .and_then(Value::as_str)
                    .unwrap_or("UNKNOWN")
                    .to_string(),
                decimals: payload
                    .get("decimals")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u8,
                tier,
                score,
            },
        };

        let _ = self
            .hot
            .cache_put(
                "token",
                &cache_id,
                &acceptance,
                Duration::from_secs(ACCEPTANCE_CACHE_TTL_SECS),
            )
            .await;
        Ok(acceptance)
    }

    async fn holder_share(&self, wallet: &Pubkey) -> Result<f64, OracleError> {
        let Some(ecotoken) = self.ecotoken.as_ref() else {
            return Ok(0.0);
        };
        let supply = self.circulating_supply(ecotoken).await?;
        if supply == 0 {
            return Ok(0.0);
        }
        let held = self
            .chain
            .get_token_balance(wallet, ecotoken)
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        Ok(held as f64 / supply as f64)
    }

    async fn dual_burn_pct(&self, wallet: Option<&Pubkey>) -> Result<f64, OracleError> {
        let Some(base) = self.base_url.as_deref() else {
            return Ok(0.0);
        };
        let url = match wallet {
            Some(wallet) => format!("{}/v1/dual-burn/{}", base, wallet),
            None => format!("{}/v1/dual-burn", base),
        };
        let pct = match self.fetch_json(&url).await {
            Ok(payload) => payload
                .get("pct")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            Err(error) => {
                // The bonus is best-effort; a dead oracle means no bonus
                warn!("dual-burn oracle unavailable, defaulting to 0: {}", error);
                0.0
            }
        };
        Ok(pct.clamp(0.0, DUAL_BURN_CAP))
    }
}
