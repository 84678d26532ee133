// DEX aggregator HTTP client.
//
// Quotes are cached in the hot tier under `(input, output, magnitude
// bucket)` so a burst of similar quotes costs one upstream call; cache hits
// are rescaled proportionally to the requested amount. The cache TTL is
// short because routes go stale with the market.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use pyre_common::{crypto::Pubkey, transaction::Transaction};
use serde_json::Value;

use crate::{config::DEX_CACHE_TTL_SECS, store::hot::HotStore};

use super::{DexAggregator, DexQuote, OracleError};

const PRICE_API_URL: &str = "https://api.jup.ag/price/v2";

// Fixed magnitude bucket: every amount with the same digit count shares a
// cache slot, keeping cardinality bounded
pub fn amount_bucket(amount: u64) -> u64 {
    let mut bucket = 1u64;
    let mut rest = amount;
    while rest >= 10 {
        rest /= 10;
        bucket = bucket.saturating_mul(10);
    }
    bucket
}

pub struct JupiterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    hot: HotStore,
}

impl JupiterClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        api_key: Option<String>,
        hot: HotStore,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            hot,
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    async fn fetch_json(&self, builder: reqwest::RequestBuilder) -> Result<Value, OracleError> {
        let response = self.request(builder).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))
    }

    fn parse_amount(value: Option<&Value>, field: &str) -> Result<u64, OracleError> {
        value
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_u64()))
            .ok_or_else(|| OracleError::Parse(format!("missing {}", field)))
    }
}

#[async_trait]
impl DexAggregator for JupiterClient {
    async fn quote(
        &self,
        input: &Pubkey,
        output: &Pubkey,
        amount: u64,
    ) -> Result<DexQuote, OracleError> {
        let cache_id = format!("{}:{}:{}", input, output, amount_bucket(amount));
        if let Ok(Some(cached)) = self.hot.cache_get::<DexQuote>("dexq", &cache_id).await {
            debug!("dex quote cache hit for {}", cache_id);
            return Ok(cached.rescaled_to(amount));
        }

        let url = format!(
            "{}/quote?inputMint={}&outputMint={}&amount={}&slippageBps=50",
            self.base_url, input, output, amount
        );
        let payload = self.fetch_json(self.http.get(&url)).await?;
        if payload.get("error").is_some() {
            return Err(OracleError::NoRoute);
        }

        let quote = DexQuote {
            input_mint: *input,
            output_mint: *output,
            in_amount: Self::parse_amount(payload.get("inAmount"), "inAmount")?,
            out_amount: Self::parse_amount(payload.get("outAmount"), "outAmount")?,
            raw: payload,
        };

        let _ = self
            .hot
            .cache_put(
                "dexq",
                &cache_id,
                &quote,
                Duration::from_secs(DEX_CACHE_TTL_SECS),
            )
            .await;
        Ok(quote.rescaled_to(amount))
    }

    async fn swap_transaction(
        &self,
        quote: &DexQuote,
        signer: &Pubkey,
    ) -> Result<Transaction, OracleError> {
        let url = format!("{}/swap", self.base_url);
        let body = serde_json::json!({
            "quoteResponse": quote.raw,
            "userPublicKey": signer.to_base58(),
            "wrapAndUnwrapSol": true,
        });
        let payload = self.fetch_json(self.http.post(&url).json(&body)).await?;
        let encoded = payload
            .get("swapTransaction")
            .and_then(Value::as_str)
            .ok_or_else(|| OracleError::Parse("missing swapTransaction".to_string()))?;
        Transaction::from_base64(encoded).map_err(|e| OracleError::Parse(e.to_string()))
    }

    async fn token_price_usd(&self, mint: &Pubkey) -> Result<f64, OracleError> {
        let cache_id = mint.to_base58();
        if let Ok(Some(price)) = self.hot.cache_get::<f64>("price", &cache_id).await {
            return Ok(price);
        }

        let url = format!("{}?ids={}", PRICE_API_URL, mint);
        let payload = self.fetch_json(self.http.get(&url)).await?;
        let price = payload
            .pointer(&format!("/data/{}/price", mint))
            .and_then(|v| {
                v.as_str()
                    .and_then(|s| s.parse::<f64>().ok())
                    .or_else(|| v.as_f64())
            })
            .ok_or_else(|| OracleError::Parse("missing price".to_string()))?;

        let _ = self
            .hot
            .cache_put(
                "price",
                &cache_id,
                &price,
                Duration::from_secs(DEX_CACHE_TTL_SECS),
            )
            .await;
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_bucket_magnitudes() {
        assert_eq!(amount_bucket(0), 1);
        assert_eq!(amount_bucket(7), 1);
        assert_eq!(amount_bucket(10), 10);
        assert_eq!(amount_bucket(99), 10);
        assert_eq!(amount_bucket(100), 100);
        assert_eq!(amount_bucket(50_200), 10_000);
        assert_eq!(amount_bucket(999_999), 100_000);
    }

    #[test]
    fn test_bucket_equivalence() {
        // Two amounts in one bucket must share the same cache key
        assert_eq!(amount_bucket(50_200), amount_bucket(73_000));
        assert_ne!(amount_bucket(50_200), amount_bucket(7_300));
    }
}
