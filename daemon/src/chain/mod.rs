// Chain RPC pool: priority-ordered endpoints, per-endpoint circuit
// breakers, latency tracking and transparent failover.
//
// Endpoints come from configuration: the private providers first when their
// keys are present, a custom URL next, and always the public fallback last.
// A call walks the list in order, skipping endpoints whose breaker is open;
// when every breaker is open the primary is tried anyway so a fleet-wide
// blip cannot strand the relay permanently.

mod endpoint;
mod error;

pub use endpoint::RpcEndpoint;
pub use error::ChainError;

use std::{
    str::FromStr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, info, warn};
use pyre_common::{
    crypto::{Hash, Pubkey, Signature},
    time::{get_current_time_in_millis, TimestampMillis},
    transaction::{Transaction, TOKEN_PROGRAM},
};
use serde_json::{json, Value};

use crate::config::{
    BLOCKHASH_CACHE_MS, CONFIRM_POLL_MS, PUBLIC_RPC_URL, RPC_TIMEOUT_SECS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccountInfo {
    pub token_account: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
    pub decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSupply {
    pub amount: u64,
    pub decimals: u8,
}

/// The chain surface the relay consumes. The production implementation is
/// the failover pool below; tests substitute their own.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn get_balance(&self, account: &Pubkey) -> Result<u64, ChainError>;

    // Aggregate balance of `owner` in `mint` across its token accounts
    async fn get_token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, ChainError>;

    async fn get_token_accounts(&self, owner: &Pubkey)
        -> Result<Vec<TokenAccountInfo>, ChainError>;

    async fn get_token_supply(&self, mint: &Pubkey) -> Result<TokenSupply, ChainError>;

    async fn latest_blockhash(&self) -> Result<Hash, ChainError>;

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ChainError>;

    /// Poll until the signature reaches confirmed commitment or the timeout
    /// elapses. A transaction that landed with an on-chain error is
    /// surfaced as `Rejected`.
    async fn confirm(&self, signature: &Signature, timeout: Duration) -> Result<(), ChainError>;
}

pub struct EndpointSnapshot {
    pub name: String,
    pub priority: u8,
    pub circuit_open: bool,
    pub average_latency_ms: Option<u64>,
}

pub struct RpcPool {
    endpoints: Vec<Arc<RpcEndpoint>>,
    blockhash_cache: Mutex<Option<(Hash, TimestampMillis)>>,
}

impl RpcPool {
    pub fn from_parts(mut endpoints: Vec<Arc<RpcEndpoint>>) -> Self {
        endpoints.sort_by_key(|endpoint| endpoint.priority());
        Self {
            endpoints,
            blockhash_cache: Mutex::new(None),
        }
    }

    pub fn from_config(config: &crate::config::Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(RPC_TIMEOUT_SECS))
            .build()?;

        let mut endpoints = Vec::new();
        if let Some(key) = config.helius_api_key.as_deref() {
            endpoints.push(Arc::new(RpcEndpoint::new(
                "helius",
                format!("https://mainnet.helius-rpc.com/?api-key={}", key),
                0,
                client.clone(),
            )));
        }
        if let Some(key) = config.triton_api_key.as_deref() {
            endpoints.push(Arc::new(RpcEndpoint::new(
                "triton",
                format!("https://pyre.rpcpool.com/{}", key),
                1,
                client.clone(),
            )));
        }
        if let Some(url) = config.rpc_url.as_deref() {
            endpoints.push(Arc::new(RpcEndpoint::new("custom", url, 2, client.clone())));
        }
        // Always present so a configuration with no providers still works
        endpoints.push(Arc::new(RpcEndpoint::new(
            "public",
            PUBLIC_RPC_URL,
            9,
            client,
        )));

        info!(
            "rpc pool configured with {} endpoints: {}",
            endpoints.len(),
            endpoints
                .iter()
                .map(|e| e.name().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self::from_parts(endpoints))
    }

    pub fn snapshots(&self) -> Vec<EndpointSnapshot> {
        self.endpoints
            .iter()
            .map(|endpoint| EndpointSnapshot {
                name: endpoint.name().to_string(),
                priority: endpoint.priority(),
                circuit_open: endpoint.is_open(),
                average_latency_ms: endpoint.average_latency_ms(),
            })
            .collect()
    }

    // At least one endpoint can take requests
    pub fn is_healthy(&self) -> bool {
        self.endpoints.iter().any(|endpoint| !endpoint.is_open())
    }

    pub fn invalidate_blockhash(&self) {
        *self.blockhash_cache.lock().expect("cache poisoned") = None;
    }

    async fn call_with_failover(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let mut last_error: Option<ChainError> = None;
        let mut attempted = false;

        for endpoint in &self.endpoints {
            if !endpoint.allow_request() {
                debug!("skipping {} for {}, circuit open", endpoint.name(), method);
                continue;
            }
            attempted = true;
            match endpoint.call(method, params.clone()).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    warn!("{} failed on {}: {}", method, endpoint.name(), error);
                    // Chain-level outcomes are authoritative, another
                    // endpoint would answer the same
                    if !error.trips_circuit() && !matches!(error, ChainError::InvalidResponse(_)) {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
            }
        }

        // Every circuit open: try the primary anyway rather than fail blind
        if !attempted {
            if let Some(primary) = self.endpoints.first() {
                warn!(
                    "all rpc circuits open, forcing {} through {}",
                    method,
                    primary.name()
                );
                return primary.call(method, params).await;
            }
        }

        Err(ChainError::AllEndpointsFailed(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no endpoints configured".to_string()),
        ))
    }
}

fn parse_u64_amount(value: &Value, context: &str) -> Result<u64, ChainError> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| value.as_u64())
        .ok_or_else(|| ChainError::InvalidResponse(format!("bad amount in {}", context)))
}

#[async_trait]
impl ChainRpc for RpcPool {
    async fn get_balance(&self, account: &Pubkey) -> Result<u64, ChainError> {
        let result = self
            .call_with_failover("getBalance", json!([account.to_base58()]))
            .await?;
        result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| ChainError::InvalidResponse("getBalance value".to_string()))
    }

    async fn get_token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, ChainError> {
        let result = self
            .call_with_failover(
                "getTokenAccountsByOwner",
                json!([
                    owner.to_base58(),
                    { "mint": mint.to_base58() },
                    { "encoding": "jsonParsed" }
                ]),
            )
            .await?;
        let accounts = result
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| ChainError::InvalidResponse("token accounts value".to_string()))?;
        let mut total = 0u64;
        for account in accounts {
            let amount = account
                .pointer("/account/data/parsed/info/tokenAmount/amount")
                .map(|v| parse_u64_amount(v, "token balance"))
                .transpose()?
                .unwrap_or(0);
            total = total.saturating_add(amount);
        }
        Ok(total)
    }

    async fn get_token_accounts(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<TokenAccountInfo>, ChainError> {
        let result = self
            .call_with_failover(
                "getTokenAccountsByOwner",
                json!([
                    owner.to_base58(),
                    { "programId": TOKEN_PROGRAM.to_base58() },
                    { "encoding": "jsonParsed" }
                ]),
            )
            .await?;
        let accounts = result
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| ChainError::InvalidResponse("token accounts value".to_string()))?;

        let mut parsed = Vec::with_capacity(accounts.len());
        for account in accounts {
            let token_account = account
                .get("pubkey")
                .and_then(Value::as_str)
                .and_then(|s| Pubkey::from_str(s).ok());
            let info = account.pointer("/account/data/parsed/info");
            let mint = info
                .and_then(|i| i.get("mint"))
                .and_then(Value::as_str)
                .and_then(|s| Pubkey::from_str(s).ok());
            let amount = info
                .and_then(|i| i.pointer("/tokenAmount/amount"))
                .map(|v| parse_u64_amount(v, "token account"))
                .transpose()?;
            let decimals = info
                .and_then(|i| i.pointer("/tokenAmount/decimals"))
                .and_then(Value::as_u64);
            if let (Some(token_account), Some(mint), Some(amount), Some(decimals)) =
                (token_account, mint, amount, decimals)
            {
                parsed.push(TokenAccountInfo {
                    token_account,
                    mint,
                    amount,
                    decimals: decimals as u8,
                });
            }
        }
        Ok(parsed)
    }

    async fn get_token_supply(&self, mint: &Pubkey) -> Result<TokenSupply, ChainError> {
        let result = self
            .call_with_failover("getTokenSupply", json!([mint.to_base58()]))
            .await?;
        let value = result
            .get("value")
            .ok_or_else(|| ChainError::InvalidResponse("token supply value".to_string()))?;
        let amount = value
            .get("amount")
            .map(|v| parse_u64_amount(v, "token supply"))
            .transpose()?
            .ok_or_else(|| ChainError::InvalidResponse("token supply amount".to_string()))?;
        let decimals = value
            .get("decimals")
            .and_then(Value::as_u64)
            .ok_or_else(|| ChainError::InvalidResponse("token supply decimals".to_string()))?;
        Ok(TokenSupply {
            amount,
            decimals: decimals as u8,
        })
    }

    async fn latest_blockhash(&self) -> Result<Hash, ChainError> {
        {
            let cache = self.blockhash_cache.lock().expect("cache poisoned");
            if let Some((hash, fetched_at)) = cache.as_ref() {
                if get_current_time_in_millis().saturating_sub(*fetched_at) < BLOCKHASH_CACHE_MS {
                    return Ok(*hash);
                }
            }
        }

        let result = self
            .call_with_failover(
                "getLatestBlockhash",
                json!([{ "commitment": "confirmed" }]),
            )
            .await?;
        let hash = result
            .pointer("/value/blockhash")
            .and_then(Value::as_str)
            .and_then(|s| Hash::from_str(s).ok())
            .ok_or_else(|| ChainError::InvalidResponse("blockhash".to_string()))?;

        *self.blockhash_cache.lock().expect("cache poisoned") =
            Some((hash, get_current_time_in_millis()));
        Ok(hash)
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ChainError> {
        let result = self
            .call_with_failover(
                "sendTransaction",
                json!([tx.to_base64(), { "encoding": "base64", "maxRetries": 0 }]),
            )
            .await;

        match result {
            Ok(value) => value
                .as_str()
                .and_then(|s| Signature::from_str(s).ok())
                .ok_or_else(|| ChainError::InvalidResponse("send signature".to_string())),
            Err(error) => {
                // A stale cached blockhash poisons every retry; drop it
                let stale = matches!(error, ChainError::BlockhashNotFound)
                    || matches!(&error, ChainError::Simulation(m) if m.contains("Blockhash not found"));
                if stale {
                    self.invalidate_blockhash();
                }
                Err(error)
            }
        }
    }

    async fn confirm(&self, signature: &Signature, timeout: Duration) -> Result<(), ChainError> {
        let deadline = get_current_time_in_millis() + timeout.as_millis() as u64;
        loop {
            let result = self
                .call_with_failover(
                    "getSignatureStatuses",
                    json!([[signature.to_base58()]]),
                )
                .await?;
            let status = result.pointer("/value/0");
            if let Some(status) = status.filter(|s| !s.is_null()) {
                if let Some(err) = status.get("err").filter(|e| !e.is_null()) {
                    return Err(ChainError::Rejected(err.to_string()));
                }
                let commitment = status
                    .get("confirmationStatus")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if commitment == "confirmed" || commitment == "finalized" {
                    return Ok(());
                }
            }
            if get_current_time_in_millis() >= deadline {
                return Err(ChainError::ConfirmTimeout(signature.to_base58()));
            }
            tokio::time::sleep(Duration::from_millis(CONFIRM_POLL_MS)).await;
        }
    }
}
