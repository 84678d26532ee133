use std::{
    collections::VecDeque,
    sync::Mutex,
    time::{Duration, Instant},
};

use log::trace;
use pyre_common::circuit::{CircuitBreaker, CircuitConfig};
use serde_json::{json, Value};

use crate::config::{
    RPC_FAILURE_THRESHOLD, RPC_HALF_OPEN_TRIALS, RPC_LATENCY_WINDOW, RPC_RESET_TIMEOUT_SECS,
};

use super::ChainError;

/// One JSON-RPC endpoint with its own breaker and latency window.
pub struct RpcEndpoint {
    name: String,
    url: String,
    priority: u8,
    client: reqwest::Client,
    breaker: Mutex<CircuitBreaker>,
    // Sliding window of the last N request latencies in milliseconds
    latency: Mutex<VecDeque<u64>>,
}

impl RpcEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>, priority: u8, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            priority,
            client,
            breaker: Mutex::new(CircuitBreaker::new(CircuitConfig {
                failure_threshold: RPC_FAILURE_THRESHOLD,
                reset_timeout: Duration::from_secs(RPC_RESET_TIMEOUT_SECS),
                half_open_trials: RPC_HALF_OPEN_TRIALS,
                max_reset_timeout: Duration::from_secs(RPC_RESET_TIMEOUT_SECS * 8),
            })),
            latency: Mutex::new(VecDeque::with_capacity(RPC_LATENCY_WINDOW)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn allow_request(&self) -> bool {
        self.breaker.lock().expect("breaker poisoned").allow_request()
    }

    pub fn is_open(&self) -> bool {
        self.breaker.lock().expect("breaker poisoned").is_open()
    }

    pub fn average_latency_ms(&self) -> Option<u64> {
        let window = self.latency.lock().expect("latency poisoned");
        if window.is_empty() {
            return None;
        }
        Some(window.iter().sum::<u64>() / window.len() as u64)
    }

    fn record_latency(&self, elapsed: Duration) {
        let mut window = self.latency.lock().expect("latency poisoned");
        if window.len() == RPC_LATENCY_WINDOW {
            window.pop_front();
        }
        window.push_back(elapsed.as_millis() as u64);
    }

    fn record_outcome(&self, error: Option<&ChainError>) {
        let mut breaker = self.breaker.lock().expect("breaker poisoned");
        match error {
            None => breaker.record_success(),
            Some(error) if error.trips_circuit() => breaker.record_failure(),
            // Non-qualifying failures leave the breaker alone
            Some(_) => {}
        }
    }

    /// One JSON-RPC call. Latency is tracked for every attempt, the breaker
    /// only sees qualifying failures.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        trace!("rpc {} -> {}", method, self.name);
        let started = Instant::now();
        let result = self.call_inner(method, params).await;
        self.record_latency(started.elapsed());
        self.record_outcome(result.as_ref().err());
        result
    }

    async fn call_inner(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self.client.post(&self.url).json(&body).send().await?;
        if response.status().as_u16() == 429 {
            return Err(ChainError::RateLimited);
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;

        if let Some(error) = payload.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            return Err(ChainError::from_rpc(code, message));
        }

        payload
            .get("result")
            .cloned()
            .ok_or_else(|| ChainError::InvalidResponse("missing result".to_string()))
    }
}
