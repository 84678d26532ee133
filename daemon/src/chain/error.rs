use thiserror::Error;

/// Chain RPC failures, classified once so the retry loop, the circuit
/// breakers and the user-facing error mapping all agree.
///
/// Providers disagree on how failures are spelled; `from_rpc` first matches
/// structured codes and only then falls back to the textual patterns.
#[derive(Debug, Error, Clone)]
pub enum ChainError {
    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("RPC request timed out")]
    Timeout,

    #[error("Rate limited by RPC provider")]
    RateLimited,

    #[error("Blockhash not found")]
    BlockhashNotFound,

    #[error("Transaction expired")]
    TransactionExpired,

    #[error("Transaction simulation failed: {0}")]
    Simulation(String),

    #[error("Transaction rejected on chain: {0}")]
    Rejected(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed RPC response: {0}")]
    InvalidResponse(String),

    #[error("Confirmation timed out for {0}")]
    ConfirmTimeout(String),

    #[error("All RPC endpoints failed, last error: {0}")]
    AllEndpointsFailed(String),
}

// Transient markers providers put into simulation failure text
const TRANSIENT_SIMULATION_PATTERNS: [&str; 4] = [
    "BlockhashNotFound",
    "Blockhash not found",
    "node is behind",
    "Minimum context slot",
];

fn is_transient_text(message: &str) -> bool {
    TRANSIENT_SIMULATION_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
        || message.contains("Too Many Requests")
        || message.contains("429")
}

impl ChainError {
    /// Build a classified error from a JSON-RPC error object.
    pub fn from_rpc(code: i64, message: String) -> Self {
        if code == -32005 || message.contains("Too Many Requests") || message.contains("429") {
            return ChainError::RateLimited;
        }
        if message.contains("BlockhashNotFound") || message.contains("Blockhash not found") {
            return ChainError::BlockhashNotFound;
        }
        if message.contains("TransactionExpired") || message.contains("block height exceeded") {
            return ChainError::TransactionExpired;
        }
        if message.contains("Transaction simulation failed") {
            return ChainError::Simulation(message);
        }
        ChainError::Rpc { code, message }
    }

    // Worth retrying within the caller's backoff budget
    pub fn is_retryable(&self) -> bool {
        match self {
            ChainError::Transport(_)
            | ChainError::Timeout
            | ChainError::RateLimited
            | ChainError::BlockhashNotFound
            | ChainError::TransactionExpired => true,
            ChainError::Simulation(message) => is_transient_text(message),
            ChainError::AllEndpointsFailed(_) => true,
            _ => false,
        }
    }

    // Qualifying kinds for the per-endpoint circuit breaker: infrastructure
    // failures only, never chain-level rejections
    pub fn trips_circuit(&self) -> bool {
        matches!(
            self,
            ChainError::Transport(_) | ChainError::Timeout | ChainError::RateLimited
        )
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ChainError::Timeout
        } else if error.status().map(|s| s.as_u16()) == Some(429) {
            ChainError::RateLimited
        } else {
            ChainError::Transport(error.to_string())
        }
    }
}
