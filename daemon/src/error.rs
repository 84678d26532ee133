// User-facing error taxonomy.
//
// Every failure that leaves the HTTP boundary maps to a closed set of
// machine codes paired with an HTTP status, an optional retry hint and
// optional per-error details. Internal errors carry their source for the
// logs but surface as an opaque 500.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use pyre_common::api::ErrorBody;
use thiserror::Error;

use crate::{chain::ChainError, oracle::OracleError, store::hot::HotError};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    #[error("Quote not found")]
    QuoteNotFound,

    #[error("{0} not found")]
    ResourceNotFound(&'static str),

    #[error("Quote has expired")]
    QuoteExpired,

    #[error("Transaction was already submitted")]
    ReplayDetected,

    #[error("No fee payer has capacity for this quote")]
    NoPayerCapacity,

    #[error("All fee payer circuits are open")]
    CircuitBreakerOpen { retry_after: u64 },

    #[error("Token {0} is below the acceptance tier")]
    TierRejected(String),

    #[error("Token verification failed")]
    VerificationFailed,

    #[error("Fee computation overflowed")]
    FeeOverflow,

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Rate limit exceeded")]
    RateLimit { retry_after: u64 },

    #[error("Service temporarily unavailable")]
    ServiceUnavailable { retry_after: u64 },

    #[error("Ignition pipeline is disabled")]
    IgnitionDisabled,

    #[error("Ignition pipeline is not configured")]
    IgnitionNotConfigured,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Admin surface is not configured")]
    AdminNotConfigured,

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl RelayError {
    pub fn validation(message: impl Into<String>) -> Self {
        RelayError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn validation_with(message: impl Into<String>, details: Vec<String>) -> Self {
        RelayError::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Validation { .. } => "VALIDATION_ERROR",
            RelayError::QuoteNotFound => "QUOTE_NOT_FOUND",
            RelayError::ResourceNotFound(_) => "NOT_FOUND",
            RelayError::QuoteExpired => "QUOTE_EXPIRED",
            RelayError::ReplayDetected => "REPLAY_DETECTED",
            RelayError::NoPayerCapacity => "NO_PAYER_CAPACITY",
            RelayError::CircuitBreakerOpen { .. } => "CIRCUIT_BREAKER_OPEN",
            RelayError::TierRejected(_) => "TIER_REJECTED",
            RelayError::VerificationFailed => "VERIFICATION_FAILED",
            RelayError::FeeOverflow => "FEE_OVERFLOW",
            RelayError::Transaction(_) => "TRANSACTION_ERROR",
            RelayError::RateLimit { .. } => "RATE_LIMIT",
            RelayError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            RelayError::IgnitionDisabled => "IGNITION_DISABLED",
            RelayError::IgnitionNotConfigured => "IGNITION_NOT_CONFIGURED",
            RelayError::InvalidApiKey => "INVALID_API_KEY",
            RelayError::AdminNotConfigured => "ADMIN_NOT_CONFIGURED",
            RelayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            RelayError::NoPayerCapacity => {
                Some(crate::config::PAYER_CAPACITY_RETRY_AFTER_SECS)
            }
            RelayError::CircuitBreakerOpen { retry_after }
            | RelayError::RateLimit { retry_after }
            | RelayError::ServiceUnavailable { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<Vec<String>> {
        match self {
            RelayError::Validation { details, .. } if !details.is_empty() => {
                Some(details.clone())
            }
            _ => None,
        }
    }

    fn public_message(&self) -> String {
        match self {
            // Never leak internal error chains to the client
            RelayError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.public_message(),
            code: self.code().to_string(),
            status_code: self.status_code().as_u16(),
            details: self.details(),
            retry_after: self.retry_after(),
        }
    }
}

impl ResponseError for RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Validation { .. } => StatusCode::BAD_REQUEST,
            RelayError::QuoteNotFound | RelayError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            RelayError::QuoteExpired => StatusCode::GONE,
            RelayError::ReplayDetected => StatusCode::CONFLICT,
            RelayError::NoPayerCapacity
            | RelayError::CircuitBreakerOpen { .. }
            | RelayError::ServiceUnavailable { .. }
            | RelayError::AdminNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::TierRejected(_) => StatusCode::BAD_REQUEST,
            RelayError::VerificationFailed => StatusCode::BAD_GATEWAY,
            RelayError::FeeOverflow => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Transaction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            RelayError::IgnitionDisabled | RelayError::IgnitionNotConfigured => {
                StatusCode::FORBIDDEN
            }
            RelayError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let RelayError::Internal(source) = self {
            log::error!("internal error surfaced to client: {:#}", source);
        }
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

impl From<HotError> for RelayError {
    fn from(error: HotError) -> Self {
        RelayError::Internal(anyhow::Error::new(error).context("hot store failure"))
    }
}

impl From<ChainError> for RelayError {
    fn from(error: ChainError) -> Self {
        if error.is_retryable() {
            RelayError::ServiceUnavailable { retry_after: 5 }
        } else {
            RelayError::Transaction(error.to_string())
        }
    }
}

impl From<OracleError> for RelayError {
    fn from(error: OracleError) -> Self {
        log::warn!("oracle failure: {}", error);
        RelayError::VerificationFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        assert_eq!(RelayError::QuoteExpired.code(), "QUOTE_EXPIRED");
        assert_eq!(RelayError::QuoteExpired.status_code().as_u16(), 410);
        assert_eq!(RelayError::ReplayDetected.status_code().as_u16(), 409);
        assert_eq!(RelayError::NoPayerCapacity.retry_after(), Some(30));
        assert_eq!(
            RelayError::RateLimit { retry_after: 12 }.retry_after(),
            Some(12)
        );
    }

    #[test]
    fn test_internal_error_is_opaque() {
        let error = RelayError::Internal(anyhow::anyhow!("secret connection string"));
        let body = error.body();
        assert_eq!(body.error, "Internal error");
        assert_eq!(body.code, "INTERNAL_ERROR");
    }

    #[test]
    fn test_validation_details_surface() {
        let error = RelayError::validation_with(
            "transaction rejected",
            vec!["fee payer mismatch".into()],
        );
        let body = error.body();
        assert_eq!(body.details.unwrap().len(), 1);
    }
}
