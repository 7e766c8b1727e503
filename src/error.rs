//! Error types for the CSR desk.

use thiserror::Error;

use crate::domain::provider::ServiceProvider;
use crate::request::RequestId;

/// Result type alias using the desk error type.
pub type Result<T> = std::result::Result<T, CsrError>;

/// Main error type for the CSR desk.
#[derive(Error, Debug)]
pub enum CsrError {
    /// A required login field was left empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The CAPTCHA answer did not match the expected sum
    #[error("Incorrect CAPTCHA answer")]
    CaptchaMismatch,

    /// Request not found
    #[error("Request not found: {0}")]
    RequestNotFound(RequestId),

    /// A request with the same ID already exists in the store
    #[error("Duplicate request: {0}")]
    DuplicateRequest(RequestId),

    /// Request is in an invalid state for the requested operation
    #[error("Invalid state transition: request {0} is in state '{1}', expected '{2}'")]
    InvalidState(RequestId, String, String),

    /// A dispatch for this provider is already in flight
    #[error("Dispatch already in progress for provider {0}")]
    ProviderBusy(ServiceProvider),

    /// A forward for this request is already in flight
    #[error("Forward already in progress for request {0}")]
    RequestBusy(RequestId),

    /// The provider endpoint could not be reached; the dispatch was rolled back
    #[error("Provider {provider} unreachable: {reason}")]
    ProviderUnreachable {
        provider: ServiceProvider,
        reason: String,
    },

    /// The response could not be delivered to the station; the forward was rolled back
    #[error("Forwarding request {id} failed: {reason}")]
    ForwardFailed { id: RequestId, reason: String },

    /// Validation error (e.g., malformed mobile number, inconsistent timestamps)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CsrError {
    /// Whether the operator can retry the operation that produced this error.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            CsrError::ProviderUnreachable { .. }
                | CsrError::ForwardFailed { .. }
                | CsrError::ProviderBusy(_)
                | CsrError::RequestBusy(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_failures_are_retriable() {
        let unreachable = CsrError::ProviderUnreachable {
            provider: ServiceProvider::Jio,
            reason: "connection refused".to_string(),
        };
        assert!(unreachable.is_retriable());
        assert_eq!(
            unreachable.to_string(),
            "Provider Jio unreachable: connection refused"
        );

        let failed = CsrError::ForwardFailed {
            id: RequestId::from("CSR-001"),
            reason: "mailbox full".to_string(),
        };
        assert!(failed.is_retriable());
    }

    #[test]
    fn test_login_errors_are_not_retriable() {
        assert!(!CsrError::MissingField("username").is_retriable());
        assert!(!CsrError::CaptchaMismatch.is_retriable());
        assert!(
            !CsrError::InvalidState(
                RequestId::from("CSR-002"),
                "Completed".to_string(),
                "Response Received".to_string()
            )
            .is_retriable()
        );
    }
}
