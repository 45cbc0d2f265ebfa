// Error taxonomy for the API client and the mock layer
use crate::storage::StoreError;

/// Errors surfaced by API operations, real or mock-served.
///
/// `Cancelled` is not user-facing; queries swallow it and leave their
/// state untouched. Everything else reaches the caller's `error` slot.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx HTTP response from the remote endpoint.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request's cancellation token fired before settlement.
    #[error("request cancelled")]
    Cancelled,

    /// Unknown id inside the mock layer.
    #[error("{0} not found")]
    NotFound(String),

    /// Transport-level failure (connect, DNS, broken stream).
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape.
    #[error("invalid response: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ApiError {
    /// Server errors and transport failures are retried; client errors
    /// (4xx), cancellation and mock-layer failures are deterministic.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Http { status, .. } => *status >= 500,
            ApiError::Network(_) => true,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        let err = ApiError::Http {
            status: 503,
            message: "HTTP 503: Service Unavailable".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        let err = ApiError::Http {
            status: 404,
            message: "HTTP 404: Not Found".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!ApiError::Cancelled.is_retryable());
        assert!(!ApiError::NotFound("batch bat_1".to_string()).is_retryable());
    }

    #[test]
    fn test_network_errors_are_retryable() {
        assert!(ApiError::Network("connection refused".to_string()).is_retryable());
    }
}
