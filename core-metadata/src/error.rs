use bridge_traits::error::BridgeError;
use bridge_traits::http::HttpResponse;
use thiserror::Error;

/// Per-item failure of a remote metadata or embedding call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// Timeout, connection failure or retryable status; worth another attempt
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Permanent rejection; the item is skipped for this pass
    #[error("Request rejected: {0}")]
    NonRetryableRequest(String),

    /// The response could not be interpreted; the item is skipped for this pass
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl MetadataError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MetadataError::TransientNetwork(_))
    }

    /// Classifies a non-2xx response.
    pub fn from_status(context: &str, response: &HttpResponse) -> Self {
        let message = format!(
            "{} returned status {}: {}",
            context,
            response.status,
            response.body_preview(200)
        );

        if response.is_retryable_status() {
            MetadataError::TransientNetwork(message)
        } else {
            MetadataError::NonRetryableRequest(message)
        }
    }
}

impl From<BridgeError> for MetadataError {
    fn from(error: BridgeError) -> Self {
        if error.is_transient() {
            MetadataError::TransientNetwork(error.to_string())
        } else {
            MetadataError::NonRetryableRequest(error.to_string())
        }
    }
}

impl From<core_runtime::Error> for MetadataError {
    fn from(error: core_runtime::Error) -> Self {
        MetadataError::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::HashMap;

    fn response(status: u16) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from("slow down"),
        }
    }

    #[test]
    fn test_status_classification() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(MetadataError::from_status("edition", &response(status)).is_retryable());
        }
        for status in [400, 401, 403, 404, 422] {
            let error = MetadataError::from_status("edition", &response(status));
            assert!(matches!(error, MetadataError::NonRetryableRequest(_)));
        }
    }

    #[test]
    fn test_bridge_error_classification() {
        let timeout: MetadataError = BridgeError::Timeout("30s".to_string()).into();
        assert!(timeout.is_retryable());

        let connection: MetadataError = BridgeError::Connection("refused".to_string()).into();
        assert!(connection.is_retryable());

        let failed: MetadataError = BridgeError::OperationFailed("bad url".to_string()).into();
        assert!(!failed.is_retryable());
    }

    #[test]
    fn test_malformed_is_not_retryable() {
        assert!(!MetadataError::MalformedResponse("no data".to_string()).is_retryable());
    }
}
