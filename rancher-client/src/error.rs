//! Client error types

use thiserror::Error;

/// Errors returned by the remote API client
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status
    #[error("Bad response {status} from {url}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    /// The request could not be sent or the response body not read
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Request payload could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// The client was configured with an unusable base URL or credentials
    #[error("Client configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    pub fn status(status: u16, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            url: url.into(),
            message: message.into(),
        }
    }

    /// Whether the server reported the target as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
