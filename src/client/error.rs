use thiserror::Error;

/// Errors returned by the NEOS backend client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("{method} {url} failed: {source}")]
    Request {
        /// HTTP method.
        method: String,
        /// Request URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        /// HTTP method.
        method: String,
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("could not decode response from {url}: {source}")]
    Decode {
        /// Request URL.
        url: String,
        /// Decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The underlying HTTP client could not be built.
    #[error("could not build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl ClientError {
    /// HTTP status of the failure, if the backend answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend reported the entity as missing.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
