//! Error types for the NEOS provider.

use std::fmt;

use thiserror::Error;

use crate::client::ClientError;
use crate::schema::Diagnostic;

/// The lifecycle operation a backend failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Creating a remote entity.
    Create,
    /// Reading or listing remote entities.
    Read,
    /// Updating a remote entity.
    Update,
    /// Deleting a remote entity.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Create => "creating",
            Self::Read => "reading",
            Self::Update => "updating",
            Self::Delete => "deleting",
        };
        f.write_str(verb)
    }
}

/// A failed backend call, with the steps of the same operation that had
/// already been committed remotely when it failed.
#[derive(Debug)]
pub struct BackendFailure {
    /// Operation the call belonged to.
    pub operation: Operation,
    /// Human-readable entity kind, e.g. `data system`.
    pub kind: &'static str,
    /// The step that failed, e.g. `put connection`.
    pub step: String,
    /// Steps that succeeded before the failure, in order.
    pub committed: Vec<String>,
    /// The client error.
    pub source: ClientError,
}

/// Errors that can occur while serving provider requests.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested entity was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A record failed schema validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Provider configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Login against the NEOS IAM service failed.
    #[error("Unable to Create NEOS API Client: {0}")]
    Authentication(String),

    /// A backend call failed.
    #[error("Error {} {}: {}", .0.operation, .0.kind, .0.source)]
    Backend(Box<BackendFailure>),

    /// A user-supplied free-form payload is not usable.
    #[error("Invalid {attribute}: {message}")]
    InvalidPayload {
        /// Attribute holding the payload.
        attribute: String,
        /// What is wrong with it.
        message: String,
    },

    /// The host handed over provider data of an unexpected type.
    #[error("Unexpected Provider Data: {0}")]
    UnexpectedProviderData(String),

    /// A lifecycle call arrived before a successful Configure.
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A record could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Operation not supported.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Build a backend failure for a step with nothing committed before it.
    pub fn backend(
        operation: Operation,
        kind: &'static str,
        step: impl Into<String>,
        source: ClientError,
    ) -> Self {
        Self::Backend(Box::new(BackendFailure {
            operation,
            kind,
            step: step.into(),
            committed: Vec::new(),
            source,
        }))
    }

    /// Build an invalid payload error for an attribute.
    pub fn invalid_payload(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from a backend call.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }

    /// Render the error as an error diagnostic for the host.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Backend(failure) => {
                let mut detail = format!(
                    "Could not complete {} while {} {}, unexpected error: {}",
                    failure.step, failure.operation, failure.kind, failure.source
                );
                if !failure.committed.is_empty() {
                    detail.push_str(&format!(
                        "\n\nAlready applied remotely: {}",
                        failure.committed.join(", ")
                    ));
                }
                Diagnostic::error(format!("Error {} {}", failure.operation, failure.kind))
                    .with_detail(detail)
            }
            Self::InvalidPayload { attribute, message } => {
                Diagnostic::error(format!("Invalid {attribute}"))
                    .with_detail(message.clone())
                    .with_attribute(attribute.clone())
            }
            other => Diagnostic::error(other.to_string()),
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::Authentication(msg) => tonic::Status::unauthenticated(msg),
            ProviderError::Backend(failure) => tonic::Status::unavailable(format!(
                "Error {} {}: {}",
                failure.operation, failure.kind, failure.source
            )),
            err @ ProviderError::InvalidPayload { .. } => {
                tonic::Status::invalid_argument(err.to_string())
            }
            ProviderError::UnexpectedProviderData(msg) => tonic::Status::internal(msg),
            ProviderError::NotConfigured(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            }
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            }
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
        }
    }
}
