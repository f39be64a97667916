//! Ordered, non-transactional multi-call mutations.
//!
//! Each backend call of a Create or Update runs as a named step. When a
//! step fails, the resulting [`ProviderError::Backend`] lists every step
//! that had already been applied remotely, so the operator knows exactly
//! what state the entity was left in.

use std::future::Future;

use tracing::{debug, warn};

use crate::client::ClientError;
use crate::error::{BackendFailure, Operation, ProviderError};

/// Checkpoint log for one lifecycle operation on one entity.
#[derive(Debug)]
pub struct Steps {
    operation: Operation,
    kind: &'static str,
    committed: Vec<String>,
}

impl Steps {
    /// Start an empty log.
    pub fn new(operation: Operation, kind: &'static str) -> Self {
        Self {
            operation,
            kind,
            committed: Vec::new(),
        }
    }

    /// Run one backend call. On success the step is recorded as committed;
    /// on failure no further step should run.
    pub async fn run<T, F>(&mut self, step: &str, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        debug!(kind = self.kind, step = step, "Running backend step");
        match call.await {
            Ok(value) => {
                self.committed.push(step.to_string());
                Ok(value)
            }
            Err(source) => {
                warn!(
                    kind = self.kind,
                    step = step,
                    committed = ?self.committed,
                    error = %source,
                    "Backend step failed"
                );
                Err(ProviderError::Backend(Box::new(BackendFailure {
                    operation: self.operation,
                    kind: self.kind,
                    step: step.to_string(),
                    committed: self.committed.clone(),
                    source,
                })))
            }
        }
    }

    /// Steps applied so far, in order.
    pub fn committed(&self) -> &[String] {
        &self.committed
    }
}
