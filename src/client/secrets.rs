//! Secrets stored on the core gateway.

use std::sync::Arc;

use super::models::{Secret, SecretList, SecretRequest};
use super::{ClientContext, ClientError};

/// Secret operations.
#[derive(Debug, Clone)]
pub struct SecretClient {
    ctx: Arc<ClientContext>,
}

impl SecretClient {
    pub(crate) fn new(ctx: Arc<ClientContext>) -> Self {
        Self { ctx }
    }

    fn url(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/secret/{}", self.ctx.endpoints().core, id),
            None => format!("{}/secret", self.ctx.endpoints().core),
        }
    }

    /// List all secrets. Values are never returned.
    pub async fn list(&self) -> Result<Vec<Secret>, ClientError> {
        let list: SecretList = self.ctx.get(&self.url(None), None).await?;
        Ok(list.secrets)
    }

    /// Create a secret.
    pub async fn create(&self, request: &SecretRequest) -> Result<Secret, ClientError> {
        self.ctx.post(&self.url(None), request, None).await
    }

    /// Replace name and values of a secret.
    pub async fn update(&self, id: &str, request: &SecretRequest) -> Result<Secret, ClientError> {
        self.ctx.put(&self.url(Some(id)), request, None).await
    }

    /// Delete a secret.
    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.ctx.delete::<()>(&self.url(Some(id)), None, None).await
    }
}
