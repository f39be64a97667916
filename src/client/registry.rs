//! Cores registered in the NEOS registry.

use std::sync::Arc;

use super::models::{RegistryCore, RegistryCoreDeleteRequest, RegistryCoreList, RegistryCoreRequest};
use super::{ClientContext, ClientError};

/// Registry core operations.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    ctx: Arc<ClientContext>,
}

impl RegistryClient {
    pub(crate) fn new(ctx: Arc<ClientContext>) -> Self {
        Self { ctx }
    }

    fn url(&self) -> String {
        format!("{}/core", self.ctx.endpoints().registry)
    }

    /// List all registered cores.
    pub async fn list(&self) -> Result<Vec<RegistryCore>, ClientError> {
        let list: RegistryCoreList = self.ctx.get(&self.url(), None).await?;
        Ok(list.cores)
    }

    /// Register a core. The access key is only returned here.
    pub async fn create(&self, request: &RegistryCoreRequest) -> Result<RegistryCore, ClientError> {
        self.ctx.post(&self.url(), request, None).await
    }

    /// Deregister a core by resource name.
    pub async fn delete(&self, urn: &str) -> Result<(), ClientError> {
        let request = RegistryCoreDeleteRequest {
            urn: urn.to_string(),
        };
        self.ctx.delete(&self.url(), Some(&request), None).await
    }
}

#[cfg(test)]
mod tests {
    use crate::client::test_support::client_for;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_delete_sends_urn_in_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/registry/core"))
            .and(body_json(json!({"urn": "urn:ksa:core:c-1"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        client
            .registry_cores()
            .delete("urn:ksa:core:c-1")
            .await
            .unwrap();
    }
}
