//! `neos_registry_core`: a core registered in the NEOS registry.
//!
//! Registrations cannot be changed in place. Update only refreshes
//! `last_updated`; any change to name or partition replaces the core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::models::{RegistryCore, RegistryCoreRequest};
use crate::client::registry::RegistryClient;
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::{identifier, timestamp, Reconciler, Steps};
use crate::schema::{Attribute, Schema};

const KIND: &str = "registry core";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryCoreRecord {
    pub name: String,
    pub partition: String,
    pub host: Option<String>,
    /// Only returned when the core is registered.
    pub access_key: Option<String>,
    pub identifier: Option<String>,
    pub urn: Option<String>,
    pub last_updated: Option<String>,
}

impl RegistryCoreRecord {
    fn matches(&self, core: &RegistryCore) -> bool {
        match self.urn.as_deref().filter(|u| !u.is_empty()) {
            Some(urn) => core.urn == urn,
            None => !self.name.is_empty() && core.name == self.name,
        }
    }

    fn apply(&mut self, core: &RegistryCore) {
        if !core.identifier.is_empty() {
            self.identifier = Some(core.identifier.clone());
        }
        if !core.urn.is_empty() {
            self.urn = Some(core.urn.clone());
        }
        if !core.name.is_empty() {
            self.name = core.name.clone();
        }
        if !core.partition.is_empty() {
            self.partition = core.partition.clone();
        }
        if self.host.is_some() || !core.host.is_empty() {
            self.host = Some(core.host.clone());
        }
        if let Some(access_key) = core.access_key.as_ref().filter(|k| !k.is_empty()) {
            self.access_key = Some(access_key.clone());
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistryCoreResource {
    client: RegistryClient,
}

#[async_trait]
impl Reconciler for RegistryCoreResource {
    type Record = RegistryCoreRecord;
    const TYPE_NAME: &'static str = "neos_registry_core";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A core registered in the NEOS registry.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Name of the core."),
            )
            .with_attribute(
                "partition",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Partition the core lives in."),
            )
            .with_attribute("host", Attribute::optional_string())
            .with_attribute("access_key", Attribute::computed_string().sensitive())
            .with_attribute("identifier", Attribute::computed_string())
            .with_attribute("urn", Attribute::computed_string())
            .with_attribute("last_updated", Attribute::computed_string())
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.registry_cores(),
        }
    }

    fn import(id: &str) -> Value {
        json!({ "urn": id })
    }

    async fn create(&self, mut desired: RegistryCoreRecord) -> Result<RegistryCoreRecord, ProviderError> {
        let request = RegistryCoreRequest {
            name: desired.name.clone(),
            partition: desired.partition.clone(),
        };
        let mut steps = Steps::new(Operation::Create, KIND);
        let core = steps
            .run("register core", self.client.create(&request))
            .await?;
        desired.apply(&core);
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }

    async fn read(
        &self,
        mut current: RegistryCoreRecord,
    ) -> Result<Option<RegistryCoreRecord>, ProviderError> {
        let cores = self
            .client
            .list()
            .await
            .map_err(|e| ProviderError::backend(Operation::Read, KIND, "list cores", e))?;
        let Some(core) = cores.iter().find(|c| current.matches(c)) else {
            return Ok(None);
        };
        current.apply(core);
        Ok(Some(current))
    }

    async fn update(
        &self,
        prior: RegistryCoreRecord,
        mut desired: RegistryCoreRecord,
    ) -> Result<RegistryCoreRecord, ProviderError> {
        desired.identifier = prior.identifier;
        desired.urn = prior.urn;
        desired.access_key = prior.access_key;
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }

    async fn delete(&self, current: RegistryCoreRecord) -> Result<(), ProviderError> {
        let urn = identifier(&current.urn, KIND)?;
        self.client
            .delete(urn)
            .await
            .map_err(|e| ProviderError::backend(Operation::Delete, KIND, "deregister core", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_for;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cores() -> Value {
        json!({"cores": [
            {"identifier": "c-0", "urn": "urn:core:c-0", "name": "edge", "partition": "ksa"},
            {"identifier": "c-1", "urn": "urn:core:c-1", "name": "main", "partition": "ksa", "host": "core.neos"}
        ]})
    }

    #[tokio::test]
    async fn test_create_keeps_access_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/registry/core"))
            .and(body_json(json!({"name": "main", "partition": "ksa"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identifier": "c-1",
                "urn": "urn:core:c-1",
                "name": "main",
                "partition": "ksa",
                "access_key": "AK-123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = RegistryCoreResource::from_client(&client_for(&server.uri()));
        let desired = RegistryCoreRecord {
            name: "main".to_string(),
            partition: "ksa".to_string(),
            ..Default::default()
        };
        let created = resource.create(desired).await.unwrap();
        assert_eq!(created.access_key.as_deref(), Some("AK-123"));
        assert_eq!(created.urn.as_deref(), Some("urn:core:c-1"));
        assert_eq!(created.host, None);
    }

    #[tokio::test]
    async fn test_import_by_urn_then_read_hydrates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/registry/core"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cores()))
            .mount(&server)
            .await;

        let resource = RegistryCoreResource::from_client(&client_for(&server.uri()));
        let imported: RegistryCoreRecord =
            serde_json::from_value(RegistryCoreResource::import("urn:core:c-1")).unwrap();
        let read = resource.read(imported).await.unwrap().unwrap();
        assert_eq!(read.name, "main");
        assert_eq!(read.identifier.as_deref(), Some("c-1"));
        assert_eq!(read.host.as_deref(), Some("core.neos"));
    }

    #[tokio::test]
    async fn test_update_touches_nothing_remotely() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let resource = RegistryCoreResource::from_client(&client_for(&server.uri()));
        let prior = RegistryCoreRecord {
            name: "main".to_string(),
            partition: "ksa".to_string(),
            urn: Some("urn:core:c-1".to_string()),
            access_key: Some("AK-123".to_string()),
            ..Default::default()
        };
        let mut desired = prior.clone();
        desired.urn = None;
        desired.access_key = None;
        desired.host = Some("core.neos".to_string());
        let updated = resource.update(prior, desired).await.unwrap();
        assert_eq!(updated.urn.as_deref(), Some("urn:core:c-1"));
        assert_eq!(updated.access_key.as_deref(), Some("AK-123"));
        assert!(updated.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_delete_by_urn() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/registry/core"))
            .and(body_json(json!({"urn": "urn:core:c-1"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let resource = RegistryCoreResource::from_client(&client_for(&server.uri()));
        let current = RegistryCoreRecord {
            urn: Some("urn:core:c-1".to_string()),
            ..Default::default()
        };
        resource.delete(current).await.unwrap();
    }
}
