//! `neos_data_unit`: a core entity with an optional configuration document.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::entity::{create_entity, delete_entity, entity_schema, find, update_entity, EntityRecord};
use crate::client::core::{DataUnitClient, EntityKind};
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::{identifier, Reconciler, Steps};
use crate::schema::{Attribute, Schema};
use crate::validation::parse_json_payload;

const KIND: EntityKind = EntityKind::DataUnit;

/// Stored state of a data unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataUnitRecord {
    #[serde(flatten)]
    pub entity: EntityRecord,
    /// Configuration as a JSON document.
    pub config_json: Option<String>,
}

impl DataUnitRecord {
    fn configuration(&self) -> Result<Option<serde_json::Value>, ProviderError> {
        self.config_json
            .as_deref()
            .map(|raw| parse_json_payload("config_json", raw))
            .transpose()
    }
}

#[derive(Debug, Clone)]
pub struct DataUnitResource {
    client: DataUnitClient,
}

#[async_trait]
impl Reconciler for DataUnitResource {
    type Record = DataUnitRecord;
    const TYPE_NAME: &'static str = "neos_data_unit";
    const JSON_ATTRIBUTES: &'static [&'static str] = &["config_json"];

    fn schema() -> Schema {
        entity_schema("A NEOS data unit.").with_attribute(
            "config_json",
            Attribute::optional_string().with_description("Configuration as a JSON document."),
        )
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.data_units(),
        }
    }

    async fn create(&self, mut desired: DataUnitRecord) -> Result<DataUnitRecord, ProviderError> {
        let configuration = desired.configuration()?;

        let mut steps = Steps::new(Operation::Create, KIND.label());
        let id = create_entity(&mut steps, self.client.entities(), &mut desired.entity, None).await?;
        if let Some(configuration) = configuration {
            steps
                .run("put config", self.client.put_config(&id, configuration))
                .await?;
        }

        desired.entity.stamp();
        Ok(desired)
    }

    async fn read(&self, mut current: DataUnitRecord) -> Result<Option<DataUnitRecord>, ProviderError> {
        let id = identifier(&current.entity.id, KIND.label())?;
        let Some(entity) = find(self.client.entities(), id).await? else {
            return Ok(None);
        };
        current.entity.apply(&entity);
        Ok(Some(current))
    }

    async fn update(
        &self,
        prior: DataUnitRecord,
        mut desired: DataUnitRecord,
    ) -> Result<DataUnitRecord, ProviderError> {
        let id = identifier(&prior.entity.id, KIND.label())?;
        let configuration = desired.configuration()?;

        let mut steps = Steps::new(Operation::Update, KIND.label());
        update_entity(&mut steps, self.client.entities(), id, &mut desired.entity, None).await?;
        if let Some(configuration) = configuration {
            steps
                .run("put config", self.client.put_config(id, configuration))
                .await?;
        }

        desired.entity.stamp();
        Ok(desired)
    }

    async fn delete(&self, current: DataUnitRecord) -> Result<(), ProviderError> {
        let id = identifier(&current.entity.id, KIND.label())?;
        delete_entity(self.client.entities(), id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_for;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn desired(config: Option<&str>) -> DataUnitRecord {
        DataUnitRecord {
            entity: EntityRecord {
                name: "orders".to_string(),
                ..Default::default()
            },
            config_json: config.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_malformed_config_is_rejected_before_any_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let resource = DataUnitResource::from_client(&client_for(&server.uri()));
        let err = resource
            .create(desired(Some("{\"table\": ")))
            .await
            .unwrap_err();
        let diagnostic = err.to_diagnostic();
        assert_eq!(diagnostic.summary, "Invalid config_json");
        assert_eq!(diagnostic.attribute.as_deref(), Some("config_json"));
    }

    #[test]
    fn test_validate_flags_malformed_config() {
        let config = json!({"name": "orders", "config_json": "not json"});
        let diagnostics = DataUnitResource::validate(&config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("config_json"));
    }

    #[tokio::test]
    async fn test_create_puts_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/gateway/v2/data_unit"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"identifier": "du-1", "name": "orders"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/gateway/v2/data_unit/du-1/config"))
            .and(body_json(json!({"configuration": {"table": "orders"}})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let resource = DataUnitResource::from_client(&client_for(&server.uri()));
        let created = resource
            .create(desired(Some(r#"{"table":"orders"}"#)))
            .await
            .unwrap();
        assert_eq!(created.entity.id.as_deref(), Some("du-1"));
    }

    #[tokio::test]
    async fn test_create_without_config_skips_config_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/gateway/v2/data_unit"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"identifier": "du-1", "name": "orders"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let resource = DataUnitResource::from_client(&client_for(&server.uri()));
        let created = resource.create(desired(None)).await.unwrap();
        assert_eq!(created.config_json, None);
    }
}
