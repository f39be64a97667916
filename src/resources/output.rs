//! `neos_output`: a core entity with an output type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity::{create_entity, delete_entity, entity_schema, find, update_entity, EntityRecord};
use crate::client::core::{EntityClient, EntityKind};
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::{identifier, Reconciler, Steps};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation::validate;

const KIND: EntityKind = EntityKind::Output;

/// Accepted `output_type` values.
pub const OUTPUT_TYPES: [&str; 2] = ["dashboard", "application"];

/// Stored state of an output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputRecord {
    #[serde(flatten)]
    pub entity: EntityRecord,
    /// `dashboard` or `application`.
    pub output_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OutputResource {
    client: EntityClient,
}

#[async_trait]
impl Reconciler for OutputResource {
    type Record = OutputRecord;
    const TYPE_NAME: &'static str = "neos_output";

    fn schema() -> Schema {
        entity_schema("A NEOS output.").with_attribute(
            "output_type",
            Attribute::optional_string()
                .with_description("The output type, either dashboard or application."),
        )
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.entities(KIND),
        }
    }

    fn validate(config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validate(&Self::schema(), config);
        if let Some(output_type) = config.get("output_type").and_then(Value::as_str) {
            if !OUTPUT_TYPES.contains(&output_type) {
                diagnostics.push(
                    Diagnostic::error("Invalid output_type")
                        .with_detail(format!(
                            "'{}' is not one of {}",
                            output_type,
                            OUTPUT_TYPES.join(", ")
                        ))
                        .with_attribute("output_type"),
                );
            }
        }
        diagnostics
    }

    async fn create(&self, mut desired: OutputRecord) -> Result<OutputRecord, ProviderError> {
        let mut steps = Steps::new(Operation::Create, KIND.label());
        let output_type = desired.output_type.clone();
        create_entity(&mut steps, &self.client, &mut desired.entity, output_type).await?;
        desired.entity.stamp();
        Ok(desired)
    }

    async fn read(&self, mut current: OutputRecord) -> Result<Option<OutputRecord>, ProviderError> {
        let id = identifier(&current.entity.id, KIND.label())?;
        let Some(entity) = find(&self.client, id).await? else {
            return Ok(None);
        };
        current.entity.apply(&entity);
        if let Some(output_type) = entity.output_type.filter(|t| !t.is_empty()) {
            current.output_type = Some(output_type);
        }
        Ok(Some(current))
    }

    async fn update(
        &self,
        prior: OutputRecord,
        mut desired: OutputRecord,
    ) -> Result<OutputRecord, ProviderError> {
        let id = identifier(&prior.entity.id, KIND.label())?;
        let mut steps = Steps::new(Operation::Update, KIND.label());
        let output_type = desired.output_type.clone();
        update_entity(&mut steps, &self.client, id, &mut desired.entity, output_type).await?;
        desired.entity.stamp();
        Ok(desired)
    }

    async fn delete(&self, current: OutputRecord) -> Result<(), ProviderError> {
        let id = identifier(&current.entity.id, KIND.label())?;
        delete_entity(&self.client, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_for;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_validate_output_type() {
        let ok = json!({"name": "sales dashboard", "output_type": "dashboard"});
        assert!(OutputResource::validate(&ok).is_empty());

        let bad = json!({"name": "sales dashboard", "output_type": "report"});
        let diagnostics = OutputResource::validate(&bad);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("output_type"));
    }

    #[tokio::test]
    async fn test_create_sends_output_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/gateway/v2/output"))
            .and(body_partial_json(json!({"entity": {"output_type": "application"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identifier": "out-1", "name": "portal", "output_type": "application"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = OutputResource::from_client(&client_for(&server.uri()));
        let desired = OutputRecord {
            entity: EntityRecord {
                name: "portal".to_string(),
                ..Default::default()
            },
            output_type: Some("application".to_string()),
        };
        let created = resource.create(desired).await.unwrap();
        assert_eq!(created.entity.id.as_deref(), Some("out-1"));
        assert_eq!(created.output_type.as_deref(), Some("application"));
    }

    #[tokio::test]
    async fn test_read_refreshes_output_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/output"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [{"identifier": "out-1", "name": "portal", "output_type": "dashboard"}]
            })))
            .mount(&server)
            .await;

        let resource = OutputResource::from_client(&client_for(&server.uri()));
        let current = OutputRecord {
            entity: EntityRecord {
                id: Some("out-1".to_string()),
                name: "portal".to_string(),
                ..Default::default()
            },
            output_type: Some("application".to_string()),
        };
        let read = resource.read(current).await.unwrap().unwrap();
        assert_eq!(read.output_type.as_deref(), Some("dashboard"));
    }
}
