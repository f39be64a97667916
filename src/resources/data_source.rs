//! `neos_data_source`: a core entity with connection settings and a
//! credentials secret.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::entity::{create_entity, delete_entity, entity_schema, find, update_entity, EntityRecord};
use crate::client::core::{DataSourceClient, EntityKind};
use crate::client::models::{DataSourceSecretRequest, SecretRequest};
use crate::client::secrets::SecretClient;
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::{identifier, Reconciler, Steps};
use crate::schema::{Attribute, Schema};
use crate::validation::{parse_json_payload, parse_string_map_payload};

const KIND: EntityKind = EntityKind::DataSource;

/// Stored state of a data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceRecord {
    #[serde(flatten)]
    pub entity: EntityRecord,
    /// Connection settings as a JSON document.
    pub connection_json: String,
    /// Credentials as a JSON object of string values.
    pub secret_json: String,
}

#[derive(Debug, Clone)]
pub struct DataSourceResource {
    client: DataSourceClient,
    secrets: SecretClient,
}

#[async_trait]
impl Reconciler for DataSourceResource {
    type Record = DataSourceRecord;
    const TYPE_NAME: &'static str = "neos_data_source";
    const JSON_ATTRIBUTES: &'static [&'static str] = &["connection_json", "secret_json"];

    fn schema() -> Schema {
        entity_schema("A NEOS data source.")
            .with_attribute(
                "connection_json",
                Attribute::required_string()
                    .with_description("Connection settings as a JSON document."),
            )
            .with_attribute(
                "secret_json",
                Attribute::required_string()
                    .sensitive()
                    .with_description("Credentials as a JSON object of strings."),
            )
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.data_sources(),
            secrets: client.secrets(),
        }
    }

    async fn create(&self, mut desired: DataSourceRecord) -> Result<DataSourceRecord, ProviderError> {
        let connection = parse_json_payload("connection_json", &desired.connection_json)?;
        let data = parse_string_map_payload("secret_json", &desired.secret_json)?;

        let mut steps = Steps::new(Operation::Create, KIND.label());
        let id = create_entity(&mut steps, self.client.entities(), &mut desired.entity, None).await?;
        steps
            .run("put connection", self.client.put_connection(&id, connection))
            .await?;
        let secret = steps
            .run(
                "create secret",
                self.client.create_secret(&id, &DataSourceSecretRequest { data }),
            )
            .await?;
        info!(id = %id, secret = %secret.identifier, "Created data source secret");

        desired.entity.stamp();
        Ok(desired)
    }

    async fn read(&self, mut current: DataSourceRecord) -> Result<Option<DataSourceRecord>, ProviderError> {
        let id = identifier(&current.entity.id, KIND.label())?;
        let Some(entity) = find(self.client.entities(), id).await? else {
            return Ok(None);
        };
        current.entity.apply(&entity);
        Ok(Some(current))
    }

    async fn update(
        &self,
        prior: DataSourceRecord,
        mut desired: DataSourceRecord,
    ) -> Result<DataSourceRecord, ProviderError> {
        let id = identifier(&prior.entity.id, KIND.label())?;
        let connection = parse_json_payload("connection_json", &desired.connection_json)?;
        let data = parse_string_map_payload("secret_json", &desired.secret_json)?;

        let mut steps = Steps::new(Operation::Update, KIND.label());
        update_entity(&mut steps, self.client.entities(), id, &mut desired.entity, None).await?;
        steps
            .run("put connection", self.client.put_connection(id, connection))
            .await?;

        let detail = steps.run("get data source", self.client.get(id)).await?;
        let secret_id = detail.secret_identifier.filter(|s| !s.is_empty());
        let existing = match secret_id {
            Some(secret_id) => {
                let secrets = steps.run("find secret", self.secrets.list()).await?;
                secrets.into_iter().find(|s| s.identifier == secret_id)
            }
            None => None,
        };
        match existing {
            Some(secret) => {
                let request = SecretRequest {
                    name: secret.name,
                    data,
                };
                steps
                    .run("put secret", self.secrets.update(&secret.identifier, &request))
                    .await?;
            }
            None => {
                steps
                    .run(
                        "create secret",
                        self.client.create_secret(id, &DataSourceSecretRequest { data }),
                    )
                    .await?;
            }
        }

        desired.entity.stamp();
        Ok(desired)
    }

    async fn delete(&self, current: DataSourceRecord) -> Result<(), ProviderError> {
        let id = identifier(&current.entity.id, KIND.label())?;
        delete_entity(self.client.entities(), id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_for;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn desired() -> DataSourceRecord {
        DataSourceRecord {
            entity: EntityRecord {
                name: "crm".to_string(),
                ..Default::default()
            },
            connection_json: r#"{"type": "postgres", "host": "db"}"#.to_string(),
            secret_json: r#"{"user": "neos", "password": "s3cret"}"#.to_string(),
        }
    }

    #[test]
    fn test_record_flattens_entity_fields() {
        let value = serde_json::to_value(desired()).unwrap();
        assert_eq!(value["name"], "crm");
        assert!(value["id"].is_null());
        assert!(value.get("entity").is_none());

        let record: DataSourceRecord = serde_json::from_value(json!({"id": "ds-9"})).unwrap();
        assert_eq!(record.entity.id.as_deref(), Some("ds-9"));
        assert_eq!(record.connection_json, "");
    }

    #[tokio::test]
    async fn test_malformed_secret_makes_no_backend_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let resource = DataSourceResource::from_client(&client_for(&server.uri()));
        let mut record = desired();
        record.secret_json = r#"{"user": 1}"#.to_string();
        let err = resource.create(record).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::InvalidPayload { ref attribute, .. } if attribute == "secret_json"
        ));
    }

    #[tokio::test]
    async fn test_create_runs_entity_connection_secret_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/gateway/v2/data_source"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identifier": "ds-1", "name": "crm", "urn": "urn:ds-1"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/gateway/v2/data_source/ds-1/connection"))
            .and(body_json(json!({"connection": {"type": "postgres", "host": "db"}})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/gateway/v2/data_source/ds-1/secret"))
            .and(body_json(json!({"data": {"user": "neos", "password": "s3cret"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"identifier": "sec-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let resource = DataSourceResource::from_client(&client_for(&server.uri()));
        let created = resource.create(desired()).await.unwrap();
        assert_eq!(created.entity.id.as_deref(), Some("ds-1"));
        assert_eq!(created.connection_json, desired().connection_json);
    }

    #[tokio::test]
    async fn test_create_secret_failure_reports_committed_steps() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/gateway/v2/data_source"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"identifier": "ds-1", "name": "crm"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/gateway/v2/data_source/ds-1/connection"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/gateway/v2/data_source/ds-1/secret"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let resource = DataSourceResource::from_client(&client_for(&server.uri()));
        match resource.create(desired()).await.unwrap_err() {
            ProviderError::Backend(failure) => {
                assert_eq!(failure.step, "create secret");
                assert_eq!(failure.committed, vec!["create entity", "put connection"]);
            }
            other => panic!("expected backend failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_rewrites_existing_secret_under_its_name() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/gateway/v2/data_source/ds-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"identifier": "ds-1", "name": "crm"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/gateway/v2/data_source/ds-1/info"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/gateway/v2/data_source/ds-1/connection"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/data_source/ds-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identifier": "ds-1", "name": "crm", "secret_identifier": "sec-1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secrets": [{"identifier": "sec-1", "name": "crm-credentials", "keys": ["user"]}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/gateway/v2/secret/sec-1"))
            .and(body_partial_json(json!({"name": "crm-credentials"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"identifier": "sec-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let resource = DataSourceResource::from_client(&client_for(&server.uri()));
        let mut prior = desired();
        prior.entity.id = Some("ds-1".to_string());
        let updated = resource.update(prior, desired()).await.unwrap();
        assert_eq!(updated.entity.id.as_deref(), Some("ds-1"));
        assert!(updated.entity.last_updated.is_some());
    }
}
