//! `neos_data_product`: a core entity with an optional column schema.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::entity::{create_entity, delete_entity, entity_schema, find, update_entity, EntityRecord};
use crate::client::core::{DataProductClient, EntityKind};
use crate::client::models::{DataType, ProductSchema, SchemaField};
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::{identifier, Reconciler, Steps};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};

const KIND: EntityKind = EntityKind::DataProduct;

/// Column type of one schema field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataTypeBlock {
    pub column_type: Option<String>,
    pub meta: Option<BTreeMap<String, String>>,
}

/// One field of the product schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldBlock {
    pub name: String,
    pub description: Option<String>,
    pub primary: Option<bool>,
    pub optional: Option<bool>,
    pub data_type: Option<DataTypeBlock>,
}

/// The `schema` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaBlock {
    pub product_type: Option<String>,
    pub fields: Option<Vec<FieldBlock>>,
}

/// Stored state of a data product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataProductRecord {
    #[serde(flatten)]
    pub entity: EntityRecord,
    pub schema: Option<SchemaBlock>,
}

// Unset local values stay unset while the remote value is the zero value.
fn keep_str(local: Option<&String>, remote: &str) -> Option<String> {
    match local {
        None if remote.is_empty() => None,
        _ => Some(remote.to_string()),
    }
}

fn keep_bool(local: Option<bool>, remote: bool) -> Option<bool> {
    match local {
        None if !remote => None,
        _ => Some(remote),
    }
}

impl SchemaBlock {
    /// The schema to send, if there is anything to send.
    fn to_remote(&self) -> Option<ProductSchema> {
        let product_type = self.product_type.clone().unwrap_or_default();
        let fields: Vec<SchemaField> = self
            .fields
            .iter()
            .flatten()
            .map(|f| {
                let data_type = f.data_type.clone().unwrap_or_default();
                SchemaField {
                    name: f.name.clone(),
                    description: f.description.clone().unwrap_or_default(),
                    primary: f.primary.unwrap_or(false),
                    optional: f.optional.unwrap_or(false),
                    data_type: DataType {
                        column_type: data_type.column_type.unwrap_or_default(),
                        meta: data_type.meta.unwrap_or_default(),
                    },
                }
            })
            .collect();
        if product_type.is_empty() || fields.is_empty() {
            return None;
        }
        Some(ProductSchema {
            product_type,
            fields,
        })
    }

    /// Rebuild the block from the backend schema, keeping the local
    /// spelling of unset values.
    fn from_remote(remote: &ProductSchema, local: Option<&SchemaBlock>) -> Self {
        let local_fields = local.and_then(|l| l.fields.as_ref());
        let fields = remote
            .fields
            .iter()
            .map(|field| {
                let prior = local_fields.and_then(|fs| fs.iter().find(|f| f.name == field.name));
                let prior_type = prior.and_then(|p| p.data_type.as_ref());
                let data_type = if prior_type.is_none()
                    && field.data_type.column_type.is_empty()
                    && field.data_type.meta.is_empty()
                {
                    None
                } else {
                    Some(DataTypeBlock {
                        column_type: keep_str(
                            prior_type.and_then(|t| t.column_type.as_ref()),
                            &field.data_type.column_type,
                        ),
                        meta: match prior_type.and_then(|t| t.meta.as_ref()) {
                            None if field.data_type.meta.is_empty() => None,
                            _ => Some(field.data_type.meta.clone()),
                        },
                    })
                };
                FieldBlock {
                    name: field.name.clone(),
                    description: keep_str(
                        prior.and_then(|p| p.description.as_ref()),
                        &field.description,
                    ),
                    primary: keep_bool(prior.and_then(|p| p.primary), field.primary),
                    optional: keep_bool(prior.and_then(|p| p.optional), field.optional),
                    data_type,
                }
            })
            .collect();
        Self {
            product_type: Some(remote.product_type.clone()),
            fields: Some(fields),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataProductResource {
    client: DataProductClient,
}

impl DataProductResource {
    async fn put_schema(
        &self,
        steps: &mut Steps,
        id: &str,
        record: &DataProductRecord,
    ) -> Result<(), ProviderError> {
        let Some(schema) = record.schema.as_ref().and_then(SchemaBlock::to_remote) else {
            return Ok(());
        };
        steps
            .run("put schema", self.client.put_schema(id, &schema))
            .await?;
        Ok(())
    }
}

fn schema_block() -> NestedBlock {
    let data_type = Block::new()
        .with_attribute("column_type", Attribute::optional_string())
        .with_attribute("meta", Attribute::string_map(AttributeFlags::optional()));
    let field = Block::new()
        .with_attribute(
            "name",
            Attribute::required_string().with_description("Name of the schema field."),
        )
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("primary", Attribute::optional_bool())
        .with_attribute("optional", Attribute::optional_bool())
        .with_block("data_type", NestedBlock::single(data_type));
    NestedBlock::single(
        Block::new()
            .with_description("Column schema of the product.")
            .with_attribute("product_type", Attribute::optional_string())
            .with_block("fields", NestedBlock::list(field)),
    )
}

#[async_trait]
impl Reconciler for DataProductResource {
    type Record = DataProductRecord;
    const TYPE_NAME: &'static str = "neos_data_product";

    fn schema() -> Schema {
        entity_schema("A NEOS data product.").with_block("schema", schema_block())
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.data_products(),
        }
    }

    async fn create(&self, mut desired: DataProductRecord) -> Result<DataProductRecord, ProviderError> {
        let mut steps = Steps::new(Operation::Create, KIND.label());
        let id = create_entity(&mut steps, self.client.entities(), &mut desired.entity, None).await?;
        self.put_schema(&mut steps, &id, &desired).await?;
        desired.entity.stamp();
        Ok(desired)
    }

    async fn read(
        &self,
        mut current: DataProductRecord,
    ) -> Result<Option<DataProductRecord>, ProviderError> {
        let id = identifier(&current.entity.id, KIND.label())?.to_string();
        let Some(entity) = find(self.client.entities(), &id).await? else {
            return Ok(None);
        };
        current.entity.apply(&entity);

        let remote = match self.client.get_schema(&id).await {
            Ok(schema) => schema,
            Err(e) if e.is_not_found() => {
                debug!(id = %id, "No schema for data product");
                ProductSchema::default()
            }
            Err(e) => {
                return Err(ProviderError::backend(
                    Operation::Read,
                    KIND.label(),
                    "get schema",
                    e,
                ))
            }
        };
        current.schema = if remote.product_type.is_empty() && remote.fields.is_empty() {
            None
        } else {
            Some(SchemaBlock::from_remote(&remote, current.schema.as_ref()))
        };
        Ok(Some(current))
    }

    async fn update(
        &self,
        prior: DataProductRecord,
        mut desired: DataProductRecord,
    ) -> Result<DataProductRecord, ProviderError> {
        let id = identifier(&prior.entity.id, KIND.label())?;
        let mut steps = Steps::new(Operation::Update, KIND.label());
        update_entity(&mut steps, self.client.entities(), id, &mut desired.entity, None).await?;
        self.put_schema(&mut steps, id, &desired).await?;
        desired.entity.stamp();
        Ok(desired)
    }

    async fn delete(&self, current: DataProductRecord) -> Result<(), ProviderError> {
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

    fn schema() -> SchemaBlock {
        SchemaBlock {
            product_type: Some("stored".to_string()),
            fields: Some(vec![FieldBlock {
                name: "order_id".to_string(),
                primary: Some(true),
                data_type: Some(DataTypeBlock {
                    column_type: Some("VARCHAR".to_string()),
                    meta: None,
                }),
                ..Default::default()
            }]),
        }
    }

    fn record(id: Option<&str>, schema: Option<SchemaBlock>) -> DataProductRecord {
        DataProductRecord {
            entity: EntityRecord {
                id: id.map(str::to_string),
                name: "orders".to_string(),
                ..Default::default()
            },
            schema,
        }
    }

    async fn listing(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/data_product"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [{"identifier": "dp-1", "name": "orders"}]
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_empty_schema_is_not_sent() {
        assert!(SchemaBlock::default().to_remote().is_none());
        let no_fields = SchemaBlock {
            product_type: Some("stored".to_string()),
            fields: Some(vec![]),
        };
        assert!(no_fields.to_remote().is_none());
        assert!(schema().to_remote().is_some());
    }

    #[tokio::test]
    async fn test_create_puts_schema() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/gateway/v2/data_product"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"identifier": "dp-1", "name": "orders"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/gateway/v2/data_product/dp-1/schema"))
            .and(body_json(json!({"schema": {
                "product_type": "stored",
                "fields": [{
                    "name": "order_id",
                    "description": "",
                    "primary": true,
                    "optional": false,
                    "data_type": {"column_type": "VARCHAR", "meta": {}}
                }]
            }})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let resource = DataProductResource::from_client(&client_for(&server.uri()));
        let created = resource.create(record(None, Some(schema()))).await.unwrap();
        assert_eq!(created.entity.id.as_deref(), Some("dp-1"));
    }

    #[tokio::test]
    async fn test_read_treats_missing_schema_as_empty() {
        let server = MockServer::start().await;
        listing(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/data_product/dp-1/schema"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resource = DataProductResource::from_client(&client_for(&server.uri()));
        let read = resource
            .read(record(Some("dp-1"), Some(schema())))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.schema, None);
    }

    #[tokio::test]
    async fn test_read_surfaces_schema_fetch_failure() {
        let server = MockServer::start().await;
        listing(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/data_product/dp-1/schema"))
            .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
            .mount(&server)
            .await;

        let resource = DataProductResource::from_client(&client_for(&server.uri()));
        let err = resource
            .read(record(Some("dp-1"), Some(schema())))
            .await
            .unwrap_err();
        let diagnostic = err.to_diagnostic();
        assert_eq!(diagnostic.summary, "Error reading data product");
        assert!(diagnostic.detail.unwrap().contains("get schema"));
    }

    #[tokio::test]
    async fn test_read_keeps_local_spelling_of_unset_values() {
        let server = MockServer::start().await;
        listing(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/data_product/dp-1/schema"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "product_type": "stored",
                "fields": [{
                    "name": "order_id",
                    "description": "",
                    "primary": true,
                    "optional": false,
                    "data_type": {"column_type": "VARCHAR", "meta": {}}
                }]
            })))
            .mount(&server)
            .await;

        let resource = DataProductResource::from_client(&client_for(&server.uri()));
        let current = record(Some("dp-1"), Some(schema()));
        let read = resource.read(current.clone()).await.unwrap().unwrap();
        assert_eq!(read, current);
    }
}
