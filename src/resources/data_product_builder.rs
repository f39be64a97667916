//! `neos_data_product_builder`: the builder definition attached to an
//! existing data product.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::client::core::{DataProductClient, EntityKind};
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::{timestamp, Reconciler, Steps};
use crate::schema::{Attribute, AttributeFlags, Schema};
use crate::validation::parse_json_payload;

const KIND: &str = "data product builder";

/// Stored state of a builder definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderRecord {
    /// Identifier of the data product.
    pub id: String,
    pub dataunit_datasource_linkids: Option<Vec<String>>,
    /// Builder definition as a JSON document.
    pub builder_json: String,
    pub last_updated: Option<String>,
}

impl BuilderRecord {
    /// Replace the local document with the remote one unless they are
    /// semantically equal.
    fn observe(&mut self, remote: &Value) -> Result<(), ProviderError> {
        let local = serde_json::from_str::<Value>(&self.builder_json).ok();
        if local.as_ref() != Some(remote) {
            self.builder_json = serde_json::to_string(remote)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DataProductBuilderResource {
    client: DataProductClient,
}

impl DataProductBuilderResource {
    async fn apply(
        &self,
        operation: Operation,
        mut desired: BuilderRecord,
    ) -> Result<BuilderRecord, ProviderError> {
        let builder = parse_json_payload("builder_json", &desired.builder_json)?;
        let mut steps = Steps::new(operation, KIND);
        steps
            .run("put builder", self.client.put_builder(&desired.id, &builder))
            .await?;
        let remote = steps
            .run("get builder", self.client.get_builder(&desired.id))
            .await?;
        desired.observe(&remote)?;
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }
}

#[async_trait]
impl Reconciler for DataProductBuilderResource {
    type Record = BuilderRecord;
    const TYPE_NAME: &'static str = "neos_data_product_builder";
    const JSON_ATTRIBUTES: &'static [&'static str] = &["builder_json"];

    fn schema() -> Schema {
        Schema::v0()
            .with_description("The builder definition of a NEOS data product.")
            .with_attribute(
                "id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Identifier of the data product."),
            )
            .with_attribute(
                "dataunit_datasource_linkids",
                Attribute::string_list(AttributeFlags::optional()),
            )
            .with_attribute(
                "builder_json",
                Attribute::required_string()
                    .with_description("Builder definition as a JSON document."),
            )
            .with_attribute("last_updated", Attribute::computed_string())
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.data_products(),
        }
    }

    async fn create(&self, desired: BuilderRecord) -> Result<BuilderRecord, ProviderError> {
        self.apply(Operation::Create, desired).await
    }

    async fn read(&self, mut current: BuilderRecord) -> Result<Option<BuilderRecord>, ProviderError> {
        match self.client.get_builder(&current.id).await {
            Ok(Value::Null) => Ok(None),
            Ok(remote) => {
                current.observe(&remote)?;
                Ok(Some(current))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(ProviderError::backend(
                Operation::Read,
                EntityKind::DataProduct.label(),
                "get builder",
                e,
            )),
        }
    }

    async fn update(
        &self,
        _prior: BuilderRecord,
        desired: BuilderRecord,
    ) -> Result<BuilderRecord, ProviderError> {
        self.apply(Operation::Update, desired).await
    }

    async fn delete(&self, current: BuilderRecord) -> Result<(), ProviderError> {
        debug!(id = %current.id, "Builder definitions are not deleted remotely");
        Ok(())
    }
}
