//! Core gateway entities: data systems, data sources, data units, data
//! products and outputs.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::models::{
    ConnectionRequest, DataSourceDetail, DataSourceSecretRequest, DataSourceSecretResponse,
    DataUnitConfigRequest, Entity, EntityCreateRequest, EntityInfo, EntityList,
    EntityUpdateRequest, ProductSchema, ProductSchemaRequest,
};
use super::{ClientContext, ClientError};

/// The kinds of core entity the gateway manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A data system.
    DataSystem,
    /// A data source.
    DataSource,
    /// A data unit.
    DataUnit,
    /// A data product.
    DataProduct,
    /// An output.
    Output,
}

impl EntityKind {
    /// Path segment and link type name, e.g. `data_system`.
    pub fn path(self) -> &'static str {
        match self {
            Self::DataSystem => "data_system",
            Self::DataSource => "data_source",
            Self::DataUnit => "data_unit",
            Self::DataProduct => "data_product",
            Self::Output => "output",
        }
    }

    /// Human-readable name, e.g. `data system`.
    pub fn label(self) -> &'static str {
        match self {
            Self::DataSystem => "data system",
            Self::DataSource => "data source",
            Self::DataUnit => "data unit",
            Self::DataProduct => "data product",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// CRUD over one kind of core entity.
#[derive(Debug, Clone)]
pub struct EntityClient {
    ctx: Arc<ClientContext>,
    kind: EntityKind,
}

impl EntityClient {
    pub(crate) fn new(ctx: Arc<ClientContext>, kind: EntityKind) -> Self {
        Self { ctx, kind }
    }

    /// The entity kind this client manages.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.ctx.endpoints().core, self.kind.path())
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), id)
    }

    /// List every entity of this kind.
    pub async fn list(&self) -> Result<Vec<Entity>, ClientError> {
        let list: EntityList = self.ctx.get(&self.collection_url(), None).await?;
        Ok(list.entities)
    }

    /// Create an entity with its info fields.
    pub async fn create(&self, request: &EntityCreateRequest) -> Result<Entity, ClientError> {
        self.ctx.post(&self.collection_url(), request, None).await
    }

    /// Replace the scalar fields of an entity.
    pub async fn update(
        &self,
        id: &str,
        request: &EntityUpdateRequest,
    ) -> Result<Entity, ClientError> {
        self.ctx.put(&self.item_url(id), request, None).await
    }

    /// Replace the owner, contact and link fields of an entity. The gateway
    /// may answer with an empty body.
    pub async fn update_info(
        &self,
        id: &str,
        info: &EntityInfo,
    ) -> Result<Option<EntityInfo>, ClientError> {
        let url = format!("{}/info", self.item_url(id));
        self.ctx.put(&url, info, None).await
    }

    /// Delete an entity.
    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.ctx.delete::<()>(&self.item_url(id), None, None).await
    }

    pub(crate) fn sub_url(&self, id: &str, suffix: &str) -> String {
        format!("{}/{}", self.item_url(id), suffix)
    }

    pub(crate) fn ctx(&self) -> &ClientContext {
        &self.ctx
    }
}

/// Data sources with their connection and secret payloads.
#[derive(Debug, Clone)]
pub struct DataSourceClient {
    entities: EntityClient,
}

impl DataSourceClient {
    pub(crate) fn new(ctx: Arc<ClientContext>) -> Self {
        Self {
            entities: EntityClient::new(ctx, EntityKind::DataSource),
        }
    }

    /// Entity-level operations.
    pub fn entities(&self) -> &EntityClient {
        &self.entities
    }

    /// Fetch a single data source, including its secret reference.
    pub async fn get(&self, id: &str) -> Result<DataSourceDetail, ClientError> {
        let url = format!("{}/{}", self.entities.collection_url(), id);
        self.entities.ctx().get(&url, None).await
    }

    /// Replace the connection settings.
    pub async fn put_connection(&self, id: &str, connection: Value) -> Result<Value, ClientError> {
        let url = self.entities.sub_url(id, "connection");
        self.entities
            .ctx()
            .put(&url, &ConnectionRequest { connection }, None)
            .await
    }

    /// Attach a new secret to the data source.
    pub async fn create_secret(
        &self,
        id: &str,
        request: &DataSourceSecretRequest,
    ) -> Result<DataSourceSecretResponse, ClientError> {
        let url = self.entities.sub_url(id, "secret");
        self.entities.ctx().post(&url, request, None).await
    }
}

/// Data units with their configuration payload.
#[derive(Debug, Clone)]
pub struct DataUnitClient {
    entities: EntityClient,
}

impl DataUnitClient {
    pub(crate) fn new(ctx: Arc<ClientContext>) -> Self {
        Self {
            entities: EntityClient::new(ctx, EntityKind::DataUnit),
        }
    }

    /// Entity-level operations.
    pub fn entities(&self) -> &EntityClient {
        &self.entities
    }

    /// Replace the configuration.
    pub async fn put_config(&self, id: &str, configuration: Value) -> Result<Value, ClientError> {
        let url = self.entities.sub_url(id, "config");
        self.entities
            .ctx()
            .put(&url, &DataUnitConfigRequest { configuration }, None)
            .await
    }
}

/// Data products with their schema and builder payloads.
#[derive(Debug, Clone)]
pub struct DataProductClient {
    entities: EntityClient,
}

impl DataProductClient {
    pub(crate) fn new(ctx: Arc<ClientContext>) -> Self {
        Self {
            entities: EntityClient::new(ctx, EntityKind::DataProduct),
        }
    }

    /// Entity-level operations.
    pub fn entities(&self) -> &EntityClient {
        &self.entities
    }

    /// Replace the schema.
    pub async fn put_schema(&self, id: &str, schema: &ProductSchema) -> Result<Value, ClientError> {
        let url = self.entities.sub_url(id, "schema");
        let request = ProductSchemaRequest {
            schema: schema.clone(),
        };
        self.entities.ctx().put(&url, &request, None).await
    }

    /// Fetch the schema.
    pub async fn get_schema(&self, id: &str) -> Result<ProductSchema, ClientError> {
        let url = self.entities.sub_url(id, "schema");
        self.entities.ctx().get(&url, None).await
    }

    /// Replace the builder definition.
    pub async fn put_builder(&self, id: &str, builder: &Value) -> Result<Value, ClientError> {
        let url = self.entities.sub_url(id, "builder");
        self.entities.ctx().put(&url, builder, None).await
    }

    /// Fetch the builder definition.
    pub async fn get_builder(&self, id: &str) -> Result<Value, ClientError> {
        let url = self.entities.sub_url(id, "builder");
        self.entities.ctx().get(&url, None).await
    }
}
