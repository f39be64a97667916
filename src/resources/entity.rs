//! Shared shape of the core gateway entities, and the data system resource
//! which uses nothing beyond it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::core::{EntityClient, EntityKind};
use crate::client::models::{
    Entity, EntityCreateRequest, EntityInfo, EntityPayload, EntityUpdateRequest,
};
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::{identifier, timestamp, Reconciler, Steps};
use crate::schema::{Attribute, AttributeFlags, Schema};

/// Fields every core entity record carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityRecord {
    /// Backend identifier.
    pub id: Option<String>,
    /// Globally unique resource name.
    pub urn: Option<String>,
    /// Entity name.
    pub name: String,
    /// Short label.
    pub label: Option<String>,
    /// Free text description.
    pub description: Option<String>,
    /// Owner.
    pub owner: Option<String>,
    /// Contact identifiers.
    pub contact_ids: Option<Vec<String>>,
    /// Related links.
    pub links: Option<Vec<String>>,
    /// Creation timestamp reported by the backend.
    pub created_at: Option<String>,
    /// Time of the last successful create or update.
    pub last_updated: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Keep an unset list unset when the backend reports it empty.
fn merge_list(local: &Option<Vec<String>>, remote: &[String]) -> Option<Vec<String>> {
    if remote.is_empty() && local.is_none() {
        None
    } else {
        Some(remote.to_vec())
    }
}

impl EntityRecord {
    pub(crate) fn payload(&self, output_type: Option<String>) -> EntityPayload {
        EntityPayload {
            name: self.name.clone(),
            label: self.label.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            output_type,
        }
    }

    pub(crate) fn info(&self) -> EntityInfo {
        EntityInfo {
            owner: self.owner.clone().unwrap_or_default(),
            contact_ids: self.contact_ids.clone().unwrap_or_default(),
            links: self.links.clone().unwrap_or_default(),
        }
    }

    /// Overwrite local fields from a backend entity.
    pub(crate) fn apply(&mut self, entity: &Entity) {
        self.id = Some(entity.identifier.clone());
        self.urn = non_empty(&entity.urn);
        self.name = entity.name.clone();
        self.label = non_empty(&entity.label);
        self.description = non_empty(&entity.description);
        if let Some(created_at) = &entity.created_at {
            self.created_at = Some(created_at.clone());
        }
        if let Some(owner) = &entity.owner {
            self.owner = non_empty(owner);
        }
        if let Some(contact_ids) = &entity.contact_ids {
            self.contact_ids = merge_list(&self.contact_ids, contact_ids);
        }
        if let Some(links) = &entity.links {
            self.links = merge_list(&self.links, links);
        }
    }

    /// Overwrite the ownership fields from a backend info response.
    pub(crate) fn apply_info(&mut self, info: &EntityInfo) {
        self.owner = non_empty(&info.owner);
        self.contact_ids = merge_list(&self.contact_ids, &info.contact_ids);
        self.links = merge_list(&self.links, &info.links);
    }

    pub(crate) fn stamp(&mut self) {
        self.last_updated = Some(timestamp());
    }
}

/// Schema with the common core entity attributes.
pub(crate) fn entity_schema(description: &str) -> Schema {
    Schema::v0()
        .with_description(description)
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("Backend identifier."),
        )
        .with_attribute(
            "urn",
            Attribute::computed_string().with_description("Globally unique resource name."),
        )
        .with_attribute("name", Attribute::required_string())
        .with_attribute("label", Attribute::optional_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("owner", Attribute::optional_string())
        .with_attribute(
            "contact_ids",
            Attribute::string_list(AttributeFlags::optional()),
        )
        .with_attribute("links", Attribute::string_list(AttributeFlags::optional()))
        .with_attribute("created_at", Attribute::computed_string())
        .with_attribute("last_updated", Attribute::computed_string())
}

/// List entities of the client's kind and pick the one with `id`.
pub(crate) async fn find(client: &EntityClient, id: &str) -> Result<Option<Entity>, ProviderError> {
    let entities = client.list().await.map_err(|e| {
        ProviderError::backend(Operation::Read, client.kind().label(), "list entities", e)
    })?;
    Ok(entities.into_iter().find(|e| e.identifier == id))
}

/// Create the entity with its info fields and record the assigned identity.
pub(crate) async fn create_entity(
    steps: &mut Steps,
    client: &EntityClient,
    record: &mut EntityRecord,
    output_type: Option<String>,
) -> Result<String, ProviderError> {
    let request = EntityCreateRequest {
        entity: record.payload(output_type),
        entity_info: record.info(),
    };
    let entity = steps.run("create entity", client.create(&request)).await?;
    record.apply(&entity);
    Ok(entity.identifier)
}

/// Update the scalar fields, then the info fields, of an existing entity.
pub(crate) async fn update_entity(
    steps: &mut Steps,
    client: &EntityClient,
    id: &str,
    record: &mut EntityRecord,
    output_type: Option<String>,
) -> Result<(), ProviderError> {
    let request = EntityUpdateRequest {
        entity: record.payload(output_type),
    };
    let entity = steps.run("update entity", client.update(id, &request)).await?;
    record.apply(&entity);
    record.id = Some(id.to_string());

    let info = record.info();
    let info = steps
        .run("update entity info", client.update_info(id, &info))
        .await?;
    if let Some(info) = info {
        record.apply_info(&info);
    }
    Ok(())
}

/// Delete an entity of the client's kind.
pub(crate) async fn delete_entity(client: &EntityClient, id: &str) -> Result<(), ProviderError> {
    client.delete(id).await.map_err(|e| {
        ProviderError::backend(Operation::Delete, client.kind().label(), "delete entity", e)
    })
}

/// `neos_data_system`
#[derive(Debug, Clone)]
pub struct DataSystemResource {
    client: EntityClient,
}

#[async_trait]
impl Reconciler for DataSystemResource {
    type Record = EntityRecord;
    const TYPE_NAME: &'static str = "neos_data_system";

    fn schema() -> Schema {
        entity_schema("A NEOS data system.")
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.entities(EntityKind::DataSystem),
        }
    }

    async fn create(&self, mut desired: EntityRecord) -> Result<EntityRecord, ProviderError> {
        let mut steps = Steps::new(Operation::Create, EntityKind::DataSystem.label());
        create_entity(&mut steps, &self.client, &mut desired, None).await?;
        desired.stamp();
        Ok(desired)
    }

    async fn read(&self, mut current: EntityRecord) -> Result<Option<EntityRecord>, ProviderError> {
        let id = identifier(&current.id, EntityKind::DataSystem.label())?;
        let Some(entity) = find(&self.client, id).await? else {
            return Ok(None);
        };
        current.apply(&entity);
        Ok(Some(current))
    }

    async fn update(
        &self,
        prior: EntityRecord,
        mut desired: EntityRecord,
    ) -> Result<EntityRecord, ProviderError> {
        let id = identifier(&prior.id, EntityKind::DataSystem.label())?;
        let mut steps = Steps::new(Operation::Update, EntityKind::DataSystem.label());
        update_entity(&mut steps, &self.client, id, &mut desired, None).await?;
        desired.stamp();
        Ok(desired)
    }

    async fn delete(&self, current: EntityRecord) -> Result<(), ProviderError> {
        let id = identifier(&current.id, EntityKind::DataSystem.label())?;
        delete_entity(&self.client, id).await
    }
}
