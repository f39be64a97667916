//! Listings of core gateway entities.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{listing_schema, NoArguments};
use crate::client::core::{EntityClient, EntityKind};
use crate::client::models::Entity;
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::DataReader;
use crate::schema::Schema;

const FIELDS: &[&str] = &["id", "urn", "name", "label", "description", "owner", "created_at"];
const OUTPUT_FIELDS: &[&str] = &[
    "id",
    "urn",
    "name",
    "label",
    "description",
    "owner",
    "created_at",
    "output_type",
];

/// The entity kind a listing covers.
pub trait ListedKind: Send + Sync + 'static {
    /// Data source type name.
    const TYPE_NAME: &'static str;
    /// Computed attribute holding the listing.
    const ATTRIBUTE: &'static str;
    /// Core entity kind.
    const KIND: EntityKind;
}

macro_rules! listed_kind {
    ($name:ident, $type_name:literal, $attribute:literal, $kind:ident) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl ListedKind for $name {
            const TYPE_NAME: &'static str = $type_name;
            const ATTRIBUTE: &'static str = $attribute;
            const KIND: EntityKind = EntityKind::$kind;
        }
    };
}

listed_kind!(DataSystems, "neos_data_systems", "data_systems", DataSystem);
listed_kind!(DataSources, "neos_data_sources", "data_sources", DataSource);
listed_kind!(DataUnits, "neos_data_units", "data_units", DataUnit);
listed_kind!(DataProducts, "neos_data_products", "data_products", DataProduct);
listed_kind!(Outputs, "neos_outputs", "outputs", Output);

/// One listed entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySummary {
    pub id: String,
    pub urn: String,
    pub name: String,
    pub label: String,
    pub description: String,
    pub owner: Option<String>,
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
}

impl From<&Entity> for EntitySummary {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.identifier.clone(),
            urn: entity.urn.clone(),
            name: entity.name.clone(),
            label: entity.label.clone(),
            description: entity.description.clone(),
            owner: entity.owner.clone(),
            created_at: entity.created_at.clone(),
            output_type: entity.output_type.clone(),
        }
    }
}

/// Every entity of one core kind.
#[derive(Debug, Clone)]
pub struct EntityListing<K> {
    client: EntityClient,
    _kind: PhantomData<K>,
}

#[async_trait]
impl<K: ListedKind> DataReader for EntityListing<K> {
    type Query = NoArguments;
    type Output = Value;
    const TYPE_NAME: &'static str = K::TYPE_NAME;

    fn schema() -> Schema {
        let fields = if K::KIND == EntityKind::Output {
            OUTPUT_FIELDS
        } else {
            FIELDS
        };
        listing_schema(
            &format!("Every {} on the NEOS core.", K::KIND.label()),
            K::ATTRIBUTE,
            fields,
            &[],
        )
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.entities(K::KIND),
            _kind: PhantomData,
        }
    }

    async fn read(&self, _query: NoArguments) -> Result<Value, ProviderError> {
        let entities = self.client.list().await.map_err(|e| {
            ProviderError::backend(Operation::Read, K::KIND.label(), "list entities", e)
        })?;
        let summaries: Vec<EntitySummary> = entities.iter().map(EntitySummary::from).collect();
        let mut listing = Map::new();
        listing.insert(K::ATTRIBUTE.to_string(), serde_json::to_value(summaries)?);
        Ok(Value::Object(listing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_for;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_lists_data_systems() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/data_system"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entities": [
                {"identifier": "ds-1", "urn": "urn:ds:1", "name": "erp", "label": "ERP"},
                {"identifier": "ds-2", "name": "crm", "owner": "sales"}
            ]})))
            .expect(1)
            .mount(&server)
            .await;

        let reader = EntityListing::<DataSystems>::from_client(&client_for(&server.uri()));
        let listed = reader.read(NoArguments {}).await.unwrap();
        let systems = listed["data_systems"].as_array().unwrap();
        assert_eq!(systems.len(), 2);
        assert_eq!(systems[0]["id"], "ds-1");
        assert_eq!(systems[0]["label"], "ERP");
        assert_eq!(systems[1]["owner"], "sales");
        assert!(systems[0].get("output_type").is_none());
    }

    #[tokio::test]
    async fn test_outputs_carry_output_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/output"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entities": [
                {"identifier": "o-1", "name": "board", "output_type": "dashboard"}
            ]})))
            .mount(&server)
            .await;

        let reader = EntityListing::<Outputs>::from_client(&client_for(&server.uri()));
        let listed = reader.read(NoArguments {}).await.unwrap();
        assert_eq!(listed["outputs"][0]["output_type"], "dashboard");
        assert!(EntityListing::<Outputs>::schema()
            .attribute("outputs")
            .is_some());
    }

    #[tokio::test]
    async fn test_listing_failure_names_the_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/data_unit"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let reader = EntityListing::<DataUnits>::from_client(&client_for(&server.uri()));
        let err = reader.read(NoArguments {}).await.unwrap_err();
        assert_eq!(err.to_diagnostic().summary, "Error reading data unit");
    }
}
