//! Parent/child link resources between core entities.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::core::EntityKind;
use crate::client::links::LinksClient;
use crate::client::models::Link;
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::{timestamp, Reconciler, Steps};
use crate::schema::{Attribute, Schema};

const KIND: &str = "link";

/// The pair of entity kinds a link resource connects.
pub trait LinkKind: Send + Sync + 'static {
    /// Resource type name.
    const TYPE_NAME: &'static str;
    /// Kind of the parent entity.
    const PARENT: EntityKind;
    /// Kind of the child entity.
    const CHILD: EntityKind;
}

macro_rules! link_kind {
    ($name:ident, $type_name:literal, $parent:ident, $child:ident) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl LinkKind for $name {
            const TYPE_NAME: &'static str = $type_name;
            const PARENT: EntityKind = EntityKind::$parent;
            const CHILD: EntityKind = EntityKind::$child;
        }
    };
}

link_kind!(SystemToSource, "neos_link_data_system_data_source", DataSystem, DataSource);
link_kind!(SourceToUnit, "neos_link_data_source_data_unit", DataSource, DataUnit);
link_kind!(UnitToProduct, "neos_link_data_unit_data_product", DataUnit, DataProduct);
link_kind!(ProductToOutput, "neos_link_data_product_output", DataProduct, Output);
link_kind!(ProductToProduct, "neos_link_data_product_data_product", DataProduct, DataProduct);

/// Stored state of a link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRecord {
    /// `<parent>-<child>`.
    pub id: Option<String>,
    pub parent_identifier: String,
    pub child_identifier: String,
    pub last_updated: Option<String>,
}

fn link_id(parent: &str, child: &str) -> String {
    format!("{}-{}", parent, child)
}

/// Link resource for one pair of entity kinds.
#[derive(Debug, Clone)]
pub struct LinkResource<L> {
    client: LinksClient,
    kind: PhantomData<L>,
}

impl<L: LinkKind> LinkResource<L> {
    fn matches(link: &Link, record: &LinkRecord) -> bool {
        let kind_matches =
            |actual: &str, expected: EntityKind| actual.is_empty() || actual == expected.path();
        if !kind_matches(&link.parent.entity_type, L::PARENT)
            || !kind_matches(&link.child.entity_type, L::CHILD)
        {
            return false;
        }
        if record.parent_identifier.is_empty() || record.child_identifier.is_empty() {
            // imported records only know the composite id
            return record.id.as_deref()
                == Some(link_id(&link.parent.identifier, &link.child.identifier).as_str());
        }
        link.parent.identifier == record.parent_identifier
            && link.child.identifier == record.child_identifier
    }

    async fn link(
        &self,
        operation: Operation,
        mut desired: LinkRecord,
    ) -> Result<LinkRecord, ProviderError> {
        let mut steps = Steps::new(operation, KIND);
        steps
            .run(
                "link entities",
                self.client.link(
                    L::PARENT,
                    &desired.parent_identifier,
                    L::CHILD,
                    &desired.child_identifier,
                ),
            )
            .await?;
        desired.id = Some(link_id(&desired.parent_identifier, &desired.child_identifier));
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }
}

#[async_trait]
impl<L: LinkKind> Reconciler for LinkResource<L> {
    type Record = LinkRecord;
    const TYPE_NAME: &'static str = L::TYPE_NAME;

    fn schema() -> Schema {
        Schema::v0()
            .with_description(format!(
                "Link from a NEOS {} to a {}.",
                L::PARENT.label(),
                L::CHILD.label()
            ))
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("Parent and child identifiers."),
            )
            .with_attribute("parent_identifier", Attribute::required_string().with_force_new())
            .with_attribute("child_identifier", Attribute::required_string().with_force_new())
            .with_attribute("last_updated", Attribute::computed_string())
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.links(),
            kind: PhantomData,
        }
    }

    async fn create(&self, desired: LinkRecord) -> Result<LinkRecord, ProviderError> {
        self.link(Operation::Create, desired).await
    }

    async fn read(&self, mut current: LinkRecord) -> Result<Option<LinkRecord>, ProviderError> {
        let links = self.client.list().await.map_err(|e| {
            ProviderError::backend(Operation::Read, KIND, "list links", e)
        })?;
        let Some(link) = links.iter().find(|l| Self::matches(l, &current)) else {
            return Ok(None);
        };
        current.parent_identifier = link.parent.identifier.clone();
        current.child_identifier = link.child.identifier.clone();
        current.id = Some(link_id(&current.parent_identifier, &current.child_identifier));
        Ok(Some(current))
    }

    async fn update(&self, _prior: LinkRecord, desired: LinkRecord) -> Result<LinkRecord, ProviderError> {
        self.link(Operation::Update, desired).await
    }

    async fn delete(&self, current: LinkRecord) -> Result<(), ProviderError> {
        self.client
            .unlink(
                L::PARENT,
                &current.parent_identifier,
                L::CHILD,
                &current.child_identifier,
            )
            .await
            .map_err(|e| {
                ProviderError::backend(Operation::Delete, KIND, "unlink entities", e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_for;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type SourceUnit = LinkResource<SourceToUnit>;

    fn record() -> LinkRecord {
        LinkRecord {
            parent_identifier: "ds-1".to_string(),
            child_identifier: "du-2".to_string(),
            ..Default::default()
        }
    }

    fn links_body() -> serde_json::Value {
        json!({"links": [
            {"parent": {"identifier": "ds-1", "entity_type": "data_source"},
             "child": {"identifier": "du-1", "entity_type": "data_unit"}},
            {"parent": {"identifier": "ds-1", "entity_type": "data_source"},
             "child": {"identifier": "du-2", "entity_type": "data_unit"}}
        ]})
    }

    #[test]
    fn test_type_names_and_schema() {
        assert_eq!(SourceUnit::TYPE_NAME, "neos_link_data_source_data_unit");
        assert_eq!(
            LinkResource::<ProductToProduct>::TYPE_NAME,
            "neos_link_data_product_data_product"
        );
        let schema = SourceUnit::schema();
        assert!(schema.attribute("parent_identifier").unwrap().force_new);
        assert!(schema.attribute("child_identifier").unwrap().force_new);
    }

    #[tokio::test]
    async fn test_create_posts_link_and_composes_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/gateway/v2/link/data_source/ds-1/data_unit/du-2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let resource = SourceUnit::from_client(&client_for(&server.uri()));
        let created = resource.create(record()).await.unwrap();
        assert_eq!(created.id.as_deref(), Some("ds-1-du-2"));
    }

    #[tokio::test]
    async fn test_read_matches_parent_and_child() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/link"))
            .respond_with(ResponseTemplate::new(200).set_body_json(links_body()))
            .mount(&server)
            .await;

        let resource = SourceUnit::from_client(&client_for(&server.uri()));
        let read = resource.read(record()).await.unwrap().unwrap();
        assert_eq!(read.child_identifier, "du-2");
        assert_eq!(read.id.as_deref(), Some("ds-1-du-2"));

        let mut missing = record();
        missing.child_identifier = "du-3".to_string();
        assert!(resource.read(missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_after_import_hydrates_identifiers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/link"))
            .respond_with(ResponseTemplate::new(200).set_body_json(links_body()))
            .mount(&server)
            .await;

        let resource = SourceUnit::from_client(&client_for(&server.uri()));
        let imported: LinkRecord = serde_json::from_value(SourceUnit::import("ds-1-du-1")).unwrap();
        let read = resource.read(imported).await.unwrap().unwrap();
        assert_eq!(read.parent_identifier, "ds-1");
        assert_eq!(read.child_identifier, "du-1");
    }

    #[tokio::test]
    async fn test_delete_removes_the_pair() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/gateway/v2/link/data_source/ds-1/data_unit/du-2"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let resource = SourceUnit::from_client(&client_for(&server.uri()));
        resource.delete(record()).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_ignores_links_of_another_child_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/link"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"links": [
                {"parent": {"identifier": "dp-1", "entity_type": "data_product"},
                 "child": {"identifier": "x-1", "entity_type": "output"}}
            ]})))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let current = LinkRecord {
            parent_identifier: "dp-1".to_string(),
            child_identifier: "x-1".to_string(),
            ..Default::default()
        };
        let product_to_product = LinkResource::<ProductToProduct>::from_client(&client);
        assert!(product_to_product.read(current.clone()).await.unwrap().is_none());
        let product_to_output = LinkResource::<ProductToOutput>::from_client(&client);
        assert!(product_to_output.read(current).await.unwrap().is_some());
    }
}
