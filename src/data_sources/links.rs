//! `neos_links`: every parent/child link on the core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::listing_schema;
use crate::client::links::LinksClient;
use crate::client::models::Link;
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::DataReader;
use crate::schema::{Attribute, Schema};

/// Optional filters, matched against the entity type names
/// (`data_system`, `data_product`, ...).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LinkQuery {
    pub parent_type: Option<String>,
    pub child_type: Option<String>,
}

impl LinkQuery {
    fn matches(&self, link: &Link) -> bool {
        let accepts = |filter: &Option<String>, actual: &str| {
            filter.as_deref().map_or(true, |f| f.is_empty() || f == actual)
        };
        accepts(&self.parent_type, &link.parent.entity_type)
            && accepts(&self.child_type, &link.child.entity_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkSummary {
    pub id: String,
    pub parent_identifier: String,
    pub parent_name: String,
    pub parent_type: String,
    pub child_identifier: String,
    pub child_name: String,
    pub child_type: String,
}

impl From<&Link> for LinkSummary {
    fn from(link: &Link) -> Self {
        Self {
            id: format!("{}-{}", link.parent.identifier, link.child.identifier),
            parent_identifier: link.parent.identifier.clone(),
            parent_name: link.parent.name.clone(),
            parent_type: link.parent.entity_type.clone(),
            child_identifier: link.child.identifier.clone(),
            child_name: link.child.name.clone(),
            child_type: link.child.entity_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkListing {
    pub parent_type: Option<String>,
    pub child_type: Option<String>,
    pub links: Vec<LinkSummary>,
}

#[derive(Debug, Clone)]
pub struct LinksReader {
    client: LinksClient,
}

#[async_trait]
impl DataReader for LinksReader {
    type Query = LinkQuery;
    type Output = LinkListing;
    const TYPE_NAME: &'static str = "neos_links";

    fn schema() -> Schema {
        listing_schema(
            "Every link between core entities.",
            "links",
            &[
                "id",
                "parent_identifier",
                "parent_name",
                "parent_type",
                "child_identifier",
                "child_name",
                "child_type",
            ],
            &[],
        )
        .with_attribute("parent_type", Attribute::optional_string())
        .with_attribute("child_type", Attribute::optional_string())
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.links(),
        }
    }

    async fn read(&self, query: LinkQuery) -> Result<LinkListing, ProviderError> {
        let links = self
            .client
            .list()
            .await
            .map_err(|e| ProviderError::backend(Operation::Read, "link", "list links", e))?;
        let links = links
            .iter()
            .filter(|l| query.matches(l))
            .map(LinkSummary::from)
            .collect();
        Ok(LinkListing {
            parent_type: query.parent_type,
            child_type: query.child_type,
            links,
        })
    }
}
