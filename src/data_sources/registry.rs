//! `neos_registry_cores`

use async_trait::async_trait;
use serde::Serialize;

use super::{listing_schema, NoArguments};
use crate::client::registry::RegistryClient;
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::DataReader;
use crate::schema::Schema;

/// A registered core. Access keys are never listed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreSummary {
    pub identifier: String,
    pub urn: String,
    pub name: String,
    pub partition: String,
    pub host: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoreListing {
    pub cores: Vec<CoreSummary>,
}

#[derive(Debug, Clone)]
pub struct RegistryCoresReader {
    client: RegistryClient,
}

#[async_trait]
impl DataReader for RegistryCoresReader {
    type Query = NoArguments;
    type Output = CoreListing;
    const TYPE_NAME: &'static str = "neos_registry_cores";

    fn schema() -> Schema {
        listing_schema(
            "Every core registered in the NEOS registry.",
            "cores",
            &["identifier", "urn", "name", "partition", "host"],
            &[],
        )
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.registry_cores(),
        }
    }

    async fn read(&self, _query: NoArguments) -> Result<CoreListing, ProviderError> {
        let cores = self.client.list().await.map_err(|e| {
            ProviderError::backend(Operation::Read, "registry core", "list cores", e)
        })?;
        Ok(CoreListing {
            cores: cores
                .into_iter()
                .map(|c| CoreSummary {
                    identifier: c.identifier,
                    urn: c.urn,
                    name: c.name,
                    partition: c.partition,
                    host: c.host,
                })
                .collect(),
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

    #[tokio::test]
    async fn test_access_keys_are_not_listed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/registry/core"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cores": [
                {"identifier": "c-1", "urn": "urn:core:c-1", "name": "main",
                 "partition": "ksa", "host": "core.neos", "access_key": "AK-123"}
            ]})))
            .mount(&server)
            .await;

        let reader = RegistryCoresReader::from_client(&client_for(&server.uri()));
        let listing = reader.read(NoArguments {}).await.unwrap();
        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(value["cores"][0]["host"], "core.neos");
        assert!(value["cores"][0].get("access_key").is_none());
    }
}
