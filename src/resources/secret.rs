//! `neos_secret`
//!
//! The backend never returns secret values, only the keys it holds. State
//! is rebuilt from those keys with the values taken from configuration.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::models::{Secret, SecretRequest};
use crate::client::secrets::SecretClient;
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::{identifier, timestamp, Reconciler, Steps};
use crate::schema::{Attribute, AttributeFlags, Schema};

const KIND: &str = "secret";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretRecord {
    pub id: Option<String>,
    pub urn: Option<String>,
    pub name: String,
    pub is_system: Option<bool>,
    pub data: BTreeMap<String, String>,
    pub last_updated: Option<String>,
}

impl SecretRecord {
    fn request(&self) -> SecretRequest {
        SecretRequest {
            name: self.name.clone(),
            data: self.data.clone(),
        }
    }

    fn apply(&mut self, secret: &Secret) {
        self.id = Some(secret.identifier.clone());
        self.urn = Some(secret.urn.clone()).filter(|u| !u.is_empty());
        if !secret.name.is_empty() {
            self.name = secret.name.clone();
        }
        self.is_system = Some(secret.is_system);
        self.data = secret
            .keys
            .iter()
            .map(|key| (key.clone(), self.data.get(key).cloned().unwrap_or_default()))
            .collect();
    }
}

#[derive(Debug, Clone)]
pub struct SecretResource {
    client: SecretClient,
}

#[async_trait]
impl Reconciler for SecretResource {
    type Record = SecretRecord;
    const TYPE_NAME: &'static str = "neos_secret";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A secret stored on the NEOS core.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("urn", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("is_system", Attribute::computed_bool())
            .with_attribute(
                "data",
                Attribute::string_map(AttributeFlags::required().sensitive())
                    .with_description("Secret values by key."),
            )
            .with_attribute("last_updated", Attribute::computed_string())
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.secrets(),
        }
    }

    async fn create(&self, mut desired: SecretRecord) -> Result<SecretRecord, ProviderError> {
        let mut steps = Steps::new(Operation::Create, KIND);
        let secret = steps
            .run("create secret", self.client.create(&desired.request()))
            .await?;
        desired.apply(&secret);
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }

    async fn read(&self, mut current: SecretRecord) -> Result<Option<SecretRecord>, ProviderError> {
        let id = identifier(&current.id, KIND)?;
        let secrets = self
            .client
            .list()
            .await
            .map_err(|e| ProviderError::backend(Operation::Read, KIND, "list secrets", e))?;
        let Some(secret) = secrets.iter().find(|s| s.identifier == id) else {
            return Ok(None);
        };
        current.apply(secret);
        Ok(Some(current))
    }

    async fn update(
        &self,
        prior: SecretRecord,
        mut desired: SecretRecord,
    ) -> Result<SecretRecord, ProviderError> {
        let id = identifier(&prior.id, KIND)?;
        let mut steps = Steps::new(Operation::Update, KIND);
        let secret = steps
            .run("update secret", self.client.update(id, &desired.request()))
            .await?;
        desired.apply(&secret);
        desired.id = prior.id.clone();
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }

    async fn delete(&self, current: SecretRecord) -> Result<(), ProviderError> {
        let id = identifier(&current.id, KIND)?;
        self.client
            .delete(id)
            .await
            .map_err(|e| ProviderError::backend(Operation::Delete, KIND, "delete secret", e))
    }
}
