//! `neos_account`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::iam::AccountClient;
use crate::client::models::{Account, AccountCreateRequest, AccountUpdateRequest};
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::{identifier, timestamp, Reconciler, Steps};
use crate::schema::{Attribute, Schema};

const KIND: &str = "account";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountRecord {
    pub id: Option<String>,
    pub urn: Option<String>,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub is_system: Option<bool>,
    pub last_updated: Option<String>,
}

impl AccountRecord {
    fn apply(&mut self, account: &Account) {
        self.id = Some(account.identifier.clone());
        self.urn = Some(account.urn.clone()).filter(|u| !u.is_empty());
        self.name = account.name.clone();
        if self.display_name.is_some() || !account.display_name.is_empty() {
            self.display_name = Some(account.display_name.clone());
        }
        if self.description.is_some() || !account.description.is_empty() {
            self.description = Some(account.description.clone());
        }
        if self.owner.is_some() || !account.owner.is_empty() {
            self.owner = Some(account.owner.clone());
        }
        self.is_system = Some(account.is_system);
    }
}

#[derive(Debug, Clone)]
pub struct AccountResource {
    client: AccountClient,
}

#[async_trait]
impl Reconciler for AccountResource {
    type Record = AccountRecord;
    const TYPE_NAME: &'static str = "neos_account";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A NEOS IAM account.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("urn", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("display_name", Attribute::optional_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("owner", Attribute::optional_string())
            .with_attribute("is_system", Attribute::computed_bool())
            .with_attribute("last_updated", Attribute::computed_string())
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.accounts(),
        }
    }

    async fn create(&self, mut desired: AccountRecord) -> Result<AccountRecord, ProviderError> {
        let request = AccountCreateRequest {
            name: desired.name.clone(),
            display_name: desired.display_name.clone().unwrap_or_default(),
            description: desired.description.clone().unwrap_or_default(),
            owner: desired.owner.clone().unwrap_or_default(),
        };
        let mut steps = Steps::new(Operation::Create, KIND);
        let account = steps
            .run("create account", self.client.create(&request))
            .await?;
        desired.apply(&account);
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }

    async fn read(&self, mut current: AccountRecord) -> Result<Option<AccountRecord>, ProviderError> {
        let id = identifier(&current.id, KIND)?;
        let accounts = self
            .client
            .list()
            .await
            .map_err(|e| ProviderError::backend(Operation::Read, KIND, "list accounts", e))?;
        let Some(account) = accounts.iter().find(|a| a.identifier == id) else {
            return Ok(None);
        };
        current.apply(account);
        Ok(Some(current))
    }

    async fn update(
        &self,
        prior: AccountRecord,
        mut desired: AccountRecord,
    ) -> Result<AccountRecord, ProviderError> {
        let id = identifier(&prior.id, KIND)?;
        let request = AccountUpdateRequest {
            display_name: desired.display_name.clone().unwrap_or_default(),
            description: desired.description.clone().unwrap_or_default(),
            owner: desired.owner.clone().unwrap_or_default(),
        };
        let mut steps = Steps::new(Operation::Update, KIND);
        let account = steps
            .run("update account", self.client.update(id, &request))
            .await?;
        desired.apply(&account);
        desired.id = prior.id.clone();
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }

    async fn delete(&self, current: AccountRecord) -> Result<(), ProviderError> {
        let id = identifier(&current.id, KIND)?;
        self.client
            .delete(id)
            .await
            .map_err(|e| ProviderError::backend(Operation::Delete, KIND, "delete account", e))
    }
}
