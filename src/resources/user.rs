//! `neos_user`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::iam::UserClient;
use crate::client::models::{User, UserRequest};
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::{identifier, timestamp, Reconciler, Steps};
use crate::schema::{Attribute, Schema};

const KIND: &str = "user";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRecord {
    pub id: Option<String>,
    pub urn: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub enabled: bool,
    /// Account the user lives in; the provider account when unset.
    pub account: Option<String>,
    pub is_system: Option<bool>,
    pub last_updated: Option<String>,
}

impl UserRecord {
    fn request(&self) -> UserRequest {
        UserRequest {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            username: self.username.clone().unwrap_or_default(),
            email: self.email.clone().unwrap_or_default(),
            enabled: self.enabled,
        }
    }

    fn apply(&mut self, user: &User) {
        self.id = Some(user.identifier.clone());
        self.urn = Some(user.urn.clone()).filter(|u| !u.is_empty());
        self.first_name = user.first_name.clone();
        self.last_name = user.last_name.clone();
        if self.username.is_some() || !user.username.is_empty() {
            self.username = Some(user.username.clone());
        }
        if self.email.is_some() || !user.email.is_empty() {
            self.email = Some(user.email.clone());
        }
        self.enabled = user.enabled;
        self.is_system = Some(user.is_system);
    }
}

#[derive(Debug, Clone)]
pub struct UserResource {
    client: UserClient,
}

#[async_trait]
impl Reconciler for UserResource {
    type Record = UserRecord;
    const TYPE_NAME: &'static str = "neos_user";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A NEOS IAM user.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("urn", Attribute::computed_string())
            .with_attribute("first_name", Attribute::required_string())
            .with_attribute("last_name", Attribute::required_string())
            .with_attribute("username", Attribute::optional_string().with_force_new())
            .with_attribute("email", Attribute::optional_string())
            .with_attribute("enabled", Attribute::required_bool())
            .with_attribute(
                "account",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("Account of the user, defaults to the provider account."),
            )
            .with_attribute("is_system", Attribute::computed_bool())
            .with_attribute("last_updated", Attribute::computed_string())
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.users(),
        }
    }

    async fn create(&self, mut desired: UserRecord) -> Result<UserRecord, ProviderError> {
        let mut steps = Steps::new(Operation::Create, KIND);
        let user = steps
            .run(
                "create user",
                self.client.create(&desired.request(), desired.account.as_deref()),
            )
            .await?;
        desired.apply(&user);
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }

    async fn read(&self, mut current: UserRecord) -> Result<Option<UserRecord>, ProviderError> {
        let id = identifier(&current.id, KIND)?;
        let users = self
            .client
            .list(current.account.as_deref())
            .await
            .map_err(|e| ProviderError::backend(Operation::Read, KIND, "list users", e))?;
        let Some(user) = users.iter().find(|u| u.identifier == id) else {
            return Ok(None);
        };
        current.apply(user);
        Ok(Some(current))
    }

    async fn update(
        &self,
        prior: UserRecord,
        mut desired: UserRecord,
    ) -> Result<UserRecord, ProviderError> {
        let id = identifier(&prior.id, KIND)?;
        let mut steps = Steps::new(Operation::Update, KIND);
        let user = steps
            .run(
                "update user",
                self.client
                    .update(id, &desired.request(), prior.account.as_deref()),
            )
            .await?;
        desired.apply(&user);
        desired.id = prior.id.clone();
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }

    async fn delete(&self, current: UserRecord) -> Result<(), ProviderError> {
        let id = identifier(&current.id, KIND)?;
        self.client
            .delete(id, current.account.as_deref())
            .await
            .map_err(|e| ProviderError::backend(Operation::Delete, KIND, "delete user", e))
    }
}
