//! Listings of IAM accounts, groups, users and user policies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{listing_schema, NoArguments};
use crate::client::iam::{AccountClient, GroupClient, PolicyClient, UserClient};
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::DataReader;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Optional account filter for group and user listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccountQuery {
    pub account: Option<String>,
}

fn with_account_argument(schema: Schema) -> Schema {
    schema.with_attribute(
        "account",
        Attribute::optional_string()
            .with_description("Account to list, defaults to the provider account."),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub id: String,
    pub urn: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub owner: String,
    pub is_system: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountListing {
    pub accounts: Vec<AccountSummary>,
}

/// `neos_accounts`
#[derive(Debug, Clone)]
pub struct AccountsReader {
    client: AccountClient,
}

#[async_trait]
impl DataReader for AccountsReader {
    type Query = NoArguments;
    type Output = AccountListing;
    const TYPE_NAME: &'static str = "neos_accounts";

    fn schema() -> Schema {
        listing_schema(
            "Every NEOS IAM account.",
            "accounts",
            &["id", "urn", "name", "display_name", "description", "owner", "is_system"],
            &["is_system"],
        )
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.accounts(),
        }
    }

    async fn read(&self, _query: NoArguments) -> Result<AccountListing, ProviderError> {
        let accounts = self
            .client
            .list()
            .await
            .map_err(|e| ProviderError::backend(Operation::Read, "account", "list accounts", e))?;
        Ok(AccountListing {
            accounts: accounts
                .into_iter()
                .map(|a| AccountSummary {
                    id: a.identifier,
                    urn: a.urn,
                    name: a.name,
                    display_name: a.display_name,
                    description: a.description,
                    owner: a.owner,
                    is_system: a.is_system,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_system: bool,
    pub principals: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupListing {
    pub account: Option<String>,
    pub groups: Vec<GroupSummary>,
}

/// `neos_groups`
#[derive(Debug, Clone)]
pub struct GroupsReader {
    client: GroupClient,
}

#[async_trait]
impl DataReader for GroupsReader {
    type Query = AccountQuery;
    type Output = GroupListing;
    const TYPE_NAME: &'static str = "neos_groups";

    fn schema() -> Schema {
        let group = AttributeType::object([
            ("id", AttributeType::String),
            ("name", AttributeType::String),
            ("description", AttributeType::String),
            ("is_system", AttributeType::Bool),
            ("principals", AttributeType::list(AttributeType::String)),
        ]);
        with_account_argument(
            Schema::v0()
                .with_description("Every IAM group of an account.")
                .with_attribute(
                    "groups",
                    Attribute::new(AttributeType::list(group), AttributeFlags::computed()),
                ),
        )
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.groups(),
        }
    }

    async fn read(&self, query: AccountQuery) -> Result<GroupListing, ProviderError> {
        let groups = self
            .client
            .list(query.account.as_deref())
            .await
            .map_err(|e| ProviderError::backend(Operation::Read, "group", "list groups", e))?;
        debug!(count = groups.len(), account = ?query.account, "Listed groups");
        Ok(GroupListing {
            account: query.account,
            groups: groups
                .into_iter()
                .map(|g| GroupSummary {
                    id: g.identifier,
                    name: g.name,
                    description: g.description,
                    is_system: g.is_system,
                    principals: g.principals,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub urn: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub enabled: bool,
    pub is_system: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserListing {
    pub account: Option<String>,
    pub users: Vec<UserSummary>,
}

/// `neos_users`
#[derive(Debug, Clone)]
pub struct UsersReader {
    client: UserClient,
}

#[async_trait]
impl DataReader for UsersReader {
    type Query = AccountQuery;
    type Output = UserListing;
    const TYPE_NAME: &'static str = "neos_users";

    fn schema() -> Schema {
        with_account_argument(listing_schema(
            "Every IAM user of an account.",
            "users",
            &[
                "id",
                "urn",
                "first_name",
                "last_name",
                "username",
                "email",
                "enabled",
                "is_system",
            ],
            &["enabled", "is_system"],
        ))
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.users(),
        }
    }

    async fn read(&self, query: AccountQuery) -> Result<UserListing, ProviderError> {
        let users = self
            .client
            .list(query.account.as_deref())
            .await
            .map_err(|e| ProviderError::backend(Operation::Read, "user", "list users", e))?;
        Ok(UserListing {
            account: query.account,
            users: users
                .into_iter()
                .map(|u| UserSummary {
                    id: u.identifier,
                    urn: u.urn,
                    first_name: u.first_name,
                    last_name: u.last_name,
                    username: u.username,
                    email: u.email,
                    enabled: u.enabled,
                    is_system: u.is_system,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicySummary {
    pub id: String,
    pub policy_json: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyListing {
    pub user_policies: Vec<PolicySummary>,
}

/// `neos_user_policies`
#[derive(Debug, Clone)]
pub struct UserPoliciesReader {
    client: PolicyClient,
}

#[async_trait]
impl DataReader for UserPoliciesReader {
    type Query = NoArguments;
    type Output = PolicyListing;
    const TYPE_NAME: &'static str = "neos_user_policies";

    fn schema() -> Schema {
        listing_schema(
            "Every IAM user policy.",
            "user_policies",
            &["id", "policy_json"],
            &[],
        )
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.policies(),
        }
    }

    async fn read(&self, _query: NoArguments) -> Result<PolicyListing, ProviderError> {
        let policies = self.client.list().await.map_err(|e| {
            ProviderError::backend(Operation::Read, "user policy", "list policies", e)
        })?;
        let user_policies = policies
            .into_iter()
            .map(|p| {
                Ok(PolicySummary {
                    id: p.identifier,
                    policy_json: serde_json::to_string(&p.policy)?,
                })
            })
            .collect::<Result<_, ProviderError>>()?;
        Ok(PolicyListing { user_policies })
    }
}
