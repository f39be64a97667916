//! `neos_group`: an IAM group and its member principals.
//!
//! Membership is reconciled with a [`SetDiff`] against the group as the
//! backend currently reports it: additions are applied before removals, and
//! nothing is sent when the memberships already match.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::iam::GroupClient;
use crate::client::models::{Group, GroupRequest};
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::{identifier, timestamp, Reconciler, SetDiff, Steps};
use crate::schema::{Attribute, AttributeFlags, Schema};

const KIND: &str = "group";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupRecord {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    /// Member principals, compared as a set.
    pub principals: Option<Vec<String>>,
    /// Account the group lives in; the provider account when unset.
    pub account: Option<String>,
    pub is_system: Option<bool>,
    pub last_updated: Option<String>,
}

impl GroupRecord {
    fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    fn request(&self) -> GroupRequest {
        GroupRequest {
            name: self.name.clone(),
            description: self.description.clone().unwrap_or_default(),
        }
    }

    fn desired_principals(&self) -> BTreeSet<String> {
        self.principals.iter().flatten().cloned().collect()
    }

    /// Record the observed membership, keeping the local list when it
    /// already names the same principals.
    fn observe_principals(&mut self, observed: &BTreeSet<String>) {
        if self.desired_principals() == *observed {
            return;
        }
        self.principals = if observed.is_empty() && self.principals.is_none() {
            None
        } else {
            Some(observed.iter().cloned().collect())
        };
    }

    fn apply(&mut self, group: &Group) {
        self.id = Some(group.identifier.clone());
        self.name = group.name.clone();
        if self.description.is_some() || !group.description.is_empty() {
            self.description = Some(group.description.clone());
        }
        self.is_system = Some(group.is_system);
    }
}

#[derive(Debug, Clone)]
pub struct GroupResource {
    client: GroupClient,
}

impl GroupResource {
    /// Move the membership of group `id` from `current` to the desired set.
    /// Returns the resulting membership.
    async fn reconcile_principals(
        &self,
        steps: &mut Steps,
        id: &str,
        account: Option<&str>,
        desired: &GroupRecord,
        current: &[String],
    ) -> Result<BTreeSet<String>, ProviderError> {
        let diff = SetDiff::between(desired.desired_principals(), current.iter().cloned());
        let mut observed: BTreeSet<String> = diff.apply(current);
        if diff.is_empty() {
            debug!(id = %id, "Group membership already matches");
            return Ok(observed);
        }

        if !diff.to_add.is_empty() {
            let group = steps
                .run(
                    "add principals",
                    self.client.add_principals(id, diff.additions(), account),
                )
                .await?;
            observed = group.principals.into_iter().collect();
        }
        if !diff.to_remove.is_empty() {
            let group = steps
                .run(
                    "remove principals",
                    self.client.remove_principals(id, diff.removals(), account),
                )
                .await?;
            observed = match group {
                Some(group) => group.principals.into_iter().collect(),
                None => observed.difference(&diff.to_remove).cloned().collect(),
            };
        }
        Ok(observed)
    }
}

#[async_trait]
impl Reconciler for GroupResource {
    type Record = GroupRecord;
    const TYPE_NAME: &'static str = "neos_group";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A NEOS IAM group.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "principals",
                Attribute::string_set(AttributeFlags::optional())
                    .with_description("Identifiers of the member principals."),
            )
            .with_attribute(
                "account",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("Account of the group, defaults to the provider account."),
            )
            .with_attribute("is_system", Attribute::computed_bool())
            .with_attribute("last_updated", Attribute::computed_string())
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.groups(),
        }
    }

    async fn create(&self, mut desired: GroupRecord) -> Result<GroupRecord, ProviderError> {
        let mut steps = Steps::new(Operation::Create, KIND);
        let group = steps
            .run(
                "create group",
                self.client.create(&desired.request(), desired.account()),
            )
            .await?;
        let observed = self
            .reconcile_principals(
                &mut steps,
                &group.identifier,
                desired.account(),
                &desired,
                &group.principals,
            )
            .await?;

        desired.apply(&group);
        desired.observe_principals(&observed);
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }

    async fn read(&self, mut current: GroupRecord) -> Result<Option<GroupRecord>, ProviderError> {
        let id = identifier(&current.id, KIND)?;
        let groups = self
            .client
            .list(current.account())
            .await
            .map_err(|e| ProviderError::backend(Operation::Read, KIND, "list groups", e))?;
        let Some(group) = groups.iter().find(|g| g.identifier == id) else {
            return Ok(None);
        };
        current.apply(group);
        current.observe_principals(&group.principals.iter().cloned().collect());
        Ok(Some(current))
    }

    async fn update(
        &self,
        prior: GroupRecord,
        mut desired: GroupRecord,
    ) -> Result<GroupRecord, ProviderError> {
        let id = identifier(&prior.id, KIND)?;
        let account = prior.account();

        let mut steps = Steps::new(Operation::Update, KIND);
        steps
            .run("update group", self.client.update(id, &desired.request(), account))
            .await?;
        let group = steps
            .run("get group", self.client.get(id, account))
            .await?;
        let observed = self
            .reconcile_principals(&mut steps, id, account, &desired, &group.principals)
            .await?;

        desired.apply(&group);
        desired.observe_principals(&observed);
        desired.id = prior.id.clone();
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }

    async fn delete(&self, current: GroupRecord) -> Result<(), ProviderError> {
        let id = identifier(&current.id, KIND)?;
        self.client
            .delete(id, current.account())
            .await
            .map_err(|e| ProviderError::backend(Operation::Delete, KIND, "delete group", e))
    }
}
