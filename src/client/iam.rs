//! IAM service: accounts, groups, users and user policies.
//!
//! Group and user calls accept an optional account override; `None` or an
//! empty string falls back to the account the client was configured with.

use std::sync::Arc;

use super::models::{
    Account, AccountCreateRequest, AccountList, AccountUpdateRequest, Group, GroupList,
    GroupRequest, Policy, PolicyCreateRequest, PolicyList, PolicyUpdateRequest,
    PrincipalsRequest, User, UserList, UserRequest,
};
use super::{ClientContext, ClientError};

/// IAM accounts.
#[derive(Debug, Clone)]
pub struct AccountClient {
    ctx: Arc<ClientContext>,
}

impl AccountClient {
    pub(crate) fn new(ctx: Arc<ClientContext>) -> Self {
        Self { ctx }
    }

    fn url(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/accounts/{}", self.ctx.endpoints().iam, id),
            None => format!("{}/accounts", self.ctx.endpoints().iam),
        }
    }

    /// List all accounts.
    pub async fn list(&self) -> Result<Vec<Account>, ClientError> {
        let list: AccountList = self.ctx.get(&self.url(None), None).await?;
        Ok(list.accounts)
    }

    /// Create an account.
    pub async fn create(&self, request: &AccountCreateRequest) -> Result<Account, ClientError> {
        self.ctx.post(&self.url(None), request, None).await
    }

    /// Update an account.
    pub async fn update(
        &self,
        id: &str,
        request: &AccountUpdateRequest,
    ) -> Result<Account, ClientError> {
        self.ctx.put(&self.url(Some(id)), request, None).await
    }

    /// Delete an account.
    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.ctx.delete::<()>(&self.url(Some(id)), None, None).await
    }
}

/// IAM groups and their principals.
#[derive(Debug, Clone)]
pub struct GroupClient {
    ctx: Arc<ClientContext>,
}

impl GroupClient {
    pub(crate) fn new(ctx: Arc<ClientContext>) -> Self {
        Self { ctx }
    }

    fn url(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/groups/{}", self.ctx.endpoints().iam, id),
            None => format!("{}/groups", self.ctx.endpoints().iam),
        }
    }

    fn principals_url(&self, id: &str) -> String {
        format!("{}/principals", self.url(Some(id)))
    }

    /// List all groups of an account.
    pub async fn list(&self, account: Option<&str>) -> Result<Vec<Group>, ClientError> {
        let list: GroupList = self.ctx.get(&self.url(None), account).await?;
        Ok(list.groups)
    }

    /// Fetch one group.
    pub async fn get(&self, id: &str, account: Option<&str>) -> Result<Group, ClientError> {
        self.ctx.get(&self.url(Some(id)), account).await
    }

    /// Create a group without members.
    pub async fn create(
        &self,
        request: &GroupRequest,
        account: Option<&str>,
    ) -> Result<Group, ClientError> {
        self.ctx.post(&self.url(None), request, account).await
    }

    /// Update name and description of a group.
    pub async fn update(
        &self,
        id: &str,
        request: &GroupRequest,
        account: Option<&str>,
    ) -> Result<Group, ClientError> {
        self.ctx.put(&self.url(Some(id)), request, account).await
    }

    /// Delete a group.
    pub async fn delete(&self, id: &str, account: Option<&str>) -> Result<(), ClientError> {
        self.ctx.delete::<()>(&self.url(Some(id)), None, account).await
    }

    /// Add principals; returns the group with its resulting membership.
    pub async fn add_principals(
        &self,
        id: &str,
        principals: Vec<String>,
        account: Option<&str>,
    ) -> Result<Group, ClientError> {
        self.ctx
            .post(&self.principals_url(id), &PrincipalsRequest { principals }, account)
            .await
    }

    /// Remove principals. Returns the group with its resulting membership
    /// when the backend sends one back.
    pub async fn remove_principals(
        &self,
        id: &str,
        principals: Vec<String>,
        account: Option<&str>,
    ) -> Result<Option<Group>, ClientError> {
        self.ctx
            .delete_returning(
                &self.principals_url(id),
                Some(&PrincipalsRequest { principals }),
                account,
            )
            .await
    }
}

/// IAM users.
#[derive(Debug, Clone)]
pub struct UserClient {
    ctx: Arc<ClientContext>,
}

impl UserClient {
    pub(crate) fn new(ctx: Arc<ClientContext>) -> Self {
        Self { ctx }
    }

    fn url(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/users/{}", self.ctx.endpoints().iam, id),
            None => format!("{}/users", self.ctx.endpoints().iam),
        }
    }

    /// List all users of an account.
    pub async fn list(&self, account: Option<&str>) -> Result<Vec<User>, ClientError> {
        let list: UserList = self.ctx.get(&self.url(None), account).await?;
        Ok(list.users)
    }

    /// Create a user.
    pub async fn create(
        &self,
        request: &UserRequest,
        account: Option<&str>,
    ) -> Result<User, ClientError> {
        self.ctx.post(&self.url(None), request, account).await
    }

    /// Update a user.
    pub async fn update(
        &self,
        id: &str,
        request: &UserRequest,
        account: Option<&str>,
    ) -> Result<User, ClientError> {
        self.ctx.put(&self.url(Some(id)), request, account).await
    }

    /// Delete a user.
    pub async fn delete(&self, id: &str, account: Option<&str>) -> Result<(), ClientError> {
        self.ctx.delete::<()>(&self.url(Some(id)), None, account).await
    }
}

/// IAM user policies.
#[derive(Debug, Clone)]
pub struct PolicyClient {
    ctx: Arc<ClientContext>,
}

impl PolicyClient {
    pub(crate) fn new(ctx: Arc<ClientContext>) -> Self {
        Self { ctx }
    }

    fn url(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/policies/{}", self.ctx.endpoints().iam, id),
            None => format!("{}/policies", self.ctx.endpoints().iam),
        }
    }

    /// List all user policies.
    pub async fn list(&self) -> Result<Vec<Policy>, ClientError> {
        let list: PolicyList = self.ctx.get(&self.url(None), None).await?;
        Ok(list.policies)
    }

    /// Fetch the policy attached to a principal.
    pub async fn get(&self, id: &str) -> Result<Policy, ClientError> {
        self.ctx.get(&self.url(Some(id)), None).await
    }

    /// Attach a policy to a principal.
    pub async fn create(&self, request: &PolicyCreateRequest) -> Result<Policy, ClientError> {
        self.ctx.post(&self.url(None), request, None).await
    }

    /// Replace the policy attached to a principal.
    pub async fn update(
        &self,
        id: &str,
        request: &PolicyUpdateRequest,
    ) -> Result<Policy, ClientError> {
        self.ctx.put(&self.url(Some(id)), request, None).await
    }

    /// Detach the policy from a principal.
    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.ctx.delete::<()>(&self.url(Some(id)), None, None).await
    }
}

#[cfg(test)]
mod tests {
    use crate::client::test_support::client_for;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_group_calls_honour_account_override() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/iam/groups/g-1"))
            .and(header("x-account", "other"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identifier": "g-1",
                "name": "analysts",
                "principals": ["u-1"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let group = client.groups().get("g-1", Some("other")).await.unwrap();
        assert_eq!(group.name, "analysts");
        assert_eq!(group.principals, vec!["u-1".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_account_override_uses_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/iam/users"))
            .and(header("x-account", "acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"users": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        assert!(client.users().list(Some("")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_principal_add_and_remove() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/iam/groups/g-1/principals"))
            .and(body_json(json!({"principals": ["u-2"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identifier": "g-1",
                "principals": ["u-1", "u-2"]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/iam/groups/g-1/principals"))
            .and(body_json(json!({"principals": ["u-1"]})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let groups = client_for(&server.uri()).groups();
        let group = groups
            .add_principals("g-1", vec!["u-2".into()], None)
            .await
            .unwrap();
        assert_eq!(group.principals.len(), 2);
        let removed = groups
            .remove_principals("g-1", vec!["u-1".into()], None)
            .await
            .unwrap();
        assert!(removed.is_none());
    }
}
