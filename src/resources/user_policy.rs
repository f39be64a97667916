//! `neos_user_policy`: the policy document attached to a principal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::iam::PolicyClient;
use crate::client::models::{PolicyCreateRequest, PolicyUpdateRequest};
use crate::client::NeosClient;
use crate::error::{Operation, ProviderError};
use crate::reconcile::{timestamp, Reconciler, Steps};
use crate::schema::{Attribute, Schema};
use crate::validation::{normalize_json, parse_json_payload};

const KIND: &str = "user policy";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPolicyRecord {
    /// Principal the policy is attached to.
    pub id: String,
    /// Policy document, stored normalized.
    pub policy_json: String,
    pub last_updated: Option<String>,
}

impl UserPolicyRecord {
    fn document(&self) -> Result<Value, ProviderError> {
        parse_json_payload("policy_json", &self.policy_json)
    }

    fn normalize(&mut self) -> Result<(), ProviderError> {
        self.policy_json = normalize_json("policy_json", &self.policy_json)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UserPolicyResource {
    client: PolicyClient,
}

#[async_trait]
impl Reconciler for UserPolicyResource {
    type Record = UserPolicyRecord;
    const TYPE_NAME: &'static str = "neos_user_policy";
    const JSON_ATTRIBUTES: &'static [&'static str] = &["policy_json"];

    fn schema() -> Schema {
        Schema::v0()
            .with_description("The IAM policy of a NEOS principal.")
            .with_attribute(
                "id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Identifier of the principal."),
            )
            .with_attribute(
                "policy_json",
                Attribute::required_string().with_description("Policy as a JSON document."),
            )
            .with_attribute("last_updated", Attribute::computed_string())
    }

    fn from_client(client: &NeosClient) -> Self {
        Self {
            client: client.policies(),
        }
    }

    async fn create(&self, mut desired: UserPolicyRecord) -> Result<UserPolicyRecord, ProviderError> {
        let request = PolicyCreateRequest {
            principal: desired.id.clone(),
            policy: desired.document()?,
        };
        let mut steps = Steps::new(Operation::Create, KIND);
        steps
            .run("create policy", self.client.create(&request))
            .await?;
        desired.normalize()?;
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }

    async fn read(
        &self,
        mut current: UserPolicyRecord,
    ) -> Result<Option<UserPolicyRecord>, ProviderError> {
        let policy = match self.client.get(&current.id).await {
            Ok(policy) => policy,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => {
                return Err(ProviderError::backend(Operation::Read, KIND, "get policy", e));
            }
        };
        let local = serde_json::from_str::<Value>(&current.policy_json).ok();
        if local.as_ref() != Some(&policy.policy) {
            current.policy_json = serde_json::to_string(&policy.policy)?;
        }
        Ok(Some(current))
    }

    async fn update(
        &self,
        _prior: UserPolicyRecord,
        mut desired: UserPolicyRecord,
    ) -> Result<UserPolicyRecord, ProviderError> {
        let request = PolicyUpdateRequest {
            policy: desired.document()?,
        };
        let mut steps = Steps::new(Operation::Update, KIND);
        steps
            .run("update policy", self.client.update(&desired.id, &request))
            .await?;
        desired.normalize()?;
        desired.last_updated = Some(timestamp());
        Ok(desired)
    }

    async fn delete(&self, current: UserPolicyRecord) -> Result<(), ProviderError> {
        self.client
            .delete(&current.id)
            .await
            .map_err(|e| ProviderError::backend(Operation::Delete, KIND, "delete policy", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_for;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn desired(policy_json: &str) -> UserPolicyRecord {
        UserPolicyRecord {
            id: "u-1".to_string(),
            policy_json: policy_json.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_posts_for_principal_and_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/iam/policies"))
            .and(body_json(json!({
                "principal": "u-1",
                "policy": {"version": "2022-10-01", "statements": []}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identifier": "u-1",
                "policy": {"version": "2022-10-01", "statements": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = UserPolicyResource::from_client(&client_for(&server.uri()));
        let created = resource
            .create(desired(r#"{ "version": "2022-10-01",  "statements": [] }"#))
            .await
            .unwrap();
        assert_eq!(
            created.policy_json,
            r#"{"statements":[],"version":"2022-10-01"}"#
        );
    }

    #[tokio::test]
    async fn test_read_keeps_equivalent_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/iam/policies/u-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identifier": "u-1",
                "policy": {"statements": [], "version": "2022-10-01"}
            })))
            .mount(&server)
            .await;

        let resource = UserPolicyResource::from_client(&client_for(&server.uri()));
        let current = desired(r#"{"version": "2022-10-01", "statements": []}"#);
        let read = resource.read(current.clone()).await.unwrap().unwrap();
        assert_eq!(read, current);
    }

    #[tokio::test]
    async fn test_read_miss_on_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/iam/policies/u-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resource = UserPolicyResource::from_client(&client_for(&server.uri()));
        assert!(resource.read(desired("{}")).await.unwrap().is_none());
    }
}
