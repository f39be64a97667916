//! Drive a [`ProviderService`] through plan and apply flows without a gRPC
//! server.
//!
//! ```ignore
//! use neos_provider::testing::ProviderTester;
//! use neos_provider::reconcile::ReadMissPolicy;
//! use serde_json::json;
//!
//! let tester = ProviderTester::connected(client, ReadMissPolicy::Remove).await?;
//! let state = tester
//!     .lifecycle_create("neos_data_system", json!({"name": "erp"}))
//!     .await?;
//! assert_eq!(state["name"], "erp");
//! ```

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::client::NeosClient;
use crate::error::ProviderError;
use crate::provider::NeosProvider;
use crate::reconcile::{ProviderData, ReadMissPolicy};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Test harness around a provider.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl ProviderTester<NeosProvider> {
    /// A NEOS provider bound to an existing client, ignoring the process
    /// environment and skipping login.
    pub async fn connected(
        client: NeosClient,
        read_miss: ReadMissPolicy,
    ) -> Result<Self, ProviderError> {
        let provider = NeosProvider::with_env(|_| None);
        let data: ProviderData = Arc::new(client);
        provider.configure_with_data(&data, read_miss).await?;
        Ok(Self::new(provider))
    }
}

impl<P: ProviderService> ProviderTester<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Configure the provider, failing on any error diagnostic.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource with no prior state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed.clone(), proposed)
            .await
    }

    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior: Value,
        proposed: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior), proposed.clone(), proposed)
            .await
    }

    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior), Value::Null, Value::Null)
            .await
    }

    pub async fn create(&self, resource_type: &str, planned: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned).await
    }

    pub async fn read(&self, resource_type: &str, current: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current).await
    }

    pub async fn update(
        &self,
        resource_type: &str,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.update(resource_type, prior, planned).await
    }

    pub async fn delete(&self, resource_type: &str, current: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current).await
    }

    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }

    /// Plan, create, then read back. Returns the state after the read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Plan, update, then read back. A plan that requires replacement is
    /// refused, since the host would destroy and create instead.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior: Value,
        proposed: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior.clone(), proposed)
            .await?;
        if plan.requires_replace {
            return Err(ProviderError::Validation(format!(
                "{} plan requires replacement, not an in-place update",
                resource_type
            )));
        }
        let updated = self
            .update(resource_type, prior, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current.clone()).await?;
        self.delete(resource_type, current).await
    }

    /// Create, update and delete in turn. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial: Value,
        updated: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Failure of a harness call that reports diagnostics.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("{}", render(.0))]
    Diagnostics(Vec<Diagnostic>),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn render(diagnostics: &[Diagnostic]) -> String {
    let lines: Vec<String> = diagnostics
        .iter()
        .map(|d| match &d.detail {
            Some(detail) => format!("{}: {}", d.summary, detail),
            None => d.summary.clone(),
        })
        .collect();
    format!("Diagnostics: {}", lines.join("; "))
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<Diagnostic> = diagnostics.into_iter().filter(|d| d.is_error()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "Expected no changes, got: {:?}",
        plan.changes
    );
}

pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected replacement, changes: {:?}",
        plan.changes
    );
}

pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(plan.has_changes(), "Expected changes but plan is empty");
    assert!(!plan.requires_replace, "Expected in-place update, got replacement");
}

pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected a change to '{}', changed: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let found = diagnostics.iter().any(|d| {
        d.is_error()
            && (d.summary.contains(substring)
                || d.detail.as_deref().is_some_and(|s| s.contains(substring)))
    });
    assert!(
        found,
        "Expected an error containing '{}', got: {:?}",
        substring, diagnostics
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_for;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn system(id: &str, name: &str) -> Value {
        json!({
            "identifier": id,
            "urn": format!("urn:ksa:core:data_system:{}", id),
            "name": name,
            "label": "ERP",
            "description": "",
            "created_at": "2024-05-01T10:00:00Z"
        })
    }

    async fn tester(server: &MockServer, read_miss: ReadMissPolicy) -> ProviderTester<NeosProvider> {
        ProviderTester::connected(client_for(&server.uri()), read_miss)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_data_system_crud() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/gateway/v2/data_system"))
            .respond_with(ResponseTemplate::new(200).set_body_json(system("ds-1", "erp")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/data_system"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"entities": [system("ds-1", "erp")]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/gateway/v2/data_system/ds-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(system("ds-1", "erp")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/gateway/v2/data_system/ds-1/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "owner": "bob", "contact_ids": [], "links": []
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/gateway/v2/data_system/ds-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let tester = tester(&server, ReadMissPolicy::Preserve).await;
        let updated = tester
            .lifecycle_crud(
                "neos_data_system",
                json!({"name": "erp", "label": "ERP"}),
                json!({"name": "erp", "label": "ERP", "owner": "bob"}),
            )
            .await
            .unwrap();
        assert_eq!(updated["id"], "ds-1");
        assert_eq!(updated["owner"], "bob");
        assert_eq!(updated["urn"], "urn:ksa:core:data_system:ds-1");
    }

    #[tokio::test]
    async fn test_vanished_resource_is_removed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/gateway/v2/data_system"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entities": []})))
            .mount(&server)
            .await;

        let tester = tester(&server, ReadMissPolicy::Remove).await;
        let state = tester
            .read("neos_data_system", json!({"id": "ds-1", "name": "erp"}))
            .await
            .unwrap();
        assert_eq!(state, Value::Null);
    }

    #[tokio::test]
    async fn test_link_parent_change_replaces() {
        let server = MockServer::start().await;
        let tester = tester(&server, ReadMissPolicy::Preserve).await;
        let prior = json!({
            "id": "sys-1-src-1",
            "parent_identifier": "sys-1",
            "child_identifier": "src-1",
            "last_updated": "2024-05-01T10:00:00Z"
        });
        let plan = tester
            .plan_update(
                "neos_link_data_system_data_source",
                prior,
                json!({"parent_identifier": "sys-2", "child_identifier": "src-1"}),
            )
            .await
            .unwrap();
        assert_plan_replaces(&plan);
        assert_plan_changes_attribute(&plan, "parent_identifier");

        let err = tester
            .lifecycle_update(
                "neos_link_data_system_data_source",
                json!({"id": "sys-1-src-1", "parent_identifier": "sys-1", "child_identifier": "src-1"}),
                json!({"parent_identifier": "sys-2", "child_identifier": "src-1"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reformatted_json_plans_no_change() {
        let server = MockServer::start().await;
        let tester = tester(&server, ReadMissPolicy::Preserve).await;
        let prior = json!({
            "id": "du-1",
            "urn": "urn:ksa:core:data_unit:du-1",
            "name": "orders",
            "config_json": "{\"a\":1,\"b\":[1,2]}"
        });
        let mut proposed = prior.clone();
        proposed["config_json"] = json!("{ \"b\": [1, 2], \"a\": 1 }");
        let plan = tester
            .plan_update("neos_data_unit", prior.clone(), proposed)
            .await
            .unwrap();
        assert_plan_no_changes(&plan);

        let mut proposed = prior.clone();
        proposed["label"] = json!("ORD");
        let plan = tester
            .plan_update("neos_data_unit", prior, proposed)
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "label");
    }

    #[tokio::test]
    async fn test_invalid_config_is_reported() {
        let server = MockServer::start().await;
        let tester = tester(&server, ReadMissPolicy::Preserve).await;
        let err = tester
            .validate_resource_config(
                "neos_output",
                json!({"name": "board", "output_type": "spreadsheet"}),
            )
            .await
            .unwrap_err();
        match err {
            TestError::Diagnostics(diagnostics) => {
                assert_error_contains(&diagnostics, "output_type");
            }
            other => panic!("unexpected error: {other}"),
        }
        tester
            .validate_data_source_config("neos_links", json!({"parent_type": "data_system"}))
            .await
            .unwrap();
    }

    #[test]
    fn test_catalogue_type_names() {
        let tester = ProviderTester::new(NeosProvider::with_env(|_| None));
        let resources = tester.resource_types();
        let data_sources = tester.data_source_types();
        assert_eq!(resources.len(), 17);
        assert_eq!(data_sources.len(), 11);
        assert!(resources.contains(&"neos_group".to_string()));
        assert!(data_sources.contains(&"neos_registry_cores".to_string()));
        assert!(!data_sources.contains(&"neos_group".to_string()));
    }

    #[test]
    fn test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("Missing Account").with_detail("set account or NEOS_ACCOUNT")
        ]);
        let text = err.to_string();
        assert!(text.contains("Missing Account: set account or NEOS_ACCOUNT"));
    }
}
