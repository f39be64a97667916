//! The NEOS provider: Configure builds the client once, every other call is
//! routed through the [`Catalogue`] to the handler for its type name.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::config;
use crate::error::ProviderError;
use crate::reconcile::{Catalogue, Configured, ProviderData, ReadMissPolicy};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Every resource and data source type the provider serves.
pub fn catalogue() -> Catalogue {
    crate::data_sources::register(crate::resources::register(Catalogue::new()))
}

/// Hemmer provider for the NEOS platform.
pub struct NeosProvider {
    catalogue: Catalogue,
    configured: RwLock<Option<Arc<Configured>>>,
    env: EnvLookup,
}

impl NeosProvider {
    /// A provider reading `NEOS_*` fallbacks from the process environment.
    pub fn new() -> Self {
        Self::with_env(config::process_env)
    }

    /// A provider with a custom environment lookup.
    pub fn with_env<F>(env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            catalogue: catalogue(),
            configured: RwLock::new(None),
            env: Arc::new(env),
        }
    }

    /// Bind every handler to already built provider data, skipping login.
    pub async fn configure_with_data(
        &self,
        data: &ProviderData,
        read_miss: ReadMissPolicy,
    ) -> Result<(), ProviderError> {
        let configured = self.catalogue.configure(data, read_miss)?;
        *self.configured.write().await = Some(Arc::new(configured));
        Ok(())
    }

    /// Whether Configure has succeeded.
    pub async fn is_configured(&self) -> bool {
        self.configured.read().await.is_some()
    }

    async fn handlers(&self) -> Result<Arc<Configured>, ProviderError> {
        self.configured.read().await.clone().ok_or_else(|| {
            ProviderError::NotConfigured(
                "the NEOS client is not available, Configure must succeed first".to_string(),
            )
        })
    }
}

impl Default for NeosProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NeosProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeosProvider")
            .field("catalogue", &self.catalogue)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ProviderService for NeosProvider {
    fn schema(&self) -> ProviderSchema {
        self.catalogue.provider_schema(config::schema())
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&config::schema(), &config))
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let env = Arc::clone(&self.env);
        let settings = match config::resolve(&config, move |name| env(name)) {
            Ok(settings) => settings,
            Err(diagnostics) => return Ok(diagnostics),
        };
        let client = match config::connect(&settings).await {
            Ok(client) => client,
            Err(e) => return Ok(vec![e.to_diagnostic()]),
        };
        let data: ProviderData = Arc::new(client);
        self.configure_with_data(&data, settings.read_miss).await?;
        info!(
            account = %settings.account,
            partition = %settings.partition,
            read_miss = %settings.read_miss,
            "Configured NEOS client"
        );
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.configured.write().await.take();
        debug!("Released NEOS client");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.catalogue.resource(resource_type)?.validate(&config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let entry = self.catalogue.resource(resource_type)?;
        Ok(entry.plan(prior_state.as_ref(), proposed_state))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.handlers()
            .await?
            .resource(resource_type)?
            .create(planned_state)
            .await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.handlers()
            .await?
            .resource(resource_type)?
            .read(current_state)
            .await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.handlers()
            .await?
            .resource(resource_type)?
            .update(prior_state, planned_state)
            .await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.handlers()
            .await?
            .resource(resource_type)?
            .delete(current_state)
            .await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let state = self.catalogue.resource(resource_type)?.import(id);
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.catalogue.data_source(data_source_type)?.validate(&config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.handlers()
            .await?
            .data_source(data_source_type)?
            .read(config)
            .await
    }
}
