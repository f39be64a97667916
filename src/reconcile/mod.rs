//! The reconciliation contract shared by every entity kind.
//!
//! A [`Reconciler`] keeps one typed record in sync with one remote entity.
//! A [`DataReader`] produces a read-only listing. Both are registered in a
//! [`Catalogue`] as plain data (type name, schema, constructor), and the
//! provider only ever talks to them through the type-erased
//! [`ResourceHandler`] and [`DataSourceHandler`] views, which move records
//! in and out of `serde_json::Value`.
//!
//! Configure builds every handler exactly once from the shared
//! [`NeosClient`]; handlers hold nothing mutable afterwards, so the host may
//! call them concurrently for different records.

pub mod diff;
pub mod plan;
pub mod steps;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::NeosClient;
use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::types::PlanResult;
use crate::validation::{check_json_attribute, validate};

pub use diff::SetDiff;
pub use steps::Steps;

/// Opaque value the provider hands to every reconciler at Configure time.
pub type ProviderData = Arc<dyn Any + Send + Sync>;

/// What Read reports when the remote entity no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMissPolicy {
    /// Return the record unchanged.
    #[default]
    Preserve,
    /// Return a null state so the host drops the record.
    Remove,
}

impl ReadMissPolicy {
    /// Configuration spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preserve => "preserve",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for ReadMissPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadMissPolicy {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" => Ok(Self::Preserve),
            "remove" => Ok(Self::Remove),
            other => Err(ProviderError::Configuration(format!(
                "unknown read miss policy '{}'",
                other
            ))),
        }
    }
}

/// Extract the NEOS client from provider data.
pub fn neos_client(data: &ProviderData) -> Result<&NeosClient, ProviderError> {
    data.downcast_ref::<NeosClient>().ok_or_else(|| {
        ProviderError::UnexpectedProviderData(
            "expected a NEOS client. Please report this issue to the provider developers."
                .to_string(),
        )
    })
}

/// RFC 3339 timestamp stamped into `last_updated` after every mutation.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// The identifier of a record, which must have been assigned by Create.
pub fn identifier<'a>(id: &'a Option<String>, kind: &str) -> Result<&'a str, ProviderError> {
    id.as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::Validation(format!("{} has no identifier", kind)))
}

/// Create/Read/Update/Delete for one entity kind.
#[async_trait]
pub trait Reconciler: Send + Sync + Sized + 'static {
    /// The record stored by the host.
    type Record: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Resource type name, e.g. `neos_group`.
    const TYPE_NAME: &'static str;

    /// String attributes holding JSON documents. They are checked for
    /// well-formedness before any backend call and compared semantically
    /// when planning.
    const JSON_ATTRIBUTES: &'static [&'static str] = &[];

    /// Schema of the record.
    fn schema() -> Schema;

    /// Bind to the narrowed sub-client this kind needs.
    fn from_client(client: &NeosClient) -> Self;

    /// State produced by import; Read hydrates the rest.
    fn import(id: &str) -> Value {
        json!({ "id": id })
    }

    /// Validate a configuration before planning.
    fn validate(config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validate(&Self::schema(), config);
        diagnostics.extend(
            Self::JSON_ATTRIBUTES
                .iter()
                .filter_map(|attr| check_json_attribute(config, attr)),
        );
        diagnostics
    }

    /// Create the remote entity and return the observed record.
    async fn create(&self, desired: Self::Record) -> Result<Self::Record, ProviderError>;

    /// Refresh the record. `None` means the entity is gone remotely.
    async fn read(&self, current: Self::Record) -> Result<Option<Self::Record>, ProviderError>;

    /// Apply changes in place. The identifier never changes.
    async fn update(
        &self,
        prior: Self::Record,
        desired: Self::Record,
    ) -> Result<Self::Record, ProviderError>;

    /// Delete the remote entity.
    async fn delete(&self, current: Self::Record) -> Result<(), ProviderError>;
}

/// Read-only listing for one data source kind.
#[async_trait]
pub trait DataReader: Send + Sync + Sized + 'static {
    /// Arguments from the data source block.
    type Query: DeserializeOwned + Send + 'static;
    /// The produced state.
    type Output: Serialize + Send + 'static;

    /// Data source type name, e.g. `neos_groups`.
    const TYPE_NAME: &'static str;

    /// Schema of the data source.
    fn schema() -> Schema;

    /// Bind to the narrowed sub-client this kind needs.
    fn from_client(client: &NeosClient) -> Self;

    /// Produce the listing.
    async fn read(&self, query: Self::Query) -> Result<Self::Output, ProviderError>;
}

/// A configured resource reconciler working on JSON records.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Create the entity.
    async fn create(&self, planned: Value) -> Result<Value, ProviderError>;
    /// Refresh the entity, applying the read-miss policy.
    async fn read(&self, current: Value) -> Result<Value, ProviderError>;
    /// Update the entity.
    async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError>;
    /// Delete the entity.
    async fn delete(&self, current: Value) -> Result<(), ProviderError>;
}

/// A configured data source reader working on JSON records.
#[async_trait]
pub trait DataSourceHandler: Send + Sync {
    /// Produce the listing for a configuration block.
    async fn read(&self, config: Value) -> Result<Value, ProviderError>;
}

struct ErasedReconciler<R> {
    inner: R,
    read_miss: ReadMissPolicy,
}

#[async_trait]
impl<R: Reconciler> ResourceHandler for ErasedReconciler<R> {
    async fn create(&self, planned: Value) -> Result<Value, ProviderError> {
        let desired: R::Record = serde_json::from_value(planned)?;
        let observed = self.inner.create(desired).await?;
        Ok(serde_json::to_value(observed)?)
    }

    async fn read(&self, current: Value) -> Result<Value, ProviderError> {
        let record: R::Record = serde_json::from_value(current.clone())?;
        match self.inner.read(record).await? {
            Some(observed) => Ok(serde_json::to_value(observed)?),
            None => match self.read_miss {
                ReadMissPolicy::Preserve => {
                    warn!(
                        resource_type = R::TYPE_NAME,
                        "Entity not found remotely, keeping state unchanged"
                    );
                    Ok(current)
                }
                ReadMissPolicy::Remove => {
                    warn!(
                        resource_type = R::TYPE_NAME,
                        "Entity not found remotely, removing from state"
                    );
                    Ok(Value::Null)
                }
            },
        }
    }

    async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let prior: R::Record = serde_json::from_value(prior)?;
        let desired: R::Record = serde_json::from_value(planned)?;
        let observed = self.inner.update(prior, desired).await?;
        Ok(serde_json::to_value(observed)?)
    }

    async fn delete(&self, current: Value) -> Result<(), ProviderError> {
        let current: R::Record = serde_json::from_value(current)?;
        self.inner.delete(current).await
    }
}

struct ErasedReader<D>(D);

#[async_trait]
impl<D: DataReader> DataSourceHandler for ErasedReader<D> {
    async fn read(&self, config: Value) -> Result<Value, ProviderError> {
        let config = if config.is_null() { json!({}) } else { config };
        let query: D::Query = serde_json::from_value(config)?;
        let output = self.0.read(query).await?;
        Ok(serde_json::to_value(output)?)
    }
}

/// Registration of one resource type.
#[derive(Clone, Copy)]
pub struct ResourceEntry {
    type_name: &'static str,
    json_attributes: &'static [&'static str],
    schema: fn() -> Schema,
    validate: fn(&Value) -> Vec<Diagnostic>,
    import: fn(&str) -> Value,
    configure: fn(&NeosClient, ReadMissPolicy) -> Box<dyn ResourceHandler>,
}

fn configure_resource<R: Reconciler>(
    client: &NeosClient,
    read_miss: ReadMissPolicy,
) -> Box<dyn ResourceHandler> {
    Box::new(ErasedReconciler {
        inner: R::from_client(client),
        read_miss,
    })
}

impl ResourceEntry {
    /// Registration for a reconciler type.
    pub fn of<R: Reconciler>() -> Self {
        Self {
            type_name: R::TYPE_NAME,
            json_attributes: R::JSON_ATTRIBUTES,
            schema: R::schema,
            validate: R::validate,
            import: R::import,
            configure: configure_resource::<R>,
        }
    }

    /// Resource type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Schema of the resource.
    pub fn schema(&self) -> Schema {
        (self.schema)()
    }

    /// Validate a configuration.
    pub fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        (self.validate)(config)
    }

    /// State produced by importing an external identifier.
    pub fn import(&self, id: &str) -> Value {
        (self.import)(id)
    }

    /// Plan a change from prior state to a proposal.
    pub fn plan(&self, prior: Option<&Value>, proposed: Value) -> PlanResult {
        plan::diff(&self.schema(), self.json_attributes, prior, proposed)
    }
}

impl fmt::Debug for ResourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceEntry")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Registration of one data source type.
#[derive(Clone, Copy)]
pub struct DataSourceEntry {
    type_name: &'static str,
    schema: fn() -> Schema,
    configure: fn(&NeosClient) -> Box<dyn DataSourceHandler>,
}

fn configure_reader<D: DataReader>(client: &NeosClient) -> Box<dyn DataSourceHandler> {
    Box::new(ErasedReader(D::from_client(client)))
}

impl DataSourceEntry {
    /// Registration for a reader type.
    pub fn of<D: DataReader>() -> Self {
        Self {
            type_name: D::TYPE_NAME,
            schema: D::schema,
            configure: configure_reader::<D>,
        }
    }

    /// Data source type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Schema of the data source.
    pub fn schema(&self) -> Schema {
        (self.schema)()
    }

    /// Validate a configuration.
    pub fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validate(&self.schema(), config)
    }
}

impl fmt::Debug for DataSourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceEntry")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Every resource and data source type the provider serves.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    resources: Vec<ResourceEntry>,
    data_sources: Vec<DataSourceEntry>,
}

impl Catalogue {
    /// An empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource type.
    pub fn with_resource<R: Reconciler>(mut self) -> Self {
        self.resources.push(ResourceEntry::of::<R>());
        self
    }

    /// Register a data source type.
    pub fn with_data_source<D: DataReader>(mut self) -> Self {
        self.data_sources.push(DataSourceEntry::of::<D>());
        self
    }

    /// Registered resource types.
    pub fn resources(&self) -> &[ResourceEntry] {
        &self.resources
    }

    /// Registered data source types.
    pub fn data_sources(&self) -> &[DataSourceEntry] {
        &self.data_sources
    }

    /// Look up a resource type.
    pub fn resource(&self, type_name: &str) -> Result<&ResourceEntry, ProviderError> {
        self.resources
            .iter()
            .find(|e| e.type_name == type_name)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    /// Look up a data source type.
    pub fn data_source(&self, type_name: &str) -> Result<&DataSourceEntry, ProviderError> {
        self.data_sources
            .iter()
            .find(|e| e.type_name == type_name)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    /// Full schema, with the given provider block schema.
    pub fn provider_schema(&self, provider: Schema) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(provider);
        let schema = self
            .resources
            .iter()
            .fold(schema, |s, e| s.with_resource(e.type_name, e.schema()));
        self.data_sources
            .iter()
            .fold(schema, |s, e| s.with_data_source(e.type_name, e.schema()))
    }

    /// Bind every registered type to the client carried in `data`.
    pub fn configure(
        &self,
        data: &ProviderData,
        read_miss: ReadMissPolicy,
    ) -> Result<Configured, ProviderError> {
        let client = neos_client(data)?;
        let resources = self
            .resources
            .iter()
            .map(|e| (e.type_name, (e.configure)(client, read_miss)))
            .collect();
        let data_sources = self
            .data_sources
            .iter()
            .map(|e| (e.type_name, (e.configure)(client)))
            .collect();
        debug!(
            resources = self.resources.len(),
            data_sources = self.data_sources.len(),
            read_miss = %read_miss,
            "Configured catalogue"
        );
        Ok(Configured {
            resources,
            data_sources,
            read_miss,
        })
    }
}

/// Handlers bound to a client by one Configure call.
pub struct Configured {
    resources: HashMap<&'static str, Box<dyn ResourceHandler>>,
    data_sources: HashMap<&'static str, Box<dyn DataSourceHandler>>,
    read_miss: ReadMissPolicy,
}

impl Configured {
    /// The handler for a resource type.
    pub fn resource(&self, type_name: &str) -> Result<&dyn ResourceHandler, ProviderError> {
        self.resources
            .get(type_name)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    /// The handler for a data source type.
    pub fn data_source(&self, type_name: &str) -> Result<&dyn DataSourceHandler, ProviderError> {
        self.data_sources
            .get(type_name)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    /// Read-miss policy the handlers were configured with.
    pub fn read_miss(&self) -> ReadMissPolicy {
        self.read_miss
    }
}

impl fmt::Debug for Configured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut resources: Vec<_> = self.resources.keys().collect();
        resources.sort();
        f.debug_struct("Configured")
            .field("resources", &resources)
            .field("read_miss", &self.read_miss)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_for;
    use crate::schema::Attribute;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Note {
        id: Option<String>,
        text: String,
    }

    /// A reconciler over an in-memory store, for exercising the erasure.
    struct Notes {
        store: Mutex<Option<Note>>,
    }

    #[async_trait]
    impl Reconciler for Notes {
        type Record = Note;
        const TYPE_NAME: &'static str = "neos_note";
        const JSON_ATTRIBUTES: &'static [&'static str] = &["text"];

        fn schema() -> Schema {
            Schema::v0()
                .with_attribute("id", Attribute::computed_string())
                .with_attribute("text", Attribute::required_string())
        }

        fn from_client(_client: &NeosClient) -> Self {
            Self {
                store: Mutex::new(None),
            }
        }

        async fn create(&self, mut desired: Note) -> Result<Note, ProviderError> {
            desired.id = Some("n-1".to_string());
            *self.store.lock().unwrap() = Some(desired.clone());
            Ok(desired)
        }

        async fn read(&self, current: Note) -> Result<Option<Note>, ProviderError> {
            let stored = self.store.lock().unwrap().clone();
            Ok(stored.filter(|n| n.id == current.id))
        }

        async fn update(&self, prior: Note, mut desired: Note) -> Result<Note, ProviderError> {
            desired.id = prior.id;
            *self.store.lock().unwrap() = Some(desired.clone());
            Ok(desired)
        }

        async fn delete(&self, _current: Note) -> Result<(), ProviderError> {
            *self.store.lock().unwrap() = None;
            Ok(())
        }
    }

    fn data() -> ProviderData {
        Arc::new(client_for("http://127.0.0.1:9"))
    }

    #[test]
    fn test_read_miss_policy_parse() {
        assert_eq!(
            "preserve".parse::<ReadMissPolicy>().unwrap(),
            ReadMissPolicy::Preserve
        );
        assert_eq!(" Remove ".parse::<ReadMissPolicy>().unwrap(), ReadMissPolicy::Remove);
        assert!("drop".parse::<ReadMissPolicy>().is_err());
        assert_eq!(ReadMissPolicy::default(), ReadMissPolicy::Preserve);
    }

    #[test]
    fn test_unexpected_provider_data() {
        let catalogue = Catalogue::new().with_resource::<Notes>();
        let wrong: ProviderData = Arc::new("not a client".to_string());
        let err = catalogue
            .configure(&wrong, ReadMissPolicy::Preserve)
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnexpectedProviderData(_)));
    }

    #[test]
    fn test_catalogue_lookup_and_schema() {
        let catalogue = Catalogue::new().with_resource::<Notes>();
        assert_eq!(catalogue.resource("neos_note").unwrap().type_name(), "neos_note");
        assert!(matches!(
            catalogue.resource("neos_missing"),
            Err(ProviderError::UnknownResource(_))
        ));
        let schema = catalogue.provider_schema(Schema::v0());
        assert!(schema.resources.contains_key("neos_note"));
        assert_eq!(
            catalogue.resource("neos_note").unwrap().import("n-9"),
            json!({"id": "n-9"})
        );
    }

    #[test]
    fn test_default_validation_checks_json_attributes() {
        let entry = ResourceEntry::of::<Notes>();
        assert!(entry.validate(&json!({"text": "{\"a\": 1}"})).is_empty());
        let diagnostics = entry.validate(&json!({"text": "{not json"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("text"));
    }

    #[tokio::test]
    async fn test_lifecycle_through_erasure() {
        let configured = Catalogue::new()
            .with_resource::<Notes>()
            .configure(&data(), ReadMissPolicy::Preserve)
            .unwrap();
        let handler = configured.resource("neos_note").unwrap();

        let created = handler.create(json!({"text": "hi"})).await.unwrap();
        assert_eq!(created["id"], "n-1");

        let first = handler.read(created.clone()).await.unwrap();
        let second = handler.read(first.clone()).await.unwrap();
        assert_eq!(first, second);

        let updated = handler
            .update(created.clone(), json!({"id": "ignored", "text": "bye"}))
            .await
            .unwrap();
        assert_eq!(updated["id"], "n-1");
        assert_eq!(updated["text"], "bye");
    }

    #[tokio::test]
    async fn test_read_miss_preserve_returns_input_unchanged() {
        let configured = Catalogue::new()
            .with_resource::<Notes>()
            .configure(&data(), ReadMissPolicy::Preserve)
            .unwrap();
        let state = json!({"id": "gone", "text": "stale", "extra": [1, 2]});
        let read = configured
            .resource("neos_note")
            .unwrap()
            .read(state.clone())
            .await
            .unwrap();
        assert_eq!(read, state);
    }

    #[tokio::test]
    async fn test_read_miss_remove_returns_null() {
        let configured = Catalogue::new()
            .with_resource::<Notes>()
            .configure(&data(), ReadMissPolicy::Remove)
            .unwrap();
        assert_eq!(configured.read_miss(), ReadMissPolicy::Remove);
        let read = configured
            .resource("neos_note")
            .unwrap()
            .read(json!({"id": "gone", "text": "stale"}))
            .await
            .unwrap();
        assert!(read.is_null());
    }
}
