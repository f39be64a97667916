//! Request and response bodies of the NEOS REST API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response of `POST /login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent calls.
    pub access_token: String,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Token type, normally `bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Credentials sent to `POST /login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    /// User name.
    pub user: &'a str,
    /// Password.
    pub password: &'a str,
}

// ---------------------------------------------------------------------------
// Core entities
// ---------------------------------------------------------------------------

/// Scalar fields of a core entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityPayload {
    /// Entity name.
    pub name: String,
    /// Short label.
    pub label: String,
    /// Free text description.
    pub description: String,
    /// Output type, outputs only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
}

/// Ownership and relationship fields of a core entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    /// Owner of the entity.
    #[serde(default)]
    pub owner: String,
    /// Contact identifiers.
    #[serde(default)]
    pub contact_ids: Vec<String>,
    /// Related links.
    #[serde(default)]
    pub links: Vec<String>,
}

/// Body of `POST /<kind>`.
#[derive(Debug, Clone, Serialize)]
pub struct EntityCreateRequest {
    /// Scalar fields.
    pub entity: EntityPayload,
    /// Ownership and relationship fields.
    pub entity_info: EntityInfo,
}

/// Body of `PUT /<kind>/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct EntityUpdateRequest {
    /// Scalar fields.
    pub entity: EntityPayload,
}

/// A core entity as returned by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Entity {
    /// Backend identifier.
    pub identifier: String,
    /// Globally unique resource name.
    #[serde(default)]
    pub urn: String,
    /// Entity name.
    #[serde(default)]
    pub name: String,
    /// Free text description.
    #[serde(default)]
    pub description: String,
    /// Short label.
    #[serde(default)]
    pub label: String,
    /// Output type, outputs only.
    #[serde(default)]
    pub output_type: Option<String>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Owner, when the listing includes info fields.
    #[serde(default)]
    pub owner: Option<String>,
    /// Contact identifiers, when the listing includes info fields.
    #[serde(default)]
    pub contact_ids: Option<Vec<String>>,
    /// Links, when the listing includes info fields.
    #[serde(default)]
    pub links: Option<Vec<String>>,
}

/// Response of `GET /<kind>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityList {
    /// Entities of the requested kind.
    #[serde(default)]
    pub entities: Vec<Entity>,
}

/// A data source with its secondary payload references.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataSourceDetail {
    /// The entity itself.
    #[serde(flatten)]
    pub entity: Entity,
    /// Identifier of the secret holding the connection credentials.
    #[serde(default)]
    pub secret_identifier: Option<String>,
    /// Connection settings.
    #[serde(default)]
    pub connection: Option<Value>,
}

/// Body of `PUT /data_source/{id}/connection`.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionRequest {
    /// Free-form connection settings.
    pub connection: Value,
}

/// Body of `POST /data_source/{id}/secret`.
#[derive(Debug, Clone, Serialize)]
pub struct DataSourceSecretRequest {
    /// Secret values.
    pub data: BTreeMap<String, String>,
}

/// Response of `POST /data_source/{id}/secret`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataSourceSecretResponse {
    /// Identifier of the created secret.
    #[serde(default)]
    pub identifier: String,
}

/// Body of `PUT /data_unit/{id}/config`.
#[derive(Debug, Clone, Serialize)]
pub struct DataUnitConfigRequest {
    /// Free-form configuration.
    pub configuration: Value,
}

/// Column type of a data product field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataType {
    /// Column type, e.g. `VARCHAR`.
    #[serde(default)]
    pub column_type: String,
    /// Extra type metadata.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

/// One field of a data product schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Field name.
    pub name: String,
    /// Field description.
    #[serde(default)]
    pub description: String,
    /// Part of the primary key.
    #[serde(default)]
    pub primary: bool,
    /// Nullable.
    #[serde(default)]
    pub optional: bool,
    /// Column type.
    #[serde(default)]
    pub data_type: DataType,
}

/// A data product schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSchema {
    /// Product type, e.g. `stored`.
    #[serde(default)]
    pub product_type: String,
    /// Fields in order.
    #[serde(default)]
    pub fields: Vec<SchemaField>,
}

/// Body of `PUT /data_product/{id}/schema`.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSchemaRequest {
    /// The schema.
    pub schema: ProductSchema,
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// One side of a link as returned by the links listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkEntity {
    /// Backend identifier.
    #[serde(default)]
    pub identifier: String,
    /// Globally unique resource name.
    #[serde(default)]
    pub urn: String,
    /// Entity name.
    #[serde(default)]
    pub name: String,
    /// System-managed entity.
    #[serde(default)]
    pub is_system: bool,
    /// Free text description.
    #[serde(default)]
    pub description: String,
    /// Short label.
    #[serde(default)]
    pub label: String,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: String,
    /// Owner.
    #[serde(default)]
    pub owner: String,
    /// Entity kind, e.g. `data_system`.
    #[serde(default)]
    pub entity_type: String,
    /// Output type, outputs only.
    #[serde(default)]
    pub output_type: String,
}

/// A parent/child link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Parent entity.
    #[serde(default)]
    pub parent: LinkEntity,
    /// Child entity.
    #[serde(default)]
    pub child: LinkEntity,
}

/// Response of `GET /link`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkList {
    /// All links.
    #[serde(default)]
    pub links: Vec<Link>,
}

// ---------------------------------------------------------------------------
// IAM
// ---------------------------------------------------------------------------

/// An IAM account.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Account {
    /// Backend identifier.
    pub identifier: String,
    /// Globally unique resource name.
    #[serde(default)]
    pub urn: String,
    /// Account name.
    #[serde(default)]
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Free text description.
    #[serde(default)]
    pub description: String,
    /// Owner.
    #[serde(default)]
    pub owner: String,
    /// System-managed account.
    #[serde(default)]
    pub is_system: bool,
}

/// Response of `GET /accounts`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountList {
    /// All accounts.
    #[serde(default)]
    pub accounts: Vec<Account>,
}

/// Body of `POST /accounts`.
#[derive(Debug, Clone, Serialize)]
pub struct AccountCreateRequest {
    /// Account name.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Free text description.
    pub description: String,
    /// Owner.
    pub owner: String,
}

/// Body of `PUT /accounts/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct AccountUpdateRequest {
    /// Display name.
    pub display_name: String,
    /// Free text description.
    pub description: String,
    /// Owner.
    pub owner: String,
}

/// An IAM group.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Group {
    /// Backend identifier.
    pub identifier: String,
    /// Group name.
    #[serde(default)]
    pub name: String,
    /// Free text description.
    #[serde(default)]
    pub description: String,
    /// System-managed group.
    #[serde(default)]
    pub is_system: bool,
    /// Member principals.
    #[serde(default)]
    pub principals: Vec<String>,
}

/// Response of `GET /groups`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupList {
    /// All groups.
    #[serde(default)]
    pub groups: Vec<Group>,
}

/// Body of `POST /groups` and `PUT /groups/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct GroupRequest {
    /// Group name.
    pub name: String,
    /// Free text description.
    pub description: String,
}

/// Body of the group principal add and remove calls.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalsRequest {
    /// Principals to add or remove.
    pub principals: Vec<String>,
}

/// An IAM user.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct User {
    /// Backend identifier.
    pub identifier: String,
    /// Globally unique resource name.
    #[serde(default)]
    pub urn: String,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Last name.
    #[serde(default)]
    pub last_name: String,
    /// Login name.
    #[serde(default)]
    pub username: String,
    /// E-mail address.
    #[serde(default)]
    pub email: String,
    /// Whether the user may log in.
    #[serde(default)]
    pub enabled: bool,
    /// System-managed user.
    #[serde(default)]
    pub is_system: bool,
}

/// Response of `GET /users`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserList {
    /// All users.
    #[serde(default)]
    pub users: Vec<User>,
}

/// Body of `POST /users` and `PUT /users/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct UserRequest {
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Login name.
    pub username: String,
    /// E-mail address.
    pub email: String,
    /// Whether the user may log in.
    pub enabled: bool,
}

/// A user policy.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Policy {
    /// Principal the policy is attached to.
    pub identifier: String,
    /// Policy document.
    #[serde(default)]
    pub policy: Value,
}

/// Response of `GET /policies`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyList {
    /// All user policies.
    #[serde(default)]
    pub policies: Vec<Policy>,
}

/// Body of `POST /policies`.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyCreateRequest {
    /// Principal the policy is attached to.
    pub principal: String,
    /// Policy document.
    pub policy: Value,
}

/// Body of `PUT /policies/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyUpdateRequest {
    /// Policy document.
    pub policy: Value,
}

// ---------------------------------------------------------------------------
// Secrets and registry
// ---------------------------------------------------------------------------

/// A core secret. Values are never returned, only keys.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Secret {
    /// Backend identifier.
    pub identifier: String,
    /// Globally unique resource name.
    #[serde(default)]
    pub urn: String,
    /// Secret name.
    #[serde(default)]
    pub name: String,
    /// System-managed secret.
    #[serde(default)]
    pub is_system: bool,
    /// Keys stored in the secret.
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Response of `GET /secret`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretList {
    /// All secrets.
    #[serde(default)]
    pub secrets: Vec<Secret>,
}

/// Body of `POST /secret` and `PUT /secret/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct SecretRequest {
    /// Secret name.
    pub name: String,
    /// Secret values.
    pub data: BTreeMap<String, String>,
}

/// A core registered in the registry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RegistryCore {
    /// Backend identifier.
    #[serde(default)]
    pub identifier: String,
    /// Globally unique resource name.
    #[serde(default)]
    pub urn: String,
    /// Core name.
    #[serde(default)]
    pub name: String,
    /// Partition the core lives in.
    #[serde(default)]
    pub partition: String,
    /// Public host of the core.
    #[serde(default)]
    pub host: String,
    /// Access key, only returned at registration.
    #[serde(default)]
    pub access_key: Option<String>,
}

/// Response of `GET /core`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryCoreList {
    /// All cores.
    #[serde(default)]
    pub cores: Vec<RegistryCore>,
}

/// Body of `POST /core`.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryCoreRequest {
    /// Core name.
    pub name: String,
    /// Partition.
    pub partition: String,
}

/// Body of `DELETE /core`.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryCoreDeleteRequest {
    /// Resource name of the core.
    pub urn: String,
}
