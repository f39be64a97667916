//! Provider bootstrap: resolve connection settings from the provider block
//! and the environment, then log in once.
//!
//! Block values win over `NEOS_*` environment variables. Every missing or
//! invalid field is reported in the same batch of diagnostics so the
//! operator sees all problems in one pass.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::client::{auth, Endpoints, NeosClient};
use crate::error::ProviderError;
use crate::reconcile::ReadMissPolicy;
use crate::schema::{Attribute, Diagnostic, Schema};

/// Scheme used when neither the block nor the environment sets one.
pub const DEFAULT_SCHEME: &str = "https";

/// Raw provider block as sent by the host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// IAM (hub) host.
    pub iam_host: Option<String>,
    /// Registry host.
    pub registry_host: Option<String>,
    /// Core gateway host.
    pub core_host: Option<String>,
    /// Account context.
    pub account: Option<String>,
    /// Partition context.
    pub partition: Option<String>,
    /// Login name.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// `http` or `https`.
    pub scheme: Option<String>,
    /// `preserve` or `remove`.
    pub read_miss: Option<String>,
}

/// Fully resolved connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    /// Service base URLs.
    pub endpoints: Endpoints,
    /// Default account context.
    pub account: String,
    /// Partition context.
    pub partition: String,
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// What Read does when the remote entity is gone.
    pub read_miss: ReadMissPolicy,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("endpoints", &self.endpoints)
            .field("account", &self.account)
            .field("partition", &self.partition)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("read_miss", &self.read_miss)
            .finish()
    }
}

struct Field {
    attribute: &'static str,
    env: &'static str,
    label: &'static str,
}

const IAM_HOST: Field = Field {
    attribute: "iam_host",
    env: "NEOS_IAM_HOST",
    label: "IAM host",
};
const REGISTRY_HOST: Field = Field {
    attribute: "registry_host",
    env: "NEOS_REGISTRY_HOST",
    label: "registry host",
};
const CORE_HOST: Field = Field {
    attribute: "core_host",
    env: "NEOS_CORE_HOST",
    label: "core host",
};
const ACCOUNT: Field = Field {
    attribute: "account",
    env: "NEOS_ACCOUNT",
    label: "account",
};
const PARTITION: Field = Field {
    attribute: "partition",
    env: "NEOS_PARTITION",
    label: "partition",
};
const USERNAME: Field = Field {
    attribute: "username",
    env: "NEOS_USERNAME",
    label: "username",
};
const PASSWORD: Field = Field {
    attribute: "password",
    env: "NEOS_PASSWORD",
    label: "password",
};
const SCHEME: Field = Field {
    attribute: "scheme",
    env: "NEOS_SCHEME",
    label: "scheme",
};
const READ_MISS: Field = Field {
    attribute: "read_miss",
    env: "NEOS_READ_MISS",
    label: "read miss policy",
};

/// Schema of the provider block.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Connection settings for the NEOS platform.")
        .with_attribute(
            IAM_HOST.attribute,
            Attribute::optional_string().with_description("IAM host. Env: NEOS_IAM_HOST."),
        )
        .with_attribute(
            REGISTRY_HOST.attribute,
            Attribute::optional_string()
                .with_description("Registry host. Env: NEOS_REGISTRY_HOST."),
        )
        .with_attribute(
            CORE_HOST.attribute,
            Attribute::optional_string().with_description("Core gateway host. Env: NEOS_CORE_HOST."),
        )
        .with_attribute(
            ACCOUNT.attribute,
            Attribute::optional_string().with_description("Account context. Env: NEOS_ACCOUNT."),
        )
        .with_attribute(
            PARTITION.attribute,
            Attribute::optional_string()
                .with_description("Partition context. Env: NEOS_PARTITION."),
        )
        .with_attribute(
            USERNAME.attribute,
            Attribute::optional_string().with_description("Login name. Env: NEOS_USERNAME."),
        )
        .with_attribute(
            PASSWORD.attribute,
            Attribute::optional_string()
                .sensitive()
                .with_description("Login password. Env: NEOS_PASSWORD."),
        )
        .with_attribute(
            SCHEME.attribute,
            Attribute::optional_string()
                .with_description("`http` or `https` (default). Env: NEOS_SCHEME."),
        )
        .with_attribute(
            READ_MISS.attribute,
            Attribute::optional_string().with_description(
                "`preserve` (default) keeps state when an entity is gone remotely, \
                 `remove` drops it. Env: NEOS_READ_MISS.",
            ),
        )
}

/// Look a variable up in the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn pick<F>(block: &Option<String>, field: &Field, env: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    block
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| env(field.env).filter(|v| !v.trim().is_empty()))
}

fn missing(field: &Field) -> Diagnostic {
    Diagnostic::error(format!("Missing NEOS {}", field.label))
        .with_detail(format!(
            "The provider cannot create the NEOS API client as there is a missing or empty \
             value for the NEOS {}. Set the {} value in the configuration or use the {} \
             environment variable. If either is already set, ensure the value is not empty.",
            field.label, field.attribute, field.env
        ))
        .with_attribute(field.attribute)
}

fn invalid(field: &Field, value: &str, allowed: &str) -> Diagnostic {
    Diagnostic::error(format!("Invalid NEOS {}", field.label))
        .with_detail(format!("'{}' is not one of {}.", value, allowed))
        .with_attribute(field.attribute)
}

/// Resolve settings from the provider block, falling back to `env`.
pub fn resolve<F>(config: &Value, env: F) -> Result<Settings, Vec<Diagnostic>>
where
    F: Fn(&str) -> Option<String>,
{
    let block: ProviderConfig = match config {
        Value::Null => ProviderConfig::default(),
        other => serde_json::from_value(other.clone()).map_err(|e| {
            vec![Diagnostic::error("Invalid provider configuration").with_detail(e.to_string())]
        })?,
    };

    let mut diagnostics = Vec::new();
    let mut required = |value: &Option<String>, field: &Field| {
        let resolved = pick(value, field, &env);
        if resolved.is_none() {
            diagnostics.push(missing(field));
        }
        resolved.unwrap_or_default()
    };

    let iam_host = required(&block.iam_host, &IAM_HOST);
    let registry_host = required(&block.registry_host, &REGISTRY_HOST);
    let core_host = required(&block.core_host, &CORE_HOST);
    let account = required(&block.account, &ACCOUNT);
    let partition = required(&block.partition, &PARTITION);
    let username = required(&block.username, &USERNAME);
    let password = required(&block.password, &PASSWORD);

    let scheme = pick(&block.scheme, &SCHEME, &env).unwrap_or_else(|| DEFAULT_SCHEME.to_string());
    if scheme != "http" && scheme != "https" {
        diagnostics.push(invalid(&SCHEME, &scheme, "`http`, `https`"));
    }

    let read_miss = match pick(&block.read_miss, &READ_MISS, &env) {
        None => ReadMissPolicy::default(),
        Some(raw) => raw.parse::<ReadMissPolicy>().unwrap_or_else(|_| {
            diagnostics.push(invalid(&READ_MISS, &raw, "`preserve`, `remove`"));
            ReadMissPolicy::default()
        }),
    };

    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    Ok(Settings {
        endpoints: Endpoints::from_hosts(&scheme, &iam_host, &registry_host, &core_host),
        account,
        partition,
        username,
        password,
        read_miss,
    })
}

/// Log in and build the shared client.
pub async fn connect(settings: &Settings) -> Result<NeosClient, ProviderError> {
    info!(
        iam = %settings.endpoints.iam,
        username = %settings.username,
        account = %settings.account,
        "Creating NEOS client"
    );
    auth::connect(
        settings.endpoints.clone(),
        &settings.username,
        &settings.password,
        &settings.account,
        &settings.partition,
    )
    .await
    .map_err(|e| ProviderError::Authentication(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn full_block() -> Value {
        json!({
            "iam_host": "hub.neos",
            "registry_host": "hub.neos",
            "core_host": "core.neos",
            "account": "acme",
            "partition": "ksa",
            "username": "admin",
            "password": "secret"
        })
    }

    #[test]
    fn test_resolve_from_block() {
        let settings = resolve(&full_block(), env_from(&[])).unwrap();
        assert_eq!(settings.endpoints.iam, "https://hub.neos/api/iam");
        assert_eq!(settings.endpoints.core, "https://core.neos/api/gateway/v2");
        assert_eq!(settings.account, "acme");
        assert_eq!(settings.read_miss, ReadMissPolicy::Preserve);
    }

    #[test]
    fn test_block_wins_over_env() {
        let env = env_from(&[
            ("NEOS_ACCOUNT", "from-env"),
            ("NEOS_SCHEME", "http"),
            ("NEOS_READ_MISS", "remove"),
        ]);
        let settings = resolve(&full_block(), env).unwrap();
        assert_eq!(settings.account, "acme");
        assert_eq!(settings.endpoints.iam, "http://hub.neos/api/iam");
        assert_eq!(settings.read_miss, ReadMissPolicy::Remove);
    }

    #[test]
    fn test_env_fills_gaps() {
        let env = env_from(&[("NEOS_PASSWORD", "from-env")]);
        let mut block = full_block();
        block["password"] = Value::Null;
        let settings = resolve(&block, env).unwrap();
        assert_eq!(settings.password, "from-env");
    }

    #[test]
    fn test_all_missing_fields_reported_together() {
        let diagnostics = resolve(&Value::Null, env_from(&[])).unwrap_err();
        let attributes: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert_eq!(
            attributes,
            vec![
                "iam_host",
                "registry_host",
                "core_host",
                "account",
                "partition",
                "username",
                "password"
            ]
        );
        assert!(diagnostics.iter().all(|d| d.summary.starts_with("Missing NEOS")));
    }

    #[test]
    fn test_empty_values_count_as_missing() {
        let mut block = full_block();
        block["username"] = json!("  ");
        let diagnostics = resolve(&block, env_from(&[("NEOS_USERNAME", "")])).unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Missing NEOS username");
    }

    #[test]
    fn test_invalid_choices_batched_with_missing() {
        let mut block = full_block();
        block["scheme"] = json!("ftp");
        block["read_miss"] = json!("ignore");
        block["core_host"] = Value::Null;
        let diagnostics = resolve(&block, env_from(&[])).unwrap_err();
        let summaries: Vec<_> = diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec![
                "Missing NEOS core host",
                "Invalid NEOS scheme",
                "Invalid NEOS read miss policy"
            ]
        );
    }

    #[test]
    fn test_settings_debug_redacts_password() {
        let settings = resolve(&full_block(), env_from(&[])).unwrap();
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_connect_reports_login_failure() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/iam/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut block = full_block();
        for host in ["iam_host", "registry_host", "core_host"] {
            block[host] = json!(server.uri());
        }
        let settings = resolve(&block, env_from(&[])).unwrap();
        let err = connect(&settings).await.unwrap_err();
        assert!(matches!(err, ProviderError::Authentication(_)));
        assert!(err.to_string().starts_with("Unable to Create NEOS API Client"));
    }
}
