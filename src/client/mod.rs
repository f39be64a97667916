//! REST client for the NEOS IAM, registry and core gateway services.
//!
//! [`NeosClient`] is built once during Configure, after login, and is
//! never mutated afterwards. Reconcilers only ever see a narrowed
//! sub-client (e.g. [`iam::GroupClient`]) sharing the same
//! [`ClientContext`].

mod error;

pub mod auth;
pub mod core;
pub mod iam;
pub mod links;
pub mod models;
pub mod registry;
pub mod secrets;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub use error::ClientError;

/// Base URLs of the three NEOS services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// IAM service, e.g. `https://hub.neos.example/api/iam`.
    pub iam: String,
    /// Registry service, e.g. `https://hub.neos.example/api/registry`.
    pub registry: String,
    /// Core gateway, e.g. `https://core.neos.example/api/gateway/v2`.
    pub core: String,
}

impl Endpoints {
    /// Derive the service base URLs from host names.
    ///
    /// A host that already carries a `scheme://` prefix is used verbatim.
    pub fn from_hosts(scheme: &str, iam_host: &str, registry_host: &str, core_host: &str) -> Self {
        Self {
            iam: format!("{}/api/iam", origin(scheme, iam_host)),
            registry: format!("{}/api/registry", origin(scheme, registry_host)),
            core: format!("{}/api/gateway/v2", origin(scheme, core_host)),
        }
    }
}

fn origin(scheme: &str, host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("{}://{}", scheme, host)
    }
}

/// Immutable state shared by every sub-client.
#[derive(Debug)]
pub struct ClientContext {
    http: reqwest::Client,
    token: String,
    endpoints: Endpoints,
    account: String,
    partition: String,
}

impl ClientContext {
    /// Default account sent with every request.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Partition sent with every request.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Service base URLs.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn request(&self, method: Method, url: &str, account: Option<&str>) -> reqwest::RequestBuilder {
        let account = account.filter(|a| !a.is_empty()).unwrap_or(&self.account);
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .header("x-account", account)
            .header("x-partition", &self.partition)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        debug!(method = %method, url = %url, "NEOS request");
        let resp = builder.send().await.map_err(|source| ClientError::Request {
            method: method.to_string(),
            url: url.to_string(),
            source,
        })?;
        decode_response(method, url, resp).await
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        account: Option<&str>,
    ) -> Result<T, ClientError> {
        let builder = self.request(Method::GET, url, account);
        self.execute(Method::GET, url, builder).await
    }

    pub(crate) async fn post<B, T>(
        &self,
        url: &str,
        body: &B,
        account: Option<&str>,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(Method::POST, url, account).json(body);
        self.execute(Method::POST, url, builder).await
    }

    pub(crate) async fn put<B, T>(
        &self,
        url: &str,
        body: &B,
        account: Option<&str>,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(Method::PUT, url, account).json(body);
        self.execute(Method::PUT, url, builder).await
    }

    pub(crate) async fn delete<B>(
        &self,
        url: &str,
        body: Option<&B>,
        account: Option<&str>,
    ) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.delete_returning::<B, serde::de::IgnoredAny>(url, body, account)
            .await
            .map(|_| ())
    }

    pub(crate) async fn delete_returning<B, T>(
        &self,
        url: &str,
        body: Option<&B>,
        account: Option<&str>,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = self.request(Method::DELETE, url, account);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.execute(Method::DELETE, url, builder).await
    }
}

pub(crate) async fn decode_response<T: DeserializeOwned>(
    method: Method,
    url: &str,
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    let body = match resp.text().await {
        Ok(body) => body,
        Err(source) if status.is_success() => {
            return Err(ClientError::Request {
                method: method.to_string(),
                url: url.to_string(),
                source,
            })
        }
        // the status already says what went wrong
        Err(_) => String::new(),
    };

    if !status.is_success() {
        return Err(ClientError::Status {
            method: method.to_string(),
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let body = if body.trim().is_empty() { "null" } else { body.as_str() };
    serde_json::from_str(body).map_err(|source| ClientError::Decode {
        url: url.to_string(),
        source,
    })
}

/// Umbrella client handed to every reconciler at Configure time.
#[derive(Debug, Clone)]
pub struct NeosClient {
    ctx: Arc<ClientContext>,
}

impl NeosClient {
    /// Request timeout applied to every backend call.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// Build a client around an already obtained bearer token.
    pub fn new(
        endpoints: Endpoints,
        token: impl Into<String>,
        account: impl Into<String>,
        partition: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self::with_http(
            http_client()?,
            endpoints,
            token,
            account,
            partition,
        ))
    }

    pub(crate) fn with_http(
        http: reqwest::Client,
        endpoints: Endpoints,
        token: impl Into<String>,
        account: impl Into<String>,
        partition: impl Into<String>,
    ) -> Self {
        Self {
            ctx: Arc::new(ClientContext {
                http,
                token: token.into(),
                endpoints,
                account: account.into(),
                partition: partition.into(),
            }),
        }
    }

    /// Shared context.
    pub fn context(&self) -> &Arc<ClientContext> {
        &self.ctx
    }

    /// Core entities of the given kind.
    pub fn entities(&self, kind: core::EntityKind) -> core::EntityClient {
        core::EntityClient::new(Arc::clone(&self.ctx), kind)
    }

    /// Data source entities with their connection and secret payloads.
    pub fn data_sources(&self) -> core::DataSourceClient {
        core::DataSourceClient::new(Arc::clone(&self.ctx))
    }

    /// Data unit entities with their configuration payload.
    pub fn data_units(&self) -> core::DataUnitClient {
        core::DataUnitClient::new(Arc::clone(&self.ctx))
    }

    /// Data product entities with their schema and builder payloads.
    pub fn data_products(&self) -> core::DataProductClient {
        core::DataProductClient::new(Arc::clone(&self.ctx))
    }

    /// Parent/child links between core entities.
    pub fn links(&self) -> links::LinksClient {
        links::LinksClient::new(Arc::clone(&self.ctx))
    }

    /// IAM accounts.
    pub fn accounts(&self) -> iam::AccountClient {
        iam::AccountClient::new(Arc::clone(&self.ctx))
    }

    /// IAM groups and their principals.
    pub fn groups(&self) -> iam::GroupClient {
        iam::GroupClient::new(Arc::clone(&self.ctx))
    }

    /// IAM users.
    pub fn users(&self) -> iam::UserClient {
        iam::UserClient::new(Arc::clone(&self.ctx))
    }

    /// IAM user policies.
    pub fn policies(&self) -> iam::PolicyClient {
        iam::PolicyClient::new(Arc::clone(&self.ctx))
    }

    /// Core secrets.
    pub fn secrets(&self) -> secrets::SecretClient {
        secrets::SecretClient::new(Arc::clone(&self.ctx))
    }

    /// Registry cores.
    pub fn registry_cores(&self) -> registry::RegistryClient {
        registry::RegistryClient::new(Arc::clone(&self.ctx))
    }
}

pub(crate) fn http_client() -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(NeosClient::REQUEST_TIMEOUT)
        .build()
        .map_err(ClientError::Build)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A client whose three services all point at one mock server.
    pub fn client_for(uri: &str) -> NeosClient {
        let endpoints = Endpoints::from_hosts("http", uri, uri, uri);
        NeosClient::new(endpoints, "test-token", "acme", "ksa").unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_endpoints_from_hosts() {
        let endpoints = Endpoints::from_hosts("https", "hub.neos", "hub.neos/", "core.neos");
        assert_eq!(endpoints.iam, "https://hub.neos/api/iam");
        assert_eq!(endpoints.registry, "https://hub.neos/api/registry");
        assert_eq!(endpoints.core, "https://core.neos/api/gateway/v2");

        let endpoints = Endpoints::from_hosts("https", "http://127.0.0.1:9000", "x", "y");
        assert_eq!(endpoints.iam, "http://127.0.0.1:9000/api/iam");
    }

    #[tokio::test]
    async fn test_requests_carry_token_and_context_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/iam/accounts"))
            .and(header("authorization", "Bearer test-token"))
            .and(header("x-account", "acme"))
            .and(header("x-partition", "ksa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "accounts": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_support::client_for(&server.uri());
        let accounts = client.accounts().list().await.unwrap();
        assert!(accounts.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_success_body_is_an_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 64\r\n\r\n{\"identifier\"")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let client = test_support::client_for(&format!("http://{}", addr));
        let err = client
            .groups()
            .remove_principals("g-1", vec!["u1".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Request { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/iam/accounts"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
            .mount(&server)
            .await;

        let client = test_support::client_for(&server.uri());
        let err = client.accounts().list().await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("no such thing"));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/iam/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = test_support::client_for(&server.uri());
        let err = client.accounts().list().await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }
}
