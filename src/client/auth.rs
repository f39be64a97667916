//! Login against the NEOS IAM service.

use reqwest::Method;
use tracing::{debug, info};

use super::models::{LoginRequest, LoginResponse};
use super::{decode_response, http_client, ClientError, Endpoints, NeosClient};

/// Exchange credentials for a bearer token.
pub async fn login(
    http: &reqwest::Client,
    iam_url: &str,
    username: &str,
    password: &str,
) -> Result<LoginResponse, ClientError> {
    let url = format!("{}/login", iam_url);
    debug!(url = %url, username = %username, "Logging in to NEOS IAM");
    let resp = http
        .post(&url)
        .header("Accept", "application/json")
        .json(&LoginRequest {
            user: username,
            password,
        })
        .send()
        .await
        .map_err(|source| ClientError::Request {
            method: Method::POST.to_string(),
            url: url.clone(),
            source,
        })?;
    decode_response(Method::POST, &url, resp).await
}

/// Log in and build the umbrella client carrying the token.
pub async fn connect(
    endpoints: Endpoints,
    username: &str,
    password: &str,
    account: &str,
    partition: &str,
) -> Result<NeosClient, ClientError> {
    let http = http_client()?;
    let login = login(&http, &endpoints.iam, username, password).await?;
    info!(username = %username, account = %account, "Authenticated against NEOS IAM");
    Ok(NeosClient::with_http(
        http,
        endpoints,
        login.access_token,
        account,
        partition,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_connect_uses_login_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/iam/login"))
            .and(body_json(json!({"user": "admin", "password": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok-123",
                "expires_in": 3600,
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/iam/groups"))
            .and(wiremock::matchers::header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"groups": []})))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let endpoints = Endpoints::from_hosts("http", &uri, &uri, &uri);
        let client = connect(endpoints, "admin", "secret", "acme", "ksa")
            .await
            .unwrap();
        assert!(client.groups().list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/iam/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let err = login(&http, &format!("{}/api/iam", server.uri()), "admin", "nope")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));
    }
}
