use crate::VaultError;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;

/// Settings the transport needs from the resolved client configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub namespace: Option<String>,
    pub application_name: Option<String>,
    pub timeout: Duration,
    pub kubernetes_jwt_path: String,
}

/// A single API call; optional parts are left unset unless requested
pub struct ApiRequest<'a> {
    method: Method,
    path: &'a str,
    body: Option<&'a Value>,
    wrap_ttl: Option<&'a str>,
    token: Option<&'a str>,
}

impl<'a> ApiRequest<'a> {
    pub fn new(method: Method, path: &'a str) -> Self {
        Self {
            method,
            path,
            body: None,
            wrap_ttl: None,
            token: None,
        }
    }

    pub fn body(mut self, body: &'a Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn wrap_ttl(mut self, wrap_ttl: Option<&'a str>) -> Self {
        self.wrap_ttl = wrap_ttl;
        self
    }

    /// Send this token instead of the active session credential
    pub fn token(mut self, token: &'a str) -> Self {
        self.token = Some(token);
        self
    }
}

/// HTTP access to the Vault API plus the client's active session credential
pub struct Transport {
    http: reqwest::Client,
    config: TransportConfig,
    token: RwLock<Option<String>>,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Result<Self, VaultError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VaultError::Request(e.to_string()))?;

        Ok(Self {
            http,
            token: RwLock::new(None),
            config,
        })
    }

    /// Start with `token` as the active session credential
    pub(crate) fn with_active_token(mut self, token: Option<String>) -> Self {
        *self.token.get_mut() = token;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Fallback for token verification (explicit or `VAULT_TOKEN`); not sent on requests
    pub fn default_token(&self) -> Option<&str> {
        self.config.token.as_deref()
    }

    pub fn kubernetes_jwt_path(&self) -> &str {
        &self.config.kubernetes_jwt_path
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn get(&self, path: &str) -> Result<Value, VaultError> {
        self.send(ApiRequest::new(Method::GET, path)).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, VaultError> {
        self.send(ApiRequest::new(Method::POST, path).body(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, VaultError> {
        self.send(ApiRequest::new(Method::DELETE, path)).await
    }

    pub async fn list(&self, path: &str) -> Result<Value, VaultError> {
        self.send(ApiRequest::new(list_method(), path)).await
    }

    pub async fn send(&self, request: ApiRequest<'_>) -> Result<Value, VaultError> {
        let path = request.path.trim_start_matches('/');
        let url = format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path);
        tracing::debug!(method = %request.method, path, "Vault request");

        let mut builder = self.http.request(request.method, &url);

        let token = match request.token {
            Some(token) => Some(token.to_string()),
            None => self.token().await,
        };
        if let Some(token) = token {
            builder = builder.header("X-Vault-Token", token);
        }
        if let Some(ref namespace) = self.config.namespace {
            builder = builder.header("X-Vault-Namespace", namespace);
        }
        if let Some(ref app_name) = self.config.application_name {
            builder = builder.header("User-Agent", app_name);
        }
        if let Some(wrap_ttl) = request.wrap_ttl {
            builder = builder.header("X-Vault-Wrap-TTL", wrap_ttl);
        }
        if let Some(body) = request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| VaultError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| VaultError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(error_from_response(status, path, &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| VaultError::Request(format!("Invalid response: {}", e)))
    }
}

fn list_method() -> Method {
    // "LIST" is a valid token, from_bytes only fails on invalid characters
    Method::from_bytes(b"LIST").unwrap_or(Method::GET)
}

fn error_from_response(status: u16, path: &str, body: &str) -> VaultError {
    let errors: Vec<String> = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("errors").cloned())
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    let message = if errors.is_empty() {
        body.trim().to_string()
    } else {
        errors.join(", ")
    };

    if status == 404 {
        return VaultError::InvalidPath {
            path: path.to_string(),
            message,
        };
    }

    VaultError::Server {
        status,
        message,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(uri: &str, token: Option<&str>) -> Transport {
        Transport::new(TransportConfig {
            base_url: uri.to_string(),
            token: token.map(str::to_string),
            namespace: Some("team-a".to_string()),
            application_name: Some("vault-api-tests".to_string()),
            timeout: Duration::from_secs(5),
            kubernetes_jwt_path: String::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_error_from_response_joins_errors() {
        let err = error_from_response(400, "auth/token/lookup", r#"{"errors":["bad token","expired"]}"#);
        match err {
            VaultError::Server { status, message, errors } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad token, expired");
                assert_eq!(errors.len(), 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_from_response_404_is_invalid_path() {
        let err = error_from_response(404, "auth/token/roles", r#"{"errors":[]}"#);
        assert!(matches!(err, VaultError::InvalidPath { ref path, .. } if path == "auth/token/roles"));
    }

    #[test]
    fn test_error_from_response_plain_body() {
        let err = error_from_response(502, "sys/auth", "bad gateway\n");
        assert_eq!(err.server_message(), Some("bad gateway"));
    }

    #[tokio::test]
    async fn test_send_attaches_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/token/create"))
            .and(header("X-Vault-Token", "root"))
            .and(header("X-Vault-Namespace", "team-a"))
            .and(header("X-Vault-Wrap-TTL", "60s"))
            .and(header("User-Agent", "vault-api-tests"))
            .and(body_json(json!({"ttl": "1h"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport(&server.uri(), None).with_active_token(Some("root".to_string()));
        let body = json!({"ttl": "1h"});
        let response = transport
            .send(
                ApiRequest::new(Method::POST, "/auth/token/create")
                    .body(&body)
                    .wrap_ttl(Some("60s")),
            )
            .await
            .unwrap();
        assert_eq!(response, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_token_override_and_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/token/revoke-self"))
            .and(header("X-Vault-Token", "other"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport(&server.uri(), None).with_active_token(Some("root".to_string()));
        let response = transport
            .send(ApiRequest::new(Method::POST, "auth/token/revoke-self").token("other"))
            .await
            .unwrap();
        assert!(response.is_null());
    }

    #[tokio::test]
    async fn test_list_uses_list_method() {
        let server = MockServer::start().await;
        Mock::given(method("LIST"))
            .and(path("/v1/auth/token/roles"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"keys": ["ops"]}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport(&server.uri(), None);
        let response = transport.list("auth/token/roles").await.unwrap();
        assert_eq!(response["data"]["keys"][0], "ops");
    }

    #[tokio::test]
    async fn test_default_token_is_not_active() {
        let transport = transport("http://vault:8200", Some("s.default"));
        assert_eq!(transport.default_token(), Some("s.default"));
        assert!(transport.token().await.is_none());
    }

    #[tokio::test]
    async fn test_set_token_replaces_active_credential() {
        let transport = transport("http://vault:8200", None);
        assert!(transport.token().await.is_none());
        transport.set_token(Some("s.new".to_string())).await;
        assert_eq!(transport.token().await.as_deref(), Some("s.new"));
        assert!(transport.default_token().is_none());
    }
}
