use crate::auth::{AuthConstructor, AuthRegistry, DEFAULT_JWT_PATH, TokenManager};
use crate::error::VaultError;
use crate::models::{self, AuthInfo};
use crate::session::{
    FileSessionCache, LoginOutcome, LoginRequest, MemorySessionCache, SessionCache, SessionKey,
};
use crate::transport::{Transport, TransportConfig};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct VaultClientBuilder {
    base_url: Option<String>,
    token: Option<String>,
    namespace: Option<String>,
    application_name: Option<String>,
    kubernetes_jwt_path: Option<String>,
    timeout: Duration,
    session_cache: Option<Arc<dyn SessionCache>>,
    auth_methods: Vec<(String, AuthConstructor)>,
}

impl Default for VaultClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            token: None,
            namespace: None,
            application_name: None,
            kubernetes_jwt_path: None,
            timeout: DEFAULT_TIMEOUT,
            session_cache: None,
            auth_methods: Vec::new(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Token installed as the active session credential at build time.
    ///
    /// `VAULT_TOKEN` is only used as the fallback for token verification and
    /// never installed on its own.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    pub fn kubernetes_jwt_path(mut self, path: impl Into<String>) -> Self {
        self.kubernetes_jwt_path = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session_cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.session_cache = Some(cache);
        self
    }

    /// Keep login tokens in the user cache directory across processes
    pub fn persistent_session_cache(mut self) -> Self {
        match FileSessionCache::new() {
            Some(cache) => self.session_cache = Some(Arc::new(cache)),
            None => tracing::warn!("No cache directory available, using in-memory session cache"),
        }
        self
    }

    pub fn register_auth_method(mut self, method_type: impl Into<String>, constructor: AuthConstructor) -> Self {
        self.auth_methods.push((method_type.into(), constructor));
        self
    }

    fn resolve_config(&self) -> Result<TransportConfig, VaultError> {
        let base_url = self
            .base_url
            .clone()
            .or_else(|| env_var("VAULT_ADDR"))
            .ok_or(VaultError::VaultNotDetected)?;

        let token = self.token.clone().or_else(|| env_var("VAULT_TOKEN"));

        let namespace = self.namespace.clone().or_else(|| env_var("VAULT_NAMESPACE"));

        let kubernetes_jwt_path = self
            .kubernetes_jwt_path
            .clone()
            .or_else(|| env_var("K8S_JWT_TOKEN_PATH"))
            .unwrap_or_else(|| DEFAULT_JWT_PATH.to_string());

        Ok(TransportConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            namespace,
            application_name: self.application_name.clone(),
            timeout: self.timeout,
            kubernetes_jwt_path,
        })
    }

    pub fn build(self) -> Result<VaultClient, VaultError> {
        let config = self.resolve_config()?;
        let transport = Arc::new(Transport::new(config)?.with_active_token(self.token.clone()));

        let mut auth = AuthRegistry::new(Arc::clone(&transport));
        for (method_type, constructor) in self.auth_methods {
            auth.register(method_type, constructor);
        }

        Ok(VaultClient {
            transport,
            auth,
            session_cache: self
                .session_cache
                .unwrap_or_else(|| Arc::new(MemorySessionCache::new())),
            login_lock: Mutex::new(()),
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

pub struct VaultClient {
    transport: Arc<Transport>,
    auth: AuthRegistry,
    session_cache: Arc<dyn SessionCache>,
    login_lock: Mutex<()>,
}

impl VaultClient {
    pub fn from_env() -> Result<Self, VaultError> {
        VaultClientBuilder::new().build()
    }

    pub fn builder() -> VaultClientBuilder {
        VaultClientBuilder::new()
    }

    pub fn address(&self) -> &str {
        self.transport.base_url()
    }

    pub fn auth(&self) -> &AuthRegistry {
        &self.auth
    }

    pub fn tokens(&self) -> TokenManager {
        self.auth.token()
    }

    pub fn session_cache(&self) -> &Arc<dyn SessionCache> {
        &self.session_cache
    }

    /// The active session credential
    pub async fn token(&self) -> Option<String> {
        self.transport.token().await
    }

    pub async fn set_token(&self, token: Option<String>) {
        self.transport.set_token(token).await;
    }

    /// Whether the active credential is accepted by the server
    pub async fn is_authenticated(&self) -> Result<bool, VaultError> {
        if self.token().await.is_none() {
            return Ok(false);
        }
        match self.tokens().lookup_self().await {
            Ok(_) => Ok(true),
            Err(VaultError::Server { status: 403, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Log in with an auth method and install the issued token.
    ///
    /// With `token_only` the token is returned without touching the session or the
    /// cache. Otherwise an installed credential is kept unless `renew` is set, and
    /// with `use_cache` a token from an earlier login against the same server,
    /// method and mount is reused without contacting the auth backend. The active
    /// credential only changes after a fully successful login.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, VaultError> {
        let _guard = self.login_lock.lock().await;

        if request.token_only {
            let method = self.auth.method(&request.method, request.mount.as_deref())?;
            let auth = method.login(&request.credentials).await?;
            return Ok(LoginOutcome::TokenOnly(auth));
        }

        if !request.renew {
            if let Some(token) = self.transport.token().await {
                return Ok(LoginOutcome::AlreadyAuthenticated { token });
            }
        }

        let method = self.auth.method(&request.method, request.mount.as_deref())?;
        let key = SessionKey::new(self.address(), &request.method, method.mount_path());

        if request.use_cache {
            if let Some(token) = self.session_cache.get(&key) {
                self.transport.set_token(Some(token.clone())).await;
                if !request.quiet {
                    tracing::info!(session = %key, "Using cached Vault token");
                }
                return Ok(LoginOutcome::Cached { token });
            }
        }

        let auth = method.login(&request.credentials).await?;

        if request.use_cache {
            if let Err(e) = self.session_cache.set(&key, &auth.client_token, auth.lease()) {
                tracing::warn!("Failed to cache Vault token: {}", e);
            }
        }

        self.transport.set_token(Some(auth.client_token.clone())).await;
        if !request.quiet {
            tracing::info!(
                method = %request.method,
                mount = method.mount_path(),
                "Logged in to Vault"
            );
        }

        Ok(LoginOutcome::LoggedIn(auth))
    }

    /// Drop the active credential, revoking it on the server first if asked to
    pub async fn logout(&self, revoke: bool) -> Result<(), VaultError> {
        let _guard = self.login_lock.lock().await;
        if revoke && self.transport.token().await.is_some() {
            self.tokens().revoke_self().await?;
        }
        self.transport.set_token(None).await;
        Ok(())
    }

    /// Unwrap a response-wrapping token; `None` unwraps the active credential itself
    pub async fn unwrap(&self, wrapping_token: Option<&str>) -> Result<Value, VaultError> {
        let body = match wrapping_token {
            Some(token) => {
                crate::validation::non_empty("wrapping token", token)?;
                json!({ "token": token })
            }
            None => json!({}),
        };
        self.transport.post("sys/wrapping/unwrap", &body).await
    }

    /// Unwrap a token created with `wrap_ttl`
    pub async fn unwrap_auth(&self, wrapping_token: Option<&str>) -> Result<AuthInfo, VaultError> {
        models::auth(self.unwrap(wrapping_token).await?)
    }
}
