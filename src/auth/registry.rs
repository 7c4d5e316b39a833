use super::{AppRoleAuth, AuthMethod, Credentials, GitHubAuth, KubernetesAuth, TokenManager, UserpassAuth};
use super::{approle, github, kubernetes, userpass};
use crate::models::{self, AuthInfo, AuthMount, MountTuning};
use crate::transport::Transport;
use crate::{VaultError, validation};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Builds an auth method bound to the shared transport and a mount path
pub type AuthConstructor = fn(Arc<Transport>, String) -> Arc<dyn AuthMethod>;

/// Options for mounting a new auth backend
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnableAuthOptions {
    /// Defaults to the method type
    #[serde(skip)]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub local: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
}

/// Mount tuning to apply; unset fields are left unchanged
#[derive(Debug, Clone, Default, Serialize)]
pub struct TuneOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_lease_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_lease_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Mounted auth backends and the method types this client knows how to log in with
#[derive(Clone)]
pub struct AuthRegistry {
    transport: Arc<Transport>,
    constructors: HashMap<String, AuthConstructor>,
}

impl AuthRegistry {
    pub fn new(transport: Arc<Transport>) -> Self {
        let mut registry = Self {
            transport,
            constructors: HashMap::new(),
        };
        registry.register("token", TokenManager::boxed);
        registry.register(userpass::DEFAULT_MOUNT, UserpassAuth::boxed);
        registry.register(github::DEFAULT_MOUNT, GitHubAuth::boxed);
        registry.register(approle::DEFAULT_MOUNT, AppRoleAuth::boxed);
        registry.register(kubernetes::DEFAULT_MOUNT, KubernetesAuth::boxed);
        registry
    }

    /// Add or replace the constructor for a method type
    pub fn register(&mut self, method_type: impl Into<String>, constructor: AuthConstructor) {
        self.constructors.insert(method_type.into(), constructor);
    }

    pub fn method_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Auth method of the given type; `mount` defaults to the type name
    pub fn method(&self, method_type: &str, mount: Option<&str>) -> Result<Arc<dyn AuthMethod>, VaultError> {
        let constructor = self.constructors.get(method_type).ok_or_else(|| {
            VaultError::UnsupportedOperation(format!("unknown auth method type {:?}", method_type))
        })?;
        let mount = validation::mount_path(mount.unwrap_or(method_type))?;
        Ok(Arc::new(RegisteredMethod {
            method_type: method_type.to_string(),
            inner: constructor(Arc::clone(&self.transport), mount),
        }))
    }

    pub fn token(&self) -> TokenManager {
        TokenManager::new(Arc::clone(&self.transport))
    }

    pub fn userpass(&self) -> UserpassAuth {
        UserpassAuth::new(Arc::clone(&self.transport), userpass::DEFAULT_MOUNT)
    }

    pub fn github(&self) -> GitHubAuth {
        GitHubAuth::new(Arc::clone(&self.transport), github::DEFAULT_MOUNT)
    }

    pub fn approle(&self) -> AppRoleAuth {
        AppRoleAuth::new(Arc::clone(&self.transport), approle::DEFAULT_MOUNT)
    }

    pub fn kubernetes(&self) -> KubernetesAuth {
        KubernetesAuth::new(Arc::clone(&self.transport), kubernetes::DEFAULT_MOUNT)
    }

    /// Mounted auth methods ordered by path
    pub async fn list(&self, detailed: bool) -> Result<Vec<AuthMount>, VaultError> {
        if detailed {
            return Err(VaultError::UnsupportedOperation(
                "detailed auth method listing".to_string(),
            ));
        }

        let response = self.transport.get("sys/auth").await?;
        let mounts: BTreeMap<String, Value> = models::data(response)?;

        mounts
            .into_iter()
            .map(|(path, value)| {
                let mut mount: AuthMount = serde_json::from_value(value)?;
                mount.path = path;
                Ok(mount)
            })
            .collect()
    }

    pub async fn enable(&self, method_type: &str, options: &EnableAuthOptions) -> Result<(), VaultError> {
        validation::segment("auth method type", method_type)?;
        let path = validation::mount_path(options.path.as_deref().unwrap_or(method_type))?;
        if let Some(ref plugin) = options.plugin_name {
            validation::non_empty("plugin name", plugin)?;
        }

        let mut body = serde_json::to_value(options)?;
        body["type"] = Value::String(method_type.to_string());
        self.transport.post(&format!("sys/auth/{}", path), &body).await?;
        tracing::debug!(method_type, path = %path, "Enabled auth method");
        Ok(())
    }

    pub async fn disable(&self, path: &str) -> Result<(), VaultError> {
        let path = validation::mount_path(path)?;
        self.transport.delete(&format!("sys/auth/{}", path)).await?;
        tracing::debug!(path = %path, "Disabled auth method");
        Ok(())
    }

    pub async fn tune(&self, path: &str, options: &TuneOptions) -> Result<(), VaultError> {
        let path = validation::mount_path(path)?;
        validation::optional_duration("default_lease_ttl", options.default_lease_ttl.as_deref())?;
        validation::optional_duration("max_lease_ttl", options.max_lease_ttl.as_deref())?;
        let body = serde_json::to_value(options)?;
        self.transport
            .post(&format!("sys/auth/{}/tune", path), &body)
            .await?;
        Ok(())
    }

    pub async fn read_tuning(&self, path: &str) -> Result<MountTuning, VaultError> {
        let path = validation::mount_path(path)?;
        let response = self.transport.get(&format!("sys/auth/{}/tune", path)).await?;
        models::data(response)
    }
}

/// Reports the type a method was registered under rather than its built-in one
struct RegisteredMethod {
    method_type: String,
    inner: Arc<dyn AuthMethod>,
}

#[async_trait]
impl AuthMethod for RegisteredMethod {
    fn method_type(&self) -> &str {
        &self.method_type
    }

    fn mount_path(&self) -> &str {
        self.inner.mount_path()
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthInfo, VaultError> {
        self.inner.login(credentials).await
    }
}
