use super::{AuthMethod, Credentials, wrong_credentials};
use crate::models::{self, AuthInfo};
use crate::transport::Transport;
use crate::{VaultError, validation};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_MOUNT: &str = "kubernetes";
pub const DEFAULT_JWT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Kubernetes service account authentication
pub struct KubernetesAuth {
    transport: Arc<Transport>,
    mount: String,
    jwt_path: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    jwt: &'a str,
    role: &'a str,
}

impl KubernetesAuth {
    pub fn new(transport: Arc<Transport>, mount: impl Into<String>) -> Self {
        let jwt_path = transport.kubernetes_jwt_path().to_string();
        Self {
            transport,
            mount: mount.into(),
            jwt_path,
        }
    }

    pub(crate) fn boxed(transport: Arc<Transport>, mount: String) -> Arc<dyn AuthMethod> {
        Arc::new(Self::new(transport, mount))
    }

    pub fn with_jwt_path(mut self, path: impl Into<String>) -> Self {
        self.jwt_path = path.into();
        self
    }

    fn read_jwt(&self) -> Result<String, VaultError> {
        std::fs::read_to_string(&self.jwt_path)
            .map(|s| s.trim().to_string())
            .map_err(|e| {
                VaultError::validation(format!(
                    "Failed to read JWT from {}: {}",
                    self.jwt_path, e
                ))
            })
    }

    pub async fn login_role(&self, role: &str, jwt: Option<&str>) -> Result<AuthInfo, VaultError> {
        validation::non_empty("role", role)?;
        let jwt = match jwt {
            Some(jwt) => jwt.to_string(),
            None => self.read_jwt()?,
        };
        validation::non_empty("jwt", &jwt)?;

        let body = serde_json::to_value(LoginRequest { jwt: &jwt, role })?;
        let response = self
            .transport
            .post(&format!("auth/{}/login", self.mount), &body)
            .await?;
        models::auth(response)
    }
}

#[async_trait]
impl AuthMethod for KubernetesAuth {
    fn method_type(&self) -> &str {
        DEFAULT_MOUNT
    }

    fn mount_path(&self) -> &str {
        &self.mount
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthInfo, VaultError> {
        match credentials {
            Credentials::Kubernetes { role, jwt } => self.login_role(role, jwt.as_deref()).await,
            other => Err(wrong_credentials(DEFAULT_MOUNT, other)),
        }
    }
}
