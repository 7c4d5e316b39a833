use super::{AuthMethod, Credentials, wrong_credentials};
use crate::models::{self, AuthInfo};
use crate::transport::Transport;
use crate::{VaultError, validation};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub const DEFAULT_MOUNT: &str = "approle";

/// Machine authentication with a role id and optional secret id
pub struct AppRoleAuth {
    transport: Arc<Transport>,
    mount: String,
}

impl AppRoleAuth {
    pub fn new(transport: Arc<Transport>, mount: impl Into<String>) -> Self {
        Self {
            transport,
            mount: mount.into(),
        }
    }

    pub(crate) fn boxed(transport: Arc<Transport>, mount: String) -> Arc<dyn AuthMethod> {
        Arc::new(Self::new(transport, mount))
    }

    pub async fn login_role(&self, role_id: &str, secret_id: Option<&str>) -> Result<AuthInfo, VaultError> {
        validation::non_empty("role_id", role_id)?;
        let mut body = json!({ "role_id": role_id });
        if let Some(secret_id) = secret_id {
            body["secret_id"] = json!(secret_id);
        }
        let response = self
            .transport
            .post(&format!("auth/{}/login", self.mount), &body)
            .await?;
        models::auth(response)
    }
}

#[async_trait]
impl AuthMethod for AppRoleAuth {
    fn method_type(&self) -> &str {
        DEFAULT_MOUNT
    }

    fn mount_path(&self) -> &str {
        &self.mount
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthInfo, VaultError> {
        match credentials {
            Credentials::AppRole { role_id, secret_id } => {
                self.login_role(role_id, secret_id.as_deref()).await
            }
            other => Err(wrong_credentials(DEFAULT_MOUNT, other)),
        }
    }
}
