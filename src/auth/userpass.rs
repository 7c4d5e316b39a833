use super::{AuthMethod, Credentials, wrong_credentials};
use crate::models::{self, AuthInfo};
use crate::transport::Transport;
use crate::{VaultError, validation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub const DEFAULT_MOUNT: &str = "userpass";

/// A user as stored by the userpass backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserpassUser {
    #[serde(default, deserialize_with = "models::string_list")]
    pub token_policies: Vec<String>,
    #[serde(default)]
    pub token_ttl: u64,
    #[serde(default)]
    pub token_max_ttl: u64,
    #[serde(default, deserialize_with = "models::string_list")]
    pub token_bound_cidrs: Vec<String>,
}

/// Username and password authentication
pub struct UserpassAuth {
    transport: Arc<Transport>,
    mount: String,
}

impl UserpassAuth {
    pub fn new(transport: Arc<Transport>, mount: impl Into<String>) -> Self {
        Self {
            transport,
            mount: mount.into(),
        }
    }

    pub(crate) fn boxed(transport: Arc<Transport>, mount: String) -> Arc<dyn AuthMethod> {
        Arc::new(Self::new(transport, mount))
    }

    fn user_path(&self, username: &str) -> Result<String, VaultError> {
        validation::segment("username", username)?;
        Ok(format!("auth/{}/users/{}", self.mount, username))
    }

    pub async fn login_user(&self, username: &str, password: &str) -> Result<AuthInfo, VaultError> {
        validation::segment("username", username)?;
        validation::non_empty("password", password)?;
        let response = self
            .transport
            .post(
                &format!("auth/{}/login/{}", self.mount, username),
                &json!({ "password": password }),
            )
            .await?;
        models::auth(response)
    }

    pub async fn create_or_update_user(
        &self,
        username: &str,
        password: Option<&str>,
        policies: &[String],
    ) -> Result<(), VaultError> {
        let path = self.user_path(username)?;
        validation::policies(policies)?;
        let mut body = json!({ "token_policies": policies });
        if let Some(password) = password {
            validation::non_empty("password", password)?;
            body["password"] = json!(password);
        }
        self.transport.post(&path, &body).await?;
        Ok(())
    }

    pub async fn read_user(&self, username: &str) -> Result<UserpassUser, VaultError> {
        let path = self.user_path(username)?;
        let response = self.transport.get(&path).await?;
        models::data(response)
    }

    pub async fn list_users(&self) -> Result<Vec<String>, VaultError> {
        let response = self
            .transport
            .list(&format!("auth/{}/users", self.mount))
            .await?;
        models::keys(response)
    }

    pub async fn delete_user(&self, username: &str) -> Result<(), VaultError> {
        let path = self.user_path(username)?;
        self.transport.delete(&path).await?;
        Ok(())
    }

    pub async fn update_password(&self, username: &str, password: &str) -> Result<(), VaultError> {
        let path = self.user_path(username)?;
        validation::non_empty("password", password)?;
        self.transport
            .post(&format!("{}/password", path), &json!({ "password": password }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthMethod for UserpassAuth {
    fn method_type(&self) -> &str {
        DEFAULT_MOUNT
    }

    fn mount_path(&self) -> &str {
        &self.mount
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthInfo, VaultError> {
        match credentials {
            Credentials::UserPass { username, password } => self.login_user(username, password).await,
            other => Err(wrong_credentials(DEFAULT_MOUNT, other)),
        }
    }
}
