use super::{AuthMethod, Credentials, wrong_credentials};
use crate::models::{self, AuthInfo};
use crate::transport::Transport;
use crate::{VaultError, validation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub const DEFAULT_MOUNT: &str = "github";

/// Organization binding of a GitHub auth mount
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub organization: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "token_ttl")]
    pub ttl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "token_max_ttl")]
    pub max_ttl: Option<String>,
}

/// GitHub personal access token authentication
pub struct GitHubAuth {
    transport: Arc<Transport>,
    mount: String,
}

impl GitHubAuth {
    pub fn new(transport: Arc<Transport>, mount: impl Into<String>) -> Self {
        Self {
            transport,
            mount: mount.into(),
        }
    }

    pub(crate) fn boxed(transport: Arc<Transport>, mount: String) -> Arc<dyn AuthMethod> {
        Arc::new(Self::new(transport, mount))
    }

    pub async fn configure(&self, config: &GitHubConfig) -> Result<(), VaultError> {
        validation::non_empty("organization", &config.organization)?;
        validation::optional_duration("ttl", config.ttl.as_deref())?;
        validation::optional_duration("max_ttl", config.max_ttl.as_deref())?;
        let body = serde_json::to_value(config)?;
        self.transport
            .post(&format!("auth/{}/config", self.mount), &body)
            .await?;
        Ok(())
    }

    /// Raw configuration; ttl fields come back as seconds
    pub async fn read_configuration(&self) -> Result<serde_json::Value, VaultError> {
        let response = self
            .transport
            .get(&format!("auth/{}/config", self.mount))
            .await?;
        models::data(response)
    }

    pub async fn map_team(&self, team: &str, policies: &[String]) -> Result<(), VaultError> {
        validation::segment("team name", team)?;
        validation::policies(policies)?;
        self.transport
            .post(
                &format!("auth/{}/map/teams/{}", self.mount, team),
                &json!({ "value": policies.join(",") }),
            )
            .await?;
        Ok(())
    }

    pub async fn login_token(&self, token: &str) -> Result<AuthInfo, VaultError> {
        validation::non_empty("github token", token)?;
        let response = self
            .transport
            .post(&format!("auth/{}/login", self.mount), &json!({ "token": token }))
            .await?;
        models::auth(response)
    }
}

#[async_trait]
impl AuthMethod for GitHubAuth {
    fn method_type(&self) -> &str {
        DEFAULT_MOUNT
    }

    fn mount_path(&self) -> &str {
        &self.mount
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthInfo, VaultError> {
        match credentials {
            Credentials::GitHub { token } => self.login_token(token).await,
            other => Err(wrong_credentials(DEFAULT_MOUNT, other)),
        }
    }
}
