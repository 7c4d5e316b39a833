mod approle;
mod github;
mod kubernetes;
mod registry;
mod token;
mod userpass;

pub use approle::AppRoleAuth;
pub use github::{GitHubAuth, GitHubConfig};
pub use kubernetes::KubernetesAuth;
pub(crate) use kubernetes::DEFAULT_JWT_PATH;
pub use registry::{AuthConstructor, AuthRegistry, EnableAuthOptions, TuneOptions};
pub use token::{CreateTokenOptions, TokenManager, TokenRoleOptions};
pub use userpass::{UserpassAuth, UserpassUser};

use crate::VaultError;
use crate::models::AuthInfo;
use async_trait::async_trait;
use std::fmt;

/// Secrets presented to an auth method's login endpoint
#[derive(Clone)]
pub enum Credentials {
    /// An existing token; `None` falls back to the configured default token
    Token(Option<String>),
    UserPass { username: String, password: String },
    GitHub { token: String },
    AppRole { role_id: String, secret_id: Option<String> },
    /// `jwt: None` reads the service account token from disk
    Kubernetes { role: String, jwt: Option<String> },
}

impl Credentials {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token(Some(token.into()))
    }

    pub fn userpass(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserPass {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn github(token: impl Into<String>) -> Self {
        Self::GitHub {
            token: token.into(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::UserPass { .. } => "userpass",
            Self::GitHub { .. } => "github",
            Self::AppRole { .. } => "approle",
            Self::Kubernetes { .. } => "kubernetes",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserPass { username, .. } => f
                .debug_struct("UserPass")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::AppRole { role_id, .. } => f
                .debug_struct("AppRole")
                .field("role_id", role_id)
                .finish_non_exhaustive(),
            Self::Kubernetes { role, .. } => f
                .debug_struct("Kubernetes")
                .field("role", role)
                .finish_non_exhaustive(),
            other => write!(f, "{}(..)", other.kind()),
        }
    }
}

/// A mounted authentication backend that can exchange credentials for a token
#[async_trait]
pub trait AuthMethod: Send + Sync {
    /// Backend type, e.g. "userpass"
    fn method_type(&self) -> &str;

    /// Path the backend is mounted at, without the `auth/` prefix
    fn mount_path(&self) -> &str;

    /// Perform the backend's login and return the issued token
    async fn login(&self, credentials: &Credentials) -> Result<AuthInfo, VaultError>;
}

fn wrong_credentials(method_type: &str, credentials: &Credentials) -> VaultError {
    VaultError::validation(format!(
        "{} auth method cannot log in with {} credentials",
        method_type,
        credentials.kind()
    ))
}
