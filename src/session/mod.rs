mod cache;
mod file_cache;

pub use cache::{MemorySessionCache, SessionCache, SessionKey};
pub use file_cache::FileSessionCache;

use crate::auth::Credentials;
use crate::models::AuthInfo;

/// Arguments of [`VaultClient::login`](crate::VaultClient::login)
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub method: String,
    /// Defaults to the method name
    pub mount: Option<String>,
    pub credentials: Credentials,
    /// Log in again even when a credential is already installed
    pub renew: bool,
    /// Suppress informational log lines
    pub quiet: bool,
    /// Return the issued token without installing or caching it
    pub token_only: bool,
    pub use_cache: bool,
}

impl LoginRequest {
    pub fn new(method: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            method: method.into(),
            mount: None,
            credentials,
            renew: false,
            quiet: false,
            token_only: false,
            use_cache: false,
        }
    }

    pub fn mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = Some(mount.into());
        self
    }

    pub fn renew(mut self, renew: bool) -> Self {
        self.renew = renew;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn token_only(mut self, token_only: bool) -> Self {
        self.token_only = token_only;
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}

/// What a login call did
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// A credential was already installed and `renew` was not requested
    AlreadyAuthenticated { token: String },
    /// A cached token was installed without contacting the auth backend
    Cached { token: String },
    /// The auth backend issued a token which is now the active credential
    LoggedIn(AuthInfo),
    /// `token_only` login; the active credential was left untouched
    TokenOnly(AuthInfo),
}

impl LoginOutcome {
    pub fn token(&self) -> &str {
        match self {
            Self::AlreadyAuthenticated { token } | Self::Cached { token } => token,
            Self::LoggedIn(auth) | Self::TokenOnly(auth) => &auth.client_token,
        }
    }

    pub fn auth(&self) -> Option<&AuthInfo> {
        match self {
            Self::LoggedIn(auth) | Self::TokenOnly(auth) => Some(auth),
            _ => None,
        }
    }
}
