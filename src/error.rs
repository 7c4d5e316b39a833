use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Vault not detected: VAULT_ADDR not set")]
    VaultNotDetected,

    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("No token provided and VAULT_TOKEN not set")]
    CredentialMissing,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Vault server error ({status}): {message}")]
    Server {
        status: u16,
        message: String,
        errors: Vec<String>,
    },

    #[error("Invalid path {path}: {message}")]
    InvalidPath { path: String, message: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Vault request error: {0}")]
    Request(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status of a server-side failure
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::InvalidPath { .. } => Some(404),
            _ => None,
        }
    }

    /// True for any non-2xx response, including 404
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::InvalidPath { .. })
    }

    /// Message text reported by the server, if this error came from one
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Server { message, .. } | Self::InvalidPath { message, .. } => Some(message),
            _ => None,
        }
    }
}
