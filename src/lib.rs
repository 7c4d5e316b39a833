//! vault-api - Rust client for the HashiCorp Vault HTTP API
//!
//! Covers the token lifecycle (create, lookup, renew, revoke, accessors, roles,
//! capabilities), the auth method registry and a session login flow:
//! 1. `token_only` → log in and hand back the token, nothing is installed
//! 2. credential already installed and no `renew` → no-op
//! 3. `use_cache` hit → install the cached token
//! 4. otherwise → log in with the auth method and install the issued token

pub mod auth;
mod client;
mod error;
mod models;
pub mod session;
mod transport;
mod validation;

pub use auth::{AuthMethod, AuthRegistry, Credentials, TokenManager};
pub use client::{VaultClient, VaultClientBuilder};
pub use error::VaultError;
pub use models::{AuthInfo, AuthMount, MountTuning, TokenMetadata, TokenRole, WrapInfo, Wrapped};
pub use session::{LoginOutcome, LoginRequest};
pub use transport::{ApiRequest, Transport};
