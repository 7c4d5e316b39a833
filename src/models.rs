use crate::VaultError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// `auth` block returned by login, token creation and renewal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthInfo {
    pub client_token: String,
    #[serde(default)]
    pub accessor: String,
    #[serde(default, deserialize_with = "string_list")]
    pub policies: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub token_policies: Vec<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub orphan: bool,
    #[serde(default)]
    pub num_uses: u32,
    #[serde(skip, default = "Instant::now")]
    pub obtained_at: Instant,
}

impl AuthInfo {
    /// Bundle for a token whose details are not known locally
    pub fn from_token(token: String) -> Self {
        Self {
            client_token: token,
            accessor: String::new(),
            policies: Vec::new(),
            token_policies: Vec::new(),
            metadata: None,
            lease_duration: 0,
            renewable: false,
            entity_id: String::new(),
            token_type: String::new(),
            orphan: false,
            num_uses: 0,
            obtained_at: Instant::now(),
        }
    }

    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_duration)
    }

    /// Check if token needs refresh (at threshold % of lease).
    ///
    /// `threshold` is clamped to `0.0..=1.0`; NaN counts as `1.0`.
    pub fn needs_refresh(&self, threshold: f64) -> bool {
        if self.lease_duration == 0 {
            return false;
        }
        let threshold = if threshold.is_nan() {
            1.0
        } else {
            threshold.clamp(0.0, 1.0)
        };
        let threshold_duration = Duration::from_secs_f64(self.lease().as_secs_f64() * threshold);
        self.obtained_at.elapsed() >= threshold_duration
    }

    /// Lease elapsed since the response was received; zero-lease tokens never expire
    pub fn is_expired(&self) -> bool {
        if self.lease_duration == 0 {
            return false;
        }
        self.obtained_at.elapsed() >= self.lease()
    }
}

/// Token properties as reported by the lookup endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub accessor: String,
    #[serde(default, deserialize_with = "string_list")]
    pub policies: Vec<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub num_uses: u32,
    #[serde(default)]
    pub orphan: bool,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub ttl: u64,
    #[serde(default)]
    pub creation_ttl: u64,
    #[serde(default)]
    pub explicit_max_ttl: u64,
    #[serde(default)]
    pub period: Option<u64>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub meta: Option<HashMap<String, String>>,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default, rename = "type")]
    pub token_type: String,
    #[serde(default)]
    pub creation_time: u64,
    #[serde(default)]
    pub issue_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expire_time: Option<DateTime<Utc>>,
}

/// `wrap_info` block returned instead of data when response wrapping is requested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrapInfo {
    pub token: String,
    #[serde(default)]
    pub accessor: String,
    pub ttl: u64,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub creation_path: String,
    #[serde(default)]
    pub wrapped_accessor: Option<String>,
}

/// Either the direct result or a wrapping token that must be unwrapped later
#[derive(Debug, Clone)]
pub enum Wrapped<T> {
    Data(T),
    Wrapped(WrapInfo),
}

impl<T> Wrapped<T> {
    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Data(data) => Some(data),
            Self::Wrapped(_) => None,
        }
    }

    pub fn wrap_info(&self) -> Option<&WrapInfo> {
        match self {
            Self::Data(_) => None,
            Self::Wrapped(info) => Some(info),
        }
    }
}

/// Server-side template for tokens created under a role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRole {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "string_list")]
    pub allowed_policies: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub disallowed_policies: Vec<String>,
    #[serde(default)]
    pub orphan: bool,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub period: u64,
    #[serde(default)]
    pub explicit_max_ttl: u64,
    #[serde(default)]
    pub path_suffix: String,
    #[serde(default, deserialize_with = "string_list")]
    pub token_bound_cidrs: Vec<String>,
    #[serde(default)]
    pub token_type: String,
}

/// One row of the mounted auth methods listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMount {
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type")]
    pub method_type: String,
    #[serde(default)]
    pub accessor: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub local: bool,
}

/// Mount tuning as read from `sys/auth/{path}/tune`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MountTuning {
    #[serde(default)]
    pub default_lease_ttl: u64,
    #[serde(default)]
    pub max_lease_ttl: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub listing_visibility: Option<String>,
}

/// Vault returns string lists as an array, a comma separated string or null
pub(crate) fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Raw::List(list)) => normalize_policies(list),
        Some(Raw::Joined(joined)) => normalize_policies(joined.split(',').map(str::to_string)),
    })
}

pub(crate) fn normalize_policies<I>(policies: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    policies
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

pub(crate) fn data<T: DeserializeOwned>(response: serde_json::Value) -> Result<T, VaultError> {
    match response.get("data") {
        Some(data) if !data.is_null() => Ok(T::deserialize(data)?),
        _ => Err(VaultError::Request("Invalid response: missing data".to_string())),
    }
}

pub(crate) fn auth(response: serde_json::Value) -> Result<AuthInfo, VaultError> {
    match response.get("auth") {
        Some(auth) if !auth.is_null() => Ok(AuthInfo::deserialize(auth)?),
        _ => Err(VaultError::Request("Invalid response: missing auth".to_string())),
    }
}

pub(crate) fn wrapped_auth(response: serde_json::Value) -> Result<Wrapped<AuthInfo>, VaultError> {
    match response.get("wrap_info") {
        Some(info) if !info.is_null() => Ok(Wrapped::Wrapped(WrapInfo::deserialize(info)?)),
        _ => auth(response).map(Wrapped::Data),
    }
}

/// `data.keys` of a LIST response
pub(crate) fn keys(response: serde_json::Value) -> Result<Vec<String>, VaultError> {
    #[derive(Deserialize)]
    struct Keys {
        #[serde(default)]
        keys: Vec<String>,
    }
    Ok(data::<Keys>(response)?.keys)
}
