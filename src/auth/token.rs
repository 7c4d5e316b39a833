use super::{AuthMethod, Credentials, wrong_credentials};
use crate::models::{self, AuthInfo, TokenMetadata, TokenRole, Wrapped};
use crate::transport::{ApiRequest, Transport};
use crate::{VaultError, validation};
use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const MOUNT: &str = "token";
const TOKEN_TYPES: [&str; 5] = ["service", "batch", "default", "default-service", "default-batch"];

/// Arguments of a token create call; unset fields are left to the server
#[derive(Debug, Clone, Default)]
pub struct CreateTokenOptions {
    pub role_name: Option<String>,
    pub id: Option<String>,
    pub policies: Option<Vec<String>>,
    pub meta: Option<HashMap<String, String>>,
    pub orphan: bool,
    pub no_default_policy: bool,
    pub max_ttl: Option<String>,
    pub display_name: Option<String>,
    /// 0 means unlimited
    pub num_uses: u32,
    pub period: Option<String>,
    pub ttl: Option<String>,
    pub renewable: Option<bool>,
    pub wrap_ttl: Option<String>,
}

impl CreateTokenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role_name(mut self, role: impl Into<String>) -> Self {
        self.role_name = Some(role.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn policies<I, S>(mut self, policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policies = Some(policies.into_iter().map(Into::into).collect());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn orphan(mut self, orphan: bool) -> Self {
        self.orphan = orphan;
        self
    }

    pub fn no_default_policy(mut self, no_default_policy: bool) -> Self {
        self.no_default_policy = no_default_policy;
        self
    }

    pub fn max_ttl(mut self, max_ttl: impl Into<String>) -> Self {
        self.max_ttl = Some(max_ttl.into());
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn num_uses(mut self, num_uses: u32) -> Self {
        self.num_uses = num_uses;
        self
    }

    pub fn period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }

    pub fn ttl(mut self, ttl: impl Into<String>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    pub fn renewable(mut self, renewable: bool) -> Self {
        self.renewable = Some(renewable);
        self
    }

    pub fn wrap_ttl(mut self, wrap_ttl: impl Into<String>) -> Self {
        self.wrap_ttl = Some(wrap_ttl.into());
        self
    }

    fn validate(&self) -> Result<(), VaultError> {
        if let Some(ref role) = self.role_name {
            validation::segment("role name", role)?;
        }
        if let Some(ref id) = self.id {
            validation::non_empty("token id", id)?;
        }
        if let Some(ref policies) = self.policies {
            validation::policies(policies)?;
        }
        if let Some(ref meta) = self.meta {
            for key in meta.keys() {
                validation::non_empty("meta key", key)?;
            }
        }
        if let Some(ref name) = self.display_name {
            validation::non_empty("display name", name)?;
        }
        validation::optional_duration("max_ttl", self.max_ttl.as_deref())?;
        validation::optional_duration("period", self.period.as_deref())?;
        validation::optional_duration("ttl", self.ttl.as_deref())?;
        validation::optional_duration("wrap_ttl", self.wrap_ttl.as_deref())?;
        Ok(())
    }

    fn path(&self) -> String {
        match (&self.role_name, self.orphan) {
            (Some(role), _) => format!("create/{}", role),
            (None, true) => "create-orphan".to_string(),
            (None, false) => "create".to_string(),
        }
    }

    fn body(&self) -> CreateTokenBody<'_> {
        CreateTokenBody {
            id: self.id.as_deref(),
            policies: self.policies.as_ref().map(|p| models::normalize_policies(p.iter().cloned())),
            meta: self.meta.as_ref(),
            no_parent: self.orphan,
            no_default_policy: self.no_default_policy,
            explicit_max_ttl: self.max_ttl.as_deref(),
            display_name: self.display_name.as_deref(),
            num_uses: self.num_uses,
            period: self.period.as_deref(),
            ttl: self.ttl.as_deref(),
            renewable: self.renewable,
        }
    }
}

#[derive(Serialize)]
struct CreateTokenBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    policies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<&'a HashMap<String, String>>,
    #[serde(skip_serializing_if = "is_false")]
    no_parent: bool,
    #[serde(skip_serializing_if = "is_false")]
    no_default_policy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    explicit_max_ttl: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "is_zero")]
    num_uses: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    period: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    renewable: Option<bool>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// Settings written to a token role; unset fields keep their server value
#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenRoleOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_policies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disallowed_policies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphan: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "token_period")]
    pub period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "token_explicit_max_ttl")]
    pub explicit_max_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_bound_cidrs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenRoleOptions {
    fn validate(&self) -> Result<(), VaultError> {
        if let Some(ref policies) = self.allowed_policies {
            validation::policies(policies)?;
        }
        if let Some(ref policies) = self.disallowed_policies {
            validation::policies(policies)?;
        }
        validation::optional_duration("period", self.period.as_deref())?;
        validation::optional_duration("explicit_max_ttl", self.explicit_max_ttl.as_deref())?;
        if let Some(ref suffix) = self.path_suffix {
            if suffix.contains('/') {
                return Err(VaultError::validation("path_suffix must not contain '/'"));
            }
        }
        if let Some(ref cidrs) = self.token_bound_cidrs {
            for cidr in cidrs {
                validation::non_empty("bound CIDR", cidr)?;
            }
        }
        if let Some(ref token_type) = self.token_type {
            if !TOKEN_TYPES.contains(&token_type.as_str()) {
                return Err(VaultError::validation(format!(
                    "token_type must be one of {:?}, got {:?}",
                    TOKEN_TYPES, token_type
                )));
            }
        }
        Ok(())
    }
}

/// Token lifecycle operations of a token store mount, `auth/token` by default
#[derive(Clone)]
pub struct TokenManager {
    transport: Arc<Transport>,
    mount: String,
}

impl TokenManager {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self::with_mount(transport, MOUNT)
    }

    pub fn with_mount(transport: Arc<Transport>, mount: impl Into<String>) -> Self {
        Self {
            transport,
            mount: mount.into(),
        }
    }

    pub(crate) fn boxed(transport: Arc<Transport>, mount: String) -> Arc<dyn AuthMethod> {
        Arc::new(Self::with_mount(transport, mount))
    }

    fn path(&self, endpoint: &str) -> String {
        format!("auth/{}/{}", self.mount, endpoint)
    }

    /// Create a token, or a wrapping token for it when `wrap_ttl` is set
    pub async fn create(&self, options: &CreateTokenOptions) -> Result<Wrapped<AuthInfo>, VaultError> {
        options.validate()?;
        let path = self.path(&options.path());
        let body = serde_json::to_value(options.body())?;

        let response = self
            .transport
            .send(
                ApiRequest::new(Method::POST, &path)
                    .body(&body)
                    .wrap_ttl(options.wrap_ttl.as_deref()),
            )
            .await?;
        models::wrapped_auth(response)
    }

    pub async fn lookup(&self, token: &str) -> Result<TokenMetadata, VaultError> {
        validation::non_empty("token", token)?;
        let response = self
            .transport
            .post(&self.path("lookup"), &json!({ "token": token }))
            .await?;
        models::data(response)
    }

    pub async fn lookup_self(&self) -> Result<TokenMetadata, VaultError> {
        let response = self.transport.get(&self.path("lookup-self")).await?;
        models::data(response)
    }

    /// Metadata for the token behind `accessor`; the token id is never returned
    pub async fn lookup_accessor(&self, accessor: &str) -> Result<TokenMetadata, VaultError> {
        validation::non_empty("accessor", accessor)?;
        let response = self
            .transport
            .post(&self.path("lookup-accessor"), &json!({ "accessor": accessor }))
            .await?;
        let mut metadata: TokenMetadata = models::data(response)?;
        metadata.id.clear();
        Ok(metadata)
    }

    pub async fn renew(&self, token: &str, increment: Option<&str>) -> Result<AuthInfo, VaultError> {
        validation::non_empty("token", token)?;
        validation::optional_duration("increment", increment)?;
        let mut body = json!({ "token": token });
        if let Some(increment) = increment {
            body["increment"] = json!(increment);
        }
        let response = self.transport.post(&self.path("renew"), &body).await?;
        models::auth(response)
    }

    pub async fn renew_self(&self, increment: Option<&str>) -> Result<AuthInfo, VaultError> {
        validation::optional_duration("increment", increment)?;
        let body = match increment {
            Some(increment) => json!({ "increment": increment }),
            None => json!({}),
        };
        let response = self.transport.post(&self.path("renew-self"), &body).await?;
        models::auth(response)
    }

    pub async fn renew_accessor(
        &self,
        accessor: &str,
        increment: Option<&str>,
    ) -> Result<AuthInfo, VaultError> {
        validation::non_empty("accessor", accessor)?;
        validation::optional_duration("increment", increment)?;
        let mut body = json!({ "accessor": accessor });
        if let Some(increment) = increment {
            body["increment"] = json!(increment);
        }
        let response = self.transport.post(&self.path("renew-accessor"), &body).await?;
        models::auth(response)
    }

    pub async fn revoke(&self, token: &str) -> Result<(), VaultError> {
        validation::non_empty("token", token)?;
        self.transport
            .post(&self.path("revoke"), &json!({ "token": token }))
            .await?;
        Ok(())
    }

    pub async fn revoke_self(&self) -> Result<(), VaultError> {
        self.transport.post(&self.path("revoke-self"), &json!({})).await?;
        Ok(())
    }

    pub async fn revoke_accessor(&self, accessor: &str) -> Result<(), VaultError> {
        validation::non_empty("accessor", accessor)?;
        self.transport
            .post(&self.path("revoke-accessor"), &json!({ "accessor": accessor }))
            .await?;
        Ok(())
    }

    /// Revoke `token` but keep its children alive, re-parented to the root
    pub async fn revoke_and_orphan(&self, token: &str) -> Result<(), VaultError> {
        validation::non_empty("token", token)?;
        self.transport
            .post(&self.path("revoke-orphan"), &json!({ "token": token }))
            .await?;
        Ok(())
    }

    pub async fn capabilities(
        &self,
        paths: &[String],
        token: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, VaultError> {
        validation::paths(paths)?;
        validation::non_empty("token", token)?;
        let response = self
            .transport
            .post("sys/capabilities", &json!({ "paths": paths, "token": token }))
            .await?;
        Ok(capabilities_by_path(paths, &response))
    }

    pub async fn capabilities_self(
        &self,
        paths: &[String],
    ) -> Result<BTreeMap<String, Vec<String>>, VaultError> {
        validation::paths(paths)?;
        let response = self
            .transport
            .post("sys/capabilities-self", &json!({ "paths": paths }))
            .await?;
        Ok(capabilities_by_path(paths, &response))
    }

    pub async fn capabilities_accessor(
        &self,
        paths: &[String],
        accessor: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, VaultError> {
        validation::paths(paths)?;
        validation::non_empty("accessor", accessor)?;
        let response = self
            .transport
            .post(
                "sys/capabilities-accessor",
                &json!({ "paths": paths, "accessor": accessor }),
            )
            .await?;
        Ok(capabilities_by_path(paths, &response))
    }

    pub async fn role_read(&self, role_name: &str) -> Result<TokenRole, VaultError> {
        validation::segment("role name", role_name)?;
        let response = self
            .transport
            .get(&self.path(&format!("roles/{}", role_name)))
            .await?;
        models::data(response)
    }

    /// Role names; a missing roles path is reported as no roles
    // FIXME: a 404 here cannot be told apart from a misrouted request (e.g. a wrong namespace).
    pub async fn role_list(&self) -> Result<Vec<String>, VaultError> {
        match self.transport.list(&self.path("roles")).await {
            Ok(response) => models::keys(response),
            Err(VaultError::InvalidPath { .. }) => {
                tracing::debug!("No token roles defined");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn role_write(&self, role_name: &str, options: &TokenRoleOptions) -> Result<(), VaultError> {
        validation::segment("role name", role_name)?;
        options.validate()?;
        let body = serde_json::to_value(options)?;
        self.transport
            .post(&self.path(&format!("roles/{}", role_name)), &body)
            .await?;
        Ok(())
    }

    pub async fn role_delete(&self, role_name: &str) -> Result<(), VaultError> {
        validation::segment("role name", role_name)?;
        self.transport
            .delete(&self.path(&format!("roles/{}", role_name)))
            .await?;
        Ok(())
    }

    /// Ask the server to clean up stale token entries
    pub async fn tidy(&self) -> Result<(), VaultError> {
        self.transport.post(&self.path("tidy"), &json!({})).await?;
        Ok(())
    }

    /// Verify that a token is accepted by the server and return it unchanged.
    ///
    /// Falls back to the configured default token when `token` is `None`.
    pub async fn login(&self, token: Option<&str>, quiet: bool) -> Result<String, VaultError> {
        let (token, _) = self.verify(token).await?;
        if !quiet {
            tracing::info!("Token accepted by Vault");
        }
        Ok(token)
    }

    async fn verify(&self, token: Option<&str>) -> Result<(String, TokenMetadata), VaultError> {
        let token = token
            .or_else(|| self.transport.default_token())
            .ok_or(VaultError::CredentialMissing)?
            .to_string();
        validation::non_empty("token", &token)?;

        let path = self.path("lookup-self");
        let response = self
            .transport
            .send(ApiRequest::new(Method::GET, &path).token(&token))
            .await
            .map_err(|e| match e {
                VaultError::Server { message, .. } | VaultError::InvalidPath { message, .. } => {
                    VaultError::Authentication(message)
                }
                other => other,
            })?;

        let metadata = models::data(response)?;
        Ok((token, metadata))
    }
}

#[async_trait]
impl AuthMethod for TokenManager {
    fn method_type(&self) -> &str {
        MOUNT
    }

    fn mount_path(&self) -> &str {
        &self.mount
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthInfo, VaultError> {
        let Credentials::Token(token) = credentials else {
            return Err(wrong_credentials(MOUNT, credentials));
        };
        let (token, metadata) = self.verify(token.as_deref()).await?;

        let mut auth = AuthInfo::from_token(token);
        auth.accessor = metadata.accessor;
        auth.policies = metadata.policies;
        auth.metadata = metadata.meta;
        auth.lease_duration = metadata.ttl;
        auth.renewable = metadata.renewable;
        auth.entity_id = metadata.entity_id;
        auth.token_type = metadata.token_type;
        auth.orphan = metadata.orphan;
        auth.num_uses = metadata.num_uses;
        Ok(auth)
    }
}

/// Paths the server did not report on get the conventional `["deny"]`
fn capabilities_by_path(paths: &[String], response: &Value) -> BTreeMap<String, Vec<String>> {
    let data = match response.get("data") {
        Some(data) if data.is_object() => data,
        _ => response,
    };

    let as_list = |value: Option<&Value>| -> Option<Vec<String>> {
        value.and_then(|v| serde_json::from_value(v.clone()).ok())
    };

    paths
        .iter()
        .map(|path| {
            let caps = as_list(data.get(path.as_str()))
                .or_else(|| {
                    // single-path responses from older servers only carry "capabilities"
                    if paths.len() == 1 {
                        as_list(data.get("capabilities"))
                    } else {
                        None
                    }
                })
                .unwrap_or_else(|| vec!["deny".to_string()]);
            (path.clone(), caps)
        })
        .collect()
}
