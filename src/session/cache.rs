use crate::VaultError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

/// Identifies one login target: server, method type and mount
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub address: String,
    pub method: String,
    pub mount: String,
}

impl SessionKey {
    pub fn new(address: impl Into<String>, method: impl Into<String>, mount: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            method: method.into(),
            mount: mount.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}@{}", self.address, self.method, self.mount)
    }
}

/// Store for tokens obtained by earlier successful logins
pub trait SessionCache: Send + Sync {
    fn get(&self, key: &SessionKey) -> Option<String>;

    /// `lease` is the token's lease; zero means it does not expire
    fn set(&self, key: &SessionKey, token: &str, lease: Duration) -> Result<(), VaultError>;

    fn invalidate(&self, key: &SessionKey);

    fn clear(&self);
}

/// Process-local cache, lost when the client is dropped
#[derive(Default)]
pub struct MemorySessionCache {
    entries: Mutex<HashMap<SessionKey, String>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionCache for MemorySessionCache {
    fn get(&self, key: &SessionKey) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &SessionKey, token: &str, _lease: Duration) -> Result<(), VaultError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| VaultError::Request("session cache lock poisoned".to_string()))?;
        entries.insert(key.clone(), token.to_string());
        Ok(())
    }

    fn invalidate(&self, key: &SessionKey) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
