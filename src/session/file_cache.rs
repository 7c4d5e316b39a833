use super::{SessionCache, SessionKey};
use crate::VaultError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Serialize, Deserialize)]
struct CachedToken {
    token: String,
    /// Unix timestamp; absent for tokens without a lease
    expires_at: Option<u64>,
}

/// Session cache persisted as one JSON file per key in the user cache directory
pub struct FileSessionCache {
    cache_dir: PathBuf,
}

impl FileSessionCache {
    pub fn new() -> Option<Self> {
        directories::ProjectDirs::from("", "", "vault-api").map(|dirs| Self {
            cache_dir: dirs.cache_dir().join("sessions"),
        })
    }

    pub fn in_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn cache_key(key: &SessionKey) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&key.address);
        hasher.update([0u8]);
        hasher.update(&key.method);
        hasher.update([0u8]);
        hasher.update(&key.mount);
        format!("{:x}", hasher.finalize())
    }

    fn cache_path(&self, key: &SessionKey) -> PathBuf {
        self.cache_dir.join(format!("{}.json", Self::cache_key(key)))
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl SessionCache for FileSessionCache {
    /// Expired entries are ignored
    fn get(&self, key: &SessionKey) -> Option<String> {
        let content = std::fs::read_to_string(self.cache_path(key)).ok()?;
        let cached: CachedToken = serde_json::from_str(&content).ok()?;

        match cached.expires_at {
            Some(expires_at) if expires_at <= now() => None,
            _ => Some(cached.token),
        }
    }

    fn set(&self, key: &SessionKey, token: &str, lease: Duration) -> Result<(), VaultError> {
        std::fs::create_dir_all(&self.cache_dir)?;

        let cached = CachedToken {
            token: token.to_string(),
            expires_at: (!lease.is_zero()).then(|| now() + lease.as_secs()),
        };

        let content = serde_json::to_string(&cached)?;
        std::fs::write(self.cache_path(key), content)?;
        Ok(())
    }

    fn invalidate(&self, key: &SessionKey) {
        let _ = std::fs::remove_file(self.cache_path(key));
    }

    fn clear(&self) {
        let Ok(entries) = std::fs::read_dir(&self.cache_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}
