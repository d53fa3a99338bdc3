//! Client configuration.
//!
//! Read from `<config dir>/filerelay/config.json`; every field is optional.
//! `FILERELAY_API_URL`, `FILERELAY_TOKEN` and `FILERELAY_SESSION_ID`
//! override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use filerelay_protocol::Credentials;
use filerelay_protocol::constants::{
    BLOB_RELEASE_DELAY, DOWNLOAD_TIMEOUT, RETRY_ATTEMPTS, RETRY_DELAY,
};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub const ENV_API_URL: &str = "FILERELAY_API_URL";
pub const ENV_TOKEN: &str = "FILERELAY_TOKEN";
pub const ENV_SESSION_ID: &str = "FILERELAY_SESSION_ID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API origin, e.g. `https://chat.example.com`. Empty means relative URLs.
    pub api_url: String,
    pub token: String,
    pub session_id: String,
    pub download_timeout_secs: u64,
    pub blob_release_delay_ms: u64,
    /// Retry budget for callers acting on `retryable`; never used internally.
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Where downloaded files are written by the CLI.
    pub download_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            token: String::new(),
            session_id: String::new(),
            download_timeout_secs: DOWNLOAD_TIMEOUT.as_secs(),
            blob_release_delay_ms: BLOB_RELEASE_DELAY.as_millis() as u64,
            retry_attempts: RETRY_ATTEMPTS,
            retry_delay_ms: RETRY_DELAY.as_millis() as u64,
            download_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    /// Loads the config file (if any) and applies environment overrides.
    pub fn load() -> Result<Self, ClientError> {
        let path = config_path()
            .ok_or_else(|| ClientError::Config("config directory not available".into()))?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Reads `path`. A missing file yields defaults; an unparsable one is
    /// logged and also yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ClientError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Self>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse client config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    /// Writes the config as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ClientError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        set_permissions_0600(path);
        tracing::debug!(path = %path.display(), "client config saved");
        Ok(())
    }

    /// Applies non-empty overrides looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(v) = get(ENV_API_URL) {
            self.api_url = v;
        }
        if let Some(v) = get(ENV_TOKEN) {
            self.token = v;
        }
        if let Some(v) = get(ENV_SESSION_ID) {
            self.session_id = v;
        }
    }

    /// The configured credentials, if both parts are set.
    pub fn credentials(&self) -> Option<Credentials> {
        let creds = Credentials::new(self.token.clone(), self.session_id.clone());
        creds.is_complete().then_some(creds)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn blob_release_delay(&self) -> Duration {
        Duration::from_millis(self.blob_release_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// `<config dir>/filerelay/config.json`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("filerelay").join("config.json"))
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}
