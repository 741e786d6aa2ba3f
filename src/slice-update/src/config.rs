//! Update configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{BINARY_NAME, GITHUB_API_URL, REPO_NAME, REPO_OWNER};

/// Where the update settings live on disk.
///
/// Everything is optional; missing fields fall back to the built-in release
/// location of slice itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// GitHub account that publishes releases
    #[serde(default = "default_owner")]
    pub owner: String,

    /// GitHub repository that publishes releases
    #[serde(default = "default_repo")]
    pub repo: String,

    /// Name of the executable inside release archives
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Base URL of the GitHub REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Static JSON manifest used instead of the GitHub API when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,

    /// Deadline for the release query, in seconds
    #[serde(default = "default_check_timeout")]
    pub check_timeout_secs: u64,

    /// Deadline for the asset download, in seconds
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

fn default_owner() -> String {
    REPO_OWNER.to_string()
}

fn default_repo() -> String {
    REPO_NAME.to_string()
}

fn default_binary_name() -> String {
    BINARY_NAME.to_string()
}

fn default_api_url() -> String {
    GITHUB_API_URL.to_string()
}

fn default_check_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    300
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            repo: default_repo(),
            binary_name: default_binary_name(),
            api_url: default_api_url(),
            manifest_url: None,
            check_timeout_secs: default_check_timeout(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

impl UpdateConfig {
    /// Path of the config file (~/.slice/update.json).
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".slice").join("update.json"))
    }

    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        match Self::config_path().filter(|p| p.exists()) {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load config from a specific file, falling back to defaults.
    ///
    /// A broken file is logged and ignored so that `slice update` can still
    /// repair an installation whose settings went bad.
    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring invalid update config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Request timeout for the release query.
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs.max(1))
    }

    /// Request timeout for the asset download.
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_at_slice_releases() {
        let config = UpdateConfig::default();
        assert_eq!(config.owner, "archangelgroupco");
        assert_eq!(config.repo, "slice");
        assert_eq!(config.binary_name, "slice");
        assert_eq!(config.api_url, "https://api.github.com");
        assert!(config.manifest_url.is_none());
        assert_eq!(config.check_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update.json");
        std::fs::write(
            &path,
            r#"{"manifest_url": "https://example.com/latest.json", "check_timeout_secs": 5}"#,
        )
        .unwrap();

        let config = UpdateConfig::load_from(&path);
        assert_eq!(
            config.manifest_url.as_deref(),
            Some("https://example.com/latest.json")
        );
        assert_eq!(config.check_timeout(), Duration::from_secs(5));
        assert_eq!(config.repo, "slice");
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update.json");
        std::fs::write(&path, "not json").unwrap();

        assert_eq!(UpdateConfig::load_from(&path), UpdateConfig::default());
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let config = UpdateConfig {
            download_timeout_secs: 0,
            ..UpdateConfig::default()
        };
        assert_eq!(config.download_timeout(), Duration::from_secs(1));
    }
}
