use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{CaptureError, Result};

/// Main configuration structure for codex-capture
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// What gets captured and where it is written
    #[serde(default)]
    pub capture: CaptureConfig,
    /// HTTP proxy configuration
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl Config {
    /// Load configuration from an explicit path, or from the first default
    /// location that exists, falling back to built-in defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        for path in default_config_paths().iter().flatten() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CaptureError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content)
            .map_err(|e| CaptureError::Config(format!("Failed to parse config: {e}")))
    }
}

fn default_config_paths() -> [Option<PathBuf>; 3] {
    [
        dirs::home_dir().map(|h| h.join(".codex-capture").join("config.toml")),
        dirs::config_dir().map(|c| c.join("codex-capture").join("config.toml")),
        Some(PathBuf::from("config.toml")),
    ]
}

/// Capture behaviour configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Explicit capture directory (overrides `CODEX_CAPTURE_DIR`)
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Substring the request URL must contain (empty = capture everything)
    #[serde(default)]
    pub filter: String,
    /// Only capture POST requests whose body mentions a `"model"` field
    #[serde(default = "default_llm_only")]
    pub llm_only: bool,
    /// Maximum characters kept in assistant text/reasoning previews
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    /// Maximum characters kept in the last user message preview
    #[serde(default = "default_user_preview_chars")]
    pub user_preview_chars: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dir: None,
            filter: String::new(),
            llm_only: default_llm_only(),
            preview_chars: default_preview_chars(),
            user_preview_chars: default_user_preview_chars(),
        }
    }
}

fn default_llm_only() -> bool {
    true
}

fn default_preview_chars() -> usize {
    800
}

fn default_user_preview_chars() -> usize {
    300
}

/// HTTP proxy server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Address to listen on (e.g., "127.0.0.1:18110")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Model server that requests outside `/p/{url}` are forwarded to
    #[serde(default = "default_upstream_url")]
    pub upstream_url: Option<String>,
    /// Allowed upstream hosts for dynamic passthrough (empty = allow all)
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    /// Longest silence from upstream, in seconds, before a relay is
    /// abandoned. Bounds each read, not the whole response.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Seconds allowed to establish the upstream connection
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            upstream_url: default_upstream_url(),
            allowed_hosts: Vec::new(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:18110".to_string()
}

fn default_upstream_url() -> Option<String> {
    Some("http://127.0.0.1:11434".to_string())
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}
