use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Service configuration: the fixed GitHub token, the static public-API
/// key, and where the local activity database lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Static bearer key accepted by the public upload API.
    #[serde(default)]
    pub static_api_key: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

/// Per-user data root: `<platform data dir>/gitdrive/`.
fn default_data_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("gitdrive")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".gitdrive")
    } else {
        PathBuf::from(".gitdrive")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_token: String::new(),
            api_base: default_api_base(),
            static_api_key: None,
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    /// Load from `<config_dir>/gitdrive/config.json` (if present), then
    /// apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = dirs::config_dir().map(|d| d.join("gitdrive").join("config.json"));
        let mut config = match path.as_deref() {
            Some(p) if p.exists() => Self::from_file(p)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {e}", path.display()))?;
        let config = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("GITDRIVE_GITHUB_TOKEN") {
            self.github_token = v;
        }
        if let Ok(v) = std::env::var("GITDRIVE_API_BASE") {
            self.api_base = v;
        }
        if let Ok(v) = std::env::var("GITDRIVE_API_KEY") {
            self.static_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("GITDRIVE_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
    }

    /// Path of the SQLite database holding logs, metadata, and API keys.
    pub fn activity_db_path(&self) -> PathBuf {
        self.data_dir.join("activity.db")
    }
}
