use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PanelConfig {
    pub base_url: String,
    pub state_file: PathBuf,
    pub download_dir: PathBuf,
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            state_file: PathBuf::from("./listpanel-state.toml"),
            download_dir: PathBuf::from("."),
            timeout_secs: None,
            user_agent: format!("listpanel/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl PanelConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Reads the config file; a missing file means defaults.
pub fn load_config(path: &str) -> Result<PanelConfig, Box<dyn std::error::Error>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(PanelConfig::default()),
        Err(err) => return Err(err.into()),
    };
    let config: PanelConfig = toml::from_str(&text)?;
    Ok(config)
}

pub fn save_config(path: &str, config: &PanelConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(config)?;
    fs::write(path, toml_str)?;
    Ok(())
}
