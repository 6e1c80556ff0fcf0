// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "inclusion-import.yaml";

/// Runtime settings: YAML file first, then `INCLUSION_*` environment
/// variables on top.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub poll_interval_ms: u64,
    pub page_size: u32,
    pub request_timeout_secs: u64,
    pub store_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/".to_string(),
            api_token: None,
            poll_interval_ms: 2000,
            page_size: 100,
            request_timeout_secs: 30,
            store_path: PathBuf::from("inclusion-store.json"),
        }
    }
}

impl Config {
    /// Load `path` (or `inclusion-import.yaml` if present), then apply
    /// environment overrides. An explicit path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("no config file, using defaults");
                Self::default()
            }
        };
        cfg.apply_overrides(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg = Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply `INCLUSION_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("INCLUSION_API_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = lookup("INCLUSION_API_TOKEN") {
            self.api_token = Some(v);
        }
        if let Some(v) = lookup("INCLUSION_POLL_INTERVAL_MS") {
            self.poll_interval_ms = v
                .trim()
                .parse()
                .with_context(|| format!("INCLUSION_POLL_INTERVAL_MS={}", v))?;
        }
        if let Some(v) = lookup("INCLUSION_PAGE_SIZE") {
            self.page_size = v
                .trim()
                .parse()
                .with_context(|| format!("INCLUSION_PAGE_SIZE={}", v))?;
        }
        if let Some(v) = lookup("INCLUSION_STORE_PATH") {
            self.store_path = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.poll_interval_ms > 0, "poll_interval_ms must be positive");
        anyhow::ensure!(self.page_size > 0, "page_size must be positive");
        anyhow::ensure!(
            self.request_timeout_secs > 0,
            "request_timeout_secs must be positive"
        );
        anyhow::ensure!(!self.api_base_url.trim().is_empty(), "api_base_url is empty");
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
