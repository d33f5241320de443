//! Configuration persistence
//!
//! `config.json` under the user config dir, with environment overrides for
//! the fields people actually rotate (key, endpoint, model).

use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API base URL, e.g. `https://api.example.com` (no trailing slash)
    pub base_url: String,
    pub api_key: String,
    /// Default completion model
    pub model: String,
    /// Skip per-tool confirmation prompts in the REPL
    pub auto_accept: bool,
    /// Gates advertisement and execution of `subagent_factory`
    pub subagent_experimental: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            model: String::new(),
            auto_accept: false,
            subagent_experimental: false,
        }
    }
}

impl Config {
    /// Load from disk (missing file yields defaults), then apply env overrides.
    pub fn load() -> Self {
        let mut cfg = match fs::read_to_string(paths::config_file()) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("config.json is invalid ({}), using defaults", e);
                Config::default()
            }),
            Err(_) => Config::default(),
        };

        if let Ok(v) = std::env::var("SKIPPER_BASE_URL") {
            cfg.base_url = v;
        }
        if let Ok(v) = std::env::var("SKIPPER_API_KEY") {
            cfg.api_key = v;
        }
        if let Ok(v) = std::env::var("SKIPPER_MODEL") {
            cfg.model = v;
        }
        cfg.base_url = cfg.base_url.trim_end_matches('/').to_string();
        cfg
    }

    pub fn save(&self) -> Result<(), CoreError> {
        let root = paths::config_root();
        fs::create_dir_all(&root)?;
        let blob = serde_json::to_string_pretty(self)?;
        fs::write(paths::config_file(), blob)?;
        Ok(())
    }

    /// Fatal-for-the-call checks before any request is issued.
    pub fn validate_for_api(&self) -> Result<(), CoreError> {
        if self.base_url.trim().is_empty() {
            return Err(CoreError::Config("base_url is not set".into()));
        }
        if self.api_key.trim().is_empty() {
            return Err(CoreError::Config("api_key is not set".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_fails_api_validation() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.validate_for_api(),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn validation_passes_with_url_and_key() {
        let cfg = Config {
            base_url: "https://api.example.com".into(),
            api_key: "sk-test".into(),
            ..Config::default()
        };
        assert!(cfg.validate_for_api().is_ok());
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = Config {
            base_url: "https://api.example.com".into(),
            api_key: "k".into(),
            model: "m-1".into(),
            auto_accept: true,
            subagent_experimental: true,
        };
        let blob = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&blob).unwrap();
        assert_eq!(back.model, "m-1");
        assert!(back.auto_accept);
        assert!(back.subagent_experimental);
    }
}
