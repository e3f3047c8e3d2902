use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const ENV_AVATAR_CACHE: &str = "FOLKS_CONTACTS_AVATAR_CACHE";
const ENV_LOG: &str = "FOLKS_CONTACTS_LOG";

const APP_DIR: &str = "folks-contacts";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Manager parameters, folded into the manager URI.
    pub parameters: BTreeMap<String, String>,
    pub avatar_cache_dir: Option<PathBuf>,
    /// Upper bound on the startup wait for the first population, 0 = none.
    pub initial_population_timeout_ms: u64,
    /// Finish save/remove requests that carry no items instead of dropping them.
    pub finish_empty_requests: bool,
    pub log_filter: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            parameters: BTreeMap::new(),
            avatar_cache_dir: None,
            initial_population_timeout_ms: 0,
            finish_empty_requests: false,
            log_filter: "folks_contacts=info".to_string(),
        }
    }
}

impl ManagerConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location; a missing file gives defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(path),
            None => {
                let mut config = Self::default();
                config.apply_overrides(|key| env::var(key).ok());
                Ok(config)
            }
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?;
        }
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_AVATAR_CACHE).filter(|v| !v.is_empty()) {
            self.avatar_cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|v| !v.is_empty()) {
            self.log_filter = filter;
        }
    }

    pub fn avatar_cache_dir(&self) -> PathBuf {
        self.avatar_cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(env::temp_dir)
                .join(APP_DIR)
                .join("avatars")
        })
    }

    /// `contacts:folks:` followed by `key=value` pairs joined with `&`.
    pub fn manager_uri(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("contacts:folks:{}", params.join("&"))
    }
}
