use anyhow::{Context, Result};
use geoacl_engine::CacheConfig;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_ENV: &str = "GEOACL_CONFIG";

// Host configuration sourced from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclConfig {
    // YAML seed file loaded into the stores at startup.
    pub rules_file: Option<PathBuf>,
    pub rules_cache: CacheConfig,
    pub admin_rules_cache: CacheConfig,
    // Wrap the engine in the invalidating result cache.
    pub cache_enabled: bool,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            rules_file: None,
            rules_cache: CacheConfig::default(),
            admin_rules_cache: CacheConfig::default(),
            cache_enabled: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AclConfigOverride {
    rules_file: Option<PathBuf>,
    rules_cache: Option<CacheOverride>,
    admin_rules_cache: Option<CacheOverride>,
    cache_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CacheOverride {
    max_entries: Option<u64>,
    expire_after_ms: Option<u64>,
}

impl CacheOverride {
    fn apply(self, config: &mut CacheConfig) {
        if let Some(value) = self.max_entries {
            config.max_entries = Some(value);
        }
        if let Some(value) = self.expire_after_ms {
            config.expire_after = Some(Duration::from_millis(value));
        }
    }
}

impl AclConfig {
    pub fn from_env() -> Result<Self> {
        let rules_file = std::env::var("GEOACL_RULES_FILE").ok().map(PathBuf::from);
        let rules_cache = cache_from_env("GEOACL_RULES_CACHE")?;
        let admin_rules_cache = cache_from_env("GEOACL_ADMIN_RULES_CACHE")?;
        let cache_enabled = std::env::var("GEOACL_CACHE_ENABLED")
            .ok()
            .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
            .unwrap_or(true);
        Ok(Self {
            rules_file,
            rules_cache,
            admin_rules_cache,
            cache_enabled,
        })
    }

    /// Environment first, then the YAML file at `path` (or `GEOACL_CONFIG`) on top.
    pub fn from_env_or_yaml(path: Option<&str>) -> Result<Self> {
        let mut config = Self::from_env()?;
        let path = match path {
            Some(path) => Some(path.to_string()),
            None => std::env::var(CONFIG_ENV).ok(),
        };
        if let Some(path) = path {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read {CONFIG_ENV}: {path}"))?;
            let override_cfg: AclConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse geoacl config yaml")?;
            if let Some(value) = override_cfg.rules_file {
                config.rules_file = Some(value);
            }
            if let Some(value) = override_cfg.rules_cache {
                value.apply(&mut config.rules_cache);
            }
            if let Some(value) = override_cfg.admin_rules_cache {
                value.apply(&mut config.admin_rules_cache);
            }
            if let Some(value) = override_cfg.cache_enabled {
                config.cache_enabled = value;
            }
        }
        Ok(config)
    }
}

fn cache_from_env(prefix: &str) -> Result<CacheConfig> {
    let max_entries = env_u64(&format!("{prefix}_MAX_ENTRIES"))?;
    let expire_after = env_u64(&format!("{prefix}_EXPIRE_AFTER_MS"))?.map(Duration::from_millis);
    Ok(CacheConfig {
        max_entries,
        expire_after,
    })
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("parse {key}")),
        Err(_) => Ok(None),
    }
}
