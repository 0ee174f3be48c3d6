//! Service configuration
//!
//! Defaults, then an optional TOML file, then `GK_*` environment overrides.

use gk_core::{ArtifactLayout, ModelVariant};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Result, ServiceError};

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "GK_CONFIG";
/// Config file used when `GK_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/service.toml";

/// Runtime configuration for the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: String,
    /// Root of the trainer's artifact layout
    pub artifacts_dir: PathBuf,
    /// Pin a variant; `None` serves the evaluator's best model
    pub model_variant: Option<ModelVariant>,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            artifacts_dir: PathBuf::from("."),
            model_variant: None,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load from the config file (if any) and the process environment
    pub fn load() -> Result<Self> {
        let explicit = env::var(CONFIG_PATH_ENV).ok();
        let path = explicit
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else if explicit.is_some() {
            return Err(ServiceError::Config(format!("config file {path} does not exist")));
        } else {
            Self::default()
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ServiceError::Config(format!("Failed to parse config file: {e}")))
    }

    /// Apply `GK_*` overrides; `lookup` returns the variable's value if set.
    ///
    /// `GK_MODEL_VARIANT=best` clears a pinned variant.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(addr) = get("GK_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(dir) = get("GK_ARTIFACTS_DIR") {
            self.artifacts_dir = PathBuf::from(dir);
        }
        if let Some(variant) = get("GK_MODEL_VARIANT") {
            self.model_variant = if variant.eq_ignore_ascii_case("best") {
                None
            } else {
                Some(
                    variant
                        .parse()
                        .map_err(|e| ServiceError::Config(format!("GK_MODEL_VARIANT: {e}")))?,
                )
            };
        }
        if let Some(level) = get("GK_LOG_LEVEL") {
            self.log_level = level;
        }

        Ok(())
    }

    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.artifacts_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.artifacts_dir, PathBuf::from("."));
        assert_eq!(config.model_variant, None);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ServiceConfig::from_toml_str(
            r#"
            artifacts_dir = "/srv/gk"
            model_variant = "tuned"
            "#,
        )
        .unwrap();

        assert_eq!(config.artifacts_dir, PathBuf::from("/srv/gk"));
        assert_eq!(config.model_variant, Some(ModelVariant::Tuned));
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn invalid_toml_is_config_error() {
        assert!(matches!(
            ServiceConfig::from_toml_str("model_variant = \"forest\""),
            Err(ServiceError::Config(_))
        ));
    }

    #[test]
    fn env_overrides_win() {
        let mut config = ServiceConfig {
            model_variant: Some(ModelVariant::Tuned),
            ..ServiceConfig::default()
        };
        config
            .apply_overrides(lookup(&[
                ("GK_BIND_ADDR", "127.0.0.1:9000"),
                ("GK_ARTIFACTS_DIR", "/tmp/artifacts"),
                ("GK_MODEL_VARIANT", "best"),
                ("GK_LOG_LEVEL", "  "),
            ]))
            .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.artifacts_dir, PathBuf::from("/tmp/artifacts"));
        assert_eq!(config.model_variant, None);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn bad_variant_override() {
        let mut config = ServiceConfig::default();
        assert!(config
            .apply_overrides(lookup(&[("GK_MODEL_VARIANT", "gbdt")]))
            .is_err());
    }

    #[test]
    fn from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.toml");
        fs::write(&path, "bind_addr = \"127.0.0.1:8123\"\n").unwrap();

        let config = ServiceConfig::from_file(&path).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8123");
        assert_eq!(config.layout().root(), Path::new("."));
    }
}
