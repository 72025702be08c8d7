//! Configuration structures and loading logic

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output format for the CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Inspector configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InspectConfig {
    /// Model directory to inspect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    /// Upper bound on concurrent shard header reads (unbounded if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// Show dtype, shape, and size columns when listing
    pub show_sizes: bool,

    pub output: OutputFormat,
}

impl InspectConfig {
    /// Load configuration from file with environment variable overrides
    ///
    /// Without an explicit path, `<config_dir>/tensor-catalog/config.toml` is
    /// used when it exists.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.or_else(|| default_config_path().filter(|p| p.is_file()));

        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content).context("Failed to parse TOML config")?
        } else {
            Self::default()
        };

        // Environment variable overrides
        if let Ok(model_path) = std::env::var("MODEL_PATH") {
            config.model_path = Some(PathBuf::from(model_path));
        }
        if let Ok(limit) = std::env::var("TENSOR_CATALOG_MAX_CONCURRENCY") {
            config.max_concurrency = Some(
                limit
                    .parse()
                    .context("Invalid TENSOR_CATALOG_MAX_CONCURRENCY value")?,
            );
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let Some(model_path) = &self.model_path else {
            anyhow::bail!("--model-path not provided and MODEL_PATH environment variable not set");
        };

        if !model_path.exists() {
            anyhow::bail!("Model path does not exist: {}", model_path.display());
        }
        if !model_path.is_dir() {
            anyhow::bail!("Model path is not a directory: {}", model_path.display());
        }

        if self.max_concurrency == Some(0) {
            anyhow::bail!("max_concurrency must be >= 1");
        }

        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tensor-catalog/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_env() {
        unsafe {
            std::env::remove_var("MODEL_PATH");
            std::env::remove_var("TENSOR_CATALOG_MAX_CONCURRENCY");
        }
    }

    #[test]
    fn test_default_config() {
        let config = InspectConfig::default();
        assert_eq!(config.model_path, None);
        assert_eq!(config.max_concurrency, None);
        assert_eq!(config.output, OutputFormat::Text);
        assert!(!config.show_sizes);
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model_path = "/models/llama"
max_concurrency = 4
show_sizes = true
output = "json"
"#,
        )
        .unwrap();

        let config = InspectConfig::load(Some(path)).unwrap();
        assert_eq!(config.model_path, Some(PathBuf::from("/models/llama")));
        assert_eq!(config.max_concurrency, Some(4));
        assert!(config.show_sizes);
        assert_eq!(config.output, OutputFormat::Json);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model_path = \"/from/file\"\n").unwrap();

        unsafe {
            std::env::set_var("MODEL_PATH", "/from/env");
            std::env::set_var("TENSOR_CATALOG_MAX_CONCURRENCY", "8");
        }
        let config = InspectConfig::load(Some(path)).unwrap();
        clear_env();

        assert_eq!(config.model_path, Some(PathBuf::from("/from/env")));
        assert_eq!(config.max_concurrency, Some(8));
    }

    #[test]
    #[serial]
    fn test_invalid_concurrency_env() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        unsafe {
            std::env::set_var("TENSOR_CATALOG_MAX_CONCURRENCY", "many");
        }
        let result = InspectConfig::load(Some(path));
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_validate_requires_model_path() {
        assert!(InspectConfig::default().validate().is_err());
    }

    #[test]
    fn test_validate_rejects_file_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("model.safetensors");
        std::fs::write(&file, b"").unwrap();

        let config = InspectConfig {
            model_path: Some(file),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let dir = TempDir::new().unwrap();
        let config = InspectConfig {
            model_path: Some(dir.path().to_path_buf()),
            max_concurrency: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = InspectConfig {
            max_concurrency: Some(2),
            ..config
        };
        assert!(config.validate().is_ok());
    }
}
