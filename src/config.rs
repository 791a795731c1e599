//! `config.toml` settings for training and inference defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;
use crate::dataset::DatasetSource;
use crate::logging::LoggingOptions;
use crate::predict::DEFAULT_TOP_K;
use crate::registry::SlotPolicy;
use crate::training::DEFAULT_SEED;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors that may occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("No suitable config directory found")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub training: TrainingSettings,
    #[serde(default)]
    pub inference: InferenceSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// Split used by the CLIs when a request omits one.
    #[serde(default = "default_split")]
    pub default_split: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// JSON or JSONL records file; takes precedence over `synthetic_size`.
    #[serde(default)]
    pub dataset_path: Option<PathBuf>,
    /// Train on this many synthetic records instead of the built-in sample.
    #[serde(default)]
    pub synthetic_size: Option<usize>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            default_split: default_split(),
            seed: default_seed(),
            dataset_path: None,
            synthetic_size: None,
        }
    }
}

impl TrainingSettings {
    pub fn dataset_source(&self) -> DatasetSource {
        match (&self.dataset_path, self.synthetic_size) {
            (Some(path), _) => DatasetSource::File(path.clone()),
            (None, Some(size)) => DatasetSource::Synthetic {
                size,
                seed: self.seed,
            },
            (None, None) => DatasetSource::BuiltIn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    #[serde(default)]
    pub slot_policy: SlotPolicy,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            slot_policy: SlotPolicy::default(),
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default = "default_true")]
    pub write_file: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            write_file: true,
        }
    }
}

impl From<&LoggingSettings> for LoggingOptions {
    fn from(settings: &LoggingSettings) -> Self {
        Self {
            default_filter: settings.filter.clone(),
            write_file: settings.write_file,
        }
    }
}

fn default_split() -> f64 {
    0.8
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Replace out-of-range values with their defaults.
    pub fn normalized(mut self) -> Self {
        let split = self.training.default_split;
        if !(split.is_finite() && split > 0.0 && split < 1.0) {
            self.training.default_split = default_split();
        }
        if self.inference.top_k == 0 {
            self.inference.top_k = default_top_k();
        }
        if self.training.synthetic_size == Some(0) {
            self.training.synthetic_size = None;
        }
        self
    }
}

/// Resolve `config.toml` inside the app directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load configuration from the app directory, returning defaults if missing.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    load_from(&config_path()?)
}

pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<AppConfig>(&text)
        .map(AppConfig::normalized)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
}

pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    save_to_path(config, &config_path()?)
}

pub fn save_to_path(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let text = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => ConfigError::CreateDir { path, source },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.training.default_split, 0.8);
        assert_eq!(config.inference.top_k, 5);
        assert_eq!(config.training.dataset_source(), DatasetSource::BuiltIn);
    }

    #[test]
    fn partial_file_fills_defaults_and_normalizes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[training]\ndefault_split = 1.5\nsynthetic_size = 200\n\n[inference]\nslot_policy = \"most-recent\"\n",
        )
        .unwrap();
        let config = load_from(&path).unwrap();
        assert_eq!(config.training.default_split, 0.8);
        assert_eq!(config.inference.slot_policy, SlotPolicy::MostRecent);
        assert_eq!(
            config.training.dataset_source(),
            DatasetSource::Synthetic { size: 200, seed: 42 }
        );
        assert!(config.logging.write_file);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = AppConfig::default();
        config.training.dataset_path = Some(PathBuf::from("records.jsonl"));
        config.inference.top_k = 3;
        save_to_path(&config, &path).unwrap();
        assert_eq!(load_from(&path).unwrap(), config);
    }

    #[test]
    fn malformed_toml_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[training\n").unwrap();
        match load_from(&path) {
            Err(ConfigError::ParseToml { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn load_or_default_reads_app_directory() {
        let base = tempdir().unwrap();
        let _guard = app_dirs::override_base(base.path());
        assert_eq!(load_or_default().unwrap(), AppConfig::default());
        let mut config = AppConfig::default();
        config.training.seed = 7;
        save(&config).unwrap();
        assert_eq!(load_or_default().unwrap().training.seed, 7);
    }
}
