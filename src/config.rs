//! TOML settings shared by the splitpack binaries.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;

/// Filename of the settings file under the app root.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors that can occur while loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No suitable config directory could be resolved.
    #[error("No suitable config directory available for settings")]
    NoConfigDir,
    /// Failed to read the settings file.
    #[error("Failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse the settings file.
    #[error("Failed to parse settings {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to serialize settings to TOML.
    #[error("Failed to serialize settings: {0}")]
    SerializeToml(#[from] toml::ser::Error),
    /// Failed to write the settings file.
    #[error("Failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Settings shared by the splitpack binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Override for the document database path.
    pub documents_db: Option<PathBuf>,
    /// Override for the blob store root.
    pub blob_root: Option<PathBuf>,
    /// Training fraction applied when the CLI does not pass one.
    pub train_fraction: f64,
    /// Test fraction applied when the CLI does not pass one.
    pub test_fraction: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            documents_db: None,
            blob_root: None,
            train_fraction: 0.8,
            test_fraction: 0.2,
        }
    }
}

impl Settings {
    /// Document database path, defaulting to the app root location.
    pub fn resolved_documents_db(&self) -> Result<PathBuf, ConfigError> {
        match &self.documents_db {
            Some(path) => Ok(path.clone()),
            None => Ok(app_root()?.join(crate::documents::DOCUMENTS_DB_FILE_NAME)),
        }
    }

    /// Blob store root, defaulting to `blobs` under the app root.
    pub fn resolved_blob_root(&self) -> Result<PathBuf, ConfigError> {
        match &self.blob_root {
            Some(path) => Ok(path.clone()),
            None => Ok(app_root()?.join("blobs")),
        }
    }
}

fn app_root() -> Result<PathBuf, ConfigError> {
    app_dirs::app_root_dir().map_err(|_| ConfigError::NoConfigDir)
}

/// Resolve the settings file path under the app root.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_root()?.join(CONFIG_FILE_NAME))
}

/// Load settings from disk, writing a default settings file on first run so
/// users have a template to edit.
pub fn load_or_init() -> Result<Settings, ConfigError> {
    load_or_init_from(&config_path()?)
}

fn load_or_init_from(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        let settings = Settings::default();
        save_to_path(&settings, path)?;
        return Ok(settings);
    }
    load_from(path)
}

/// Load settings from a specific path; a missing file yields defaults.
pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

/// Persist settings, writing atomically via a temporary file in the same
/// directory so a crash never leaves a partial settings file.
pub fn save_to_path(settings: &Settings, path: &Path) -> Result<(), ConfigError> {
    let data = toml::to_string_pretty(settings)?;
    let dir = path.parent().ok_or_else(|| ConfigError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::Other,
            "settings path has no parent directory",
        ),
    })?;
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.write_all(data.as_bytes())
        .map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    tmp.persist(path).map_err(|err| ConfigError::Write {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}
