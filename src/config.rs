use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, info};

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    /// Minutes between automatic changes; `None` disables the auto-changer.
    pub auto_change_interval: Option<f64>,
    pub auto_start: bool,
    pub file_patterns: String,
    pub get_files_recursively: bool,
    pub random_wallpaper: bool,
    pub shuffle_images: bool,
    pub wallpaper_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_change_interval: None,
            auto_start: false,
            file_patterns: "*".to_string(),
            get_files_recursively: false,
            random_wallpaper: false,
            shuffle_images: false,
            wallpaper_path: None,
        }
    }
}

impl Settings {
    pub fn auto_change_interval(&self) -> Option<Duration> {
        let minutes = self.auto_change_interval?;
        if !minutes.is_finite() || minutes <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(minutes * 60.0).ok()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.file_patterns
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse JSON config {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write config file {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to locate the executable directory")]
    NoExecutableDir,
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    pub fn open(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };

        Ok(Self::at(path))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// On read or parse failure the current values are kept.
    pub fn load(&mut self) -> Result<&Settings, ConfigError> {
        if !self.path.exists() {
            debug!("no config file at {}, keeping current settings", self.path.display());
            return Ok(&self.settings);
        }

        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;

        let settings: Settings =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;

        info!("loaded settings from {}", self.path.display());
        self.settings = settings;
        Ok(&self.settings)
    }

    pub fn replace(&mut self, settings: Settings) -> Result<(), ConfigError> {
        self.settings = settings;
        self.save()
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(&self.settings)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        fs::write(&self.path, json).map_err(write_err)?;

        info!("saved settings to {}", self.path.display());
        Ok(())
    }
}

fn default_config_path() -> Result<PathBuf, ConfigError> {
    let exe = env::current_exe().map_err(|_| ConfigError::NoExecutableDir)?;
    let dir = exe.parent().ok_or(ConfigError::NoExecutableDir)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}
