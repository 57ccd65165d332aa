use crate::session::Game;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, read_to_string, write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Error while storing or loading the configuration file
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("error while reading configuration from {}: {:#}", path.display(), err)]
    Read { err: std::io::Error, path: PathBuf },
    #[error("error while writing configuration to {}: {:#}", path.display(), err)]
    Write { err: std::io::Error, path: PathBuf },
    #[error("error while parsing configuration from {}: {:#}", path.display(), err)]
    Json {
        err: serde_json::error::Error,
        path: PathBuf,
    },
    #[error("error while creating directory {} for the configuration: {:#}", path.display(), err)]
    DirCreation { err: std::io::Error, path: PathBuf },
}

/// State kept between runs
///
/// Fields are filled in as the information is acquired, `None` means it still has to be asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_games: Option<Vec<Game>>,
    /// The account password, base64 encoded.
    ///
    /// This is only obfuscation, anyone who can read the file can recover the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_encoded: Option<String>,
}

impl Configuration {
    /// The stored password, if there is one and it can be decoded
    pub fn password(&self) -> Option<String> {
        let encoded = self.password_encoded.as_deref()?;
        let decoded = BASE64_STANDARD
            .decode(encoded)
            .ok()
            .and_then(|raw| String::from_utf8(raw).ok());
        if decoded.is_none() {
            warn!("stored password can't be decoded, ignoring it");
        }
        decoded
    }

    pub fn set_password(&mut self, password: &str) {
        self.password_encoded = Some(BASE64_STANDARD.encode(password));
    }
}

/// Store the configuration in a json file
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        ConfigStore { path }
    }

    /// Store the configuration in the user's config directory
    ///
    /// Falls back to `config.json` in the working directory on platforms without one.
    pub fn user_config() -> Self {
        Self::new(default_config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored configuration
    ///
    /// A missing or unreadable file results in an empty configuration.
    pub fn load(&self) -> Configuration {
        match self.read() {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!(path = %self.path.display(), "no configuration stored yet");
                Configuration::default()
            }
            Err(e) => {
                warn!(error = %e, "ignoring stored configuration");
                Configuration::default()
            }
        }
    }

    fn read(&self) -> Result<Option<Configuration>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = read_to_string(&self.path).map_err(|err| ConfigError::Read {
            err,
            path: self.path.clone(),
        })?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| ConfigError::Json {
                err,
                path: self.path.clone(),
            })
    }

    /// Overwrite the stored configuration
    pub fn save(&self, config: &Configuration) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            create_dir_all(parent).map_err(|err| ConfigError::DirCreation {
                err,
                path: parent.into(),
            })?;
        }

        let raw = serde_json::to_string_pretty(config).map_err(|err| ConfigError::Json {
            err,
            path: self.path.clone(),
        })?;
        write(&self.path, raw).map_err(|err| ConfigError::Write {
            err,
            path: self.path.clone(),
        })?;
        debug!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    match ProjectDirs::from("", "", "steam-idler") {
        Some(dirs) => dirs.config_dir().join("config.json"),
        None => PathBuf::from("config.json"),
    }
}
