//! Persistent user settings: the refresh token and endpoint bookmarks,
//! stored as TOML.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::SettingsError;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct AuthSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub auth: AuthSettings,
    /// bookmark name -> endpoint id
    #[serde(default)]
    pub bookmarks: BTreeMap<String, String>,
    #[serde(skip)]
    path: PathBuf,
}

impl Settings {
    /// Read settings from `path`. A missing file yields blank settings.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let mut settings = match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::debug!("Read settings from {}", path.display());
                toml::from_str::<Settings>(&text)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    "No settings file found at {}, using blank settings",
                    path.display()
                );
                Settings::default()
            }
            Err(e) => return Err(e.into()),
        };
        settings.path = path.to_path_buf();
        Ok(settings)
    }

    pub fn save(&self) -> Result<&Path, SettingsError> {
        let text = toml::to_string(self)?;
        std::fs::write(&self.path, text)?;
        tracing::debug!("Wrote current settings to {}", self.path.display());
        Ok(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Map a bookmark name to its endpoint id; anything else is taken to be
    /// an endpoint id already.
    pub fn resolve<'a>(&'a self, endpoint: &'a str) -> &'a str {
        match self.bookmarks.get(endpoint) {
            Some(id) => {
                tracing::debug!("Resolved bookmark {endpoint} to endpoint {id}");
                id
            }
            None => endpoint,
        }
    }

    pub fn add_bookmark(&mut self, name: &str, endpoint: &str) {
        self.bookmarks.insert(name.to_string(), endpoint.to_string());
    }

    pub fn remove_bookmark(&mut self, name: &str) -> Result<String, SettingsError> {
        self.bookmarks
            .remove(name)
            .ok_or_else(|| SettingsError::UnknownBookmark(name.to_string()))
    }
}
