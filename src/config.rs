use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::SettingsError;

/// Abstracts environment variable access so tests can run isolated.
pub trait Env {
    fn var(&self, key: &str) -> Result<String, std::env::VarError>;
}

/// Reads the real process environment.
pub struct RealEnv;

impl Env for RealEnv {
    fn var(&self, key: &str) -> Result<String, std::env::VarError> {
        std::env::var(key)
    }
}

/// Fixed set of variables, for tests.
#[derive(Default)]
pub struct MapEnv(pub HashMap<String, String>);

impl MapEnv {
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Result<String, std::env::VarError> {
        self.0.get(key).cloned().ok_or(std::env::VarError::NotPresent)
    }
}

/// Base URL of a Globus service, overridable through `key`.
pub fn service_url(env: &dyn Env, key: &str, default: &str) -> String {
    env.var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Settings file location: explicit flag, then `GLOBUS_TRANSFER_SETTINGS`,
/// then `~/.globus_transfer_settings`.
pub fn settings_path(env: &dyn Env, explicit: Option<&Path>) -> Result<PathBuf, SettingsError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = env.var(constants::SETTINGS_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let home = dirs::home_dir().ok_or(SettingsError::NoHome)?;
    Ok(home.join(constants::SETTINGS_FILE_NAME))
}

/// Name of the user running the CLI, as the scheduler knows them.
pub fn current_user(env: &dyn Env) -> Option<String> {
    env.var("USER").or_else(|_| env.var("LOGNAME")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_settings_path_wins_over_env() {
        let env = MapEnv::default().with(constants::SETTINGS_ENV, "/from/env");
        let path = settings_path(&env, Some(Path::new("/explicit"))).unwrap();
        assert_eq!(path, PathBuf::from("/explicit"));
    }

    #[test]
    fn settings_path_from_env() {
        let env = MapEnv::default().with(constants::SETTINGS_ENV, "/from/env");
        assert_eq!(settings_path(&env, None).unwrap(), PathBuf::from("/from/env"));
    }

    #[test]
    fn blank_service_url_falls_back_to_default() {
        let env = MapEnv::default().with(constants::TRANSFER_URL_ENV, "  ");
        assert_eq!(
            service_url(&env, constants::TRANSFER_URL_ENV, "https://default"),
            "https://default"
        );
    }

    #[test]
    fn current_user_falls_back_to_logname() {
        let env = MapEnv::default().with("LOGNAME", "alice");
        assert_eq!(current_user(&env).as_deref(), Some("alice"));
    }
}
