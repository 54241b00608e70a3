//! XDG settings store adapter

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::application::ports::SettingsStore;
use crate::domain::config::VoiceSettings;
use crate::domain::error::SettingsError;

/// XDG-compliant settings store
pub struct XdgSettingsStore {
    path: PathBuf,
}

impl XdgSettingsStore {
    /// Create a new settings store with the default path
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("voxnote");

        Self {
            path: config_dir.join("config.toml"),
        }
    }

    /// Create with a custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse TOML content into settings
    fn parse_toml(content: &str) -> Result<VoiceSettings, SettingsError> {
        toml::from_str(content).map_err(|e| SettingsError::ParseError(e.to_string()))
    }

    /// Serialize settings to TOML
    fn to_toml(settings: &VoiceSettings) -> Result<String, SettingsError> {
        toml::to_string_pretty(settings).map_err(|e| SettingsError::WriteError(e.to_string()))
    }
}

impl Default for XdgSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStore for XdgSettingsStore {
    async fn load(&self) -> Result<VoiceSettings, SettingsError> {
        if !self.exists() {
            // No file yet: everything falls back to defaults downstream.
            return Ok(VoiceSettings::empty());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| SettingsError::ReadError(e.to_string()))?;

        Self::parse_toml(&content)
    }

    async fn save(&self, settings: &VoiceSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SettingsError::WriteError(e.to_string()))?;
        }

        let content = Self::to_toml(settings)?;

        fs::write(&self.path, content)
            .await
            .map_err(|e| SettingsError::WriteError(e.to_string()))?;

        Ok(())
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }
}
