//! Settings storage port interface

use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::config::VoiceSettings;
use crate::domain::error::SettingsError;

/// Port for settings storage
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load settings from storage.
    ///
    /// # Returns
    /// The loaded settings (may have None fields if the file doesn't exist)
    async fn load(&self) -> Result<VoiceSettings, SettingsError>;

    /// Save settings to storage.
    async fn save(&self, settings: &VoiceSettings) -> Result<(), SettingsError>;

    /// Get the settings file path.
    fn path(&self) -> PathBuf;

    /// Check if the settings file exists.
    fn exists(&self) -> bool;
}
