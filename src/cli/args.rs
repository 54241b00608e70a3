//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::config::{LocalConfig, VoiceSettings};

/// Voxnote - voice annotation from the microphone
#[derive(Parser, Debug)]
#[command(name = "voxnote")]
#[command(version)]
#[command(about = "Record a voice annotation and recognize it to text")]
#[command(long_about = None)]
pub struct Cli {
    /// Recognition provider (google, yandex, local)
    #[arg(short = 'p', long, value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Recognition language code (e.g. en-US, ru-RU)
    #[arg(short = 'l', long, value_name = "LANG")]
    pub language: Option<String>,

    /// Input device name (defaults to the system default device)
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,

    /// Maximum recording duration in seconds
    #[arg(long, value_name = "SECS")]
    pub max_duration: Option<u64>,

    /// Do not recognize automatically after stopping; trigger manually
    #[arg(long)]
    pub no_auto_recognize: bool,

    /// Path to a local whisper model (local provider)
    #[arg(short = 'm', long, value_name = "PATH")]
    pub model: Option<String>,

    /// Also write the captured audio to this WAV file
    #[arg(long, value_name = "PATH")]
    pub save_wav: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Settings overrides derived from the command line
    pub fn overrides(&self) -> VoiceSettings {
        VoiceSettings {
            provider: self.provider.clone(),
            language: self.language.clone(),
            input_device: self.device.clone(),
            sample_rate_hz: None,
            max_duration_secs: self.max_duration,
            auto_recognition: if self.no_auto_recognize {
                Some(false)
            } else {
                None
            },
            google: None,
            yandex: None,
            local: self.model.clone().map(|model_path| LocalConfig {
                model_path: Some(model_path),
            }),
        }
    }
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available input devices
    Devices,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create the config file with defaults
    Init,
    /// List the effective configuration
    List,
    /// Show the config file path
    Path,
}
