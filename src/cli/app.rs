//! CLI application flows

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use crate::application::annotation::{AnnotationEvent, AnnotationStateMachine};
use crate::application::ports::SettingsStore;
use crate::domain::annotation::AnnotationState;
use crate::domain::config::VoiceSettings;
use crate::infrastructure::audio::wav;
use crate::infrastructure::{
    list_input_devices, CpalAudioSource, ProviderFactory, XdgSettingsStore,
};

use super::args::ConfigAction;
use super::presenter::Presenter;

/// Exit code for runtime failures
pub const EXIT_ERROR: u8 = 1;

/// Exit code for configuration/usage errors
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Merge defaults, the settings file and command-line overrides
pub async fn load_merged_settings(overrides: VoiceSettings) -> VoiceSettings {
    let store = XdgSettingsStore::new();
    let file = match store.load().await {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(error = %e, "could not load settings file; using defaults");
            VoiceSettings::empty()
        }
    };
    VoiceSettings::defaults().merge(file).merge(overrides)
}

/// Record one annotation, recognize it and print the transcript
pub async fn run_record(settings: VoiceSettings, save_wav: Option<PathBuf>) -> ExitCode {
    let mut presenter = Presenter::new();
    let auto_recognition = settings.auto_recognition_or_default();

    let handle = match AnnotationStateMachine::spawn(
        Arc::new(CpalAudioSource::new()),
        Arc::new(ProviderFactory::new()),
        settings,
    ) {
        Ok(handle) => handle,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    let mut events = handle.subscribe();

    presenter.info("Press Enter to stop recording, Ctrl-C to cancel.");
    presenter.start_spinner("Recording...");

    if handle.start_recording().await.is_err() {
        presenter.stop_spinner();
        presenter.error("Annotation pipeline is unavailable");
        return ExitCode::from(EXIT_ERROR);
    }

    // The actor processes commands in order, so by the time the state query
    // answers, the device either opened or the attempt failed while idle.
    match handle.state().await {
        Ok(AnnotationState::Recording) => {}
        Ok(_) => {
            presenter.stop_spinner();
            while let Ok(event) = events.try_recv() {
                if let AnnotationEvent::ErrorChanged(message) = event {
                    if !message.is_empty() {
                        presenter.error(&message);
                    }
                }
            }
            return ExitCode::from(EXIT_ERROR);
        }
        Err(_) => return ExitCode::from(EXIT_ERROR),
    }

    // Enter stops, Ctrl-C cancels.
    let stop_handle = handle.clone();
    tokio::spawn(async move {
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        let _ = reader.read_line(&mut line).await;
        let _ = stop_handle.stop_recording().await;
    });
    let cancel_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_handle.cancel().await;
        }
    });

    let mut transcript = String::new();
    let mut last_error = String::new();
    let mut manual_triggered = false;
    let final_state = loop {
        match events.recv().await {
            Ok(AnnotationEvent::LevelChanged(level)) => presenter.update_level(level),
            Ok(AnnotationEvent::RecordingChanged(false)) => {
                presenter.update_spinner("Processing...")
            }
            Ok(AnnotationEvent::RecognizingChanged(true)) => {
                presenter.update_spinner("Recognizing...")
            }
            Ok(AnnotationEvent::TextChanged(text)) => transcript = text,
            Ok(AnnotationEvent::ErrorChanged(message)) => {
                if !message.is_empty() {
                    last_error = message;
                }
            }
            Ok(AnnotationEvent::StateChanged(state)) => match state {
                AnnotationState::Ready => {
                    if !auto_recognition && !manual_triggered && transcript.is_empty() {
                        // Auto-recognition is off: trigger the one manual pass.
                        manual_triggered = true;
                        presenter.update_spinner("Recognizing...");
                        if handle.recognize().await.is_err() {
                            break AnnotationState::Error;
                        }
                    } else {
                        break AnnotationState::Ready;
                    }
                }
                AnnotationState::Error => break AnnotationState::Error,
                AnnotationState::Idle => break AnnotationState::Idle,
                _ => {}
            },
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break AnnotationState::Error,
        }
    };
    presenter.stop_spinner();

    if let Some(path) = save_wav {
        match handle.last_capture().await {
            Ok(Some(snapshot)) => match wav::write_wav(&path, &snapshot).await {
                Ok(()) => presenter.success(&format!("Saved capture to {}", path.display())),
                Err(e) => presenter.warn(&format!("Could not write WAV file: {}", e)),
            },
            _ => presenter.warn("No capture available to save"),
        }
    }

    let code = match final_state {
        AnnotationState::Ready => {
            let _ = handle.finalize().await;
            presenter.output(&transcript);
            ExitCode::SUCCESS
        }
        AnnotationState::Idle => {
            presenter.warn("Recording cancelled");
            ExitCode::from(EXIT_ERROR)
        }
        _ => {
            if last_error.is_empty() {
                presenter.error("Annotation failed");
            } else {
                presenter.error(&last_error);
            }
            ExitCode::from(EXIT_ERROR)
        }
    };

    let _ = handle.shutdown().await;
    code
}

/// List the available input devices
pub fn handle_devices_command(presenter: &Presenter) -> ExitCode {
    match list_input_devices() {
        Ok(devices) if devices.is_empty() => {
            presenter.warn("No input devices found");
            ExitCode::SUCCESS
        }
        Ok(devices) => {
            for name in devices {
                presenter.output(&name);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Handle the config subcommands
pub async fn handle_config_command(
    action: ConfigAction,
    store: &XdgSettingsStore,
    presenter: &Presenter,
) -> ExitCode {
    match action {
        ConfigAction::Init => {
            if store.exists() {
                presenter.error(&format!(
                    "Config file already exists at: {}",
                    store.path().display()
                ));
                return ExitCode::from(EXIT_USAGE_ERROR);
            }
            match store.save(&VoiceSettings::defaults()).await {
                Ok(()) => {
                    presenter.success(&format!("Created {}", store.path().display()));
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    presenter.error(&e.to_string());
                    ExitCode::from(EXIT_ERROR)
                }
            }
        }
        ConfigAction::List => match store.load().await {
            Ok(file) => {
                let settings = VoiceSettings::defaults().merge(file);
                presenter.key_value("provider", settings.provider_or_default());
                presenter.key_value("language", settings.language_or_default());
                presenter.key_value(
                    "input_device",
                    settings.input_device.as_deref().unwrap_or("default"),
                );
                presenter.key_value(
                    "sample_rate_hz",
                    &settings.sample_rate_or_default().to_string(),
                );
                presenter.key_value(
                    "max_duration_secs",
                    &settings.max_duration_or_default().to_string(),
                );
                presenter.key_value(
                    "auto_recognition",
                    &settings.auto_recognition_or_default().to_string(),
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                presenter.error(&e.to_string());
                ExitCode::from(EXIT_ERROR)
            }
        },
        ConfigAction::Path => {
            presenter.output(&store.path().display().to_string());
            ExitCode::SUCCESS
        }
    }
}
