//! Voxnote CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use voxnote::cli::{
    app::{handle_config_command, handle_devices_command, load_merged_settings, run_record},
    args::{Cli, Commands},
    presenter::Presenter,
};
use voxnote::infrastructure::XdgSettingsStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let presenter = Presenter::new();

    match cli.command {
        Some(Commands::Devices) => handle_devices_command(&presenter),
        Some(Commands::Config { action }) => {
            let store = XdgSettingsStore::new();
            handle_config_command(action, &store, &presenter).await
        }
        None => {
            let save_wav = cli.save_wav.clone();
            let settings = load_merged_settings(cli.overrides()).await;
            run_record(settings, save_wav).await
        }
    }
}
