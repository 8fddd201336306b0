// Euclidio - headless Euclidean sequencer for DIN and USB MIDI with OSC control

use clap::Parser;
use euclidio::midi::ports::{list_input_ports, list_output_ports};
use euclidio::{App, AppConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "euclidio")]
#[command(about = "Euclidean rhythm and chord sequencer", long_about = None)]
struct Cli {
    /// Configuration file (RON); defaults to the user config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load this preset slot (0-15) after start-up
    #[arg(short, long)]
    preset: Option<u8>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    run_for_secs: Option<u64>,

    /// Print the host MIDI ports and exit
    #[arg(long)]
    list_ports: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(AppConfig::default_path);
    let config = match &config_path {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    };

    // Logging comes up before a config error is reported, with the default filter if need be
    let filter = match &config {
        Ok(config) => config.log_filter.clone(),
        Err(_) => euclidio::config::DEFAULT_LOG_FILTER.to_string(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    if cli.list_ports {
        return print_ports();
    }

    let mut app = match App::start(&config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "failed to start");
            return ExitCode::FAILURE;
        }
    };

    if let Some(slot) = cli.preset {
        if let Err(e) = app.load_preset(slot) {
            warn!(slot, error = %e, "preset not loaded");
        }
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_ctrlc = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        stop_for_ctrlc.store(true, Ordering::Release);
    }) {
        warn!(error = %e, "Ctrl-C handler not installed");
    }

    let deadline = cli
        .run_for_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    info!("running, press Ctrl-C to stop");
    app.run(&stop, deadline);
    app.shutdown();
    ExitCode::SUCCESS
}

fn print_ports() -> ExitCode {
    match (list_input_ports(), list_output_ports()) {
        (Ok(inputs), Ok(outputs)) => {
            println!("MIDI inputs:");
            for name in inputs {
                println!("  {name}");
            }
            println!("MIDI outputs:");
            for name in outputs {
                println!("  {name}");
            }
            ExitCode::SUCCESS
        }
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, "cannot enumerate MIDI ports");
            ExitCode::FAILURE
        }
    }
}
