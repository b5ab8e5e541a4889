//! serterm - A serial-line terminal
//!
//! serterm opens a serial port and lets you watch what the device sends while
//! typing back to it, in one of two transmit modes.
//!
//! # Modes
//!
//! - **Dumb**: every keystroke is sent the moment it is pressed
//! - **Local**: a line is edited locally and sent on Enter, with escape
//!   sequences (`\n`, `\x1b`, `\o033`, ...) decoded to exact bytes
//!
//! If the device disappears (USB adapter unplugged) serterm waits for it to
//! come back and reconnects on its own.
//!
//! # Quick Start
//!
//! ```text
//! serterm                              # /dev/ttyUSB0, 8N1, 9600 baud
//! serterm /dev/ttyACM0 8 1 115200 N    # explicit settings
//! serterm -m local -d                  # local-line mode, show non-printables
//! ```

mod cli;
mod config;
mod core;
mod ui;

use std::env;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::cli::Command;
use crate::config::Config;
use crate::core::channel::SerialOpener;
use crate::core::supervisor::ConnectionSupervisor;
use crate::ui::{Console, CrosstermKeySource};

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = match cli::parse_args(env::args().skip(1)) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            cli::print_help();
            return Ok(());
        }
        Ok(Command::Version) => {
            cli::print_version();
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("serterm {} starting...", cli::VERSION);

    // Command line overrides the config file
    let mut config = match args.config {
        Some(ref path) => Config::load_explicit(path)?,
        None => Config::load(),
    };
    args.apply(&mut config);

    if args.save {
        let path = match args.config {
            Some(ref path) => {
                config.save_to(path)?;
                path.clone()
            }
            None => config.save()?,
        };
        eprintln!("Settings saved to {}", path.display());
    }

    info!("Port: {}", config.port);
    info!("Mode: {}, display: {}", config.mode, config.display);

    let console = Console::stdout();
    let mut keys = CrosstermKeySource::new().context("Failed to put the terminal in raw mode")?;

    let result = ConnectionSupervisor::new(SerialOpener, config).run(&console, &mut keys);

    // Restore the terminal before reporting anything
    drop(keys);
    println!();

    match result {
        Ok(()) => {
            info!("serterm exiting");
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Log to `~/.serterm/serterm.log`; stdout belongs to the serial data
fn init_logging() {
    let log_path = config::data_dir()
        .map(|dir| dir.join("serterm.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("serterm.log"));

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter =
            EnvFilter::try_from_env("SERTERM_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
