// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use paxibox::Config;
use paxibox::constants::APP_NAME;
use std::path::PathBuf;
use std::sync::Mutex;

mod cli;

#[derive(Parser)]
#[command(name = "paxibox")]
#[command(about = "Package intake kiosk")]
#[command(version = paxibox::constants::app_version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file (default: ~/.config/paxibox/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the terminal kiosk (default)
    Kiosk,

    /// Scan with the camera and print every confirmation
    Scan {
        /// Exit after the first accepted code
        #[arg(long)]
        once: bool,
    },

    /// Decode a code from an image file
    Decode {
        /// Image to scan
        image: PathBuf,

        /// Send the result to the remote log
        #[arg(short, long)]
        log: bool,
    },

    /// Submit a manual entry
    Manual {
        /// Tracking number (resi)
        #[arg(long)]
        resi: String,

        /// Recipient name
        #[arg(long, default_value = "")]
        recipient: String,

        /// Send the result to the remote log
        #[arg(short, long)]
        log: bool,
    },

    /// Write a health-check entry to the remote store
    TestConnection {
        /// Deadline in milliseconds (default: from config)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Print the Firebase configuration delivery response built from the environment
    Config {
        /// Exit with an error when the configuration is incomplete
        #[arg(long)]
        check: bool,
    },

    /// List available cameras
    List,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let kiosk = matches!(cli.command, None | Some(Commands::Kiosk));
    init_logging(kiosk);

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    let result = match cli.command {
        None | Some(Commands::Kiosk) => return paxibox::terminal::run(config),
        Some(Commands::Scan { once }) => cli::scan(config, once),
        Some(Commands::Decode { image, log }) => cli::decode(config, &image, log),
        Some(Commands::Manual {
            resi,
            recipient,
            log,
        }) => cli::manual(config, &resi, &recipient, log),
        Some(Commands::TestConnection { timeout_ms }) => cli::test_connection(config, timeout_ms),
        Some(Commands::Config { check }) => cli::print_config(check),
        Some(Commands::List) => cli::list_cameras(),
    };
    Ok(result?)
}

/// Set RUST_LOG to control the level, e.g. RUST_LOG=paxibox=debug
///
/// The kiosk owns the terminal, so it logs to `<cache_dir>/paxibox/kiosk.log`.
fn init_logging(to_file: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);

    if !to_file {
        builder.init();
        return;
    }

    match open_log_file() {
        Some(file) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        None => builder.with_writer(std::io::sink).init(),
    }
}

fn open_log_file() -> Option<std::fs::File> {
    let dir = dirs::cache_dir()?.join(APP_NAME);
    std::fs::create_dir_all(&dir).ok()?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("kiosk.log"))
        .ok()
}
