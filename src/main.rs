//! Dronefall CLI - host games and inspect generated content.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Dronefall - program drones, draft instructions, take the galaxy
#[derive(Parser, Debug)]
#[command(name = "dronefall")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Host a game and wait for players to connect
    Host {
        /// JSON server configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Address to listen on (overrides the config file)
        #[arg(short, long)]
        bind: Option<String>,

        /// Number of players to seat before starting
        #[arg(short, long)]
        players: Option<usize>,

        /// Number of locations in the galaxy
        #[arg(short, long)]
        locations: Option<usize>,

        /// Galaxy and draft seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Seconds a phase waits before forfeiting silent players
        #[arg(long)]
        deadline: Option<u64>,
    },

    /// Generate a galaxy and print it
    Galaxy {
        /// Number of locations
        #[arg(short, long, default_value = "12")]
        locations: usize,

        /// Generation seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,
    },

    /// List the built-in instruction catalog
    InspectCatalog {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Host {
            config,
            bind,
            players,
            locations,
            seed,
            deadline,
        } => cli::host::execute(&cli::host::HostOptions {
            config,
            bind,
            players,
            locations,
            seed,
            deadline,
        }),

        Commands::Galaxy {
            locations,
            seed,
            format,
        } => cli::galaxy::execute(locations, seed, format),

        Commands::InspectCatalog { format } => cli::catalog::execute(format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
