//! # statespace CLI
//!
//! Command-line interface for replaying scripted mutations against a
//! statespace tree and inspecting the result.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "statespace")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (used only if it exists)
    #[arg(long, default_value = "statespace.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a YAML script of mutations to a JSON state and print the trail
    Replay {
        /// Initial state (JSON)
        #[arg(long)]
        state: PathBuf,

        /// Mutation script (YAML)
        #[arg(long)]
        script: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the space at a path of a JSON state
    Show {
        /// State (JSON)
        #[arg(long)]
        state: PathBuf,

        /// Path such as `todos[abc].tags` (defaults to the root)
        #[arg(long, default_value = "")]
        path: String,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = commands::load_config(&cli.config)?;

    match cli.command {
        Commands::Replay {
            state,
            script,
            json,
        } => commands::replay(config, &state, &script, json),
        Commands::Show { state, path, json } => commands::show(config, &state, &path, json),
    }
}
