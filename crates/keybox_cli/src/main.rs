//! KeyBox CLI
//!
//! Command-line tools for key models described in a JSON manifest.
//!
//! # Commands
//!
//! - `check` - Validate a model and report classes without a key
//! - `inspect` - Describe every declared key and its parts
//! - `encode-key` - Encode a key envelope from part values
//! - `decode-key` - Decode a hex key envelope against a model

mod commands;
mod manifest;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// KeyBox key model tools.
#[derive(Parser)]
#[command(name = "keybox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the model manifest
    #[arg(global = true, short, long)]
    model: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a model and report classes without a key
    Check {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Describe every declared key and its parts
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Encode a key envelope as hex
    EncodeKey {
        /// Declared type to encode
        type_name: String,

        /// Part value as NAME=VALUE (repeatable)
        #[arg(short, long)]
        part: Vec<String>,

        /// Mark the envelope as key-only
        #[arg(short, long)]
        key_only: bool,
    },

    /// Decode a hex key envelope
    DecodeKey {
        /// Hex-encoded envelope bytes
        hex: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Check { format } => {
            let path = cli.model.ok_or("Model path required for check")?;
            commands::check::run(&path, &format)?;
        }
        Commands::Inspect { format } => {
            let path = cli.model.ok_or("Model path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::EncodeKey {
            type_name,
            part,
            key_only,
        } => {
            let path = cli.model.ok_or("Model path required for encode-key")?;
            commands::encode_key::run(&path, &type_name, &part, key_only)?;
        }
        Commands::DecodeKey { hex, format } => {
            let path = cli.model.ok_or("Model path required for decode-key")?;
            commands::decode_key::run(&path, &hex, &format)?;
        }
        Commands::Version => {
            println!("KeyBox CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("KeyBox Core v{}", keybox_core::VERSION);
        }
    }

    Ok(())
}
