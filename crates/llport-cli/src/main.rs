#![deny(unsafe_code)]

mod commands;
mod config;
mod exit_code;
mod output;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use llport_core::fid::FidParseError;
use llport_core::{CryptoError, ZeroOutError};
use llport_export::ExportError;
use tracing_subscriber::EnvFilter;

use crate::commands::{decode, encode, fid, read, zero};
use crate::config::Config;

/// Inspect FIDs and export handles, and work with encrypted block images
#[derive(Parser)]
#[command(name = "llport")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Show the inode numbers of a FID
    llport fid '[0x200000400:0x1:0x0]'

    # Build an export handle for a file and its directory
    llport encode 0x200000400:0x1:0x0 0x200000007:0x1:0x0

    # Zero four blocks of an image, then read them back
    llport zero disk.img --lblk 0 --pblk 8 --len 4 --key-hex \"$KEY\"
    llport read disk.img --lblk 0 --pblk 8 --len 4 --key-hex \"$KEY\" --hex
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (llport.toml)
    #[arg(long, env = "LLPORT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a FID maps to inode numbers
    Fid(fid::Args),

    /// Encode FIDs into an export handle
    Encode(encode::Args),

    /// Decode an export handle
    Decode(decode::Args),

    /// Overwrite a block range of an image with encrypted zeroes
    Zero(zero::Args),

    /// Decrypt a block range of an image
    Read(read::Args),
}

fn main() -> ExitCode {
    let quiet = std::env::args().any(|a| a == "-q" || a == "--quiet");
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            if !quiet {
                eprintln!("Error: {e:#}");
            }
            ExitCode::from(categorize_error(&e))
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration resolved");

    match cli.command {
        Commands::Fid(args) => fid::execute(&args),
        Commands::Encode(args) => encode::execute(&args),
        Commands::Decode(args) => decode::execute(&args),
        Commands::Zero(args) => zero::execute(&args, &config),
        Commands::Read(args) => read::execute(&args, &config),
    }
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<ExportError>() {
            return match err {
                ExportError::Stale | ExportError::Protocol { .. } => exit_code::BAD_HANDLE,
                _ => exit_code::GENERAL_ERROR,
            };
        }
        if cause.downcast_ref::<ZeroOutError>().is_some() || cause.downcast_ref::<io::Error>().is_some() {
            return exit_code::IO_ERROR;
        }
        if cause.downcast_ref::<FidParseError>().is_some()
            || cause.downcast_ref::<CryptoError>().is_some()
            || cause.downcast_ref::<hex::FromHexError>().is_some()
        {
            return exit_code::USAGE_ERROR;
        }
    }
    exit_code::GENERAL_ERROR
}
