//! haloforge CLI - Generate halo-exchange glue code from TOML job files.
//!
//! # Commands
//!
//! - `haloforge generate <job.toml>` - Run every generator section of a job
//! - `haloforge inspect <stencil>` - Show a stencil's directions and their
//!   communication fan-out
//!
//! # Examples
//!
//! ```bash
//! # Write pack infos, boundary reports and lattice models to ./generated
//! haloforge generate lbm.toml --output generated
//!
//! # Print the generated files instead of writing them
//! haloforge generate lbm.toml --dry-run
//!
//! # Which ghost-layer directions does a D3Q19 population travel through?
//! haloforge inspect D3Q19
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod job;

use commands::{generate, inspect};

/// haloforge - halo-exchange code generation
#[derive(Parser)]
#[command(name = "haloforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every generator section of a job file
    Generate {
        /// TOML job file
        job: String,

        /// Output directory for generated files
        #[arg(short, long)]
        output: Option<String>,

        /// Show generated files without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show a stencil and its communication directions
    Inspect {
        /// Stencil name (D2Q9, D3Q7, D3Q15, D3Q19, D3Q27)
        stencil: String,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Generate {
            job,
            output,
            dry_run,
        } => generate::execute(&job, output.as_deref(), dry_run),

        Commands::Inspect { stencil } => inspect::execute(&stencil),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
