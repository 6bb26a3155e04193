mod args;
mod commands;
mod config;
pub mod defaults;
mod printing;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use args::{InitArgs, RunArgs};
use commands::{init, run, validate};

/// evodyn: individual-based simulations of evolutionary dynamics
///
/// Populations of individuals carrying strategies (traits) play games on
/// networks, imitate or replace each other according to their fitness and
/// mutate, for one or several interacting species.
#[derive(Parser, Debug)]
#[command(name = "evodyn")]
#[command(author, version, about = "Simulates evolutionary games in structured populations", long_about = None)]
struct Cli {
    /// Number of threads to use for parallel replicates
    ///
    /// If not specified, defaults to the number of logical CPUs.
    #[arg(short = 't', long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a new simulation configuration file.
    ///
    /// Sets up the parameters for a new experiment (model, population size,
    /// network, update rule, etc.) but does not run it yet.
    Init(Box<InitArgs>),

    /// Run a simulation from a configuration file.
    ///
    /// Reports the mean traits and fitness of every species at regular
    /// intervals as CSV.
    Run(RunArgs),

    /// Check a configuration file without running it.
    Validate {
        /// Configuration file
        #[arg(short, long, default_value = defaults::CONFIG_FILE)]
        config: PathBuf,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    match cli.command {
        Commands::Init(args) => {
            init::init_config(&args)?;
        }
        Commands::Run(args) => {
            run::run_simulation(&args)?;
        }
        Commands::Validate { config } => {
            validate::validate_config(&config)?;
        }
    }

    Ok(())
}
