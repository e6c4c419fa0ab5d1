//! VersaDB CLI
//!
//! Command-line tools for exploring the VersaDB connection protocol.
//!
//! # Commands
//!
//! - `cmp` - Compare two keys written as JSON
//! - `demo` - Run a scripted open/upgrade/delete scenario and print its trace

mod commands;

use clap::{Parser, Subcommand};
use commands::demo::Scenario;
use tracing_subscriber::EnvFilter;

/// VersaDB command-line tools.
#[derive(Parser)]
#[command(name = "versadb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two keys, printing -1, 0, or 1
    Cmp {
        /// First key as JSON (`{"$date": n}` and `{"$binary": [..]}` are recognised)
        first: String,

        /// Second key as JSON
        second: String,
    },

    /// Run a protocol scenario on a virtual clock
    Demo {
        /// Scenario to run
        #[arg(value_enum)]
        scenario: Scenario,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Ticks to advance the virtual clock after the scenario settles
        #[arg(short, long, default_value = "2000")]
        ticks: u64,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Cmp { first, second } => {
            commands::cmp::run(&first, &second)?;
        }
        Commands::Demo {
            scenario,
            format,
            ticks,
        } => {
            commands::demo::run(scenario, &format, ticks)?;
        }
        Commands::Version => {
            println!("VersaDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("VersaDB Core v{}", versadb_core::VERSION);
        }
    }

    Ok(())
}
