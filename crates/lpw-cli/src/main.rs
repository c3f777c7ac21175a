mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::waterfall::{AnalyzeArgs, DistributeArgs, SummaryArgs};

/// Liquidation preference waterfall calculations
#[derive(Parser)]
#[command(
    name = "lpw",
    version,
    about = "Liquidation preference waterfall calculations",
    long_about = "Models how proceeds from a company sale are distributed among share \
                  classes based on their liquidation preferences, participation rights, \
                  caps, and conversion options. Cap tables load from CSV or JSON; exit \
                  values accept K/M/B suffixes (500K, 15M, 1.5B)."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Distribute a single exit value across the cap table
    Distribute(DistributeArgs),
    /// Sweep several exit values and report conversions and caps
    Analyze(AnalyzeArgs),
    /// Summarise the cap table (shares, invested, ownership)
    Summary(SummaryArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Distribute(args) => commands::waterfall::run_distribute(args),
        Commands::Analyze(args) => commands::waterfall::run_analyze(args),
        Commands::Summary(args) => commands::waterfall::run_summary(args),
        Commands::Version => {
            println!("lpw {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
