use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use receipt_fx::cli::setup::setup;
use receipt_fx::core::log::init_logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for receipt_fx::AppCommand {
    fn from(cmd: Commands) -> receipt_fx::AppCommand {
        match cmd {
            Commands::Convert {
                input,
                receipt_id,
                json,
            } => receipt_fx::AppCommand::Convert {
                input,
                receipt_id,
                json,
            },
            Commands::Rates => receipt_fx::AppCommand::Rates,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Extract amounts from receipt text and convert them to the home currency
    Convert {
        /// File with the recognized receipt text, `-` or omitted for stdin
        input: Option<PathBuf>,

        /// Identifier recorded in the report, defaults to the file name
        #[arg(long)]
        receipt_id: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Display the exchange rates used for conversion
    Rates,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => receipt_fx::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
