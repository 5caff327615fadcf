pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "riego",
    about = "Riego operator CLI",
    long_about = "Inspect configuration, check readiness of the record-keeping service and run offline dripper trials.",
    after_help = "Examples:\n  riego doctor --json\n  riego config\n  riego cv 120,118,125,130,119,121,123,117,122,124,120,119,126,118,121,120"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, bot token readiness and gateway reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Compute mean, CV and uniformity band for a dripper trial")]
    Cv {
        #[arg(
            required = true,
            num_args = 1..,
            help = "Collected volumes in mL, as separate arguments or one comma-separated list"
        )]
        values: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Cv { values } => commands::cv::run(&values),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
