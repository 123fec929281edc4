use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use provident::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // An unknown command is answered with usage, not an error.
        Err(err) if err.kind() == ErrorKind::InvalidSubcommand => {
            let _ = Cli::command().print_help();
            return ExitCode::SUCCESS;
        }
        Err(err) => err.exit(),
    };
    let root = PathBuf::from(".");

    match cli.command {
        None => {
            let _ = Cli::command().print_help();
            ExitCode::SUCCESS
        }
        Some(Command::Generate { output }) => match cli::generate_once(&root, &output) {
            Ok(report) => {
                println!(
                    "generated {} providers -> {}",
                    report.providers,
                    report.output.display()
                );
                ExitCode::SUCCESS
            }
            Err(err) => {
                cli::report_failure(&err);
                ExitCode::FAILURE
            }
        },
        Some(Command::Watch { output }) => match cli::watch(root, output).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        },
    }
}
