use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

use ctr_lab_cli::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    ctr_lab_cli::init_tracing(cli.log_format, cli.verbose);

    match ctr_lab_cli::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "✗".red(), err);
            ExitCode::FAILURE
        }
    }
}
