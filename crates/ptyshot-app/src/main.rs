mod cli;
mod telemetry;

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_level);

    let command_line = cli.command_line();
    debug!(command = %command_line, "executing");

    match ptyshot_pty::execute(&command_line) {
        Ok(output) => {
            if !cli.quiet {
                println!("Captured output:");
            }
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error executing command: {err}");
            if let Some(output) = err.captured_output().filter(|o| !o.is_empty()) {
                if !cli.quiet {
                    println!("Captured output:");
                }
                println!("{output}");
            }
            ExitCode::FAILURE
        }
    }
}
