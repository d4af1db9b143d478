//! trackdupe - audio duplicate finder
//!
//! Entry point for the trackdupe CLI application.

use clap::Parser;
use trackdupe::{
    cli::Cli,
    error::{ExitCode, StructuredError},
    signal::ShutdownHandler,
};

fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    match trackdupe::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            // A fatal error raised after Ctrl+C is still reported as an interruption
            let exit_code = if trackdupe::signal::global_handler().is_some_and(ShutdownHandler::is_shutdown_requested) {
                ExitCode::Interrupted
            } else {
                ExitCode::GeneralError
            };

            if json_errors {
                let structured = StructuredError::new(&err, exit_code);
                if let Ok(json) = serde_json::to_string_pretty(&structured) {
                    eprintln!("{}", json);
                } else {
                    eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
                }
            } else {
                eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
            }

            std::process::exit(exit_code.as_i32());
        }
    }
}
