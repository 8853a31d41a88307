//! bitcollector Binary Entry Point
//!
//! Runs every module named in a configuration file once and exits.
//! Core functionality is provided by the `bitcollector` library crate.

use std::path::PathBuf;
use std::process::ExitCode;

use bitcollector::FrameworkDriver;
use clap::{ArgAction, Parser};

/// bitcollector - Pluggable Data-Collection Harness
#[derive(Parser, Debug)]
#[command(name = "bitcollector", version, about, long_about = None, disable_version_flag = true)]
struct Cli {
    /// Path to the framework configuration file
    config: PathBuf,

    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version requests print to stdout and succeed.
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let mut driver = FrameworkDriver::new().with_global_logging(true);
    match driver.run(&cli.config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            for line in e.diagnostics() {
                eprintln!("Startup - ERROR - {line}");
            }
            ExitCode::FAILURE
        }
    }
}
