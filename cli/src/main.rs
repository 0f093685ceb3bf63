//! Rigger - agentless Compose and Stack deployments over SSH

use clap::Parser;

use rigger_cli::cli::Cli;
use rigger_cli::output::json::{error_code, format_error};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    if let Err(e) = cli.run().await {
        if json {
            match format_error(&format!("{e:#}"), error_code(&e)) {
                Ok(out) => println!("{out}"),
                Err(_) => eprintln!("Error: {e:#}"),
            }
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }
}
