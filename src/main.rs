pub mod browser;
pub mod cli;
pub mod core;
pub mod error;
pub mod models;
pub mod remote;
pub mod storage;
pub mod tui;

use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    cli::init_tracing(cli.verbose, cli.is_interactive());

    if let Err(e) = cli::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
