//! litefab entry point.
//!
//! Exit codes: 0 on success, 1 on any failure; errors go to stderr.

use clap::Parser;
use litefab_node::cli::{self, Cli};
use tracing::Level;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli::run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
