//! Yieldpoint CLI
//!
//! Runs demo programs under the suspend/resume runtime and inspects the
//! resolved runtime options.

use tracing_subscriber::EnvFilter;
use yieldpoint_core::cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
