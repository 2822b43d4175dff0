//! AI Status Monitor entry point

use aarambh_status::StatusError;
use clap::Parser;
use status_monitor::cli::{self, Cli, ExitCode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let code = match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if e
                .downcast_ref::<StatusError>()
                .is_some_and(StatusError::is_user_error)
            {
                ExitCode::InvalidInput
            } else {
                ExitCode::InternalError
            }
        }
    };

    std::process::exit(code.into());
}
