use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gitlack::config::Config;

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    setup_logging(config.log_level());

    if let Err(e) = gitlack::run(config).await {
        log::error!("Fatal: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
