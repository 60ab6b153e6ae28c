use clap::Parser;
use tracing::info;

use livecoding_server::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    info!("=== Live Coding Server ===");
    info!(host = %cli.host, port = cli.port, "starting");

    livecoding_server::run(cli).await
}
