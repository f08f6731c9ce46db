use clap::Parser;
use slack_file_harvest::cli::{run, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the token may come from the real environment.
    let dotenv = dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dotenv = ?dotenv,
        "slack-file-harvest starting"
    );

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "slack-file-harvest aborted");
        return Err(e);
    }
    tracing::info!("slack-file-harvest finished");
    Ok(())
}
