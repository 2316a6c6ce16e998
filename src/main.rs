use clap::Parser;
use image_import::cli::{Args, Runner};
use image_import::error::handlers::RejectionHandler;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = Runner::new(args).run().await {
        let rejection = RejectionHandler::reject(&err);
        tracing::error!(status = rejection.status, reason = rejection.reason, "{}", err);
        eprintln!("{}", serde_json::to_string_pretty(&rejection)?);
        std::process::exit(1);
    }
    Ok(())
}
