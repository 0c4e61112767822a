//! Print the projected view of a snapshot file as JSON.

use kb_view::ViewConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ViewConfig::from_env();
    tracing::info!(snapshot = %config.snapshot_path.display(), "loading snapshot");
    let out = kb_view::render(&config).await?;
    println!("{}", out);
    Ok(())
}
