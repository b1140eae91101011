use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use btspider::crawler::Crawler;
use btspider::store;

#[derive(Parser, Debug)]
#[command(name = "btspider")]
#[command(author, version, about = "BitTorrent DHT crawler", long_about = None)]
struct Args {
    /// Store URL: mem:// or a JSONL file path
    #[arg(long, default_value = "torrents.jsonl")]
    db: String,

    /// DHT listen address
    #[arg(long, default_value = ":26881")]
    dht: String,

    /// Parallel metadata fetch sessions
    #[arg(long, default_value_t = 10)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(db = %args.db, "opening store");
    let store = store::open(&args.db).with_context(|| format!("opening store {}", args.db))?;

    let crawler = Crawler::new(store, &args.dht, args.concurrency)
        .await
        .context("creating crawler")?;

    crawler.start();
    info!(addr = %args.dht, concurrency = args.concurrency, "crawler running");

    shutdown_signal().await;
    info!("shutdown signal received");

    crawler.stop().await;
    info!("bye");
    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                error!(error = %e, "cannot install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
