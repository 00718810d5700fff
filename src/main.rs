//! forge-exporter - Main entry point.
//!
//! This binary wires the remote client, the fetch orchestrator, the periodic
//! drivers, and the metrics HTTP server together and runs until interrupted.

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forge_exporter::client::{AuthorMode, GithubClient, RemoteClient};
use forge_exporter::config::Options;
use forge_exporter::exporter::Exporter;
use forge_exporter::metrics::Collector;
use forge_exporter::server::{AppState, build_router};

#[tokio::main]
async fn main() {
    let options = Options::parse();

    // Initialize tracing
    let default_filter = if options.debug {
        "forge_exporter=debug"
    } else {
        "forge_exporter=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = run(options).await {
        tracing::error!(error = %err, "Exiting");
        std::process::exit(1);
    }
}

async fn run(options: Options) -> anyhow::Result<()> {
    options.validate()?;

    let token = std::env::var("GITHUB_TOKEN").unwrap_or_default();
    if token.is_empty() {
        bail!("no GITHUB_TOKEN environment variable defined");
    }

    let author_mode = if options.realnames {
        AuthorMode::Login
    } else {
        AuthorMode::StableId
    };

    let client = GithubClient::from_token(token, author_mode)
        .context("failed to create API client")?;
    let client: Arc<dyn RemoteClient> = Arc::new(client);

    let exporter = Exporter::new(Arc::clone(&client), &options.repos);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
        });
    }

    // start fetching data in the background, but bring up the metrics
    // server as soon as possible so warm-up scrapes succeed
    let handles = exporter.start(options.schedule(), shutdown.clone());

    let collector = Arc::new(Collector::new(
        exporter.caches().clone(),
        Arc::clone(exporter.fetcher()),
        client,
    ));
    let app = build_router(AppState::new(collector));

    tracing::info!(listen = %options.listen, "Starting metrics server");

    let listener = tokio::net::TcpListener::bind(options.listen)
        .await
        .with_context(|| format!("failed to bind to {}", options.listen))?;

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await
        .context("metrics server failed")?;

    // no graceful drain: cached state is process-lifetime only
    shutdown.cancel();
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
