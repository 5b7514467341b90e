//! Report intake bot
//!
//! Walks a single authorized operator through batch, test type, test name and
//! PDF, then forwards the bundle to the ingestion endpoint.

mod config;
mod engine;
mod intake;
mod runtime;
mod session;
mod transport;
mod uploader;

use config::IntakeConfig;
use engine::IntakeEngine;
use runtime::Dispatcher;
use session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::TelegramTransport;
use uploader::{HttpUploader, LoggingUploader};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "report_intake=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = match IntakeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Refusing to start");
            return Err(e.into());
        }
    };
    tracing::info!(
        operator = %config.authorized_operator,
        upload_url = %config.upload_url,
        batches = ?config.rules.batches(),
        test_types = ?config.rules.test_types(),
        session_ttl = ?config.session_ttl,
        "Configuration loaded"
    );

    let store = Arc::new(SessionStore::new(config.session_ttl));
    let transport = Arc::new(TelegramTransport::new(
        &config.telegram_api,
        config.bot_token.clone(),
    )?);
    let uploader = Arc::new(LoggingUploader::new(HttpUploader::new(
        config.upload_url.clone(),
        config.api_key.clone(),
        config.upload_timeout,
    )?));

    let engine = Arc::new(IntakeEngine::new(
        Arc::new(config.rules.clone()),
        config.authorized_operator,
        Arc::clone(&store),
        uploader,
        Arc::clone(&transport),
    ));
    let dispatcher = Dispatcher::new(engine);

    let cancel = CancellationToken::new();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    // Abandoned sessions
    if let Some(ttl) = store.ttl() {
        let period = (ttl / 2).max(MIN_SWEEP_INTERVAL);
        tokio::spawn(session::run_sweeper(Arc::clone(&store), period, cancel.clone()));
    }

    let poller = {
        let transport = Arc::clone(&transport);
        let cancel = cancel.clone();
        tokio::spawn(async move { transport.run_polling(inbound_tx, cancel).await })
    };

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            tracing::info!("Shutdown requested");
            cancel.cancel();
        });
    }

    tracing::info!("Report intake bot running");
    dispatcher.run(inbound_rx, cancel.clone()).await;

    cancel.cancel();
    let _ = poller.await;

    Ok(())
}
