//! Admin server plus a scheduled capture job.
//!
//! Run with:
//! ```bash
//! SHEET_URL="https://docs.google.com/spreadsheets/d/<id>/edit#gid=0" \
//!     cargo run --example axum_admin --features axum-integration
//! ```
//!
//! Then visit: http://localhost:3000/pool/stats

use axum::{Router, routing::get};
use sheetcast::integrations::axum::router;
use sheetcast::prelude::*;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;

/// Messaging client that only logs what it would send.
struct LogClient;

impl MessagingClient for LogClient {
    async fn send_image(
        &self,
        recipient: &str,
        image: &[u8],
        caption: &str,
    ) -> std::result::Result<String, DeliveryError> {
        log::info!(
            "📨 Would send {} bytes to {} with caption {:?}",
            image.len(),
            recipient,
            caption
        );
        Ok(format!("local-{}", recipient))
    }
}

/// Health check endpoint.
async fn health() -> &'static str {
    "OK"
}

/// Run `job` every `period` until `stop` flips.
async fn run_schedule(
    orchestrator: CaptureOrchestrator,
    job: ScheduleJob,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = dispatch_pooled(&orchestrator, &job, &LogClient, None).await;
                log::info!("Scheduled run finished: {:?}", report);
            }
            _ = stop.changed() => break,
        }
    }
}

/// Shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("Shutdown signal received, cleaning up...");
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let sheet_url = std::env::var("SHEET_URL")
        .unwrap_or_else(|_| "https://sheets.example.com/d/demo/edit#gid=0".to_string());
    let document = DocumentRef::parse(&sheet_url).expect("SHEET_URL is not a valid URL");

    // Pool from app.env / environment, Chrome launched
    let pool = init_session_pool()
        .await
        .expect("Failed to initialize session pool");

    let job = ScheduleJob::new("demo", document)
        .with_caption("Spreadsheet snapshot")
        .with_settle_delay(Duration::from_secs(2))
        .with_recipient(Recipient::new("ops-channel"))
        .with_recipient(Recipient::new("finance-channel").with_view("1"));

    let (stop_tx, stop_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_schedule(
        CaptureOrchestrator::new(Arc::clone(&pool)),
        job,
        Duration::from_secs(300),
        stop_rx,
    ));

    let app = Router::new()
        .route("/health", get(health))
        .merge(router(Arc::clone(&pool)));

    log::info!("Starting server on http://localhost:3000");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000")
        .await
        .expect("Failed to bind");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    let _ = stop_tx.send(true);
    if let Err(e) = scheduler.await {
        log::error!("Scheduler task failed: {}", e);
    }

    pool.close_all().await;
    log::info!("Cleanup complete");
}
