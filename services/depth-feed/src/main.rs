use depth_feed::config::FeedConfig;
use depth_feed::engine::ReconciliationEngine;
use depth_feed::session::{feed_channels, Session};
use depth_feed::{http, transport};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinError;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => FeedConfig::load(&path)?,
        None => FeedConfig::default(),
    };
    tracing::info!(
        symbol = %config.symbol,
        depth = config.depth,
        highlight_ms = config.highlight_ms,
        "Starting depth feed service"
    );

    let engine = ReconciliationEngine::new(config.engine_config());
    let (session, views) = Session::new(engine);
    let (channels, book_ends, trade_ends) = feed_channels(config.channel_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let book_url = config.book_url.clone();
    let book_task = tokio::spawn(async move {
        if let Err(e) = transport::run_feed(&book_url, book_ends).await {
            tracing::error!(error = %e, "Book transport failed");
        }
    });
    let trade_url = config.trade_url.clone();
    let trade_task = tokio::spawn(async move {
        if let Err(e) = transport::run_feed(&trade_url, trade_ends).await {
            tracing::error!(error = %e, "Trade transport failed");
        }
    });
    let session_task = tokio::spawn(session.run(channels, shutdown_rx));

    let addr = config.listen_socket()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, http::router(views))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await?;

    tracing::info!("Shutting down");
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Session already stopped before shutdown signal");
    }
    let engine = session_task.await?;
    tracing::info!(stats = ?engine.stats(), "Session drained");

    // The session dropped its control senders on exit, which closes the sockets
    let (book_result, trade_result) = tokio::join!(book_task, trade_task);
    report_join("book", book_result);
    report_join("trade", trade_result);

    Ok(())
}

/// Log a transport task that panicked or was cancelled. Returns true if it
/// joined cleanly.
fn report_join(transport: &str, result: Result<(), JoinError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(transport, error = %e, "Transport task failed to join");
            false
        }
    }
}
