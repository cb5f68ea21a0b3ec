use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use votetally::{AppConfig, AppState, VoteDatabase, build_router};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load();
    init_tracing();

    let storage_config = config.storage_config();
    let durable = storage_config.is_durable();
    let db = VoteDatabase::open(storage_config).context("failed to open vote storage")?;
    info!(
        durable,
        data_dir = ?config.data_dir,
        polls = db.polls().poll_count().unwrap_or_default(),
        "vote storage ready"
    );

    let app = build_router(AppState::new(db.clone()));

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, "votetally started");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Err(err) = db.checkpoint().await {
        error!(error = %err, "final checkpoint failed");
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("votetally=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
