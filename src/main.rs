//! Runs the DayTime Hub server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use daytime_hub::auth::{AdminCredentials, MemorySessionStore, PgSessionStore, SessionStore};
use daytime_hub::config::{Config, SessionBackend};
use daytime_hub::db::{self, PgStore};
use daytime_hub::email::Mailer;
use daytime_hub::tasks::Background;
use daytime_hub::{build_router, AppState, SiteOptions};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(error) = run().await {
        tracing::error!("{error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let (pool, connected) = db::connect_with_retry(
        &config.database_url,
        config.db_connect_retries,
        config.db_connect_delay,
    )
    .await
    .context("Invalid `DATABASE_URL`")?;

    let store = PgStore::new(pool.clone());
    if connected {
        store
            .ensure_schema()
            .await
            .context("Failed to set up the applications table")?;
    }

    let sessions: Arc<dyn SessionStore> = match config.sessions {
        SessionBackend::Memory => Arc::new(MemorySessionStore::new()),
        SessionBackend::Database => {
            let sessions = PgSessionStore::new(pool);
            if connected {
                sessions
                    .ensure_schema()
                    .await
                    .context("Failed to set up the sessions table")?;
            }
            Arc::new(sessions)
        }
    };

    let credentials = AdminCredentials::from_parts(config.admin_user.clone(), config.admin_pass.clone());
    if credentials.is_none() {
        tracing::warn!("ADMIN_USER or ADMIN_PASS not set, the admin dashboard is disabled");
    }

    let mailer = Mailer::from_config(&config.email).await;
    tracing::info!(transports = ?mailer.transport_names(), "email configured");

    let tls = match &config.tls {
        Some((cert, key)) if cert.exists() && key.exists() => Some((cert.clone(), key.clone())),
        Some((cert, key)) => {
            tracing::warn!(cert = %cert.display(), key = %key.display(), "TLS files not found, serving plain HTTP");
            None
        }
        None => None,
    };

    let background = Background::new();
    let state = AppState {
        store: Arc::new(store),
        sessions,
        mailer: Arc::new(mailer),
        background: background.clone(),
        credentials,
        site: Arc::new(SiteOptions {
            root: config.site_root.clone(),
            production: config.production,
            direct_tls: tls.is_some(),
            trusted_proxies: config.trusted_proxies,
            cors: config.cors.clone(),
        }),
    };
    let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();
    let address = SocketAddr::from(([0, 0, 0, 0], config.port));

    if let Some((cert, key)) = tls {
        let rustls = RustlsConfig::from_pem_file(&cert, &key)
            .await
            .context("Failed to load the TLS certificate")?;
        let handle = axum_server::Handle::new();
        tokio::spawn({
            let handle = handle.clone();
            async move {
                shutdown_signal().await;
                handle.graceful_shutdown(Some(Duration::from_secs(10)));
            }
        });

        tracing::info!("HTTPS server running on {address}");
        axum_server::bind_rustls(address, rustls)
            .handle(handle)
            .serve(app)
            .await
            .context("HTTPS server failed")?;
    } else {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("Failed to bind to {address}"))?;

        tracing::info!("Server running on {address}");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server failed")?;
    }

    background.drain().await;
    tracing::info!("server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received terminate signal, shutting down"),
    }
}
