use anyhow::Context;
use auth_service::TokenStore;
use datastore::{InMemoryRepository, JsonFileRepository, Repository};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod app;
mod config;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let repo = open_repository(&config)?;
    if let Some(admin) = &config.admin {
        auth_service::ensure_admin(repo.as_ref(), &admin.email, &admin.password)
            .context("failed to register bootstrap admin")?;
    }

    let tokens = Arc::new(TokenStore::new(config.token_ttl_secs));
    let router = app::build_router(repo, tokens);
    let addr = config.addr();

    match &config.tls {
        Some(tls) => {
            let _ = rustls::crypto::ring::default_provider().install_default();
            let rustls_config =
                axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                    .await
                    .context("failed to load TLS certificate")?;

            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
            });

            tracing::info!(%addr, "server listening (https)");
            axum_server::bind_rustls(addr, rustls_config)
                .handle(handle)
                .serve(router.into_make_service())
                .await
                .context("server error")?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;

            tracing::info!(%addr, "server listening");
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("server error")?;
        }
    }

    tracing::info!("server stopped");
    Ok(())
}

fn open_repository(config: &Config) -> anyhow::Result<Arc<dyn Repository>> {
    let repo: Arc<dyn Repository> = match &config.store_path {
        Some(path) => {
            let repo = JsonFileRepository::open(path)
                .with_context(|| format!("failed to open store {}", path.display()))?;
            tracing::info!(path = %repo.path().display(), "using file store");
            Arc::new(repo)
        }
        None if config.seed_demo_data => {
            tracing::info!("using in-memory store with demo data");
            Arc::new(InMemoryRepository::with_demo_data())
        }
        None => {
            tracing::warn!("STORE_PATH not set, lives are kept in memory only");
            Arc::new(InMemoryRepository::new())
        }
    };
    Ok(repo)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
