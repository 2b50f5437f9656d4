//! `DocuVault` server entry point.
//!
//! Picks the repository and object store from the environment, wires the
//! services, then serves the Axum router until SIGINT or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use docuvault_core::memory::MemoryRepository;
use docuvault_core::repository::Repository;
use docuvault_server::build_router;
use docuvault_server::config::{DatabaseType, ObjectStoreType, ServerConfig};
use docuvault_server::state::AppState;
use docuvault_storage::{MemoryObjectStore, ObjectStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(
        database = database_label(&config.database),
        object_store = ?config.object_store,
        "DocuVault starting"
    );

    let repo = open_repository(&config.database).await?;
    let store = open_object_store(&config.object_store)?;
    let state = Arc::new(AppState::new(repo, store, &config));

    let app = build_router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, public_url = %config.public_url, "DocuVault server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("DocuVault server stopped");
    Ok(())
}

const fn database_label(database: &DatabaseType) -> &'static str {
    match database {
        DatabaseType::Memory => "memory",
        DatabaseType::Postgres { .. } => "postgres",
    }
}

async fn open_repository(database: &DatabaseType) -> anyhow::Result<Arc<dyn Repository>> {
    let repo: Arc<dyn Repository> = match database {
        DatabaseType::Memory => {
            info!("using in-memory repository (data will not persist)");
            Arc::new(MemoryRepository::new())
        }
        #[cfg(feature = "postgres")]
        DatabaseType::Postgres { url } => {
            info!(url = %"[redacted]", "using PostgreSQL repository");
            Arc::new(
                docuvault_server::postgres::PgRepository::connect(url)
                    .await
                    .context("failed to connect to PostgreSQL")?,
            )
        }
        #[cfg(not(feature = "postgres"))]
        DatabaseType::Postgres { .. } => {
            anyhow::bail!("PostgreSQL requested but feature 'postgres' is not enabled");
        }
    };
    Ok(repo)
}

fn open_object_store(object_store: &ObjectStoreType) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match object_store {
        ObjectStoreType::Memory => {
            info!("using in-memory object store (files will not persist)");
            Arc::new(MemoryObjectStore::new())
        }
        #[cfg(feature = "fs-backend")]
        ObjectStoreType::Fs { path } => {
            info!(path = %path, "using filesystem object store");
            Arc::new(
                docuvault_storage::FsObjectStore::open(path)
                    .context("failed to open filesystem object store")?,
            )
        }
        #[cfg(not(feature = "fs-backend"))]
        ObjectStoreType::Fs { .. } => {
            anyhow::bail!("filesystem object store requested but feature 'fs-backend' is not enabled");
        }
        #[cfg(feature = "rocksdb-backend")]
        ObjectStoreType::RocksDb { path } => {
            info!(path = %path, "using RocksDB object store");
            Arc::new(
                docuvault_storage::RocksDbObjectStore::open(path)
                    .context("failed to open RocksDB object store")?,
            )
        }
        #[cfg(not(feature = "rocksdb-backend"))]
        ObjectStoreType::RocksDb { .. } => {
            anyhow::bail!("RocksDB object store requested but feature 'rocksdb-backend' is not enabled");
        }
    };
    Ok(store)
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
