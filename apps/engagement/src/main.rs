mod config;
mod db;
mod errors;
mod models;
mod remote;
mod routes;
mod social;
mod state;
mod storage;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StorageBackend};
use crate::db::create_pool;
use crate::remote::{DisabledSkillService, HttpSkillService, SkillService};
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{KeyValueStore, MemoryStore, PostgresStore, RedisStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on a missing backend URL)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting engagement service v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;
    let remote = build_skill_service(&config)?;

    let state = AppState::new(store, remote, config.clone());

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Selects the persistence backend named by `STORAGE_BACKEND`.
async fn build_store(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config.storage_backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::Redis => {
            let url = config.redis_url.as_deref().unwrap_or_default();
            Arc::new(RedisStore::connect(url, &config.storage_namespace).await?)
        }
        StorageBackend::Postgres => {
            let url = config.database_url.as_deref().unwrap_or_default();
            let pool = create_pool(url).await?;
            Arc::new(PostgresStore::new(pool).await?)
        }
    };
    Ok(store)
}

/// The remote plans API is optional; without it every download is stored locally.
fn build_skill_service(config: &Config) -> Result<Arc<dyn SkillService>> {
    match &config.skill_service_url {
        Some(url) => {
            let service = HttpSkillService::new(url, config.skill_service_timeout)?;
            info!("Remote skill service: {url}");
            Ok(Arc::new(service))
        }
        None => {
            info!("Remote skill service disabled; downloads use local copies");
            Ok(Arc::new(DisabledSkillService))
        }
    }
}
