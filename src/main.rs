use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use kickoff_api::{
    config::Config,
    db::{self, CachedRepository, InMemoryRepository, MatchRepository, PgMatchRepository},
    routes::{create_router, AppState},
    services::Recommender,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("kickoff_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let mut repository: Arc<dyn MatchRepository> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            db::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            Arc::new(PgMatchRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, matches are kept in memory");
            Arc::new(InMemoryRepository::new())
        }
    };

    let cache_writer = match &config.redis_url {
        Some(url) => {
            let client = db::create_redis_client(url)?;
            let (cache, handle) = db::Cache::new(client).await;
            repository = Arc::new(CachedRepository::new(
                repository,
                cache,
                config.upcoming_cache_ttl_secs,
            ));
            Some(handle)
        }
        None => None,
    };

    tracing::info!(
        storage = repository.name(),
        cache = cache_writer.is_some(),
        "Storage initialized"
    );

    let state = AppState::new(
        repository,
        Recommender::new(config.recommender_settings()),
        config.default_limit,
    );
    let app = create_router(Arc::new(state));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
