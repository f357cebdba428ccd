//! # Parley Worker
//!
//! Purges expired sessions and verification codes on a fixed interval.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://... SWEEP_INTERVAL_SECS=300 cargo run -p parley-worker
//! ```

use parley_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use parley_shared::identity::postgres::PgIdentityStore;
use parley_worker::{config::WorkerConfig, sweeper::Sweeper};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley_worker=info,parley_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Parley Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;

    let pool = create_pool(DatabaseConfig {
        url: config.database_url.clone(),
        max_connections: config.max_connections,
        min_connections: 1,
        ..DatabaseConfig::default()
    })
    .await?;

    let sweeper = Sweeper::new(Arc::new(PgIdentityStore::new(pool.clone())), config.sweeper);

    let token = sweeper.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received, stopping sweeper...");
        token.cancel();
    });

    sweeper.run().await?;

    close_pool(pool).await;
    Ok(())
}
