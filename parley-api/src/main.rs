//! # Parley API Server
//!
//! Serves registration, credential and provider sign-in, email
//! verification, password reset, session handling and user management.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/parley AUTH_SECRET=... cargo run -p parley-api
//! ```

use parley_api::{
    app::{build_router, AppState},
    config::Config,
};
use parley_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use parley_shared::identity::postgres::PgIdentityStore;
use parley_shared::mail::{resend::ResendMailer, CodeMailer, LogMailer};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley_api=debug,parley_shared=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Parley API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..DatabaseConfig::default()
    })
    .await?;
    run_migrations(&pool).await?;

    let mailer: Arc<dyn CodeMailer> = match config.email_config() {
        Some(email) => Arc::new(ResendMailer::new(email)),
        None => {
            tracing::warn!("EMAIL_API_KEY is not set; verification codes will be logged");
            Arc::new(LogMailer)
        }
    };

    let providers = config.oauth_settings().enabled();
    tracing::info!(providers = ?providers, "Sign-in providers configured");

    let bind_address = config.bind_address();
    let state = AppState::new(Arc::new(PgIdentityStore::new(pool.clone())), mailer, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, exiting...");
}
