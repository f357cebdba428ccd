/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use parley_api::{app::AppState, config::Config};
/// use parley_shared::identity::postgres::PgIdentityStore;
/// use parley_shared::db::pool::{create_pool, DatabaseConfig};
/// use parley_shared::mail::LogMailer;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(DatabaseConfig {
///     url: config.database.url.clone(),
///     ..DatabaseConfig::default()
/// })
/// .await?;
/// let state = AppState::new(Arc::new(PgIdentityStore::new(pool)), Arc::new(LogMailer), config);
/// let app = parley_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use parley_shared::identity::{sessions::ResolverChain, IdentityService, IdentityStore};
use parley_shared::mail::CodeMailer;
use parley_shared::oauth::OAuthClient;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Identity flows
    pub identity: Arc<IdentityService>,

    /// Cookie first, then bearer
    pub resolvers: Arc<ResolverChain>,

    /// Google and GitHub sign-in
    pub oauth: Arc<OAuthClient>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state
    ///
    /// The OAuth client doubles as the provider email source, so GitHub
    /// accounts with a private email can still be reconciled.
    pub fn new(store: Arc<dyn IdentityStore>, mailer: Arc<dyn CodeMailer>, config: Config) -> Self {
        let oauth = Arc::new(OAuthClient::new(config.oauth_settings()));
        let identity = Arc::new(IdentityService::new(
            store,
            mailer,
            oauth.clone(),
            config.identity(),
        ));
        let resolvers = Arc::new(ResolverChain::standard(identity.sessions()));

        Self {
            identity,
            resolvers,
            oauth,
            config: Arc::new(config),
        }
    }

    /// Whether cookies carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.config.api.production
    }

    /// Signs OAuth state tokens
    pub fn auth_secret(&self) -> &str {
        &self.config.auth.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health
/// ├── POST /register, /login, /verify, /verify/resend
/// ├── POST /forgot-password/{request,verify,reset}
/// ├── GET|POST /logout
/// ├── GET  /post-auth                 # role dispatch
/// ├── GET  /auth/:provider/{start,callback}
/// ├── GET  /dashboard                 # admin landing
/// ├── GET  /user                      # user landing
/// ├── GET  /api/me
/// ├── POST /settings/{profile,password}
/// └── /admin/users                    # GET list, POST role, POST status
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Security and cache-control headers
///
/// Authentication is per handler, through the extractors in
/// [`crate::extract`].
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/logout", get(routes::auth::logout).post(routes::auth::logout))
        .route("/post-auth", get(routes::auth::post_auth))
        .route("/verify", post(routes::verify::verify))
        .route("/verify/resend", post(routes::verify::resend))
        .route("/forgot-password/request", post(routes::password::request_reset))
        .route("/forgot-password/verify", post(routes::password::verify_reset_code))
        .route("/forgot-password/reset", post(routes::password::reset));

    let oauth_routes = Router::new()
        .route("/:provider/start", get(routes::oauth::start))
        .route("/:provider/callback", get(routes::oauth::callback));

    let page_routes = Router::new()
        .route("/dashboard", get(routes::landing::dashboard))
        .route("/user", get(routes::landing::user_home))
        .route("/api/me", get(routes::account::me))
        .route("/settings/profile", post(routes::account::update_profile))
        .route("/settings/password", post(routes::account::change_password));

    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users))
        .route("/users/role", post(routes::admin::change_role))
        .route("/users/status", post(routes::admin::toggle_status));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .merge(auth_routes)
        .merge(page_routes)
        .nest("/auth", oauth_routes)
        .nest("/admin", admin_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
