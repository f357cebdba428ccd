//! Common test utilities for HTTP tests
//!
//! This module provides shared infrastructure for the router tests:
//! - In-memory identity store and recording mailer
//! - A literal test configuration
//! - Request helpers and cookie parsing
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use parley_api::app::{build_router, AppState};
use parley_api::config::{
    ApiConfig, AuthConfig, Config, DatabaseConfig, EmailSettings, OAuthConfig, ProviderCredentials,
};
use parley_shared::auth::password::hash_password;
use parley_shared::identity::memory::MemoryIdentityStore;
use parley_shared::identity::IdentityStore;
use parley_shared::mail::RecordingMailer;
use parley_shared::models::user::{NewUser, Role, User};
use std::sync::Arc;
use tower::Service;

pub const PASSWORD: &str = "correct horse battery";

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryIdentityStore>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            production: false,
            public_url: "http://localhost:8080".to_string(),
            cors_origins: vec!["*".to_string()],
        },
        database: DatabaseConfig {
            url: "postgresql://unused".to_string(),
            max_connections: 1,
        },
        auth: AuthConfig {
            secret: "test-secret-key-at-least-32-bytes-long".to_string(),
            require_verified_email: true,
            session_ttl_days: 30,
            code_ttl_minutes: 10,
            max_code_attempts: 5,
        },
        oauth: OAuthConfig::default(),
        email: EmailSettings {
            api_key: None,
            from: "Parley <no-reply@parley.test>".to_string(),
        },
    }
}

/// Test configuration with Google sign-in enabled
pub fn google_config() -> Config {
    let mut config = test_config();
    config.oauth.google = Some(ProviderCredentials {
        client_id: "google-client".to_string(),
        client_secret: "google-secret".to_string(),
    });
    config
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryIdentityStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let state = AppState::new(store.clone(), mailer.clone(), config);
        let app = build_router(state.clone());

        Self {
            app,
            state,
            store,
            mailer,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().call(request).await.unwrap()
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn get_with_bearer(&self, path: &str, token: &str) -> Response {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_form(&self, path: &str, body: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    /// Inserts a user directly into the store
    pub async fn create_user(&self, email: &str, role: Role, verified: bool) -> User {
        self.store
            .create_user(NewUser {
                email: email.to_string(),
                name: None,
                image: None,
                password_hash: Some(hash_password(PASSWORD).unwrap()),
                email_verified_at: verified.then(Utc::now),
                role,
            })
            .await
            .unwrap()
    }

    /// Signs in through `/login`; returns the `Cookie` header value
    pub async fn sign_in(&self, email: &str) -> String {
        let response = self
            .post_form("/login", &form(&[("email", email), ("password", PASSWORD)]), None)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("login should set a session cookie")
    }

    /// Verified user, signed in
    pub async fn signed_in_user(&self, email: &str, role: Role) -> (User, String) {
        let user = self.create_user(email, role, true).await;
        let cookie = self.sign_in(email).await;
        (user, cookie)
    }
}

/// Form-encodes key/value pairs
pub fn form(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// All `Set-Cookie` header values
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// `name=value` of a live (non-removal) session cookie, ready for a `Cookie` header
pub fn session_cookie(response: &Response) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .filter(|c| c.starts_with("parley.session-token=") && !c.contains("Max-Age=0"))
        .find_map(|c| c.split(';').next().map(str::to_string))
}

/// Session token from a `Cookie` header value
pub fn token_of(cookie: &str) -> &str {
    cookie.trim_start_matches("parley.session-token=")
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
