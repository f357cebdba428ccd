/// Session manager and request resolvers
///
/// A session is an opaque random token handed to the client. Only its SHA-256
/// digest is stored. Resolving a token always reloads the user so role and
/// disabled-status changes take effect on the next request.
///
/// Requests are resolved by an ordered [`ResolverChain`]: each
/// [`SessionResolver`] looks at one credential source, and the first one that
/// yields a viewer wins.

use super::error::IdentityResult;
use super::gate::{Identity, Viewer};
use super::store::IdentityStore;
use crate::auth::token::{generate_session_token, hash_session_token, is_well_formed};
use crate::models::user::User;
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "parley.session-token";

/// A freshly created session; `token` is the only copy of the plaintext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionManager {
    store: Arc<dyn IdentityStore>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn IdentityStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Starts a session for `user_id`
    pub async fn create(&self, user_id: Uuid, now: DateTime<Utc>) -> IdentityResult<IssuedSession> {
        let (token, token_hash) = generate_session_token();
        let expires_at = now + self.ttl;

        self.store.insert_session(&token_hash, user_id, expires_at).await?;

        tracing::debug!(user_id = %user_id, expires_at = %expires_at, "Session created");

        Ok(IssuedSession {
            token,
            user_id,
            expires_at,
        })
    }

    /// Maps a token to its user, loaded fresh from the store
    ///
    /// Unknown, malformed and expired tokens all yield `None`. So does a
    /// session whose user no longer exists.
    pub async fn resolve(&self, token: &str, now: DateTime<Utc>) -> IdentityResult<Option<User>> {
        if !is_well_formed(token) {
            return Ok(None);
        }

        let session = match self.store.find_session(&hash_session_token(token)).await? {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired(now) {
            return Ok(None);
        }

        Ok(self.store.find_user_by_id(session.user_id).await?)
    }

    /// Ends one session; revoking an unknown token is not an error
    pub async fn revoke(&self, token: &str) -> IdentityResult<()> {
        if token.is_empty() {
            return Ok(());
        }

        let removed = self.store.delete_session(&hash_session_token(token)).await?;
        if removed {
            tracing::debug!("Session revoked");
        }
        Ok(())
    }

    /// Ends every session of a user, optionally sparing the caller's own
    pub async fn revoke_all(&self, user_id: Uuid, except_token: Option<&str>) -> IdentityResult<u64> {
        let keep = except_token.map(hash_session_token);
        let removed = self
            .store
            .delete_user_sessions(user_id, keep.as_deref())
            .await?;

        tracing::info!(user_id = %user_id, removed, "Sessions revoked");
        Ok(removed)
    }
}

/// Where a request's session token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    Cookie,
    Bearer,
}

/// One way of finding a session on a request
#[async_trait]
pub trait SessionResolver: Send + Sync {
    fn source(&self) -> SessionSource;

    /// `Ok(None)` when this source carries no live session
    async fn resolve(&self, headers: &HeaderMap, now: DateTime<Utc>) -> IdentityResult<Option<Viewer>>;
}

/// Reads the session cookie
pub struct CookieSessionResolver {
    sessions: Arc<SessionManager>,
}

impl CookieSessionResolver {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl SessionResolver for CookieSessionResolver {
    fn source(&self) -> SessionSource {
        SessionSource::Cookie
    }

    async fn resolve(&self, headers: &HeaderMap, now: DateTime<Utc>) -> IdentityResult<Option<Viewer>> {
        let jar = CookieJar::from_headers(headers);
        let token = match jar.get(SESSION_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => return Ok(None),
        };

        Ok(self
            .sessions
            .resolve(&token, now)
            .await?
            .map(|user| Viewer::new(user, token, SessionSource::Cookie)))
    }
}

/// Reads `Authorization: Bearer <token>`
pub struct BearerSessionResolver {
    sessions: Arc<SessionManager>,
}

impl BearerSessionResolver {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}

/// Extracts a bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl SessionResolver for BearerSessionResolver {
    fn source(&self) -> SessionSource {
        SessionSource::Bearer
    }

    async fn resolve(&self, headers: &HeaderMap, now: DateTime<Utc>) -> IdentityResult<Option<Viewer>> {
        let token = match bearer_token(headers) {
            Some(token) => token.to_string(),
            None => return Ok(None),
        };

        Ok(self
            .sessions
            .resolve(&token, now)
            .await?
            .map(|user| Viewer::new(user, token, SessionSource::Bearer)))
    }
}

/// Ordered list of resolvers; the first hit wins and results are never merged
#[derive(Clone)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn SessionResolver>>,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Arc<dyn SessionResolver>>) -> Self {
        Self { resolvers }
    }

    /// Cookie first, then bearer header
    pub fn standard(sessions: Arc<SessionManager>) -> Self {
        Self::new(vec![
            Arc::new(CookieSessionResolver::new(sessions.clone())),
            Arc::new(BearerSessionResolver::new(sessions)),
        ])
    }

    pub fn sources(&self) -> Vec<SessionSource> {
        self.resolvers.iter().map(|r| r.source()).collect()
    }

    /// Resolves the request's identity
    ///
    /// A resolver that fails is logged and skipped, so a storage blip on one
    /// source degrades to the next source and finally to `Anonymous`.
    pub async fn resolve(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Identity {
        for resolver in &self.resolvers {
            match resolver.resolve(headers, now).await {
                Ok(Some(viewer)) => return Identity::Authenticated(viewer),
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(source = ?resolver.source(), error = %e, "Session resolver failed");
                }
            }
        }
        Identity::Anonymous
    }
}
