/// Request extractors for the identity of the caller
///
/// - [`CurrentIdentity`]: whatever the resolver chain found, never rejects
/// - [`ActiveViewer`]: an enabled, signed-in user; otherwise a redirect to
///   the sign-in page
///
/// A disabled user's session is revoked and its cookies cleared on the way
/// out, so the next request arrives anonymous.

use crate::{app::AppState, cookies::clear_auth_cookies};
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use parley_shared::identity::{
    gate::{self, GateError},
    Identity, Viewer,
};
use std::convert::Infallible;

/// Identity resolved from the request's cookie or bearer token
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = state.resolvers.resolve(&parts.headers, Utc::now()).await;
        Ok(CurrentIdentity(identity))
    }
}

/// Signed-in, enabled user
#[derive(Debug, Clone)]
pub struct ActiveViewer(pub Viewer);

#[axum::async_trait]
impl FromRequestParts<AppState> for ActiveViewer {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentIdentity(identity) = match CurrentIdentity::from_request_parts(parts, state).await {
            Ok(identity) => identity,
            Err(never) => match never {},
        };

        match gate::require_viewer(&identity) {
            Ok(viewer) => Ok(ActiveViewer(viewer.clone())),
            Err(GateError::Disabled) => {
                if let Some(viewer) = identity.viewer() {
                    tracing::info!(user_id = %viewer.user.id, "Disabled user signed out");
                    revoke_quietly(state, &viewer.session_token).await;
                }
                let jar = CookieJar::from_headers(&parts.headers);
                Err(signed_out(jar, GateError::Disabled))
            }
            Err(err) => Err(Redirect::to(&err.destination().path()).into_response()),
        }
    }
}

/// Revokes a session, logging instead of failing
pub async fn revoke_quietly(state: &AppState, token: &str) {
    if let Err(e) = state.identity.sign_out(token).await {
        tracing::warn!(error = %e, "Failed to revoke session");
    }
}

/// Clears auth cookies and redirects to where the gate error points
pub fn signed_out(jar: CookieJar, err: GateError) -> Response {
    (clear_auth_cookies(jar), Redirect::to(&err.destination().path())).into_response()
}
