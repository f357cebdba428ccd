/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Register, login, logout, post-auth dispatch
/// - `verify`: Email verification codes
/// - `password`: Forgot-password flow
/// - `oauth`: Google and GitHub sign-in
/// - `landing`: Role landing pages
/// - `account`: Current user and settings
/// - `admin`: User management
///
/// Browser actions answer with 303 redirects rendered from a
/// [`Destination`]; API-style endpoints answer with JSON.

pub mod account;
pub mod admin;
pub mod auth;
pub mod health;
pub mod landing;
pub mod oauth;
pub mod password;
pub mod verify;

use crate::{app::AppState, cookies::session_cookie};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use parley_shared::identity::{sessions::IssuedSession, Destination};

pub(crate) fn redirect(destination: &Destination) -> Redirect {
    Redirect::to(&destination.path())
}

/// Sets the session cookie and redirects
pub(crate) fn with_session(
    state: &AppState,
    jar: CookieJar,
    session: &IssuedSession,
    destination: &Destination,
) -> Response {
    let jar = jar.add(session_cookie(
        &session.token,
        session.expires_at,
        state.secure_cookies(),
    ));
    (jar, redirect(destination)).into_response()
}
