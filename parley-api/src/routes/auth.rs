/// Authentication endpoints
///
/// - `POST /register` - Create a credential account, mail a code
/// - `POST /login` - Email + password sign-in
/// - `GET|POST /logout` - End the session
/// - `GET /post-auth` - Send a signed-in user to their landing page
///
/// Bodies are form-encoded. Successful actions answer with `303 See Other`.

use super::{redirect, with_session};
use crate::{
    app::AppState,
    cookies::clear_auth_cookies,
    error::{ApiError, ApiResult},
    extract::{revoke_quietly, signed_out, CurrentIdentity},
};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use parley_shared::identity::{
    gate::{self, GateError},
    sessions::{bearer_token, SESSION_COOKIE},
    Destination, IdentityError,
};
use parley_shared::models::user::normalize_email;
use serde::Deserialize;
use validator::Validate;

/// Register form
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(email(message = "Please enter a valid email address."))]
    #[serde(default)]
    pub email: String,

    /// Strength is checked by the identity service
    #[serde(default)]
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters."))]
    pub name: Option<String>,
}

/// Login form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

/// `/verify?email=…`, with `&sent=1` when the email went out
fn verify_location(email: &str, delivered: bool) -> String {
    let mut location = Destination::VerifyEmail {
        email: email.to_string(),
    }
    .path();
    if delivered {
        location.push_str("&sent=1");
    }
    location
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /register
/// Content-Type: application/x-www-form-urlencoded
///
/// email=ada%40example.com&password=correct+horse&name=Ada
/// ```
///
/// # Response
///
/// `303 See Other` to `/verify?email=…&sent=1`
///
/// # Errors
///
/// - `409 Conflict`: Email already in use
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> ApiResult<Redirect> {
    form.validate()?;

    let registration = state
        .identity
        .register(&form.email, &form.password, form.name.as_deref(), Utc::now())
        .await?;

    Ok(Redirect::to(&verify_location(
        &registration.user.email,
        registration.code.delivered,
    )))
}

/// Sign in with email and password
///
/// An unverified account gets a fresh code and is sent to the verify page
/// instead of an error.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `403 Forbidden`: Account is disabled
/// - `422 Unprocessable Entity`: Missing email or password
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> ApiResult<Response> {
    let now = Utc::now();

    match state.identity.login(&form.email, &form.password, now).await {
        Ok(signed_in) => Ok(with_session(
            &state,
            jar,
            &signed_in.session,
            &signed_in.destination(),
        )),
        Err(IdentityError::EmailNotVerified) => {
            let email = normalize_email(&form.email);
            let issued = state.identity.resend_verification(&email, now).await?;
            let delivered = issued.map(|code| code.delivered).unwrap_or(false);
            Ok(Redirect::to(&verify_location(&email, delivered)).into_response())
        }
        Err(e) => Err(ApiError::from(e)),
    }
}

/// Revokes the cookie and bearer sessions and clears auth cookies
///
/// Always succeeds, even without a session.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let jar = CookieJar::from_headers(&headers);

    let cookie_token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    if let Some(token) = cookie_token {
        revoke_quietly(&state, &token).await;
    }
    if let Some(token) = bearer_token(&headers) {
        revoke_quietly(&state, token).await;
    }

    (clear_auth_cookies(jar), redirect(&Destination::SignIn)).into_response()
}

/// Dispatches on the role loaded for this request
pub async fn post_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    CurrentIdentity(identity): CurrentIdentity,
) -> Response {
    match gate::authorize(&identity) {
        Ok(destination) => redirect(&destination).into_response(),
        Err(GateError::Disabled) => {
            if let Some(viewer) = identity.viewer() {
                revoke_quietly(&state, &viewer.session_token).await;
            }
            signed_out(jar, GateError::Disabled)
        }
        Err(err) => redirect(&err.destination()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_location() {
        assert_eq!(
            verify_location("ada@example.com", true),
            "/verify?email=ada%40example.com&sent=1"
        );
        assert_eq!(
            verify_location("ada@example.com", false),
            "/verify?email=ada%40example.com"
        );
    }

    #[test]
    fn test_register_form_validation() {
        let form = RegisterForm {
            email: "not-an-email".to_string(),
            password: "correct horse".to_string(),
            name: None,
        };
        assert!(form.validate().is_err());

        let form = RegisterForm {
            email: "ada@example.com".to_string(),
            password: "correct horse".to_string(),
            name: Some("x".repeat(101)),
        };
        assert!(form.validate().is_err());

        let form = RegisterForm {
            email: "ada@example.com".to_string(),
            password: "correct horse".to_string(),
            name: Some("Ada".to_string()),
        };
        assert!(form.validate().is_ok());
    }
}
