/// Email verification endpoints
///
/// - `POST /verify` - Consume a code, mark the email verified, sign in
/// - `POST /verify/resend` - Mail a fresh code
///
/// The resend answer is the same whether or not an account exists.

use super::with_session;
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, response::Response, Form, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResendResponse {
    pub message: String,

    /// Lifetime of the new code
    pub expires_in_seconds: i64,
}

/// Verify an email address with a six-digit code
///
/// # Errors
///
/// - `400 Bad Request`: Unknown or expired code
/// - `403 Forbidden`: Account is disabled
/// - `422 Unprocessable Entity`: Missing email or code
pub async fn verify(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<VerifyForm>,
) -> ApiResult<Response> {
    if form.email.trim().is_empty() || form.code.trim().is_empty() {
        return Err(ApiError::invalid("code", "Email and code are required."));
    }

    let signed_in = state
        .identity
        .verify_email(&form.email, &form.code, Utc::now())
        .await?;

    Ok(with_session(
        &state,
        jar,
        &signed_in.session,
        &signed_in.destination(),
    ))
}

/// Resend a verification code
pub async fn resend(
    State(state): State<AppState>,
    Form(form): Form<ResendForm>,
) -> ApiResult<Json<ResendResponse>> {
    if form.email.trim().is_empty() {
        return Err(ApiError::invalid("email", "Email is required."));
    }

    state
        .identity
        .resend_verification(&form.email, Utc::now())
        .await?;

    Ok(Json(ResendResponse {
        message: "If this account still needs verification, a new code has been sent.".to_string(),
        expires_in_seconds: state.identity.config().code_ttl.num_seconds(),
    }))
}
