/// Forgot-password endpoints
///
/// Three steps, each answering with the next step to show:
///
/// 1. `POST /forgot-password/request` - mail a reset code, `{"step": "verify"}`
/// 2. `POST /forgot-password/verify` - check the code without consuming it, `{"step": "reset"}`
/// 3. `POST /forgot-password/reset` - consume the code, set the password, sign in
///
/// Step 1 answers identically for unknown emails.

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
pub struct RequestResetForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckCodeForm {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetForm {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetStep {
    Verify,
    Reset,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StepResponse {
    pub step: ResetStep,
    pub message: String,
}

pub async fn request_reset(
    State(state): State<AppState>,
    Form(form): Form<RequestResetForm>,
) -> ApiResult<Json<StepResponse>> {
    state
        .identity
        .request_password_reset(&form.email, Utc::now())
        .await?;

    Ok(Json(StepResponse {
        step: ResetStep::Verify,
        message: "If an account exists for that email, a reset code has been sent.".to_string(),
    }))
}

pub async fn verify_reset_code(
    State(state): State<AppState>,
    Form(form): Form<CheckCodeForm>,
) -> ApiResult<Json<StepResponse>> {
    if form.email.trim().is_empty() || form.code.trim().is_empty() {
        return Err(ApiError::invalid("code", "Email and code are required."));
    }

    state
        .identity
        .check_reset_code(&form.email, &form.code, Utc::now())
        .await?;

    Ok(Json(StepResponse {
        step: ResetStep::Reset,
        message: "Code verified. Choose a new password.".to_string(),
    }))
}

/// Set a new password
///
/// Every other session of the user is revoked.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown or expired code
/// - `403 Forbidden`: Account is disabled
/// - `422 Unprocessable Entity`: Missing fields, mismatch, or weak password
pub async fn reset(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ResetForm>,
) -> ApiResult<Response> {
    let fields = [&form.email, &form.code, &form.password, &form.confirm_password];
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(ApiError::invalid("form", "All fields are required."));
    }

    let signed_in = state
        .identity
        .reset_password(
            &form.email,
            &form.code,
            &form.password,
            &form.confirm_password,
            Utc::now(),
        )
        .await?;

    Ok(with_session(
        &state,
        jar,
        &signed_in.session,
        &signed_in.destination(),
    ))
}
