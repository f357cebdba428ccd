/// Current user and settings
///
/// - `GET /api/me` - the viewer, or 401
/// - `POST /settings/profile` - set the display name, directly or from first and last name
/// - `POST /settings/password` - change password, keeping only this session

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{revoke_quietly, ActiveViewer, CurrentIdentity},
};
use axum::{extract::State, Form, Json};
use parley_shared::identity::{
    gate::{self, GateError},
    sessions::SessionSource,
    IdentityError,
};
use parley_shared::models::user::User;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,

    /// How this request was authenticated
    pub source: SessionSource,

    /// Linked sign-in providers
    pub providers: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileForm {
    #[validate(length(max = 100, message = "Name must be at most 100 characters."))]
    pub name: Option<String>,

    #[validate(length(max = 50, message = "First name must be at most 50 characters."))]
    pub first_name: Option<String>,

    #[validate(length(max = 50, message = "Last name must be at most 50 characters."))]
    pub last_name: Option<String>,
}

impl ProfileForm {
    /// `name` when given, otherwise first and last name joined by a space
    pub fn display_name(&self) -> Option<String> {
        let part = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        part(&self.name).or_else(|| {
            let joined = [part(&self.first_name), part(&self.last_name)]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            (!joined.is_empty()).then_some(joined)
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub current_password: String,

    #[serde(default)]
    pub new_password: String,

    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct AccountUpdated {
    pub message: String,
    pub user: User,
}

/// The signed-in user
///
/// # Errors
///
/// - `401 Unauthorized`: No live session
/// - `403 Forbidden`: Account is disabled; the session is revoked
pub async fn me(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> ApiResult<Json<MeResponse>> {
    let viewer = match gate::require_viewer(&identity) {
        Ok(viewer) => viewer,
        Err(GateError::Disabled) => {
            if let Some(viewer) = identity.viewer() {
                revoke_quietly(&state, &viewer.session_token).await;
            }
            return Err(IdentityError::AccountDisabled.into());
        }
        Err(err) => return Err(IdentityError::from(err).into()),
    };

    let providers = state
        .identity
        .store()
        .list_provider_accounts(viewer.user.id)
        .await
        .map_err(IdentityError::from)?
        .into_iter()
        .map(|account| account.provider)
        .collect();

    Ok(Json(MeResponse {
        user: viewer.user.clone(),
        source: viewer.source,
        providers,
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    ActiveViewer(viewer): ActiveViewer,
    Form(form): Form<ProfileForm>,
) -> ApiResult<Json<AccountUpdated>> {
    form.validate()?;

    let user = state
        .identity
        .update_profile(viewer.user.id, form.display_name().as_deref())
        .await?;

    Ok(Json(AccountUpdated {
        message: "Profile updated successfully".to_string(),
        user,
    }))
}

/// Change password
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Missing fields, no password set, wrong
///   current password, mismatch, or weak password
pub async fn change_password(
    State(state): State<AppState>,
    ActiveViewer(viewer): ActiveViewer,
    Form(form): Form<PasswordForm>,
) -> ApiResult<Json<AccountUpdated>> {
    let fields = [&form.current_password, &form.new_password, &form.confirm_password];
    if fields.iter().any(|f| f.is_empty()) {
        return Err(ApiError::invalid("form", "All fields are required."));
    }

    let user = state
        .identity
        .change_password(
            &viewer,
            &form.current_password,
            &form.new_password,
            &form.confirm_password,
        )
        .await?;

    Ok(Json(AccountUpdated {
        message: "Password updated successfully".to_string(),
        user,
    }))
}
