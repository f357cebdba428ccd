/// User management
///
/// - `GET /admin/users?limit=&offset=` - list users
/// - `POST /admin/users/role` - `user_id`, `role`
/// - `POST /admin/users/status` - `user_id`; toggles disabled
///
/// The actor is the user loaded for this request, so a demoted or disabled
/// admin loses access immediately. Nobody can change their own role or
/// status.

use crate::{app::AppState, error::ApiResult, extract::ActiveViewer};
use axum::{
    extract::{Query, State},
    Form, Json,
};
use parley_shared::models::user::User;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<User>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub user_id: Uuid,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct AdminAction {
    pub message: String,
    pub user: User,
}

/// # Errors
///
/// - `403 Forbidden`: Admin access required
pub async fn list_users(
    State(state): State<AppState>,
    ActiveViewer(viewer): ActiveViewer,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<UserList>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let users = state.identity.list_users(&viewer.user, limit, offset).await?;
    Ok(Json(UserList { users, limit, offset }))
}

/// # Errors
///
/// - `400 Bad Request`: Unknown role
/// - `403 Forbidden`: Not an admin, or targeting yourself
/// - `404 Not Found`: No such user
pub async fn change_role(
    State(state): State<AppState>,
    ActiveViewer(viewer): ActiveViewer,
    Form(form): Form<RoleForm>,
) -> ApiResult<Json<AdminAction>> {
    let user = state
        .identity
        .change_role(&viewer.user, form.user_id, &form.role)
        .await?;

    Ok(Json(AdminAction {
        message: "User role updated successfully".to_string(),
        user,
    }))
}

/// # Errors
///
/// - `403 Forbidden`: Not an admin, or targeting yourself
/// - `404 Not Found`: No such user
pub async fn toggle_status(
    State(state): State<AppState>,
    ActiveViewer(viewer): ActiveViewer,
    Form(form): Form<StatusForm>,
) -> ApiResult<Json<AdminAction>> {
    let user = state
        .identity
        .toggle_disabled(&viewer.user, form.user_id)
        .await?;

    let verb = if user.disabled { "disabled" } else { "enabled" };
    Ok(Json(AdminAction {
        message: format!("User {} successfully", verb),
        user,
    }))
}
