/// Role landing pages
///
/// `/dashboard` belongs to admins and `/user` to everyone else; each sends
/// the wrong role to the other. Both render the viewer as JSON for the
/// front end.

use super::redirect;
use crate::extract::ActiveViewer;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use parley_shared::identity::{Destination, Viewer};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LandingResponse {
    pub page: &'static str,
    pub viewer: Viewer,
}

fn land(viewer: Viewer, here: Destination, page: &'static str) -> Response {
    let home = Destination::for_role(viewer.user.role);
    if home != here {
        return redirect(&home).into_response();
    }
    Json(LandingResponse { page, viewer }).into_response()
}

pub async fn dashboard(ActiveViewer(viewer): ActiveViewer) -> Response {
    land(viewer, Destination::AdminLanding, "dashboard")
}

pub async fn user_home(ActiveViewer(viewer): ActiveViewer) -> Response {
    land(viewer, Destination::UserLanding, "user")
}
