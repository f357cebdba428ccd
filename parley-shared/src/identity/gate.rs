/// Access gate
///
/// Turns a resolved [`Identity`] into an allow/deny decision and a
/// [`Destination`]. Every check reads the user loaded for the current request,
/// so disabling an account or changing a role applies on the very next
/// request.

use super::error::{IdentityError, IdentityResult};
use super::sessions::SessionSource;
use crate::models::user::{Role, User};
use serde::Serialize;
use uuid::Uuid;

/// Who is making the request
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Anonymous,
    Authenticated(Viewer),
}

impl Identity {
    pub fn viewer(&self) -> Option<&Viewer> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(viewer) => Some(viewer),
        }
    }

    pub fn into_viewer(self) -> Option<Viewer> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(viewer) => Some(viewer),
        }
    }
}

/// Signed-in user plus the session that carried them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewer {
    pub user: User,
    #[serde(skip)]
    pub session_token: String,
    pub source: SessionSource,
}

impl Viewer {
    pub fn new(user: User, session_token: String, source: SessionSource) -> Self {
        Self {
            user,
            session_token,
            source,
        }
    }
}

/// Where a request should be sent next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    SignIn,
    SignInDisabled,
    /// Sign-in page with an error code, e.g. after a failed provider sign-in
    SignInFailed { reason: String },
    AdminLanding,
    UserLanding,
    /// Re-dispatches on a freshly loaded role
    PostAuth,
    VerifyEmail { email: String },
}

impl Destination {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Destination::AdminLanding,
            Role::User => Destination::UserLanding,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Destination::SignIn => "/login".to_string(),
            Destination::SignInDisabled => "/login?error=disabled".to_string(),
            Destination::SignInFailed { reason } => {
                format!("/login?error={}", urlencoding::encode(reason))
            }
            Destination::AdminLanding => "/dashboard".to_string(),
            Destination::UserLanding => "/user".to_string(),
            Destination::PostAuth => "/post-auth".to_string(),
            Destination::VerifyEmail { email } => {
                format!("/verify?email={}", urlencoding::encode(email))
            }
        }
    }
}

/// Why the gate refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("Authentication required.")]
    Unauthenticated,

    #[error("Account is disabled.")]
    Disabled,
}

impl GateError {
    pub fn destination(&self) -> Destination {
        match self {
            GateError::Unauthenticated => Destination::SignIn,
            GateError::Disabled => Destination::SignInDisabled,
        }
    }
}

impl From<GateError> for IdentityError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Unauthenticated => IdentityError::Unauthenticated,
            GateError::Disabled => IdentityError::AccountDisabled,
        }
    }
}

/// Landing page for the identity, or the reason it has none
///
/// A `Disabled` outcome obliges the caller to revoke the session and clear
/// the session cookie.
pub fn authorize(identity: &Identity) -> Result<Destination, GateError> {
    let viewer = identity.viewer().ok_or(GateError::Unauthenticated)?;
    if viewer.user.disabled {
        return Err(GateError::Disabled);
    }
    Ok(Destination::for_role(viewer.user.role))
}

/// Enabled viewer or a gate error
pub fn require_viewer(identity: &Identity) -> Result<&Viewer, GateError> {
    let viewer = identity.viewer().ok_or(GateError::Unauthenticated)?;
    if viewer.user.disabled {
        return Err(GateError::Disabled);
    }
    Ok(viewer)
}

/// Enabled admin
pub fn require_admin(identity: &Identity) -> IdentityResult<&Viewer> {
    let viewer = require_viewer(identity)?;
    ensure_admin(&viewer.user)?;
    Ok(viewer)
}

/// Checks an already-loaded actor
pub fn ensure_admin(actor: &User) -> IdentityResult<()> {
    if actor.disabled {
        return Err(IdentityError::AccountDisabled);
    }
    if !actor.is_admin() {
        return Err(IdentityError::Forbidden("Admin access required.".to_string()));
    }
    Ok(())
}

/// An admin may modify any account except their own
pub fn guard_user_mutation(actor: &User, target_id: Uuid) -> IdentityResult<()> {
    ensure_admin(actor)?;
    if actor.id == target_id {
        return Err(IdentityError::Forbidden(
            "You cannot modify your own account.".to_string(),
        ));
    }
    Ok(())
}

/// Parses a submitted role name into the closed [`Role`] set
pub fn parse_role(raw: &str) -> IdentityResult<Role> {
    raw.parse::<Role>()
        .map_err(|e| IdentityError::InvalidRole(e.0))
}
