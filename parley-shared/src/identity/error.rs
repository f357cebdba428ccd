/// Identity error taxonomy
///
/// Display strings are user-facing; the API layer shows them as-is for every
/// variant except `Storage` and `Password`, whose details are only logged.

use crate::auth::password::PasswordError;
use crate::identity::store::StoreError;

pub type IdentityResult<T> = Result<T, IdentityError>;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Unknown email, no password set, or wrong password. Deliberately identical.
    #[error("Invalid credentials.")]
    InvalidCredentials,

    #[error("Account is disabled.")]
    AccountDisabled,

    #[error("Please verify your email address before signing in.")]
    EmailNotVerified,

    #[error("Invalid verification code. Please try again.")]
    CodeNotFound,

    #[error("Verification code has expired. Please request a new one.")]
    CodeExpired,

    #[error("This sign-in method is already linked to a different account.")]
    LinkConflict,

    #[error("The provider did not supply a verified email address.")]
    UnverifiedProviderEmail,

    #[error("Authentication required.")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found.")]
    NotFound(String),

    #[error("Email already in use.")]
    DuplicateEmail,

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("{0}")]
    Validation(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("Password operation failed: {0}")]
    Password(#[from] PasswordError),
}

impl IdentityError {
    /// True for failures the caller cannot fix by changing input
    pub fn is_internal(&self) -> bool {
        matches!(self, IdentityError::Storage(_) | IdentityError::Password(_))
    }
}
