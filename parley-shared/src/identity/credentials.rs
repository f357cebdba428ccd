/// Credential verifier
///
/// Checks an email and password against the stored Argon2id hash. An unknown
/// email, an account without a password and a wrong password all produce the
/// same [`IdentityError::InvalidCredentials`].
///
/// Checks run in a fixed order: account with a password, then disabled, then
/// email verification (when required), then the password itself. A disabled or
/// unverified account is reported before the password is compared.

use super::error::{IdentityError, IdentityResult};
use super::store::IdentityStore;
use crate::auth::password::verify_password;
use crate::models::user::{normalize_email, User};
use std::sync::Arc;

pub struct CredentialVerifier {
    store: Arc<dyn IdentityStore>,
    require_verified_email: bool,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn IdentityStore>, require_verified_email: bool) -> Self {
        Self {
            store,
            require_verified_email,
        }
    }

    /// Returns the matching user; never mutates anything
    pub async fn verify(&self, email: &str, password: &str) -> IdentityResult<User> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(IdentityError::Validation(
                "Email and password are required.".to_string(),
            ));
        }

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => return Err(IdentityError::InvalidCredentials),
        };

        let hash = match user.password_hash.as_deref() {
            Some(hash) => hash,
            None => return Err(IdentityError::InvalidCredentials),
        };

        if user.disabled {
            return Err(IdentityError::AccountDisabled);
        }

        if self.require_verified_email && !user.is_email_verified() {
            return Err(IdentityError::EmailNotVerified);
        }

        if !verify_password(password, hash)? {
            tracing::debug!(user_id = %user.id, "Password mismatch");
            return Err(IdentityError::InvalidCredentials);
        }

        Ok(user)
    }
}
