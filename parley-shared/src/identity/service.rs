/// Identity service
///
/// Composes the verifier, code manager, session manager, linker and gate into
/// the end-to-end flows the HTTP layer calls. Each flow takes `now` explicitly
/// so expiry behaviour is deterministic under test.

use super::codes::{CodeManager, CodePurpose, IssuedCode};
use super::config::IdentityConfig;
use super::credentials::CredentialVerifier;
use super::error::{IdentityError, IdentityResult};
use super::gate::{ensure_admin, guard_user_mutation, parse_role, Destination, Viewer};
use super::linker::{new_user_from, profile_update, AccountLinker, LinkDecision, ProviderIdentity, VerifiedEmailSource};
use super::sessions::{IssuedSession, SessionManager};
use super::store::{IdentityStore, StoreError};
use crate::auth::password::{hash_password, validate_password, verify_password};
use crate::auth::token::hash_session_token;
use crate::mail::CodeMailer;
use crate::models::user::{normalize_email, NewUser, UpdateUser, User};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;
use validator::ValidateEmail;

/// Longest display name accepted
pub const MAX_NAME_LENGTH: usize = 100;

/// A user with a brand new session
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub session: IssuedSession,
}

impl SignedIn {
    pub fn destination(&self) -> Destination {
        Destination::for_role(self.user.role)
    }
}

/// Result of a provider sign-in
#[derive(Debug, Clone)]
pub struct ProviderSignIn {
    pub signed_in: SignedIn,
    /// True when this sign-in created the user
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub code: IssuedCode,
}

impl Registration {
    pub fn destination(&self) -> Destination {
        Destination::VerifyEmail {
            email: self.user.email.clone(),
        }
    }
}

pub struct IdentityService {
    store: Arc<dyn IdentityStore>,
    config: IdentityConfig,
    credentials: CredentialVerifier,
    codes: CodeManager,
    sessions: Arc<SessionManager>,
    linker: AccountLinker,
}

fn validate_email(raw: &str) -> IdentityResult<String> {
    let email = normalize_email(raw);
    if email.is_empty() || !email.validate_email() {
        return Err(IdentityError::Validation(
            "Please enter a valid email address.".to_string(),
        ));
    }
    Ok(email)
}

fn validate_new_password(password: &str, confirm: Option<&str>) -> IdentityResult<()> {
    if let Some(confirm) = confirm {
        if password != confirm {
            return Err(IdentityError::Validation("Passwords do not match.".to_string()));
        }
    }
    validate_password(password).map_err(IdentityError::Validation)
}

fn clean_name(raw: Option<&str>) -> IdentityResult<Option<String>> {
    let name = raw.map(str::trim).filter(|n| !n.is_empty());
    match name {
        Some(n) if n.chars().count() > MAX_NAME_LENGTH => Err(IdentityError::Validation(format!(
            "Name must be at most {} characters.",
            MAX_NAME_LENGTH
        ))),
        other => Ok(other.map(str::to_string)),
    }
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        mailer: Arc<dyn CodeMailer>,
        emails: Arc<dyn VerifiedEmailSource>,
        config: IdentityConfig,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(store.clone(), config.session_ttl));
        Self {
            credentials: CredentialVerifier::new(store.clone(), config.require_verified_email),
            codes: CodeManager::new(store.clone(), mailer, config.code_ttl)
                .with_max_attempts(config.max_code_attempts),
            linker: AccountLinker::new(store.clone(), emails),
            sessions,
            store,
            config,
        }
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        self.sessions.clone()
    }

    pub fn codes(&self) -> &CodeManager {
        &self.codes
    }

    pub fn store(&self) -> Arc<dyn IdentityStore> {
        self.store.clone()
    }

    async fn start_session(&self, user: User, now: DateTime<Utc>) -> IdentityResult<SignedIn> {
        let session = self.sessions.create(user.id, now).await?;
        Ok(SignedIn { user, session })
    }

    /// Creates an unverified credential account and mails a verification code
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
        now: DateTime<Utc>,
    ) -> IdentityResult<Registration> {
        let email = validate_email(email)?;
        validate_new_password(password, None)?;
        let name = clean_name(name)?;

        let password_hash = hash_password(password)?;
        let user = match self
            .store
            .create_user(NewUser {
                email: email.clone(),
                name,
                password_hash: Some(password_hash),
                ..Default::default()
            })
            .await
        {
            Ok(user) => user,
            Err(StoreError::Duplicate { .. }) => return Err(IdentityError::DuplicateEmail),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = %user.id, "User registered");

        let code = self.codes.issue(&email, CodePurpose::VerifyEmail, now).await?;
        Ok(Registration { user, code })
    }

    /// Credential sign-in
    ///
    /// `EmailNotVerified` is returned as an error; the caller decides whether
    /// to send a fresh code.
    pub async fn login(&self, email: &str, password: &str, now: DateTime<Utc>) -> IdentityResult<SignedIn> {
        let user = self.credentials.verify(email, password).await?;
        tracing::info!(user_id = %user.id, "Credential sign-in");
        self.start_session(user, now).await
    }

    /// Consumes a verification code, marks the email verified and signs in
    pub async fn verify_email(&self, email: &str, code: &str, now: DateTime<Utc>) -> IdentityResult<SignedIn> {
        let email = normalize_email(email);
        self.codes.consume(&email, code, now).await?;

        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| IdentityError::NotFound("User".to_string()))?;

        if user.disabled {
            return Err(IdentityError::AccountDisabled);
        }

        let user = if user.is_email_verified() {
            user
        } else {
            self.store
                .update_user(
                    user.id,
                    UpdateUser {
                        email_verified_at: Some(Some(now)),
                        ..Default::default()
                    },
                )
                .await?
                .ok_or_else(|| IdentityError::NotFound("User".to_string()))?
        };

        tracing::info!(user_id = %user.id, "Email verified");
        self.start_session(user, now).await
    }

    /// Sends a new code to an existing, unverified account
    ///
    /// `None` when nothing was sent; callers respond the same either way.
    pub async fn resend_verification(&self, email: &str, now: DateTime<Utc>) -> IdentityResult<Option<IssuedCode>> {
        let email = normalize_email(email);
        match self.store.find_user_by_email(&email).await? {
            Some(user) if !user.is_email_verified() && !user.disabled => Ok(Some(
                self.codes.issue(&email, CodePurpose::VerifyEmail, now).await?,
            )),
            _ => Ok(None),
        }
    }

    /// Sends a reset code when the account exists
    pub async fn request_password_reset(&self, email: &str, now: DateTime<Utc>) -> IdentityResult<Option<IssuedCode>> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(IdentityError::Validation("Email is required.".to_string()));
        }

        match self.store.find_user_by_email(&email).await? {
            Some(_) => Ok(Some(
                self.codes.issue(&email, CodePurpose::ResetPassword, now).await?,
            )),
            None => {
                tracing::debug!("Password reset requested for unknown email");
                Ok(None)
            }
        }
    }

    /// Checks a reset code without consuming it
    pub async fn check_reset_code(&self, email: &str, code: &str, now: DateTime<Utc>) -> IdentityResult<()> {
        self.codes.check(email, code, now).await
    }

    /// Sets a new password from a reset code
    ///
    /// Every existing session of the user is revoked and a new one is started.
    /// Completing a reset also proves control of the email address.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        password: &str,
        confirm: &str,
        now: DateTime<Utc>,
    ) -> IdentityResult<SignedIn> {
        validate_new_password(password, Some(confirm))?;

        let email = normalize_email(email);
        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(IdentityError::CodeNotFound)?;

        if user.disabled {
            return Err(IdentityError::AccountDisabled);
        }

        self.codes.consume(&email, code, now).await?;

        let password_hash = hash_password(password)?;
        let update = UpdateUser {
            password_hash: Some(Some(password_hash)),
            email_verified_at: (!user.is_email_verified()).then_some(Some(now)),
            ..Default::default()
        };

        let user = self
            .store
            .update_user_revoking_sessions(user.id, update, None)
            .await?
            .ok_or_else(|| IdentityError::NotFound("User".to_string()))?;

        tracing::info!(user_id = %user.id, "Password reset");
        self.start_session(user, now).await
    }

    /// Changes the viewer's password, keeping only their current session
    pub async fn change_password(
        &self,
        viewer: &Viewer,
        current: &str,
        next: &str,
        confirm: &str,
    ) -> IdentityResult<User> {
        let hash = viewer
            .user
            .password_hash
            .as_deref()
            .ok_or_else(|| IdentityError::Validation("No password set.".to_string()))?;

        if !verify_password(current, hash)? {
            return Err(IdentityError::Validation(
                "Current password is incorrect.".to_string(),
            ));
        }

        validate_new_password(next, Some(confirm))?;

        let keep = hash_session_token(&viewer.session_token);
        let user = self
            .store
            .update_user_revoking_sessions(
                viewer.user.id,
                UpdateUser {
                    password_hash: Some(Some(hash_password(next)?)),
                    ..Default::default()
                },
                Some(&keep),
            )
            .await?
            .ok_or_else(|| IdentityError::NotFound("User".to_string()))?;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(user)
    }

    /// Sets or clears the display name
    pub async fn update_profile(&self, user_id: Uuid, name: Option<&str>) -> IdentityResult<User> {
        let name = clean_name(name)?;
        self.store
            .update_user(
                user_id,
                UpdateUser {
                    name: Some(name),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| IdentityError::NotFound("User".to_string()))
    }

    /// OAuth sign-in: reconcile, persist, sync profile, start a session
    pub async fn sign_in_with_provider(
        &self,
        identity: &ProviderIdentity,
        now: DateTime<Utc>,
    ) -> IdentityResult<ProviderSignIn> {
        let (user, created) = match self.linker.reconcile(identity, now).await? {
            LinkDecision::ExistingAccountLogin(user) => (self.sync_profile(user, identity).await, false),
            LinkDecision::LinkToExistingUser(user) => (self.sync_profile(user, identity).await, false),
            LinkDecision::CreateNewUser { email } => {
                let new_user = new_user_from(identity, &email, now);
                match self.store.create_user_with_account(new_user, identity.link()).await {
                    Ok((user, _)) => {
                        tracing::info!(user_id = %user.id, provider = %identity.provider, "User created from provider sign-in");
                        (user, true)
                    }
                    Err(StoreError::Duplicate { constraint }) => {
                        tracing::warn!(provider = %identity.provider, constraint = %constraint, "Provider sign-in lost a creation race");
                        return Err(IdentityError::LinkConflict);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            LinkDecision::RejectUnverifiedEmail => return Err(IdentityError::UnverifiedProviderEmail),
            LinkDecision::RejectLinkConflict => return Err(IdentityError::LinkConflict),
        };

        if user.disabled {
            return Err(IdentityError::AccountDisabled);
        }

        let signed_in = self.start_session(user, now).await?;
        Ok(ProviderSignIn { signed_in, created })
    }

    /// Best-effort profile sync; failures keep the stored user
    async fn sync_profile(&self, user: User, identity: &ProviderIdentity) -> User {
        let update = profile_update(&user, identity);
        if update.is_empty() {
            return user;
        }

        match self.store.update_user(user.id, update).await {
            Ok(Some(updated)) => updated,
            Ok(None) => user,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Profile sync failed");
                user
            }
        }
    }

    /// Ends a session; unknown tokens are ignored
    pub async fn sign_out(&self, token: &str) -> IdentityResult<()> {
        self.sessions.revoke(token).await
    }

    pub async fn list_users(&self, actor: &User, limit: i64, offset: i64) -> IdentityResult<Vec<User>> {
        ensure_admin(actor)?;
        Ok(self.store.list_users(limit, offset).await?)
    }

    /// Assigns a role to another user
    pub async fn change_role(&self, actor: &User, target_id: Uuid, role: &str) -> IdentityResult<User> {
        guard_user_mutation(actor, target_id)?;
        let role = parse_role(role)?;

        let user = self
            .store
            .update_user(
                target_id,
                UpdateUser {
                    role: Some(role),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| IdentityError::NotFound("User".to_string()))?;

        tracing::info!(actor_id = %actor.id, target_id = %target_id, role = %role, "Role changed");
        Ok(user)
    }

    /// Flips another user's disabled flag; disabling revokes their sessions
    pub async fn toggle_disabled(&self, actor: &User, target_id: Uuid) -> IdentityResult<User> {
        guard_user_mutation(actor, target_id)?;

        let target = self
            .store
            .find_user_by_id(target_id)
            .await?
            .ok_or_else(|| IdentityError::NotFound("User".to_string()))?;

        let disable = !target.disabled;
        let update = UpdateUser {
            disabled: Some(disable),
            ..Default::default()
        };

        let user = if disable {
            self.store.update_user_revoking_sessions(target_id, update, None).await?
        } else {
            self.store.update_user(target_id, update).await?
        }
        .ok_or_else(|| IdentityError::NotFound("User".to_string()))?;

        tracing::info!(actor_id = %actor.id, target_id = %target_id, disabled = disable, "Account status changed");
        Ok(user)
    }
}
