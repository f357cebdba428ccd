/// Verification-code manager
///
/// Issues six-digit codes bound to an email address. Issuing replaces any
/// outstanding code for the address, so only the latest one works. Codes are
/// single use: `consume` removes the record atomically. A code is discarded
/// after too many wrong guesses, after which only a fresh code works.
///
/// The same codes back email verification and password reset; the purpose
/// only changes the wording of the email.

use super::config::DEFAULT_MAX_CODE_ATTEMPTS;
use super::error::{IdentityError, IdentityResult};
use super::store::IdentityStore;
use crate::mail::CodeMailer;
use crate::models::user::normalize_email;
use crate::models::verification_code::NewVerificationCode;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Why a code was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePurpose {
    VerifyEmail,
    ResetPassword,
}

/// A code that has been stored (and handed to the mailer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCode {
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    /// False when the mailer reported a failure; the code is valid regardless
    pub delivered: bool,
}

/// Uniformly random code in `100000..=999999`
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000u32).to_string()
}

fn is_code_shaped(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

pub struct CodeManager {
    store: Arc<dyn IdentityStore>,
    mailer: Arc<dyn CodeMailer>,
    ttl: Duration,
    max_attempts: u32,
}

impl CodeManager {
    pub fn new(store: Arc<dyn IdentityStore>, mailer: Arc<dyn CodeMailer>, ttl: Duration) -> Self {
        Self {
            store,
            mailer,
            ttl,
            max_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores a fresh code for `email`, replacing older ones, and mails it
    ///
    /// # Errors
    ///
    /// Only storage failures are errors. A mail failure is logged and reported
    /// through [`IssuedCode::delivered`].
    pub async fn issue(
        &self,
        email: &str,
        purpose: CodePurpose,
        now: DateTime<Utc>,
    ) -> IdentityResult<IssuedCode> {
        let email = normalize_email(email);
        let code = generate_code();
        let expires_at = now + self.ttl;

        self.store
            .replace_verification_code(NewVerificationCode {
                identifier: email.clone(),
                code: code.clone(),
                expires_at,
            })
            .await?;

        let delivered = match self.mailer.send_code(&email, &code, purpose).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(email = %email, purpose = ?purpose, error = %e, "Failed to send verification code");
                false
            }
        };

        tracing::info!(email = %email, purpose = ?purpose, expires_at = %expires_at, "Verification code issued");

        Ok(IssuedCode {
            email,
            code,
            expires_at,
            delivered,
        })
    }

    /// Validates a code without using it up
    pub async fn check(&self, email: &str, code: &str, now: DateTime<Utc>) -> IdentityResult<()> {
        let email = normalize_email(email);
        let code = code.trim();
        if !is_code_shaped(code) {
            return Err(IdentityError::CodeNotFound);
        }

        match self.store.find_verification_code(&email, code).await? {
            None => {
                if self.store.record_failed_code_attempt(&email, self.max_attempts).await? {
                    tracing::warn!(email = %email, attempts = self.max_attempts, "Too many wrong codes, outstanding code discarded");
                }
                Err(IdentityError::CodeNotFound)
            }
            Some(record) if record.is_expired(now) => Err(IdentityError::CodeExpired),
            Some(_) => Ok(()),
        }
    }

    /// Validates and deletes a code
    ///
    /// # Errors
    ///
    /// - `CodeNotFound` when no record matches (including one already consumed)
    /// - `CodeExpired` when the record exists but its expiry has passed
    pub async fn consume(&self, email: &str, code: &str, now: DateTime<Utc>) -> IdentityResult<()> {
        self.check(email, code, now).await?;

        let email = normalize_email(email);
        match self.store.take_verification_code(&email, code.trim()).await? {
            // Lost a race with another consumer
            None => Err(IdentityError::CodeNotFound),
            Some(_) => Ok(()),
        }
    }

    /// Drops every outstanding code for `email`
    pub async fn clear(&self, email: &str) -> IdentityResult<()> {
        self.store
            .delete_verification_codes(&normalize_email(email))
            .await?;
        Ok(())
    }
}
