/// Storage collaborator for the identity engine
///
/// Every multi-step mutation is a single method so an implementation can make
/// it atomic. Uniqueness is enforced by the store and surfaces as
/// [`StoreError::Duplicate`]; the engine turns that into a domain outcome
/// instead of failing the request.
///
/// Implementations:
/// - [`PgIdentityStore`](super::postgres::PgIdentityStore): PostgreSQL via sqlx
/// - [`MemoryIdentityStore`](super::memory::MemoryIdentityStore): in-process, for tests and demos

use crate::models::{
    provider_account::{NewProviderAccount, ProviderAccount, ProviderLink},
    session::Session,
    user::{NewUser, UpdateUser, User},
    verification_code::{NewVerificationCode, VerificationCode},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Duplicate key violates {constraint}")]
    Duplicate { constraint: String },

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate {
                    constraint: db_err.constraint().unwrap_or("unique").to_string(),
                };
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Connectivity check
    async fn ping(&self) -> StoreResult<()>;

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Case-insensitive lookup
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Inserts a user; `Duplicate` when the email is taken
    async fn create_user(&self, data: NewUser) -> StoreResult<User>;

    /// Inserts a user and its first provider account in one transaction
    async fn create_user_with_account(
        &self,
        user: NewUser,
        link: ProviderLink,
    ) -> StoreResult<(User, ProviderAccount)>;

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> StoreResult<Option<User>>;

    /// Updates a user and deletes their sessions in one transaction
    ///
    /// The session whose hash equals `keep_session_hash` survives.
    async fn update_user_revoking_sessions(
        &self,
        id: Uuid,
        data: UpdateUser,
        keep_session_hash: Option<&str>,
    ) -> StoreResult<Option<User>>;

    /// Newest first
    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>>;

    async fn find_provider_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<ProviderAccount>>;

    /// Inserts a link; `Duplicate` when the external identity is already linked
    async fn link_provider_account(&self, data: NewProviderAccount) -> StoreResult<ProviderAccount>;

    /// Links a provider account to a user whose email was never verified
    ///
    /// One transaction: inserts the link, stamps `email_verified_at`, clears
    /// the password hash, and deletes the user's sessions and pending codes.
    /// Only the provider sign-in keeps access afterwards. `Duplicate` when
    /// the external identity is already linked.
    async fn link_provider_account_claiming(
        &self,
        data: NewProviderAccount,
        verified_at: DateTime<Utc>,
    ) -> StoreResult<(ProviderAccount, User)>;

    async fn list_provider_accounts(&self, user_id: Uuid) -> StoreResult<Vec<ProviderAccount>>;

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session>;

    /// Returns the record even when expired; callers decide liveness
    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>>;

    /// Returns whether a record was removed
    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool>;

    async fn delete_user_sessions(
        &self,
        user_id: Uuid,
        keep_session_hash: Option<&str>,
    ) -> StoreResult<u64>;

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Deletes prior codes for the identifier and inserts the new one atomically
    async fn replace_verification_code(
        &self,
        data: NewVerificationCode,
    ) -> StoreResult<VerificationCode>;

    async fn find_verification_code(
        &self,
        identifier: &str,
        code: &str,
    ) -> StoreResult<Option<VerificationCode>>;

    /// Removes and returns a matching code; at most one caller receives it
    async fn take_verification_code(
        &self,
        identifier: &str,
        code: &str,
    ) -> StoreResult<Option<VerificationCode>>;

    async fn delete_verification_codes(&self, identifier: &str) -> StoreResult<u64>;

    /// Counts a wrong guess against the identifier's outstanding code
    ///
    /// Deletes the code once `max_attempts` guesses have failed and returns
    /// whether it did. Issuing a new code starts the count again.
    async fn record_failed_code_attempt(&self, identifier: &str, max_attempts: u32) -> StoreResult<bool>;

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}
