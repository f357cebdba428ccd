/// PostgreSQL implementation of [`IdentityStore`]

use super::store::{IdentityStore, StoreError, StoreResult};
use crate::models::{
    provider_account::{NewProviderAccount, ProviderAccount, ProviderLink},
    session::Session,
    user::{NewUser, UpdateUser, User},
    verification_code::{NewVerificationCode, VerificationCode},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Identity store backed by a sqlx connection pool
#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn ping(&self) -> StoreResult<()> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn create_user(&self, data: NewUser) -> StoreResult<User> {
        Ok(User::create(&self.pool, data).await?)
    }

    async fn create_user_with_account(
        &self,
        user: NewUser,
        link: ProviderLink,
    ) -> StoreResult<(User, ProviderAccount)> {
        let mut tx = self.pool.begin().await?;

        let user = User::create(&mut *tx, user).await?;
        let account = ProviderAccount::create(&mut *tx, link.for_user(user.id)).await?;

        tx.commit().await?;
        Ok((user, account))
    }

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> StoreResult<Option<User>> {
        Ok(User::update(&self.pool, id, data).await?)
    }

    async fn update_user_revoking_sessions(
        &self,
        id: Uuid,
        data: UpdateUser,
        keep_session_hash: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let user = User::update(&mut *tx, id, data).await?;
        if user.is_some() {
            Session::delete_for_user(&mut *tx, id, keep_session_hash).await?;
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        Ok(User::list(&self.pool, limit, offset).await?)
    }

    async fn find_provider_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<ProviderAccount>> {
        Ok(ProviderAccount::find(&self.pool, provider, provider_account_id).await?)
    }

    async fn link_provider_account(&self, data: NewProviderAccount) -> StoreResult<ProviderAccount> {
        Ok(ProviderAccount::create(&self.pool, data).await?)
    }

    async fn link_provider_account_claiming(
        &self,
        data: NewProviderAccount,
        verified_at: DateTime<Utc>,
    ) -> StoreResult<(ProviderAccount, User)> {
        let user_id = data.user_id;
        let mut tx = self.pool.begin().await?;

        let account = ProviderAccount::create(&mut *tx, data).await?;
        let claim = UpdateUser {
            password_hash: Some(None),
            email_verified_at: Some(Some(verified_at)),
            ..Default::default()
        };
        let user = User::update(&mut *tx, user_id, claim)
            .await?
            .ok_or_else(|| StoreError::Unavailable(format!("user {} vanished while linking", user_id)))?;
        Session::delete_for_user(&mut *tx, user_id, None).await?;
        VerificationCode::delete_for_identifier(&mut *tx, &user.email).await?;

        tx.commit().await?;
        Ok((account, user))
    }

    async fn list_provider_accounts(&self, user_id: Uuid) -> StoreResult<Vec<ProviderAccount>> {
        Ok(ProviderAccount::list_for_user(&self.pool, user_id).await?)
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session> {
        Ok(Session::create(&self.pool, token_hash, user_id, expires_at).await?)
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        Ok(Session::find(&self.pool, token_hash).await?)
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool> {
        Ok(Session::delete(&self.pool, token_hash).await?)
    }

    async fn delete_user_sessions(
        &self,
        user_id: Uuid,
        keep_session_hash: Option<&str>,
    ) -> StoreResult<u64> {
        Ok(Session::delete_for_user(&self.pool, user_id, keep_session_hash).await?)
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        Ok(Session::delete_expired(&self.pool, now).await?)
    }

    async fn replace_verification_code(
        &self,
        data: NewVerificationCode,
    ) -> StoreResult<VerificationCode> {
        let mut tx = self.pool.begin().await?;
        let code = VerificationCode::replace(&mut tx, data).await?;
        tx.commit().await?;
        Ok(code)
    }

    async fn find_verification_code(
        &self,
        identifier: &str,
        code: &str,
    ) -> StoreResult<Option<VerificationCode>> {
        Ok(VerificationCode::find(&self.pool, identifier, code).await?)
    }

    async fn take_verification_code(
        &self,
        identifier: &str,
        code: &str,
    ) -> StoreResult<Option<VerificationCode>> {
        Ok(VerificationCode::take(&self.pool, identifier, code).await?)
    }

    async fn delete_verification_codes(&self, identifier: &str) -> StoreResult<u64> {
        Ok(VerificationCode::delete_for_identifier(&self.pool, identifier).await?)
    }

    async fn record_failed_code_attempt(&self, identifier: &str, max_attempts: u32) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let discarded = VerificationCode::record_failed_attempt(&mut tx, identifier, max_attempts as i32).await?;
        tx.commit().await?;
        Ok(discarded)
    }

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        Ok(VerificationCode::delete_expired(&self.pool, now).await?)
    }
}
