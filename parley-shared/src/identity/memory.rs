/// In-process identity store
///
/// Keeps everything in hash maps behind one async mutex, so every trait method
/// is atomic with respect to the others. Enforces the same uniqueness rules as
/// the PostgreSQL schema: unique normalized email, unique
/// `(provider, provider_account_id)`, unique `(identifier, code)`.
///
/// Used by the test suites and for running the API without a database.
///
/// # Example
///
/// ```
/// use parley_shared::identity::memory::MemoryIdentityStore;
/// use parley_shared::identity::store::IdentityStore;
/// use parley_shared::models::user::NewUser;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryIdentityStore::new();
/// store.create_user(NewUser::with_password("a@example.com", "hash")).await?;
/// assert!(store.create_user(NewUser::with_password("A@example.com", "hash")).await.is_err());
/// # Ok(())
/// # }
/// ```

use super::store::{IdentityStore, StoreError, StoreResult};
use crate::models::{
    provider_account::{NewProviderAccount, ProviderAccount, ProviderLink},
    session::Session,
    user::{normalize_email, NewUser, UpdateUser, User},
    verification_code::{NewVerificationCode, VerificationCode},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    accounts: HashMap<(String, String), ProviderAccount>,
    sessions: HashMap<String, Session>,
    codes: HashMap<(String, String), VerificationCode>,
    /// Failed guesses per identifier, reset on issue
    code_attempts: HashMap<String, u32>,
}

impl State {
    fn email_taken(&self, email: &str) -> bool {
        self.users.values().any(|u| u.email == email)
    }

    fn insert_user(&mut self, data: NewUser) -> StoreResult<User> {
        let email = normalize_email(&data.email);
        if self.email_taken(&email) {
            return Err(StoreError::Duplicate {
                constraint: "users_email_key".to_string(),
            });
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: data.name,
            email,
            email_verified_at: data.email_verified_at,
            image: data.image,
            password_hash: data.password_hash,
            role: data.role,
            disabled: false,
            created_at: now,
            updated_at: now,
        };

        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn insert_account(&mut self, data: NewProviderAccount) -> StoreResult<ProviderAccount> {
        let key = (data.provider.clone(), data.provider_account_id.clone());
        if self.accounts.contains_key(&key) {
            return Err(StoreError::Duplicate {
                constraint: "provider_accounts_pkey".to_string(),
            });
        }
        if !self.users.contains_key(&data.user_id) {
            return Err(StoreError::Unavailable(format!(
                "provider account references missing user {}",
                data.user_id
            )));
        }

        let account = ProviderAccount {
            provider: data.provider,
            provider_account_id: data.provider_account_id,
            user_id: data.user_id,
            access_token: data.tokens.access_token,
            refresh_token: data.tokens.refresh_token,
            id_token: data.tokens.id_token,
            token_type: data.tokens.token_type,
            scope: data.tokens.scope,
            expires_at: data.tokens.expires_at,
            created_at: Utc::now(),
        };

        self.accounts.insert(key, account.clone());
        Ok(account)
    }

    fn update_user(&mut self, id: Uuid, data: &UpdateUser) -> Option<User> {
        let user = self.users.get_mut(&id)?;
        data.apply_to(user, Utc::now());
        Some(user.clone())
    }

    fn delete_user_sessions(&mut self, user_id: Uuid, keep: Option<&str>) -> u64 {
        let before = self.sessions.len();
        self.sessions
            .retain(|hash, s| s.user_id != user_id || Some(hash.as_str()) == keep);
        (before - self.sessions.len()) as u64
    }
}

/// Hash-map backed [`IdentityStore`]
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    state: Mutex<State>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Number of stored codes for an identifier
    pub async fn code_count(&self, identifier: &str) -> usize {
        self.state
            .lock()
            .await
            .codes
            .keys()
            .filter(|(id, _)| id == identifier)
            .count()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, data: NewUser) -> StoreResult<User> {
        self.state.lock().await.insert_user(data)
    }

    async fn create_user_with_account(
        &self,
        user: NewUser,
        link: ProviderLink,
    ) -> StoreResult<(User, ProviderAccount)> {
        let mut state = self.state.lock().await;

        let key = (link.provider.clone(), link.provider_account_id.clone());
        if state.accounts.contains_key(&key) {
            return Err(StoreError::Duplicate {
                constraint: "provider_accounts_pkey".to_string(),
            });
        }

        let user = state.insert_user(user)?;
        let account = state.insert_account(link.for_user(user.id))?;
        Ok((user, account))
    }

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.update_user(id, &data))
    }

    async fn update_user_revoking_sessions(
        &self,
        id: Uuid,
        data: UpdateUser,
        keep_session_hash: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let mut state = self.state.lock().await;
        let user = state.update_user(id, &data);
        if user.is_some() {
            state.delete_user_sessions(id, keep_session_hash);
        }
        Ok(user)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn find_provider_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<ProviderAccount>> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .get(&(provider.to_string(), provider_account_id.to_string()))
            .cloned())
    }

    async fn link_provider_account(&self, data: NewProviderAccount) -> StoreResult<ProviderAccount> {
        self.state.lock().await.insert_account(data)
    }

    async fn link_provider_account_claiming(
        &self,
        data: NewProviderAccount,
        verified_at: DateTime<Utc>,
    ) -> StoreResult<(ProviderAccount, User)> {
        let mut state = self.state.lock().await;

        let user_id = data.user_id;
        let account = state.insert_account(data)?;
        let claim = UpdateUser {
            password_hash: Some(None),
            email_verified_at: Some(Some(verified_at)),
            ..Default::default()
        };
        let user = state.update_user(user_id, &claim).ok_or_else(|| {
            StoreError::Unavailable(format!("provider account references missing user {}", user_id))
        })?;

        state.delete_user_sessions(user_id, None);
        state.codes.retain(|(identifier, _), _| identifier != &user.email);
        Ok((account, user))
    }

    async fn list_provider_accounts(&self, user_id: Uuid) -> StoreResult<Vec<ProviderAccount>> {
        let state = self.state.lock().await;
        let mut accounts: Vec<ProviderAccount> = state
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(accounts)
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let mut state = self.state.lock().await;
        if state.sessions.contains_key(token_hash) {
            return Err(StoreError::Duplicate {
                constraint: "sessions_pkey".to_string(),
            });
        }

        let session = Session {
            token_hash: token_hash.to_string(),
            user_id,
            expires_at,
            created_at: Utc::now(),
        };
        state.sessions.insert(token_hash.to_string(), session.clone());
        Ok(session)
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        Ok(self.state.lock().await.sessions.get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool> {
        Ok(self.state.lock().await.sessions.remove(token_hash).is_some())
    }

    async fn delete_user_sessions(
        &self,
        user_id: Uuid,
        keep_session_hash: Option<&str>,
    ) -> StoreResult<u64> {
        Ok(self
            .state
            .lock()
            .await
            .delete_user_sessions(user_id, keep_session_hash))
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - state.sessions.len()) as u64)
    }

    async fn replace_verification_code(
        &self,
        data: NewVerificationCode,
    ) -> StoreResult<VerificationCode> {
        let mut state = self.state.lock().await;
        state.codes.retain(|(identifier, _), _| identifier != &data.identifier);
        state.code_attempts.remove(&data.identifier);

        let code = VerificationCode {
            identifier: data.identifier,
            code: data.code,
            expires_at: data.expires_at,
            created_at: Utc::now(),
        };
        state
            .codes
            .insert((code.identifier.clone(), code.code.clone()), code.clone());
        Ok(code)
    }

    async fn find_verification_code(
        &self,
        identifier: &str,
        code: &str,
    ) -> StoreResult<Option<VerificationCode>> {
        let state = self.state.lock().await;
        Ok(state
            .codes
            .get(&(identifier.to_string(), code.to_string()))
            .cloned())
    }

    async fn take_verification_code(
        &self,
        identifier: &str,
        code: &str,
    ) -> StoreResult<Option<VerificationCode>> {
        let mut state = self.state.lock().await;
        Ok(state.codes.remove(&(identifier.to_string(), code.to_string())))
    }

    async fn delete_verification_codes(&self, identifier: &str) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.codes.len();
        state.codes.retain(|(id, _), _| id != identifier);
        Ok((before - state.codes.len()) as u64)
    }

    async fn record_failed_code_attempt(&self, identifier: &str, max_attempts: u32) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        if !state.codes.keys().any(|(id, _)| id == identifier) {
            state.code_attempts.remove(identifier);
            return Ok(false);
        }

        let attempts = state.code_attempts.entry(identifier.to_string()).or_insert(0);
        *attempts += 1;
        if *attempts < max_attempts {
            return Ok(false);
        }

        state.code_attempts.remove(identifier);
        state.codes.retain(|(id, _), _| id != identifier);
        Ok(true)
    }

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.codes.len();
        state.codes.retain(|_, c| !c.is_expired(now));
        Ok((before - state.codes.len()) as u64)
    }
}
