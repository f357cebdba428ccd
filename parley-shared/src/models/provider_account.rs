/// Provider account model
///
/// Binds an external OAuth identity `(provider, provider_account_id)` to a
/// local user. The pair is the primary key, so one external identity can only
/// ever belong to one user; a duplicate insert is how link races surface.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE provider_accounts (
///     provider TEXT NOT NULL,
///     provider_account_id TEXT NOT NULL,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     access_token TEXT,
///     refresh_token TEXT,
///     id_token TEXT,
///     token_type TEXT,
///     scope TEXT,
///     expires_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (provider, provider_account_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Linked external account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProviderAccount {
    /// Provider key, e.g. "google" or "github"
    pub provider: String,

    /// The provider's stable subject identifier
    pub provider_account_id: String,

    pub user_id: Uuid,

    #[serde(skip_serializing, default)]
    pub access_token: Option<String>,

    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,

    #[serde(skip_serializing, default)]
    pub id_token: Option<String>,

    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Opaque tokens returned by a provider's token endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// External identity to attach to a user that may not exist yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderLink {
    pub provider: String,
    pub provider_account_id: String,
    pub tokens: ProviderTokens,
}

impl ProviderLink {
    pub fn for_user(self, user_id: Uuid) -> NewProviderAccount {
        NewProviderAccount {
            provider: self.provider,
            provider_account_id: self.provider_account_id,
            user_id,
            tokens: self.tokens,
        }
    }
}

/// Input for linking a provider account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProviderAccount {
    pub provider: String,
    pub provider_account_id: String,
    pub user_id: Uuid,
    pub tokens: ProviderTokens,
}

impl ProviderAccount {
    /// Inserts a link
    ///
    /// # Errors
    ///
    /// A primary key violation (`provider_accounts_pkey`) means the external
    /// identity is already linked.
    pub async fn create<'e, E>(executor: E, data: NewProviderAccount) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProviderAccount>(
            r#"
            INSERT INTO provider_accounts (
                provider, provider_account_id, user_id,
                access_token, refresh_token, id_token, token_type, scope, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING provider, provider_account_id, user_id, access_token, refresh_token,
                      id_token, token_type, scope, expires_at, created_at
            "#,
        )
        .bind(data.provider)
        .bind(data.provider_account_id)
        .bind(data.user_id)
        .bind(data.tokens.access_token)
        .bind(data.tokens.refresh_token)
        .bind(data.tokens.id_token)
        .bind(data.tokens.token_type)
        .bind(data.tokens.scope)
        .bind(data.tokens.expires_at)
        .fetch_one(executor)
        .await
    }

    /// Finds the link for an external identity
    pub async fn find<'e, E>(
        executor: E,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProviderAccount>(
            r#"
            SELECT provider, provider_account_id, user_id, access_token, refresh_token,
                   id_token, token_type, scope, expires_at, created_at
            FROM provider_accounts
            WHERE provider = $1 AND provider_account_id = $2
            "#,
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(executor)
        .await
    }

    /// Lists every provider linked to a user
    pub async fn list_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProviderAccount>(
            r#"
            SELECT provider, provider_account_id, user_id, access_token, refresh_token,
                   id_token, token_type, scope, expires_at, created_at
            FROM provider_accounts
            WHERE user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }
}
