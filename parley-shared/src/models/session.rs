/// Session model
///
/// Sessions are keyed by the SHA-256 hex digest of the bearer token; the
/// plaintext token only ever lives in the client's cookie.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE sessions (
///     token_hash TEXT PRIMARY KEY,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Stored session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A session is live strictly before its expiry instant
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub async fn create<'e, E>(
        executor: E,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING token_hash, user_id, expires_at, created_at
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(executor)
        .await
    }

    /// Looks up a session by token hash, expired or not
    pub async fn find<'e, E>(executor: E, token_hash: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT token_hash, user_id, expires_at, created_at
            FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(executor)
        .await
    }

    /// Deletes one session; returns whether a row existed
    pub async fn delete<'e, E>(executor: E, token_hash: &str) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every session of a user, optionally sparing one
    pub async fn delete_for_user<'e, E>(
        executor: E,
        user_id: Uuid,
        except_token_hash: Option<&str>,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR token_hash <> $2)
            "#,
        )
        .bind(user_id)
        .bind(except_token_hash)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_expired<'e, E>(executor: E, now: DateTime<Utc>) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_is_expired_boundary() {
        let now = Utc::now();
        let session = Session {
            token_hash: "abc".to_string(),
            user_id: Uuid::new_v4(),
            expires_at: now,
            created_at: now - Duration::days(30),
        };

        assert!(session.is_expired(now));
        assert!(session.is_expired(now + Duration::seconds(1)));
        assert!(!session.is_expired(now - Duration::seconds(1)));
    }
}
