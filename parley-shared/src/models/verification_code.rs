/// Verification code model
///
/// Six-digit codes sent by email, keyed by `(identifier, code)` where the
/// identifier is the normalized email address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct VerificationCode {
    pub identifier: String,
    #[serde(skip_serializing, default)]
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Input for issuing a code
#[derive(Debug, Clone, PartialEq)]
pub struct NewVerificationCode {
    pub identifier: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCode {
    /// Codes are still accepted at their exact expiry instant
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Replaces every outstanding code for the identifier with a new one
    ///
    /// Must run inside a transaction. A transaction-scoped advisory lock on the
    /// identifier serializes concurrent issuers so only the last write remains.
    pub async fn replace(
        conn: &mut PgConnection,
        data: NewVerificationCode,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&data.identifier)
            .execute(&mut *conn)
            .await?;

        sqlx::query("DELETE FROM verification_codes WHERE identifier = $1")
            .bind(&data.identifier)
            .execute(&mut *conn)
            .await?;

        sqlx::query_as::<_, VerificationCode>(
            r#"
            INSERT INTO verification_codes (identifier, code, expires_at)
            VALUES ($1, $2, $3)
            RETURNING identifier, code, expires_at, created_at
            "#,
        )
        .bind(data.identifier)
        .bind(data.code)
        .bind(data.expires_at)
        .fetch_one(&mut *conn)
        .await
    }

    /// Looks up an exact `(identifier, code)` match without consuming it
    pub async fn find<'e, E>(
        executor: E,
        identifier: &str,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, VerificationCode>(
            r#"
            SELECT identifier, code, expires_at, created_at
            FROM verification_codes
            WHERE identifier = $1 AND code = $2
            "#,
        )
        .bind(identifier)
        .bind(code)
        .fetch_optional(executor)
        .await
    }

    /// Atomically removes and returns a matching code
    ///
    /// Two concurrent consumers can never both receive the row.
    pub async fn take<'e, E>(
        executor: E,
        identifier: &str,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, VerificationCode>(
            r#"
            DELETE FROM verification_codes
            WHERE identifier = $1 AND code = $2
            RETURNING identifier, code, expires_at, created_at
            "#,
        )
        .bind(identifier)
        .bind(code)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete_for_identifier<'e, E>(executor: E, identifier: &str) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM verification_codes WHERE identifier = $1")
            .bind(identifier)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Bumps the failed-guess counter and deletes codes that reached `max_attempts`
    ///
    /// Run inside a transaction so the bump and the delete see each other.
    pub async fn record_failed_attempt(
        conn: &mut PgConnection,
        identifier: &str,
        max_attempts: i32,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query("UPDATE verification_codes SET attempts = attempts + 1 WHERE identifier = $1")
            .bind(identifier)
            .execute(&mut *conn)
            .await?;

        let result = sqlx::query("DELETE FROM verification_codes WHERE identifier = $1 AND attempts >= $2")
            .bind(identifier)
            .bind(max_attempts)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes codes whose expiry has passed; a code is still valid at exactly `expires_at`
    pub async fn delete_expired<'e, E>(executor: E, now: DateTime<Utc>) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM verification_codes WHERE expires_at < $1")
            .bind(now)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
