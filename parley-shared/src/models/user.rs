/// User model and database operations
///
/// A user is the canonical identity every login path resolves to. Credential
/// logins match on `password_hash`, OAuth logins reach a user through a
/// [`ProviderAccount`](super::provider_account::ProviderAccount).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT,
///     email TEXT NOT NULL UNIQUE CHECK (email = lower(email)),
///     email_verified_at TIMESTAMPTZ,
///     image TEXT,
///     password_hash TEXT,
///     role user_role NOT NULL DEFAULT 'user',
///     disabled BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use parley_shared::models::user::{NewUser, User};
/// use parley_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, NewUser::with_password("user@example.com", "$argon2id$...")).await?;
/// let found = User::find_by_email(&pool, "user@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Normalizes an email address for storage and lookup
///
/// Emails are compared case-insensitively everywhere, so they are trimmed and
/// lowercased before they touch the store.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Closed set of roles a user can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Can manage other users' roles and status
    Admin,

    /// Standard account
    #[default]
    User,
}

impl Role {
    /// Every role, in display order
    pub const ALL: [Role; 2] = [Role::Admin, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a [`Role`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// User account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Opaque user ID
    pub id: Uuid,

    /// Display name
    pub name: Option<String>,

    /// Normalized (lowercase) email, unique across users
    pub email: String,

    /// Set once the user has proven control of the email address
    pub email_verified_at: Option<DateTime<Utc>>,

    /// Avatar URL
    pub image: Option<String>,

    /// Argon2id PHC string; `None` for OAuth-only accounts
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,

    pub role: Role,

    /// Disabled accounts cannot sign in or keep browsing
    pub disabled: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

/// Input for creating a user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    /// Email address, normalized before insert
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    /// Argon2id hash; `None` for accounts created through a provider
    pub password_hash: Option<String>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub role: Role,
}

impl NewUser {
    /// Unverified credential account with the default role
    pub fn with_password(email: &str, password_hash: &str) -> Self {
        Self {
            email: normalize_email(email),
            password_hash: Some(password_hash.to_string()),
            ..Default::default()
        }
    }
}

/// Input for updating a user
///
/// Only `Some` fields are written. Nullable columns take `Some(None)` to clear.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub name: Option<Option<String>>,
    pub image: Option<Option<String>>,
    pub password_hash: Option<Option<String>>,
    pub email_verified_at: Option<Option<DateTime<Utc>>>,
    pub role: Option<Role>,
    pub disabled: Option<bool>,
}

impl UpdateUser {
    /// Returns true when no field would change
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.image.is_none()
            && self.password_hash.is_none()
            && self.email_verified_at.is_none()
            && self.role.is_none()
            && self.disabled.is_none()
    }

    /// Applies the update to an in-memory user, stamping `updated_at`
    pub fn apply_to(&self, user: &mut User, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(image) = &self.image {
            user.image = image.clone();
        }
        if let Some(hash) = &self.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(verified) = self.email_verified_at {
            user.email_verified_at = verified;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(disabled) = self.disabled {
            user.disabled = disabled;
        }
        user.updated_at = now;
    }
}

impl User {
    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Returns a database error carrying the `users_email_key` constraint when
    /// the email is already taken.
    pub async fn create<'e, E>(executor: E, data: NewUser) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, image, password_hash, email_verified_at, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, email_verified_at, image, password_hash,
                      role, disabled, created_at, updated_at
            "#,
        )
        .bind(normalize_email(&data.email))
        .bind(data.name)
        .bind(data.image)
        .bind(data.password_hash)
        .bind(data.email_verified_at)
        .bind(data.role)
        .fetch_one(executor)
        .await
    }

    /// Finds a user by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, email_verified_at, image, password_hash,
                   role, disabled, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Finds a user by email
    ///
    /// The argument is normalized first, so lookups are case-insensitive.
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, email_verified_at, image, password_hash,
                   role, disabled, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(executor)
        .await
    }

    /// Updates an existing user
    ///
    /// Only fields set in `data` are written; `updated_at` is always bumped.
    ///
    /// # Returns
    ///
    /// The updated user, or `None` if no user has this ID
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.image.is_some() {
            bind_count += 1;
            query.push_str(&format!(", image = ${}", bind_count));
        }
        if data.password_hash.is_some() {
            bind_count += 1;
            query.push_str(&format!(", password_hash = ${}", bind_count));
        }
        if data.email_verified_at.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email_verified_at = ${}", bind_count));
        }
        if data.role.is_some() {
            bind_count += 1;
            query.push_str(&format!(", role = ${}", bind_count));
        }
        if data.disabled.is_some() {
            bind_count += 1;
            query.push_str(&format!(", disabled = ${}", bind_count));
        }

        query.push_str(
            " WHERE id = $1 RETURNING id, name, email, email_verified_at, image, password_hash, \
             role, disabled, created_at, updated_at",
        );

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(image) = data.image {
            q = q.bind(image);
        }
        if let Some(hash) = data.password_hash {
            q = q.bind(hash);
        }
        if let Some(verified) = data.email_verified_at {
            q = q.bind(verified);
        }
        if let Some(role) = data.role {
            q = q.bind(role);
        }
        if let Some(disabled) = data.disabled {
            q = q.bind(disabled);
        }

        q.fetch_optional(executor).await
    }

    /// Lists users, newest first
    pub async fn list<'e, E>(executor: E, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, email_verified_at, image, password_hash,
                   role, disabled, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: Some("Ada".to_string()),
            email: "ada@example.com".to_string(),
            email_verified_at: None,
            image: None,
            password_hash: Some("$argon2id$hash".to_string()),
            role: Role::User,
            disabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("owner".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_default_is_user() {
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn test_new_user_with_password_normalizes() {
        let new_user = NewUser::with_password("Ada@Example.com", "hash");
        assert_eq!(new_user.email, "ada@example.com");
        assert_eq!(new_user.role, Role::User);
        assert!(new_user.email_verified_at.is_none());
    }

    #[test]
    fn test_update_apply_to() {
        let mut user = sample_user();
        let now = Utc::now();
        let update = UpdateUser {
            name: Some(None),
            role: Some(Role::Admin),
            disabled: Some(true),
            email_verified_at: Some(Some(now)),
            ..Default::default()
        };

        assert!(!update.is_empty());
        update.apply_to(&mut user, now);

        assert_eq!(user.name, None);
        assert!(user.is_admin());
        assert!(user.disabled);
        assert!(user.is_email_verified());
        assert_eq!(user.password_hash.as_deref(), Some("$argon2id$hash"));
    }

    #[test]
    fn test_update_default_is_empty() {
        assert!(UpdateUser::default().is_empty());
    }
}
