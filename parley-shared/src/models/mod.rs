/// Database models for Parley
///
/// Each model owns its SQL. Functions take any `PgExecutor`, so the same
/// query runs against the pool or inside a transaction.
///
/// # Models
///
/// - `user`: Canonical user accounts and roles
/// - `provider_account`: OAuth identities linked to users
/// - `session`: Server-side sessions keyed by token hash
/// - `verification_code`: One-time email codes
///
/// # Example
///
/// ```no_run
/// use parley_shared::models::user::{NewUser, User};
/// use parley_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let mut tx = pool.begin().await?;
/// let user = User::create(&mut *tx, NewUser::with_password("user@example.com", "$argon2id$...")).await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

pub mod provider_account;
pub mod session;
pub mod user;
pub mod verification_code;
