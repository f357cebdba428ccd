/// Database layer for Parley
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: Schema migration runner
///
/// Models live in the `models` module at the crate root; the identity
/// engine reaches them through [`PgIdentityStore`](crate::identity::postgres::PgIdentityStore).
///
/// # Example
///
/// ```no_run
/// use parley_shared::db::{migrations::run_migrations, pool::{create_pool, DatabaseConfig}};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
