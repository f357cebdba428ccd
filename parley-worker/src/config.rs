/// Worker configuration loaded from the environment
use crate::sweeper::SweeperConfig;
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub sweeper: SweeperConfig,
}

impl WorkerConfig {
    /// Reads `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and `SWEEP_INTERVAL_SECS`
    ///
    /// A `.env` file is honoured when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 2)?;
        let interval_secs = parse_or("SWEEP_INTERVAL_SECS", SweeperConfig::default().interval_secs)?;
        if interval_secs == 0 {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be positive");
        }

        Ok(WorkerConfig {
            database_url,
            max_connections,
            sweeper: SweeperConfig { interval_secs },
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} is not a valid number: {}", key, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_falls_back_when_unset() {
        let value: u64 = parse_or("PARLEY_WORKER_TEST_UNSET", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        std::env::set_var("PARLEY_WORKER_TEST_GARBAGE", "soon");
        let result: Result<u64> = parse_or("PARLEY_WORKER_TEST_GARBAGE", 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_or_reads_value() {
        std::env::set_var("PARLEY_WORKER_TEST_VALUE", " 90 ");
        let value: u64 = parse_or("PARLEY_WORKER_TEST_VALUE", 1).unwrap();
        assert_eq!(value, 90);
    }
}
