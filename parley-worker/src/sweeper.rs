/// Expired session and code sweeper
///
/// Deletes sessions and verification codes whose expiry has passed. Reads
/// already treat expired rows as absent, so this is housekeeping: a missed
/// or failed pass only leaves dead rows behind for the next one.
///
/// # Example
///
/// ```no_run
/// use parley_worker::sweeper::{Sweeper, SweeperConfig};
/// use parley_shared::identity::memory::MemoryIdentityStore;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let sweeper = Sweeper::new(Arc::new(MemoryIdentityStore::new()), SweeperConfig::default());
///
/// let token = sweeper.shutdown_token();
/// tokio::spawn(async move {
///     tokio::signal::ctrl_c().await.ok();
///     token.cancel();
/// });
///
/// sweeper.run().await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use parley_shared::identity::store::{IdentityStore, StoreResult};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Sweeper configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Seconds between passes
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        SweeperConfig { interval_secs: 300 }
    }
}

/// Rows removed by one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: u64,
    pub codes: u64,
}

/// Runs a single pass against `store`
pub async fn sweep_once(store: &dyn IdentityStore, now: DateTime<Utc>) -> StoreResult<SweepReport> {
    let sessions = store.purge_expired_sessions(now).await?;
    let codes = store.purge_expired_codes(now).await?;
    Ok(SweepReport { sessions, codes })
}

pub struct Sweeper {
    store: Arc<dyn IdentityStore>,
    config: SweeperConfig,
    shutdown_token: CancellationToken,
}

impl Sweeper {
    pub fn new(store: Arc<dyn IdentityStore>, config: SweeperConfig) -> Self {
        Sweeper {
            store,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Gets shutdown token
    ///
    /// Used to signal graceful shutdown from external handlers.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Sweeps every interval until shutdown; returns the number of passes
    ///
    /// A pass always runs first, even when shutdown was already requested.
    pub async fn run(&self) -> anyhow::Result<u64> {
        tracing::info!(interval_secs = self.config.interval_secs, "Sweeper starting");

        let mut passes = 0u64;
        loop {
            match sweep_once(self.store.as_ref(), Utc::now()).await {
                Ok(report) if report.sessions + report.codes > 0 => {
                    tracing::info!(
                        sessions = report.sessions,
                        codes = report.codes,
                        "Purged expired rows"
                    );
                }
                Ok(_) => tracing::debug!("Nothing to purge"),
                Err(e) => tracing::error!(error = %e, "Sweep failed"),
            }
            passes += 1;

            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = sleep(Duration::from_secs(self.config.interval_secs)) => {}
            }
        }

        tracing::info!(passes, "Sweeper shut down");
        Ok(passes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use parley_shared::auth::token::generate_session_token;
    use parley_shared::identity::memory::MemoryIdentityStore;
    use parley_shared::models::user::NewUser;
    use parley_shared::models::verification_code::NewVerificationCode;

    #[test]
    fn test_sweeper_config_default() {
        assert_eq!(SweeperConfig::default().interval_secs, 300);
    }

    async fn seeded_store(now: DateTime<Utc>) -> Arc<MemoryIdentityStore> {
        let store = Arc::new(MemoryIdentityStore::new());
        let user = store
            .create_user(NewUser {
                email: "ada@example.com".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let (_, expired) = generate_session_token();
        let (_, live) = generate_session_token();
        store
            .insert_session(&expired, user.id, now - ChronoDuration::minutes(1))
            .await
            .unwrap();
        store
            .insert_session(&live, user.id, now + ChronoDuration::days(1))
            .await
            .unwrap();

        store
            .replace_verification_code(NewVerificationCode {
                identifier: "old@example.com".to_string(),
                code: "111111".to_string(),
                expires_at: now - ChronoDuration::minutes(1),
            })
            .await
            .unwrap();
        store
            .replace_verification_code(NewVerificationCode {
                identifier: "ada@example.com".to_string(),
                code: "222222".to_string(),
                expires_at: now + ChronoDuration::minutes(10),
            })
            .await
            .unwrap();

        store
    }

    #[tokio::test]
    async fn test_sweep_once_removes_only_expired() {
        let now = Utc::now();
        let store = seeded_store(now).await;

        let report = sweep_once(store.as_ref(), now).await.unwrap();
        assert_eq!(report, SweepReport { sessions: 1, codes: 1 });
        assert_eq!(store.session_count().await, 1);
        assert_eq!(store.code_count("old@example.com").await, 0);
        assert_eq!(store.code_count("ada@example.com").await, 1);

        let report = sweep_once(store.as_ref(), now).await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let now = Utc::now();
        let store = seeded_store(now).await;
        let sweeper = Sweeper::new(store.clone(), SweeperConfig { interval_secs: 3600 });

        sweeper.shutdown_token().cancel();
        let passes = sweeper.run().await.unwrap();

        assert_eq!(passes, 1);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_repeats_each_interval() {
        let store = Arc::new(MemoryIdentityStore::new());
        let sweeper = Arc::new(Sweeper::new(store, SweeperConfig { interval_secs: 60 }));
        let token = sweeper.shutdown_token();

        let handle = tokio::spawn({
            let sweeper = sweeper.clone();
            async move { sweeper.run().await }
        });

        // Paused time auto-advances while the sweeper sleeps
        tokio::time::sleep(Duration::from_secs(150)).await;
        token.cancel();

        let passes = handle.await.unwrap().unwrap();
        assert_eq!(passes, 3);
    }
}
