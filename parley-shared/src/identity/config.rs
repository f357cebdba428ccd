/// Identity engine policy
///
/// Built once at startup and handed to each component; nothing in the engine
/// reads the environment.

use chrono::Duration;

/// Default lifetime of a session
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 30;

/// Default lifetime of an emailed verification code
pub const DEFAULT_CODE_TTL_MINUTES: i64 = 10;

/// Wrong guesses allowed before an outstanding code is discarded
pub const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    /// How long a new session stays valid
    pub session_ttl: Duration,

    /// How long an issued verification code stays valid
    pub code_ttl: Duration,

    /// Failed guesses after which the outstanding code is deleted
    pub max_code_attempts: u32,

    /// When true, credential sign-in is refused until the email is verified
    pub require_verified_email: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
            code_ttl: Duration::minutes(DEFAULT_CODE_TTL_MINUTES),
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            require_verified_email: true,
        }
    }
}
