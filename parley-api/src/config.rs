/// Configuration management for the API server
///
/// Configuration is read from the environment once at startup and passed
/// around as `Arc<Config>`. Nothing else reads environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `APP_ENV`: `production` enables secure cookies and HSTS
/// - `PUBLIC_URL`: External base URL, used for OAuth callbacks (default: http://localhost:8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: `*`)
/// - `AUTH_SECRET`: Signs OAuth state tokens, at least 32 characters (required)
/// - `REQUIRE_VERIFIED_EMAIL`: Refuse credential sign-in until verified (default: true)
/// - `SESSION_TTL_DAYS`: Session lifetime (default: 30)
/// - `CODE_TTL_MINUTES`: Verification code lifetime (default: 10)
/// - `CODE_MAX_ATTEMPTS`: Wrong guesses before a code is discarded (default: 5)
/// - `AUTH_GOOGLE_ID` / `AUTH_GOOGLE_SECRET`: Enable Google sign-in
/// - `AUTH_GITHUB_ID` / `AUTH_GITHUB_SECRET`: Enable GitHub sign-in
/// - `EMAIL_API_KEY`: Email API key; codes are logged when unset
/// - `EMAIL_FROM`: Sender address (default: `Parley <no-reply@parley.app>`)
///
/// # Example
///
/// ```no_run
/// use parley_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use parley_shared::identity::config::{
    IdentityConfig, DEFAULT_CODE_TTL_MINUTES, DEFAULT_MAX_CODE_ATTEMPTS, DEFAULT_SESSION_TTL_DAYS,
};
use parley_shared::mail::resend::EmailConfig;
use parley_shared::oauth::{OAuthClientConfig, OAuthSettings};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Product name used in emails
pub const APP_NAME: &str = "Parley";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub oauth: OAuthConfig,
    pub email: EmailSettings,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Secure cookies and HSTS
    pub production: bool,

    /// External base URL without a trailing slash
    pub public_url: String,

    /// Allowed CORS origins; `*` means permissive
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Identity policy and signing secret
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Signs OAuth state tokens
    ///
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    pub require_verified_email: bool,
    pub session_ttl_days: i64,
    pub code_ttl_minutes: i64,
    pub max_code_attempts: u32,
}

/// OAuth client credentials for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub google: Option<ProviderCredentials>,
    pub github: Option<ProviderCredentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    /// `None` sends codes to the log instead
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub from: String,
}

fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value: {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn parse_flag(key: &str, default: bool) -> anyhow::Result<bool> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("{} must be a boolean, got {:?}", key, other),
        },
        Err(_) => Ok(default),
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn provider_credentials(id_key: &str, secret_key: &str) -> anyhow::Result<Option<ProviderCredentials>> {
    match (non_empty(id_key), non_empty(secret_key)) {
        (Some(client_id), Some(client_secret)) => Ok(Some(ProviderCredentials {
            client_id,
            client_secret,
        })),
        (None, None) => Ok(None),
        _ => anyhow::bail!("{} and {} must be set together", id_key, secret_key),
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or `AUTH_SECRET` is missing
    /// - `AUTH_SECRET` is shorter than 32 characters
    /// - A variable has an invalid value
    /// - Only half of a provider's credentials are set
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_env("API_PORT", 8080u16)?;
        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let public_url = env::var("PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = parse_env("DATABASE_MAX_CONNECTIONS", 10u32)?;

        let secret = env::var("AUTH_SECRET")
            .map_err(|_| anyhow::anyhow!("AUTH_SECRET environment variable is required"))?;
        if secret.len() < 32 {
            anyhow::bail!("AUTH_SECRET must be at least 32 characters long");
        }

        let session_ttl_days = parse_env("SESSION_TTL_DAYS", DEFAULT_SESSION_TTL_DAYS)?;
        let code_ttl_minutes = parse_env("CODE_TTL_MINUTES", DEFAULT_CODE_TTL_MINUTES)?;
        if session_ttl_days < 1 || code_ttl_minutes < 1 {
            anyhow::bail!("SESSION_TTL_DAYS and CODE_TTL_MINUTES must be positive");
        }
        let max_code_attempts = parse_env("CODE_MAX_ATTEMPTS", DEFAULT_MAX_CODE_ATTEMPTS)?;
        if max_code_attempts == 0 {
            anyhow::bail!("CODE_MAX_ATTEMPTS must be positive");
        }

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                production,
                public_url,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            auth: AuthConfig {
                secret,
                require_verified_email: parse_flag("REQUIRE_VERIFIED_EMAIL", true)?,
                session_ttl_days,
                code_ttl_minutes,
                max_code_attempts,
            },
            oauth: OAuthConfig {
                google: provider_credentials("AUTH_GOOGLE_ID", "AUTH_GOOGLE_SECRET")?,
                github: provider_credentials("AUTH_GITHUB_ID", "AUTH_GITHUB_SECRET")?,
            },
            email: EmailSettings {
                api_key: non_empty("EMAIL_API_KEY"),
                from: env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| format!("{} <no-reply@parley.app>", APP_NAME)),
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Policy handed to the identity engine
    pub fn identity(&self) -> IdentityConfig {
        IdentityConfig {
            session_ttl: chrono::Duration::days(self.auth.session_ttl_days),
            code_ttl: chrono::Duration::minutes(self.auth.code_ttl_minutes),
            require_verified_email: self.auth.require_verified_email,
            max_code_attempts: self.auth.max_code_attempts,
        }
    }

    pub fn oauth_settings(&self) -> OAuthSettings {
        let client = |c: &ProviderCredentials| OAuthClientConfig {
            client_id: c.client_id.clone(),
            client_secret: c.client_secret.clone(),
        };
        OAuthSettings {
            google: self.oauth.google.as_ref().map(client),
            github: self.oauth.github.as_ref().map(client),
            public_url: self.api.public_url.clone(),
        }
    }

    /// Email API settings, when delivery is configured
    pub fn email_config(&self) -> Option<EmailConfig> {
        self.email.api_key.as_ref().map(|api_key| EmailConfig {
            api_key: api_key.clone(),
            from: self.email.from.clone(),
            app_name: APP_NAME.to_string(),
            code_ttl_minutes: self.auth.code_ttl_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                production: false,
                public_url: "http://localhost:8080".to_string(),
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
                require_verified_email: true,
                session_ttl_days: 30,
                code_ttl_minutes: 10,
                max_code_attempts: 5,
            },
            oauth: OAuthConfig::default(),
            email: EmailSettings {
                api_key: None,
                from: "Parley <no-reply@parley.app>".to_string(),
            },
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(config().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_identity_policy() {
        let identity = config().identity();
        assert_eq!(identity, IdentityConfig::default());
    }

    #[test]
    fn test_oauth_settings_only_configured_providers() {
        let mut config = config();
        config.oauth.github = Some(ProviderCredentials {
            client_id: "gh-id".to_string(),
            client_secret: "gh-secret".to_string(),
        });

        let settings = config.oauth_settings();
        assert!(settings.google.is_none());
        assert_eq!(settings.github.map(|c| c.client_id), Some("gh-id".to_string()));
        assert_eq!(settings.public_url, "http://localhost:8080");
    }

    #[test]
    fn test_email_config_requires_api_key() {
        let mut config = config();
        assert!(config.email_config().is_none());

        config.email.api_key = Some("re_test".to_string());
        let email = config.email_config().unwrap();
        assert_eq!(email.app_name, APP_NAME);
        assert_eq!(email.code_ttl_minutes, 10);
    }

    #[test]
    fn test_secrets_not_serialized() {
        let json = serde_json::to_value(config()).unwrap();
        assert!(json["auth"].get("secret").is_none());
        assert!(json["email"].get("api_key").is_none());
    }
}
