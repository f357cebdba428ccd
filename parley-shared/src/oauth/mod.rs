/// OAuth authorization-code clients
///
/// Supports Google and GitHub. A sign-in is three calls: redirect the browser
/// to [`OAuthClient::authorize_url`], exchange the returned code with
/// [`OAuthClient::exchange_code`], then load the profile with
/// [`OAuthClient::fetch_identity`]. The resulting
/// [`ProviderIdentity`](crate::identity::linker::ProviderIdentity) goes to the
/// identity service.
///
/// [`OAuthClient`] is also the engine's
/// [`VerifiedEmailSource`](crate::identity::linker::VerifiedEmailSource): it
/// trusts a provider-asserted verified email, and for GitHub falls back to the
/// `/user/emails` listing.

pub mod github;
pub mod google;

use crate::identity::linker::{asserted_email, ProviderIdentity, VerifiedEmailSource};
use crate::models::provider_account::ProviderTokens;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// User agent sent to provider APIs (GitHub rejects requests without one)
pub const USER_AGENT: &str = concat!("parley/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
    GitHub,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 2] = [OAuthProvider::Google, OAuthProvider::GitHub];

    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::GitHub => "github",
        }
    }

    fn authorize_endpoint(&self) -> &'static str {
        match self {
            OAuthProvider::Google => google::AUTHORIZE_URL,
            OAuthProvider::GitHub => github::AUTHORIZE_URL,
        }
    }

    fn token_endpoint(&self) -> &'static str {
        match self {
            OAuthProvider::Google => google::TOKEN_URL,
            OAuthProvider::GitHub => github::TOKEN_URL,
        }
    }

    fn scope(&self) -> &'static str {
        match self {
            OAuthProvider::Google => google::SCOPE,
            OAuthProvider::GitHub => github::SCOPE,
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::GitHub),
            other => Err(OAuthError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("Unknown sign-in provider: {0}")]
    UnknownProvider(String),

    #[error("Sign-in provider {0} is not configured")]
    NotConfigured(OAuthProvider),

    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Profile lookup failed: {0}")]
    Profile(String),
}

/// Client credentials registered with a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Which providers are enabled, and where callbacks land
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthSettings {
    pub google: Option<OAuthClientConfig>,
    pub github: Option<OAuthClientConfig>,
    /// Public base URL of this service, e.g. `https://parley.example.com`
    pub public_url: String,
}

impl OAuthSettings {
    pub fn client(&self, provider: OAuthProvider) -> Option<&OAuthClientConfig> {
        match provider {
            OAuthProvider::Google => self.google.as_ref(),
            OAuthProvider::GitHub => self.github.as_ref(),
        }
    }

    pub fn enabled(&self) -> Vec<OAuthProvider> {
        OAuthProvider::ALL
            .into_iter()
            .filter(|p| self.client(*p).is_some())
            .collect()
    }

    pub fn redirect_uri(&self, provider: OAuthProvider) -> String {
        format!(
            "{}/auth/{}/callback",
            self.public_url.trim_end_matches('/'),
            provider
        )
    }
}

/// Token endpoint response, shared by both providers
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    id_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Parses a token endpoint body
///
/// GitHub reports failures with HTTP 200 and an `error` field, so the body is
/// inspected regardless of status. Token values never appear in the error.
pub fn parse_token_response(body: &str, now: DateTime<Utc>) -> Result<ProviderTokens, OAuthError> {
    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|_| OAuthError::TokenExchange("unrecognized response format".to_string()))?;

    if let Some(error) = parsed.error {
        let description = parsed.error_description.unwrap_or_default();
        return Err(OAuthError::TokenExchange(
            format!("{} {}", error, description).trim().to_string(),
        ));
    }

    let access_token = parsed
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| OAuthError::TokenExchange("response missing access_token".to_string()))?;

    Ok(ProviderTokens {
        access_token: Some(access_token),
        refresh_token: parsed.refresh_token,
        id_token: parsed.id_token,
        token_type: parsed.token_type,
        scope: parsed.scope,
        expires_at: parsed.expires_in.map(|secs| now + Duration::seconds(secs)),
    })
}

pub struct OAuthClient {
    http: reqwest::Client,
    settings: OAuthSettings,
}

impl OAuthClient {
    pub fn new(settings: OAuthSettings) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { http, settings }
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    fn client(&self, provider: OAuthProvider) -> Result<&OAuthClientConfig, OAuthError> {
        self.settings
            .client(provider)
            .ok_or(OAuthError::NotConfigured(provider))
    }

    /// Provider URL the browser is sent to
    pub fn authorize_url(&self, provider: OAuthProvider, state: &str) -> Result<String, OAuthError> {
        let client = self.client(provider)?;
        let redirect_uri = self.settings.redirect_uri(provider);

        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            provider.authorize_endpoint(),
            urlencoding::encode(&client.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(provider.scope()),
            urlencoding::encode(state),
        );
        if provider == OAuthProvider::Google {
            url.push_str("&access_type=offline&prompt=select_account");
        }
        Ok(url)
    }

    /// Trades an authorization code for tokens
    pub async fn exchange_code(&self, provider: OAuthProvider, code: &str) -> Result<ProviderTokens, OAuthError> {
        let client = self.client(provider)?;
        let redirect_uri = self.settings.redirect_uri(provider);

        let response = self
            .http
            .post(provider.token_endpoint())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        match parse_token_response(&body, Utc::now()) {
            Ok(tokens) => Ok(tokens),
            Err(e) => {
                tracing::warn!(provider = %provider, status = %status, error = %e, "Token exchange rejected");
                Err(e)
            }
        }
    }

    /// Loads the signed-in profile
    pub async fn fetch_identity(
        &self,
        provider: OAuthProvider,
        tokens: ProviderTokens,
    ) -> Result<ProviderIdentity, OAuthError> {
        let access_token = tokens
            .access_token
            .clone()
            .ok_or_else(|| OAuthError::Profile("missing access token".to_string()))?;

        let url = match provider {
            OAuthProvider::Google => google::USERINFO_URL,
            OAuthProvider::GitHub => github::USER_URL,
        };

        let response = self
            .http
            .get(url)
            .bearer_auth(&access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OAuthError::Profile(format!(
                "{} profile request returned {}",
                provider,
                response.status()
            )));
        }

        let body = response.text().await?;
        match provider {
            OAuthProvider::Google => google::parse_userinfo(&body, tokens),
            OAuthProvider::GitHub => github::parse_user(&body, tokens),
        }
    }

    /// Exchange plus profile lookup
    pub async fn complete(&self, provider: OAuthProvider, code: &str) -> Result<ProviderIdentity, OAuthError> {
        let tokens = self.exchange_code(provider, code).await?;
        self.fetch_identity(provider, tokens).await
    }

    async fn github_verified_email(&self, access_token: &str) -> Result<Option<String>, OAuthError> {
        let response = self
            .http
            .get(github::EMAILS_URL)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OAuthError::Profile(format!(
                "github emails request returned {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        Ok(github::pick_verified_email(&github::parse_emails(&body)?))
    }
}

#[async_trait]
impl VerifiedEmailSource for OAuthClient {
    async fn verified_email(&self, identity: &ProviderIdentity) -> anyhow::Result<Option<String>> {
        if let Some(email) = asserted_email(identity) {
            return Ok(Some(email));
        }

        if identity.provider != OAuthProvider::GitHub.as_str() {
            return Ok(None);
        }

        match identity.tokens.access_token.as_deref() {
            Some(token) => Ok(self.github_verified_email(token).await?),
            None => Ok(None),
        }
    }
}
