/// GitHub OAuth endpoints and profile parsing
///
/// GitHub's `/user` email is whatever the user made public and carries no
/// verification flag, so it is never trusted on its own. Verified addresses
/// come from `/user/emails`.

use super::OAuthError;
use crate::identity::linker::ProviderIdentity;
use crate::models::provider_account::ProviderTokens;
use serde::Deserialize;

pub const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const USER_URL: &str = "https://api.github.com/user";
pub const EMAILS_URL: &str = "https://api.github.com/user/emails";
pub const SCOPE: &str = "read:user user:email";

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

/// One entry of `/user/emails`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitHubEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

pub fn parse_user(body: &str, tokens: ProviderTokens) -> Result<ProviderIdentity, OAuthError> {
    let user: GitHubUser = serde_json::from_str(body)
        .map_err(|e| OAuthError::Profile(format!("invalid github user: {}", e)))?;

    Ok(ProviderIdentity {
        provider: "github".to_string(),
        provider_account_id: user.id.to_string(),
        email: user.email,
        email_verified: None,
        name: user.name.or(Some(user.login)),
        image: user.avatar_url,
        tokens,
    })
}

pub fn parse_emails(body: &str) -> Result<Vec<GitHubEmail>, OAuthError> {
    serde_json::from_str(body).map_err(|e| OAuthError::Profile(format!("invalid github emails: {}", e)))
}

/// Primary verified address, else any verified address
pub fn pick_verified_email(emails: &[GitHubEmail]) -> Option<String> {
    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified))
        .map(|e| e.email.clone())
}
