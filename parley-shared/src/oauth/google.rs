/// Google OpenID Connect endpoints and profile parsing

use super::OAuthError;
use crate::identity::linker::ProviderIdentity;
use crate::models::provider_account::ProviderTokens;
use serde::Deserialize;

pub const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
pub const SCOPE: &str = "openid email profile";

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

/// Maps a userinfo response; Google asserts `email_verified` itself
pub fn parse_userinfo(body: &str, tokens: ProviderTokens) -> Result<ProviderIdentity, OAuthError> {
    let info: UserInfo = serde_json::from_str(body)
        .map_err(|e| OAuthError::Profile(format!("invalid google userinfo: {}", e)))?;

    Ok(ProviderIdentity {
        provider: "google".to_string(),
        provider_account_id: info.sub,
        email: info.email,
        email_verified: info.email_verified,
        name: info.name,
        image: info.picture,
        tokens,
    })
}
