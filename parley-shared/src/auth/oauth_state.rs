/// Signed OAuth `state` parameter
///
/// The state sent to the provider is an HS256 JWT binding the provider name
/// to a random nonce. The same nonce is stored in a short-lived cookie; the
/// callback accepts only when the signature, expiry, provider and nonce all
/// match, which ties the callback to the browser that started the flow.
///
/// # Example
///
/// ```
/// use parley_shared::auth::oauth_state::{create_state, validate_state};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-that-is-at-least-32-bytes!!";
/// let issued = create_state("github", secret, chrono::Duration::minutes(10))?;
/// let claims = validate_state(&issued.token, secret, "github", &issued.nonce)?;
/// assert_eq!(claims.provider, "github");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

const ISSUER: &str = "parley";

#[derive(Debug, thiserror::Error)]
pub enum StateTokenError {
    #[error("Failed to create state token: {0}")]
    CreateError(String),

    #[error("State token has expired")]
    Expired,

    #[error("State token is invalid: {0}")]
    Invalid(String),

    #[error("State token does not match this sign-in attempt")]
    Mismatch,
}

/// Claims carried by the state token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateClaims {
    pub iss: String,
    pub provider: String,
    pub nonce: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly minted state: the JWT for the provider and the nonce for the cookie
#[derive(Debug, Clone)]
pub struct IssuedState {
    pub token: String,
    pub nonce: String,
}

/// Signs a new state token for `provider`
pub fn create_state(provider: &str, secret: &str, ttl: Duration) -> Result<IssuedState, StateTokenError> {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let nonce = hex::encode(bytes);

    let now = Utc::now();
    let claims = StateClaims {
        iss: ISSUER.to_string(),
        provider: provider.to_string(),
        nonce: nonce.clone(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| StateTokenError::CreateError(e.to_string()))?;

    Ok(IssuedState { token, nonce })
}

/// Verifies a state token returned by the provider
///
/// # Errors
///
/// - `Expired` when the token outlived its TTL
/// - `Invalid` for a bad signature, issuer, or encoding
/// - `Mismatch` when provider or nonce differ from the expected values
pub fn validate_state(
    token: &str,
    secret: &str,
    expected_provider: &str,
    expected_nonce: &str,
) -> Result<StateClaims, StateTokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.leeway = 0;

    let data = decode::<StateClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => StateTokenError::Expired,
        _ => StateTokenError::Invalid(e.to_string()),
    })?;

    let claims = data.claims;
    if claims.provider != expected_provider || claims.nonce != expected_nonce {
        return Err(StateTokenError::Mismatch);
    }

    Ok(claims)
}
