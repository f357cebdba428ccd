/// OAuth sign-in endpoints
///
/// - `GET /auth/:provider/start` - redirect to the provider's consent page
/// - `GET /auth/:provider/callback` - finish the flow and sign in
///
/// The `state` parameter is a signed token naming the provider and a nonce;
/// the nonce also lives in a short cookie. A callback is accepted only when
/// both agree. Every callback failure lands on `/login?error=…`:
///
/// | reason             | cause                                             |
/// |--------------------|---------------------------------------------------|
/// | `oauth`            | provider error, token exchange or profile failure |
/// | `oauth_state`      | missing, expired or mismatched state              |
/// | `unverified_email` | no verified email to create an account from       |
/// | `account_conflict` | provider account already belongs to someone else  |
/// | `disabled`         | the account is disabled                           |

use super::{redirect, with_session};
use crate::{
    app::AppState,
    cookies::{clear_oauth_state, oauth_state_cookie, OAUTH_STATE_COOKIE, OAUTH_STATE_TTL_MINUTES},
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use parley_shared::auth::oauth_state::{create_state, validate_state};
use parley_shared::identity::{Destination, IdentityError};
use parley_shared::oauth::OAuthProvider;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,

    /// Set by the provider when the user declined or the request was bad
    pub error: Option<String>,
}

fn failed(jar: CookieJar, reason: &str) -> Response {
    let destination = Destination::SignInFailed {
        reason: reason.to_string(),
    };
    (jar, redirect(&destination)).into_response()
}

/// Start a provider sign-in
///
/// # Errors
///
/// - `404 Not Found`: Unknown or unconfigured provider
pub async fn start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> ApiResult<Response> {
    let provider: OAuthProvider = provider.parse()?;

    let issued = create_state(
        provider.as_str(),
        state.auth_secret(),
        chrono::Duration::minutes(OAUTH_STATE_TTL_MINUTES),
    )?;
    let url = state.oauth.authorize_url(provider, &issued.token)?;

    let jar = jar.add(oauth_state_cookie(&issued.nonce, state.secure_cookies()));
    Ok((jar, Redirect::to(&url)).into_response())
}

/// Provider callback
///
/// New sessions go to `/post-auth`, which picks the landing page from the
/// role loaded at that point.
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let provider: OAuthProvider = match provider.parse() {
        Ok(provider) => provider,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let nonce = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = clear_oauth_state(jar);

    if let Some(error) = query.error {
        tracing::info!(provider = %provider, error = %error, "Provider returned an error");
        return failed(jar, "oauth");
    }

    let (Some(code), Some(token), Some(nonce)) = (query.code, query.state, nonce) else {
        tracing::warn!(provider = %provider, "OAuth callback without code, state or nonce");
        return failed(jar, "oauth_state");
    };

    if let Err(e) = validate_state(&token, state.auth_secret(), provider.as_str(), &nonce) {
        tracing::warn!(provider = %provider, error = %e, "OAuth state rejected");
        return failed(jar, "oauth_state");
    }

    let identity = match state.oauth.complete(provider, &code).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(provider = %provider, error = %e, "OAuth exchange failed");
            return failed(jar, "oauth");
        }
    };

    match state.identity.sign_in_with_provider(&identity, Utc::now()).await {
        Ok(result) => with_session(&state, jar, &result.signed_in.session, &Destination::PostAuth),
        Err(e) => sign_in_failed(jar, provider, e),
    }
}

fn sign_in_failed(jar: CookieJar, provider: OAuthProvider, err: IdentityError) -> Response {
    match err {
        IdentityError::UnverifiedProviderEmail => failed(jar, "unverified_email"),
        IdentityError::LinkConflict => failed(jar, "account_conflict"),
        IdentityError::AccountDisabled => (jar, redirect(&Destination::SignInDisabled)).into_response(),
        e => {
            tracing::error!(provider = %provider, error = %e, "Provider sign-in failed");
            failed(jar, "oauth")
        }
    }
}
