/// HTTP tests for session resolution, logout and the access gate
mod common;

use axum::http::StatusCode;
use common::{body_json, location, set_cookies, token_of, TestContext};
use parley_shared::identity::IdentityStore;
use parley_shared::models::provider_account::{NewProviderAccount, ProviderTokens};
use parley_shared::models::user::{Role, UpdateUser};

async fn disable(ctx: &TestContext, user_id: uuid::Uuid) {
    ctx.store
        .update_user(
            user_id,
            UpdateUser {
                disabled: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::new();

    let response = ctx.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "connected");
    assert_eq!(json["providers"], serde_json::json!([]));
}

#[tokio::test]
async fn test_every_response_is_uncacheable() {
    let ctx = TestContext::new();

    for response in [ctx.get("/health", None).await, ctx.get("/user", None).await] {
        let headers = response.headers();
        assert_eq!(
            headers.get("Cache-Control").unwrap(),
            "no-cache, no-store, must-revalidate, max-age=0"
        );
        assert_eq!(headers.get("Pragma").unwrap(), "no-cache");
        assert_eq!(headers.get("Expires").unwrap(), "0");
    }
}

#[tokio::test]
async fn test_session_cookie_attributes() {
    let ctx = TestContext::new();
    ctx.create_user("ada@example.com", Role::User, true).await;

    let response = ctx
        .post_form(
            "/login",
            &common::form(&[("email", "ada@example.com"), ("password", common::PASSWORD)]),
            None,
        )
        .await;
    let cookie = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with("parley.session-token="))
        .unwrap();

    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Expires="));
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn test_anonymous_is_sent_to_sign_in() {
    let ctx = TestContext::new();

    for path in ["/user", "/dashboard", "/post-auth"] {
        let response = ctx.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", path);
        assert_eq!(location(&response), "/login", "{}", path);
    }

    let response = ctx.get("/api/me", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_landing_pages_redirect_wrong_role() {
    let ctx = TestContext::new();
    let (_, admin) = ctx.signed_in_user("admin@example.com", Role::Admin).await;
    let (_, user) = ctx.signed_in_user("user@example.com", Role::User).await;

    let response = ctx.get("/user", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");

    let response = ctx.get("/dashboard", Some(&user)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/user");

    let response = ctx.get("/dashboard", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["page"], "dashboard");
    assert_eq!(json["viewer"]["user"]["role"], "admin");
    assert!(json["viewer"].get("session_token").is_none());

    let response = ctx.get("/user", Some(&user)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["page"], "user");
}

#[tokio::test]
async fn test_post_auth_uses_current_role() {
    let ctx = TestContext::new();
    let (user, cookie) = ctx.signed_in_user("ada@example.com", Role::User).await;

    let response = ctx.get("/post-auth", Some(&cookie)).await;
    assert_eq!(location(&response), "/user");

    ctx.store
        .update_user(
            user.id,
            UpdateUser {
                role: Some(Role::Admin),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let response = ctx.get("/post-auth", Some(&cookie)).await;
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn test_disabled_user_is_signed_out() {
    let ctx = TestContext::new();
    let (user, cookie) = ctx.signed_in_user("ada@example.com", Role::User).await;
    disable(&ctx, user.id).await;

    let response = ctx.get("/user", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?error=disabled");
    assert!(set_cookies(&response)
        .iter()
        .any(|c| c.starts_with("parley.session-token=;") && c.contains("Max-Age=0")));

    // The session was revoked server-side
    assert_eq!(ctx.store.session_count().await, 0);
}

#[tokio::test]
async fn test_disabled_user_post_auth() {
    let ctx = TestContext::new();
    let (user, cookie) = ctx.signed_in_user("ada@example.com", Role::User).await;
    disable(&ctx, user.id).await;

    let response = ctx.get("/post-auth", Some(&cookie)).await;
    assert_eq!(location(&response), "/login?error=disabled");
    assert_eq!(ctx.store.session_count().await, 0);
}

#[tokio::test]
async fn test_logout_revokes_and_clears() {
    let ctx = TestContext::new();
    let (_, cookie) = ctx.signed_in_user("ada@example.com", Role::User).await;

    let response = ctx.post_form("/logout", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let cleared = set_cookies(&response);
    assert!(cleared.iter().any(|c| c.starts_with("parley.session-token=;")));
    assert!(cleared.iter().any(|c| c.starts_with("parley.oauth-state=;")));

    assert_eq!(ctx.store.session_count().await, 0);
    assert_eq!(ctx.get("/api/me", Some(&cookie)).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_session_still_redirects() {
    let ctx = TestContext::new();

    let response = ctx.get("/logout", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(set_cookies(&response).len(), 2);
}

#[tokio::test]
async fn test_bearer_token_resolves() {
    let ctx = TestContext::new();
    let (_, cookie) = ctx.signed_in_user("ada@example.com", Role::User).await;

    let response = ctx.get_with_bearer("/api/me", token_of(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user"]["email"], "ada@example.com");
    assert_eq!(json["source"], "bearer");
}

#[tokio::test]
async fn test_cookie_wins_over_bearer() {
    let ctx = TestContext::new();
    let (_, ada) = ctx.signed_in_user("ada@example.com", Role::User).await;
    let (_, bob) = ctx.signed_in_user("bob@example.com", Role::User).await;

    let request = axum::http::Request::builder()
        .uri("/api/me")
        .header("Cookie", &ada)
        .header("Authorization", format!("Bearer {}", token_of(&bob)))
        .body(axum::body::Body::empty())
        .unwrap();
    let json = body_json(ctx.send(request).await).await;
    assert_eq!(json["user"]["email"], "ada@example.com");
    assert_eq!(json["source"], "cookie");
}

#[tokio::test]
async fn test_stale_cookie_falls_back_to_bearer() {
    let ctx = TestContext::new();
    let (_, bob) = ctx.signed_in_user("bob@example.com", Role::User).await;

    let request = axum::http::Request::builder()
        .uri("/api/me")
        .header("Cookie", "parley.session-token=0000")
        .header("Authorization", format!("Bearer {}", token_of(&bob)))
        .body(axum::body::Body::empty())
        .unwrap();
    let json = body_json(ctx.send(request).await).await;
    assert_eq!(json["user"]["email"], "bob@example.com");
    assert_eq!(json["source"], "bearer");
}

#[tokio::test]
async fn test_me_lists_linked_providers() {
    let ctx = TestContext::new();
    let (user, cookie) = ctx.signed_in_user("ada@example.com", Role::User).await;
    ctx.store
        .link_provider_account(NewProviderAccount {
            provider: "github".to_string(),
            provider_account_id: "42".to_string(),
            user_id: user.id,
            tokens: ProviderTokens::default(),
        })
        .await
        .unwrap();

    let json = body_json(ctx.get("/api/me", Some(&cookie)).await).await;
    assert_eq!(json["providers"], serde_json::json!(["github"]));
}
