/// PostgreSQL identity store tests
///
/// Exercise the transactional store methods against a real database. Skipped
/// when DATABASE_URL is not set.

use chrono::{Duration, Utc};
use parley_shared::db::migrations::{ensure_database_exists, run_migrations};
use parley_shared::db::pool::{create_pool, DatabaseConfig};
use parley_shared::identity::postgres::PgIdentityStore;
use parley_shared::identity::store::IdentityStore;
use parley_shared::models::provider_account::{ProviderLink, ProviderTokens};
use parley_shared::models::user::{NewUser, UpdateUser};
use parley_shared::models::verification_code::NewVerificationCode;
use std::env;
use uuid::Uuid;

async fn store() -> Option<PgIdentityStore> {
    let url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set; skipping");
            return None;
        }
    };

    ensure_database_exists(&url).await.expect("Failed to create database");
    let pool = create_pool(DatabaseConfig {
        url,
        ..Default::default()
    })
    .await
    .expect("Failed to create pool");
    run_migrations(&pool).await.expect("Migrations failed");
    Some(PgIdentityStore::new(pool))
}

fn unique_email() -> String {
    format!("user-{}@example.com", Uuid::new_v4())
}

fn link(id: &str) -> ProviderLink {
    ProviderLink {
        provider: "github".to_string(),
        provider_account_id: id.to_string(),
        tokens: ProviderTokens::default(),
    }
}

#[tokio::test]
async fn test_duplicate_email_is_reported() {
    let Some(store) = store().await else { return };
    let email = unique_email();

    store.create_user(NewUser::with_password(&email, "hash")).await.unwrap();
    let err = store
        .create_user(NewUser::with_password(&email.to_uppercase(), "hash"))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());
}

#[tokio::test]
async fn test_create_user_with_account_rolls_back() {
    let Some(store) = store().await else { return };
    let email = unique_email();
    store.create_user(NewUser::with_password(&email, "hash")).await.unwrap();

    let account_id = Uuid::new_v4().to_string();
    let err = store
        .create_user_with_account(
            NewUser {
                email: email.clone(),
                ..Default::default()
            },
            link(&account_id),
        )
        .await
        .unwrap_err();
    assert!(err.is_duplicate());
    assert!(store.find_provider_account("github", &account_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_replace_code_keeps_only_latest() {
    let Some(store) = store().await else { return };
    let email = unique_email();
    let expires_at = Utc::now() + Duration::minutes(10);

    for code in ["111111", "222222"] {
        store
            .replace_verification_code(NewVerificationCode {
                identifier: email.clone(),
                code: code.to_string(),
                expires_at,
            })
            .await
            .unwrap();
    }

    assert!(store.find_verification_code(&email, "111111").await.unwrap().is_none());
    assert!(store.take_verification_code(&email, "222222").await.unwrap().is_some());
    assert!(store.take_verification_code(&email, "222222").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_revoking_sessions_keeps_one() {
    let Some(store) = store().await else { return };
    let user = store
        .create_user(NewUser::with_password(&unique_email(), "hash"))
        .await
        .unwrap();
    let expires_at = Utc::now() + Duration::days(30);

    let keep = format!("keep-{}", Uuid::new_v4());
    let drop = format!("drop-{}", Uuid::new_v4());
    store.insert_session(&keep, user.id, expires_at).await.unwrap();
    store.insert_session(&drop, user.id, expires_at).await.unwrap();

    let updated = store
        .update_user_revoking_sessions(
            user.id,
            UpdateUser {
                disabled: Some(true),
                ..Default::default()
            },
            Some(&keep),
        )
        .await
        .unwrap()
        .unwrap();

    assert!(updated.disabled);
    assert!(store.find_session(&keep).await.unwrap().is_some());
    assert!(store.find_session(&drop).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_attempts_discard_code() {
    let Some(store) = store().await else { return };
    let email = unique_email();
    let expires_at = Utc::now() + Duration::minutes(10);
    store
        .replace_verification_code(NewVerificationCode {
            identifier: email.clone(),
            code: "123456".to_string(),
            expires_at,
        })
        .await
        .unwrap();

    assert!(!store.record_failed_code_attempt(&email, 2).await.unwrap());
    assert!(store.find_verification_code(&email, "123456").await.unwrap().is_some());
    assert!(store.record_failed_code_attempt(&email, 2).await.unwrap());
    assert!(store.find_verification_code(&email, "123456").await.unwrap().is_none());
}

#[tokio::test]
async fn test_purge_keeps_code_at_expiry() {
    let Some(store) = store().await else { return };
    let email = unique_email();
    let expires_at = Utc::now() - Duration::days(365);
    store
        .replace_verification_code(NewVerificationCode {
            identifier: email.clone(),
            code: "123456".to_string(),
            expires_at,
        })
        .await
        .unwrap();

    store.purge_expired_codes(expires_at).await.unwrap();
    assert!(store.find_verification_code(&email, "123456").await.unwrap().is_some());

    store.purge_expired_codes(expires_at + Duration::seconds(1)).await.unwrap();
    assert!(store.find_verification_code(&email, "123456").await.unwrap().is_none());
}

#[tokio::test]
async fn test_claiming_link_clears_password_and_sessions() {
    let Some(store) = store().await else { return };
    let user = store
        .create_user(NewUser::with_password(&unique_email(), "hash"))
        .await
        .unwrap();
    let token = format!("squatter-{}", Uuid::new_v4());
    store
        .insert_session(&token, user.id, Utc::now() + Duration::days(1))
        .await
        .unwrap();

    let now = Utc::now();
    let (account, claimed) = store
        .link_provider_account_claiming(link(&Uuid::new_v4().to_string()).for_user(user.id), now)
        .await
        .unwrap();

    assert_eq!(account.user_id, user.id);
    assert!(claimed.password_hash.is_none());
    assert!(claimed.email_verified_at.is_some());
    assert!(store.find_session(&token).await.unwrap().is_none());
}
