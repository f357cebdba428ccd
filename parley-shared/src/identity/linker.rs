/// Provider account linker
///
/// Decides what an OAuth sign-in means for the local user table. The rules
/// are applied in a fixed order and the first one that matches wins:
///
/// 1. The external identity is already linked: sign in as its owner. No email
///    checks run, so a provider changing the address later does not matter.
/// 2. Without a verified email the attempt is rejected.
/// 3. A user with that email exists: link the external identity to them.
/// 4. Otherwise a new user must be created.
///
/// A uniqueness violation while linking means another request won the race;
/// it becomes [`LinkDecision::RejectLinkConflict`] rather than an error.

use super::error::{IdentityError, IdentityResult};
use super::store::{IdentityStore, StoreError};
use crate::models::provider_account::{ProviderLink, ProviderTokens};
use crate::models::user::{normalize_email, NewUser, UpdateUser, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Profile reported by an OAuth provider after a successful exchange
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderIdentity {
    pub provider: String,
    pub provider_account_id: String,
    pub email: Option<String>,
    /// `Some(true)` only when the provider vouches for the address
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub tokens: ProviderTokens,
}

impl ProviderIdentity {
    pub fn link(&self) -> ProviderLink {
        ProviderLink {
            provider: self.provider.clone(),
            provider_account_id: self.provider_account_id.clone(),
            tokens: self.tokens.clone(),
        }
    }
}

/// Finds an email address the provider has verified
#[async_trait]
pub trait VerifiedEmailSource: Send + Sync {
    async fn verified_email(&self, identity: &ProviderIdentity) -> anyhow::Result<Option<String>>;
}

/// Trusts only the provider's own `email_verified` assertion
#[derive(Debug, Clone, Copy, Default)]
pub struct AssertedEmailSource;

#[async_trait]
impl VerifiedEmailSource for AssertedEmailSource {
    async fn verified_email(&self, identity: &ProviderIdentity) -> anyhow::Result<Option<String>> {
        Ok(asserted_email(identity))
    }
}

/// The profile email when the provider asserted it is verified
pub fn asserted_email(identity: &ProviderIdentity) -> Option<String> {
    match (&identity.email, identity.email_verified) {
        (Some(email), Some(true)) if !email.trim().is_empty() => Some(email.clone()),
        _ => None,
    }
}

/// Outcome of reconciling a provider sign-in
#[derive(Debug, Clone, PartialEq)]
pub enum LinkDecision {
    /// The external identity was already linked to this user
    ExistingAccountLogin(User),
    /// The external identity has just been linked to this existing user
    LinkToExistingUser(User),
    /// Nobody owns this verified email yet
    CreateNewUser { email: String },
    RejectUnverifiedEmail,
    RejectLinkConflict,
}

pub struct AccountLinker {
    store: Arc<dyn IdentityStore>,
    emails: Arc<dyn VerifiedEmailSource>,
}

impl AccountLinker {
    pub fn new(store: Arc<dyn IdentityStore>, emails: Arc<dyn VerifiedEmailSource>) -> Self {
        Self { store, emails }
    }

    /// Decides how a provider sign-in maps onto local users
    ///
    /// Linking to a user whose email was never verified also claims that
    /// user: the email is marked verified at `now` and any password set by
    /// whoever registered the address is discarded.
    pub async fn reconcile(&self, identity: &ProviderIdentity, now: DateTime<Utc>) -> IdentityResult<LinkDecision> {
        if let Some(account) = self
            .store
            .find_provider_account(&identity.provider, &identity.provider_account_id)
            .await?
        {
            let user = self
                .store
                .find_user_by_id(account.user_id)
                .await?
                .ok_or_else(|| IdentityError::NotFound("User".to_string()))?;
            return Ok(LinkDecision::ExistingAccountLogin(user));
        }

        let email = match self.emails.verified_email(identity).await {
            Ok(Some(email)) => normalize_email(&email),
            Ok(None) => return Ok(LinkDecision::RejectUnverifiedEmail),
            Err(e) => {
                tracing::warn!(provider = %identity.provider, error = %e, "Verified email lookup failed");
                return Ok(LinkDecision::RejectUnverifiedEmail);
            }
        };
        if email.is_empty() {
            return Ok(LinkDecision::RejectUnverifiedEmail);
        }

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => return Ok(LinkDecision::CreateNewUser { email }),
        };

        let data = identity.link().for_user(user.id);
        let linked = if user.is_email_verified() {
            self.store.link_provider_account(data).await.map(|_| user.clone())
        } else {
            self.store
                .link_provider_account_claiming(data, now)
                .await
                .map(|(_, claimed)| claimed)
        };

        match linked {
            Ok(linked) => {
                tracing::info!(
                    user_id = %linked.id,
                    provider = %identity.provider,
                    claimed = !user.is_email_verified(),
                    "Linked provider account to existing user"
                );
                Ok(LinkDecision::LinkToExistingUser(linked))
            }
            Err(StoreError::Duplicate { constraint }) => {
                tracing::warn!(
                    user_id = %user.id,
                    provider = %identity.provider,
                    constraint = %constraint,
                    "Provider account link conflict"
                );
                Ok(LinkDecision::RejectLinkConflict)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Prefers the provider's value, falls back to the stored one, never blanks
pub fn merge_value(provider: Option<&str>, stored: Option<&str>) -> Option<String> {
    provider
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or(stored)
        .map(str::to_string)
}

/// Name and image changes needed to sync `stored` with the provider profile
pub fn profile_update(stored: &User, identity: &ProviderIdentity) -> UpdateUser {
    let mut update = UpdateUser::default();

    let name = merge_value(identity.name.as_deref(), stored.name.as_deref());
    if name != stored.name {
        update.name = Some(name);
    }

    let image = merge_value(identity.image.as_deref(), stored.image.as_deref());
    if image != stored.image {
        update.image = Some(image);
    }

    update
}

/// User record for a first-time provider sign-in
pub fn new_user_from(identity: &ProviderIdentity, email: &str, now: DateTime<Utc>) -> NewUser {
    NewUser {
        email: normalize_email(email),
        name: merge_value(identity.name.as_deref(), None),
        image: merge_value(identity.image.as_deref(), None),
        password_hash: None,
        email_verified_at: Some(now),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::memory::MemoryIdentityStore;
    use crate::models::user::Role;

    struct FailingEmailSource;

    #[async_trait]
    impl VerifiedEmailSource for FailingEmailSource {
        async fn verified_email(&self, _: &ProviderIdentity) -> anyhow::Result<Option<String>> {
            anyhow::bail!("emails endpoint returned 500")
        }
    }

    /// Another request links the same external account while the email lookup runs
    struct RacingEmailSource {
        store: Arc<MemoryIdentityStore>,
        owner: uuid::Uuid,
    }

    #[async_trait]
    impl VerifiedEmailSource for RacingEmailSource {
        async fn verified_email(&self, identity: &ProviderIdentity) -> anyhow::Result<Option<String>> {
            self.store
                .link_provider_account(identity.link().for_user(self.owner))
                .await?;
            Ok(asserted_email(identity))
        }
    }

    fn google(sub: &str, email: &str, verified: bool) -> ProviderIdentity {
        ProviderIdentity {
            provider: "google".to_string(),
            provider_account_id: sub.to_string(),
            email: Some(email.to_string()),
            email_verified: Some(verified),
            name: Some("Grace".to_string()),
            image: None,
            tokens: ProviderTokens::default(),
        }
    }

    fn linker(store: Arc<MemoryIdentityStore>) -> AccountLinker {
        AccountLinker::new(store, Arc::new(AssertedEmailSource))
    }

    #[tokio::test]
    async fn test_existing_link_skips_email_checks() {
        let store = Arc::new(MemoryIdentityStore::new());
        let user = store
            .create_user(NewUser::with_password("g@test.com", "hash"))
            .await
            .unwrap();
        store
            .link_provider_account(google("sub-1", "g@test.com", true).link().for_user(user.id))
            .await
            .unwrap();

        // Provider now reports a different, unverified address
        let decision = linker(store)
            .reconcile(&google("sub-1", "changed@test.com", false), Utc::now())
            .await
            .unwrap();
        assert_eq!(decision, LinkDecision::ExistingAccountLogin(user));
    }

    #[tokio::test]
    async fn test_unverified_email_rejected() {
        let store = Arc::new(MemoryIdentityStore::new());
        let decision = linker(store.clone())
            .reconcile(&google("sub-1", "g@test.com", false), Utc::now())
            .await
            .unwrap();
        assert_eq!(decision, LinkDecision::RejectUnverifiedEmail);

        let mut no_email = google("sub-2", "", true);
        no_email.email = None;
        assert_eq!(
            linker(store).reconcile(&no_email, Utc::now()).await.unwrap(),
            LinkDecision::RejectUnverifiedEmail
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_counts_as_unverified() {
        let store = Arc::new(MemoryIdentityStore::new());
        let linker = AccountLinker::new(store, Arc::new(FailingEmailSource));
        assert_eq!(
            linker.reconcile(&google("sub-1", "g@test.com", true), Utc::now()).await.unwrap(),
            LinkDecision::RejectUnverifiedEmail
        );
    }

    #[tokio::test]
    async fn test_links_to_existing_user_by_email() {
        let store = Arc::new(MemoryIdentityStore::new());
        let user = store
            .create_user(NewUser {
                email_verified_at: Some(Utc::now()),
                ..NewUser::with_password("g@test.com", "hash")
            })
            .await
            .unwrap();

        let decision = linker(store.clone())
            .reconcile(&google("sub-1", "G@Test.com", true), Utc::now())
            .await
            .unwrap();
        assert_eq!(decision, LinkDecision::LinkToExistingUser(user.clone()));

        let accounts = store.list_provider_accounts(user.id).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].provider_account_id, "sub-1");

        // Next sign-in goes through the link, even with an unverified email
        let decision = linker(store)
            .reconcile(&google("sub-1", "G@Test.com", false), Utc::now())
            .await
            .unwrap();
        assert_eq!(decision, LinkDecision::ExistingAccountLogin(user));
    }

    #[tokio::test]
    async fn test_link_claims_unverified_registration() {
        let store = Arc::new(MemoryIdentityStore::new());
        let now = Utc::now();
        let user = store
            .create_user(NewUser::with_password("g@test.com", "someone-elses-hash"))
            .await
            .unwrap();
        store
            .insert_session("squatter", user.id, now + chrono::Duration::days(1))
            .await
            .unwrap();

        let decision = linker(store.clone())
            .reconcile(&google("sub-1", "g@test.com", true), now)
            .await
            .unwrap();

        let LinkDecision::LinkToExistingUser(claimed) = decision else {
            panic!("expected a link, got {:?}", decision);
        };
        assert_eq!(claimed.id, user.id);
        assert_eq!(claimed.email_verified_at, Some(now));
        assert!(claimed.password_hash.is_none());
        assert!(store.find_session("squatter").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_link_is_a_conflict() {
        let store = Arc::new(MemoryIdentityStore::new());
        let now = Utc::now();
        let user = store
            .create_user(NewUser {
                email_verified_at: Some(now),
                ..NewUser::with_password("g@test.com", "hash")
            })
            .await
            .unwrap();
        let other = store
            .create_user(NewUser::with_password("other@test.com", "hash"))
            .await
            .unwrap();

        let linker = AccountLinker::new(
            store.clone(),
            Arc::new(RacingEmailSource {
                store: store.clone(),
                owner: other.id,
            }),
        );
        let decision = linker
            .reconcile(&google("sub-1", "g@test.com", true), now)
            .await
            .unwrap();
        assert_eq!(decision, LinkDecision::RejectLinkConflict);

        // The winner keeps the link and the loser is untouched
        let account = store.find_provider_account("google", "sub-1").await.unwrap().unwrap();
        assert_eq!(account.user_id, other.id);
        assert!(store.list_provider_accounts(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_claim_leaves_registration_alone() {
        let store = Arc::new(MemoryIdentityStore::new());
        let user = store
            .create_user(NewUser::with_password("g@test.com", "hash"))
            .await
            .unwrap();
        let other = store
            .create_user(NewUser::with_password("other@test.com", "hash"))
            .await
            .unwrap();

        let linker = AccountLinker::new(
            store.clone(),
            Arc::new(RacingEmailSource {
                store: store.clone(),
                owner: other.id,
            }),
        );
        let decision = linker
            .reconcile(&google("sub-1", "g@test.com", true), Utc::now())
            .await
            .unwrap();
        assert_eq!(decision, LinkDecision::RejectLinkConflict);

        let stored = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored, user);
    }

    #[tokio::test]
    async fn test_unknown_email_creates_user() {
        let store = Arc::new(MemoryIdentityStore::new());
        let decision = linker(store)
            .reconcile(&google("sub-1", "New@Test.com", true), Utc::now())
            .await
            .unwrap();
        assert_eq!(
            decision,
            LinkDecision::CreateNewUser {
                email: "new@test.com".to_string()
            }
        );
    }

    #[test]
    fn test_merge_never_blanks() {
        assert_eq!(merge_value(Some("New"), Some("Old")), Some("New".to_string()));
        assert_eq!(merge_value(Some("   "), Some("Old")), Some("Old".to_string()));
        assert_eq!(merge_value(None, Some("Old")), Some("Old".to_string()));
        assert_eq!(merge_value(None, None), None);
        assert_eq!(merge_value(Some(" Trim "), None), Some("Trim".to_string()));
    }

    #[test]
    fn test_profile_update_only_changes_what_differs() {
        let now = Utc::now();
        let stored = User {
            id: uuid::Uuid::new_v4(),
            name: Some("Grace".to_string()),
            email: "g@test.com".to_string(),
            email_verified_at: None,
            image: Some("https://old/avatar.png".to_string()),
            password_hash: None,
            role: Role::User,
            disabled: false,
            created_at: now,
            updated_at: now,
        };

        let mut identity = google("sub-1", "g@test.com", true);
        identity.image = Some("".to_string());
        assert!(profile_update(&stored, &identity).is_empty());

        identity.name = Some("Grace Hopper".to_string());
        let update = profile_update(&stored, &identity);
        assert_eq!(update.name, Some(Some("Grace Hopper".to_string())));
        assert!(update.image.is_none());
    }

    #[test]
    fn test_new_user_from_profile() {
        let now = Utc::now();
        let user = new_user_from(&google("sub", "X@Test.com", true), "X@Test.com", now);
        assert_eq!(user.email, "x@test.com");
        assert_eq!(user.email_verified_at, Some(now));
        assert_eq!(user.name.as_deref(), Some("Grace"));
        assert!(user.password_hash.is_none());
        assert_eq!(user.role, Role::User);
    }
}
