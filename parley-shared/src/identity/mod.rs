/// Identity reconciliation engine
///
/// Decides how a sign-in attempt maps to a canonical user, how provider
/// accounts attach to users, how sessions live and die, and what a resolved
/// identity may access.
///
/// # Components
///
/// - [`credentials::CredentialVerifier`]: email + password
/// - [`codes::CodeManager`]: emailed one-time codes
/// - [`sessions::SessionManager`] and [`sessions::ResolverChain`]: session tokens
/// - [`linker::AccountLinker`]: OAuth sign-in reconciliation
/// - [`gate`]: role routing, disabled enforcement, admin guards
/// - [`service::IdentityService`]: the end-to-end flows built from the above
///
/// All persistence goes through the [`store::IdentityStore`] trait.
///
/// # Example
///
/// ```
/// use parley_shared::identity::{
///     config::IdentityConfig, linker::AssertedEmailSource, memory::MemoryIdentityStore,
///     service::IdentityService,
/// };
/// use parley_shared::mail::RecordingMailer;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mailer = Arc::new(RecordingMailer::new());
/// let service = IdentityService::new(
///     Arc::new(MemoryIdentityStore::new()),
///     mailer.clone(),
///     Arc::new(AssertedEmailSource),
///     IdentityConfig::default(),
/// );
///
/// let now = chrono::Utc::now();
/// service.register("ada@example.com", "correct horse", None, now).await?;
/// let code = mailer.last_code_for("ada@example.com").await.unwrap_or_default();
/// let signed_in = service.verify_email("ada@example.com", &code, now).await?;
/// assert_eq!(signed_in.destination().path(), "/user");
/// # Ok(())
/// # }
/// ```

pub mod codes;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod linker;
pub mod memory;
pub mod postgres;
pub mod service;
pub mod sessions;
pub mod store;

pub use config::IdentityConfig;
pub use error::{IdentityError, IdentityResult};
pub use gate::{Destination, Identity, Viewer};
pub use service::IdentityService;
pub use store::IdentityStore;
