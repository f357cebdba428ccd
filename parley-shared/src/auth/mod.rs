/// Authentication primitives
///
/// - [`password`]: Argon2id password hashing and the password policy
/// - [`token`]: Session token generation and SHA-256 hashing
/// - [`oauth_state`]: Signed OAuth `state` tokens
///
/// These are stateless building blocks; the flows that combine them with
/// storage live in [`crate::identity`].

pub mod oauth_state;
pub mod password;
pub mod token;
