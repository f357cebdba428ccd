/// Session token generation and hashing
///
/// Tokens are 43 base62 characters (about 256 bits of entropy). Only the
/// SHA-256 digest is persisted, so a leaked sessions table cannot be replayed.
///
/// # Example
///
/// ```
/// use parley_shared::auth::token::{generate_session_token, hash_session_token, SESSION_TOKEN_LENGTH};
///
/// let (token, hash) = generate_session_token();
/// assert_eq!(token.len(), SESSION_TOKEN_LENGTH);
/// assert_eq!(hash, hash_session_token(&token));
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of a session token in characters
pub const SESSION_TOKEN_LENGTH: usize = 43;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a new session token
///
/// # Returns
///
/// Tuple of (plaintext_token, sha256_hex)
pub fn generate_session_token() -> (String, String) {
    let token = generate_random_string(SESSION_TOKEN_LENGTH);
    let hash = hash_session_token(&token);
    (token, hash)
}

/// Random base62 string from the thread-local CSPRNG
pub fn generate_random_string(length: usize) -> String {
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Hex-encoded SHA-256 of a token
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cheap shape check run before touching storage
pub fn is_well_formed(token: &str) -> bool {
    token.len() == SESSION_TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_session_token() {
        let (token, hash) = generate_session_token();

        assert_eq!(token.len(), SESSION_TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_session_token(&token));
    }

    #[test]
    fn test_tokens_are_unique() {
        let (a, _) = generate_session_token();
        let (b, _) = generate_session_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_session_token("abc"), hash_session_token("abc"));
        assert_ne!(hash_session_token("abc"), hash_session_token("abd"));
        assert_eq!(
            hash_session_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_is_well_formed() {
        let (token, _) = generate_session_token();
        assert!(is_well_formed(&token));
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed(&format!("{}!", &token[1..])));
    }
}
