//! Opaque signing tokens handed to external signers.
//!
//! A token is a random alphanumeric string. Only its SHA-256 hash is stored;
//! the plaintext leaves the system once, inside the signing link.

use rand::distr::Alphanumeric;
use rand::Rng;

use crate::hashing::sha256_hex;

/// Length of the plaintext token in characters.
pub const TOKEN_LENGTH: usize = 48;

/// A freshly generated token and the hash to persist.
#[derive(Debug, Clone)]
pub struct GeneratedToken {
    pub plaintext: String,
    pub hash: String,
}

/// Generate a new random token.
pub fn generate_token() -> GeneratedToken {
    let plaintext: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect();
    let hash = hash_token(&plaintext);
    GeneratedToken { plaintext, hash }
}

/// Hash used to look a presented token up.
pub fn hash_token(plaintext: &str) -> String {
    sha256_hex(plaintext.trim().as_bytes())
}

/// Cheap shape check so obviously malformed input never reaches storage.
pub fn looks_like_token(candidate: &str) -> bool {
    let trimmed = candidate.trim();
    trimmed.len() == TOKEN_LENGTH && trimmed.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_shape() {
        let token = generate_token();
        assert_eq!(token.plaintext.len(), TOKEN_LENGTH);
        assert!(looks_like_token(&token.plaintext));
        assert_eq!(token.hash, hash_token(&token.plaintext));
        assert_eq!(token.hash.len(), 64);
    }

    #[test]
    fn tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let token = generate_token();
        let padded = format!(" {}\n", token.plaintext);
        assert_eq!(hash_token(&padded), token.hash);
        assert!(looks_like_token(&padded));
    }

    #[test]
    fn malformed_tokens_are_rejected_early() {
        assert!(!looks_like_token(""));
        assert!(!looks_like_token("short"));
        assert!(!looks_like_token(&"!".repeat(TOKEN_LENGTH)));
    }
}
