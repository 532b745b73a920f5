//! Authentication secrets for the command channel
//!
//! Every node carries a shared secret (a content digest) that doubles as its
//! sender/receiver token on the command channel. Secrets are generated once
//! when the node record is created and compared in constant time.

use sha2::{Digest, Sha256};

/// Length of the random seed in bytes (before digesting)
const SECRET_SEED_BYTES: usize = 32;

/// Generate a fresh node secret.
///
/// Returns the hex-encoded SHA-256 digest of 32 random bytes (64 chars).
pub fn generate_secret() -> String {
    use rand::Rng;
    let mut seed = [0u8; SECRET_SEED_BYTES];
    rand::thread_rng().fill(&mut seed);
    hex::encode(Sha256::digest(seed))
}

/// Compare two tokens in constant time.
///
/// Length mismatch returns false immediately; equal-length comparison does
/// not short-circuit, to avoid leaking the position of the first difference.
pub fn tokens_match(provided: &str, expected: &str) -> bool {
    if provided.len() != expected.len() {
        return false;
    }

    let mut result = 0u8;
    for (a, b) in provided.bytes().zip(expected.bytes()) {
        result |= a ^ b;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_secret_shape() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64); // Hex-encoded SHA-256
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_secret_unique() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn test_tokens_match() {
        let token = "abc123def456";
        assert!(tokens_match(token, token));
        assert!(!tokens_match(token, "different-str"));
        assert!(!tokens_match(token, "abc123def45")); // Different length
    }
}
