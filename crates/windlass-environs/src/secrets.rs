//! Credential derivation

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha512};

/// Compatibility-frozen length of derived password hashes.
const HASH_LENGTH: usize = 24;

/// Derive the stored form of a user-supplied secret.
///
/// Agents and the control plane must derive the same value from the
/// same secret across releases, so the construction (SHA-512, base64,
/// truncated) is frozen.
pub fn password_hash(password: &str) -> String {
    let digest = Sha512::digest(password.as_bytes());
    let mut encoded = STANDARD.encode(digest);
    encoded.truncate(HASH_LENGTH);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_truncated() {
        let a = password_hash("admin-secret");
        let b = password_hash("admin-secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_LENGTH);
    }

    #[test]
    fn different_secrets_hash_differently() {
        assert_ne!(password_hash("one"), password_hash("two"));
    }

    #[test]
    fn hash_is_not_the_secret() {
        assert_ne!(password_hash("hunter2hunter2hunter2xxx"), "hunter2hunter2hunter2xxx");
    }
}
