//! Deterministic hashing used for two purposes in spec §3: turning an SDK
//! API key into its canonical cache lookup key (SHA-256 hex, never the
//! unhashed secret), and deriving a stream topic from an `EnvironmentId`.

use sha2::{Digest, Sha256};

/// Hashes an API key to the hex-encoded SHA-256 digest used as the canonical
/// `AuthRepo` lookup key. Never log or store the unhashed argument.
pub fn hash_api_key(api_key: &str) -> String {
    hex_digest(api_key.as_bytes())
}

/// A topic for the stream is the `EnvironmentID` itself (spec §3: "hashing
/// optional for privacy"); exposed separately so callers that do want the
/// hashed form for privacy can opt in without re-deriving it by hand.
pub fn topic_for_environment(environment_id: &str) -> String {
    environment_id.to_string()
}

pub fn hashed_topic_for_environment(environment_id: &str) -> String {
    hex_digest(environment_id.as_bytes())
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_api_key("key1"), hash_api_key("key1"));
    }

    #[test]
    fn different_keys_hash_differently() {
        assert_ne!(hash_api_key("key1"), hash_api_key("key2"));
    }

    #[test]
    fn hash_is_lowercase_hex_of_correct_length() {
        let hashed = hash_api_key("key1");
        assert_eq!(hashed.len(), 64);
        assert!(hashed.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn known_vector_matches_sha256() {
        // echo -n "abc" | sha256sum
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
