//! Deterministic workspace identity.
//!
//! A workspace is one user's instance of one app definition. Its identifier
//! is a digest of the `(user, app_id)` pair, so repeated launches of the same
//! app by the same user always address the same backend objects, while the
//! same user can run several apps side by side.

use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a workspace id (80 bits).
const ID_BYTES: usize = 10;

/// Maximum length of a Kubernetes label value.
const MAX_LABEL_LEN: usize = 63;

/// Derive the workspace identifier for `user` running `app_id`.
///
/// The user name is length-prefixed before hashing so that no two distinct
/// pairs share the same hash input. The result is a valid DNS-1123 label.
pub fn workspace_id(user: &str, app_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update((user.len() as u64).to_be_bytes());
    hasher.update(user.as_bytes());
    hasher.update(app_id.as_bytes());
    let digest = hasher.finalize();

    let hex: String = digest[..ID_BYTES]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    format!("ws-{hex}")
}

/// Name of the Kubernetes service fronting a workspace pod.
pub fn service_name(workspace_id: &str) -> String {
    format!("{workspace_id}-service")
}

/// Escape an arbitrary user name into a Kubernetes label value.
///
/// Lowercase ASCII letters and digits pass through and every other byte
/// becomes `-xx` (its hex code). The result always carries a `u` prefix, so
/// distinct names never share a value and the label starts with an
/// alphanumeric character. Names too long for a label become `h` plus a
/// digest instead.
pub fn escape_label_value(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len() + 1);
    escaped.push('u');
    for byte in raw.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("-{byte:02x}"));
        }
    }

    if escaped.len() > MAX_LABEL_LEN {
        return format!("h{}", short_digest(raw));
    }
    escaped
}

fn short_digest(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    digest[..12].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_workspace_id_is_stable() {
        let first = workspace_id("alice@example.org", "3f2a9c");
        let second = workspace_id("alice@example.org", "3f2a9c");
        assert_eq!(first, second);
        assert_eq!(first.len(), 3 + ID_BYTES * 2);
        assert!(first.starts_with("ws-"));
    }

    #[test]
    fn test_workspace_id_distinguishes_pairs() {
        // "ab" + "c" and "a" + "bc" concatenate identically; the length
        // prefix keeps them apart.
        assert_ne!(workspace_id("ab", "c"), workspace_id("a", "bc"));

        let mut seen = HashSet::new();
        for user in ["alice", "bob", "carol@uni.edu"] {
            for app in ["app-a", "app-b", "app-c"] {
                assert!(seen.insert(workspace_id(user, app)));
            }
        }
    }

    #[test]
    fn test_service_name() {
        assert_eq!(service_name("ws-0011"), "ws-0011-service");
    }

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value("alice"), "ualice");
        assert_eq!(escape_label_value("Al.ice"), "u-41l-2eice");
        assert_eq!(escape_label_value("a@b.org"), "ua-40b-2eorg");
        assert_eq!(escape_label_value(""), "u");
    }

    #[test]
    fn test_escape_label_value_is_one_to_one() {
        assert_ne!(escape_label_value("A@x.org"), escape_label_value("uA@x.org"));
        assert_ne!(escape_label_value("-41"), escape_label_value("A"));

        let mut seen = HashSet::new();
        for user in ["A", "uA", "a", "ua", "-41", "u-41", "A@x.org", "uA@x.org", ""] {
            assert!(seen.insert(escape_label_value(user)), "collision for {user:?}");
        }
    }

    #[test]
    fn test_escape_label_value_long() {
        let long = "x".repeat(40) + "@" + &"y".repeat(40);
        let escaped = escape_label_value(&long);
        assert!(escaped.len() <= MAX_LABEL_LEN);
        assert!(escaped.starts_with('h'));
        assert_eq!(escaped, escape_label_value(&long));
        assert_ne!(escaped, escape_label_value(&(long.clone() + "z")));
    }
}
