//! Derived resource names
//!
//! Names stored on the platform must be DNS labels (lowercase alphanumerics
//! and `-`, at most 63 characters). Long or unusual inputs are sanitized and
//! suffixed with a short content hash so distinct inputs stay distinct.

use crate::error::{CorralError, CorralResult};
use sha2::{Digest, Sha256};

/// Maximum length of a DNS label
pub const MAX_NAME_LEN: usize = 63;

/// Maximum length of an object or namespace name (DNS subdomain)
pub const MAX_OBJECT_NAME_LEN: usize = 253;

/// Short content hash: first 12 hex characters of SHA256
fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..6])
}

fn sanitize(input: &str) -> String {
    let mut out: String = input
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    while out.contains("--") {
        out = out.replace("--", "-");
    }
    out.trim_matches('-').to_string()
}

/// Build a DNS-safe name from a prefix and parts.
///
/// The plain join is used when it is already a valid label; otherwise the
/// sanitized join is truncated and a hash of the original input appended.
pub fn resource_name(prefix: &str, parts: &[&str]) -> String {
    let joined = std::iter::once(prefix)
        .chain(parts.iter().copied())
        .collect::<Vec<_>>()
        .join("-");
    let clean = sanitize(&joined);

    if clean == joined && clean.len() <= MAX_NAME_LEN {
        return clean;
    }

    let hash = short_hash(&joined);
    let budget = MAX_NAME_LEN - hash.len() - 1;
    let head: String = clean.chars().take(budget).collect();
    format!("{}-{}", head.trim_end_matches('-'), hash)
}

/// Check that `name` is usable as an object or namespace name: lowercase
/// alphanumerics, `-` and `.`, starting and ending alphanumeric.
pub fn validate(what: &str, name: &str) -> CorralResult<()> {
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let valid = !name.is_empty()
        && name.len() <= MAX_OBJECT_NAME_LEN
        && name.chars().all(|c| alnum(c) || c == '-' || c == '.')
        && name.starts_with(alnum)
        && name.ends_with(alnum);

    if valid {
        Ok(())
    } else {
        Err(CorralError::invalid(format!(
            "invalid {} name '{}': use lowercase letters, digits, '-' and '.'",
            what, name
        )))
    }
}

/// Release name backing a service instance
pub fn service_release_name(service: &str) -> String {
    resource_name("xs", &[service])
}

/// Cache volume name owned by an application
pub fn cache_volume_name(namespace: &str, app: &str) -> String {
    resource_name("cache", &[namespace, app])
}
