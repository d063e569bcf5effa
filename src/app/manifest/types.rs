//! Manifest entry type and body parsing

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{ManifestError, ManifestResult};

/// One file the update service declares as part of the application
///
/// `expected_hash` is kept as the server sent it; it is compared
/// case-insensitively against local digests and never parsed up front, so a
/// malformed value simply never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the install root, `/`-separated
    pub name: String,
    /// Expected SHA-1 as hex
    #[serde(rename = "hash")]
    pub expected_hash: String,
    /// Declared size in bytes; advisory only
    #[serde(rename = "size")]
    pub expected_size: u64,
}

/// Parse a manifest body
///
/// The body must be a JSON array. Entries are decoded in order; the first
/// entry that does not decode ends parsing and the entries decoded so far are
/// returned.
///
/// Any other body is [`ManifestError::InvalidFormat`] and stops the run. It is
/// deliberately not read as an empty manifest, so a garbled response can never
/// pass for an up-to-date install and go on to start the application.
pub fn parse_manifest(body: &[u8]) -> ManifestResult<Vec<ManifestEntry>> {
    let items: Vec<serde_json::Value> =
        serde_json::from_slice(body).map_err(|e| ManifestError::InvalidFormat {
            reason: e.to_string(),
        })?;

    let total = items.len();
    let mut entries = Vec::with_capacity(total);

    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<ManifestEntry>(item) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(
                    "Manifest entry {} of {} is malformed ({}); keeping the first {} entries",
                    index + 1,
                    total,
                    e,
                    entries.len()
                );
                break;
            }
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_order() {
        let body = br#"[
            {"name": "b.txt", "hash": "H2", "size": 20},
            {"name": "a.txt", "hash": "H1", "size": 10}
        ]"#;

        let entries = parse_manifest(body).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
        assert_eq!(entries[0].expected_hash, "H2");
        assert_eq!(entries[1].expected_size, 10);
    }

    #[test]
    fn test_malformed_entry_truncates() {
        let body = br#"[
            {"name": "a.txt", "hash": "H1", "size": 10},
            {"name": "b.txt", "hash": "H2"},
            {"name": "c.txt", "hash": "H3", "size": 30}
        ]"#;

        let entries = parse_manifest(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.txt");
    }

    #[test]
    fn test_negative_size_is_malformed() {
        let body = br#"[{"name": "a.txt", "hash": "H1", "size": -1}]"#;
        assert!(parse_manifest(body).unwrap().is_empty());
    }

    #[test]
    fn test_extra_fields_ignored() {
        let body = br#"[{"name": "a.txt", "hash": "H1", "size": 1, "mode": "0755"}]"#;
        assert_eq!(parse_manifest(body).unwrap().len(), 1);
    }

    #[test]
    fn test_non_array_body_is_invalid() {
        assert!(matches!(
            parse_manifest(b"{\"name\": \"a\"}"),
            Err(ManifestError::InvalidFormat { .. })
        ));
        assert!(matches!(
            parse_manifest(b"<html>oops</html>"),
            Err(ManifestError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_empty_array() {
        assert!(parse_manifest(b"[]").unwrap().is_empty());
    }
}
