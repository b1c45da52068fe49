use sha2::{Digest, Sha256};

use crate::domain::flow::{normalize_json, FlowDefinition};
use crate::domain::value_objects::Fingerprint;

/// Compute a SHA-256 fingerprint of a set of flow definitions.
///
/// Algorithm:
/// 1. Each definition is reduced to `(display_name, normalized trigger)` and
///    serialised to a canonical JSON string — the same normalization the
///    sync-equality rule uses, so two fingerprint-equal sets are also
///    pairwise sync-equal.
/// 2. The strings are sorted lexicographically so the fingerprint is stable
///    regardless of the order the store returned the flows in.
/// 3. All strings are joined with `\n` and hashed with SHA-256.
///
/// An empty set produces a well-defined fingerprint (hash of empty string).
pub fn fingerprint<'a>(definitions: impl IntoIterator<Item = &'a FlowDefinition>) -> Fingerprint {
    let mut entries: Vec<String> = definitions
        .into_iter()
        .map(|def| {
            serde_json::to_string(&serde_json::json!({
                "displayName": def.display_name,
                "trigger": normalize_json(&def.trigger),
            }))
            .unwrap_or_default()
        })
        .collect();

    entries.sort_unstable();

    let content = entries.join("\n");
    let hash = Sha256::digest(content.as_bytes());
    Fingerprint(format!("{:x}", hash))
}
