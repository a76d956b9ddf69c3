//! Per-source provenance blobs.
//!
//! Every enrichment call records where a piece of metadata came from: the
//! source tag, the request URL, a timestamp, and the raw payload. The map is
//! serialized to a single JSON text column keyed by source tag.
//!
//! Reads are tolerant by design (schema-on-write): unknown fields are kept in
//! the payload, and legacy entries that are bare strings or unwrapped JSON
//! objects are lifted into [`ProvenanceEntry`] form instead of failing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provenance for one enrichment call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    /// Request URL that produced the payload.
    #[serde(default)]
    pub url: Option<String>,
    /// When the call was made (ISO-8601 UTC).
    #[serde(default)]
    pub retrieved_at: Option<String>,
    /// HTTP status of the response, when applicable.
    #[serde(default)]
    pub status: Option<u16>,
    /// Raw response payload as returned by the source.
    #[serde(default)]
    pub payload: Value,
}

impl ProvenanceEntry {
    /// Creates an entry for a successful call.
    #[must_use]
    pub fn new(url: impl Into<String>, retrieved_at: impl Into<String>, payload: Value) -> Self {
        Self {
            url: Some(url.into()),
            retrieved_at: Some(retrieved_at.into()),
            status: None,
            payload,
        }
    }

    /// Attaches the HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Map from source tag (e.g. `"crossref"`) to its provenance entry.
pub type ProvenanceMap = BTreeMap<String, ProvenanceEntry>;

/// Serializes a provenance map to its column form.
///
/// # Errors
///
/// Returns the underlying serde error; the map contains only JSON-safe data
/// so this cannot fail in practice.
pub fn to_column(map: &ProvenanceMap) -> Result<String, serde_json::Error> {
    serde_json::to_string(map)
}

/// Parses the provenance column, lifting legacy shapes.
///
/// - `null`/empty → empty map
/// - entry is a string → wrapped as the payload of an entry
/// - entry is an object without the envelope fields → used as the payload
#[must_use]
pub fn from_column(raw: Option<&str>) -> ProvenanceMap {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return ProvenanceMap::new();
    };
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return ProvenanceMap::new();
    };
    let Value::Object(entries) = value else {
        return ProvenanceMap::new();
    };

    entries
        .into_iter()
        .map(|(source, entry)| {
            let lifted = match serde_json::from_value::<ProvenanceEntry>(entry.clone()) {
                Ok(parsed) if looks_like_envelope(&entry) => parsed,
                _ => ProvenanceEntry {
                    url: None,
                    retrieved_at: None,
                    status: None,
                    payload: entry,
                },
            };
            (source, lifted)
        })
        .collect()
}

/// True when the JSON object carries at least one envelope field, so plain
/// payload objects are not mistaken for entries.
fn looks_like_envelope(value: &Value) -> bool {
    value.as_object().is_some_and(|obj| {
        obj.contains_key("payload")
            || obj.contains_key("retrieved_at")
            || obj.contains_key("url")
    })
}
