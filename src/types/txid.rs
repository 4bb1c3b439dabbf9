//! Canonical transaction ids
//!
//! Collaborators hand back submitted-transaction identifiers in several
//! shapes: a bare string, `{signature}`, `{txid}`, `{id}`, `{hash}`, or one
//! of those wrapped once more (`{txid: {signature}}`). `TxId::from_sdk_value`
//! is the single mapping from those shapes to a string id; any other shape is
//! an error, never a stringified object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields probed on object-shaped ids, highest priority first
pub const ID_FIELDS: [&str; 4] = ["signature", "txid", "id", "hash"];

/// How many characters of an unmapped shape end up in the error
const PREVIEW_LEN: usize = 64;

/// Nesting depth accepted below the top-level value
const MAX_NESTING: usize = 1;

/// A transaction identifier as the originating chain prints it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    /// Wrap a non-empty id
    pub fn new(id: impl Into<String>) -> Result<Self, UnmappedShape> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(UnmappedShape::new("empty string"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Map a collaborator response entry to an id
    pub fn from_sdk_value(value: &Value) -> Result<Self, UnmappedShape> {
        Self::probe(value, 0).ok_or_else(|| UnmappedShape::of(value))
    }

    fn probe(value: &Value, depth: usize) -> Option<Self> {
        match value {
            Value::String(s) => Self::new(s.as_str()).ok(),
            Value::Object(map) if depth <= MAX_NESTING => ID_FIELDS
                .iter()
                .find_map(|field| map.get(*field))
                .and_then(|inner| Self::probe(inner, depth + 1)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<solana_sdk::signature::Signature> for TxId {
    fn from(signature: solana_sdk::signature::Signature) -> Self {
        Self(signature.to_string())
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A response entry that matched no row of the mapping table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot read a transaction id from {preview}")]
pub struct UnmappedShape {
    /// Bounded rendering of the offending value
    pub preview: String,
}

impl UnmappedShape {
    fn new(preview: impl Into<String>) -> Self {
        Self {
            preview: preview.into(),
        }
    }

    fn of(value: &Value) -> Self {
        let rendered = value.to_string();
        let preview = if rendered.chars().count() > PREVIEW_LEN {
            let head: String = rendered.chars().take(PREVIEW_LEN).collect();
            format!("{}...", head)
        } else {
            rendered
        };
        Self::new(preview)
    }
}

impl From<UnmappedShape> for crate::common::BridgeError {
    fn from(e: UnmappedShape) -> Self {
        crate::common::BridgeError::UnmappedResponse(e.preview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_string() {
        let id = TxId::from_sdk_value(&json!("abc123")).unwrap();
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn test_signature_field() {
        let id = TxId::from_sdk_value(&json!({"signature": "abc123"})).unwrap();
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn test_each_known_field() {
        for field in ID_FIELDS {
            let mut map = serde_json::Map::new();
            map.insert(field.to_string(), json!("5ig"));
            let value = Value::Object(map);
            assert_eq!(TxId::from_sdk_value(&value).unwrap().as_str(), "5ig");
        }
    }

    #[test]
    fn test_field_priority() {
        let value = json!({"id": "third", "txid": "second", "signature": "first"});
        assert_eq!(TxId::from_sdk_value(&value).unwrap().as_str(), "first");

        let value = json!({"id": "third", "txid": "second", "chain": "Solana"});
        assert_eq!(TxId::from_sdk_value(&value).unwrap().as_str(), "second");
    }

    #[test]
    fn test_one_level_of_nesting() {
        let value = json!({"chain": "Solana", "txid": {"signature": "nested"}});
        assert_eq!(TxId::from_sdk_value(&value).unwrap().as_str(), "nested");

        let too_deep = json!({"txid": {"txid": {"signature": "deep"}}});
        assert!(TxId::from_sdk_value(&too_deep).is_err());
    }

    #[test]
    fn test_higher_priority_field_with_bad_value_is_not_skipped() {
        // The first present field decides; a non-string there is unmapped
        let value = json!({"signature": 42, "txid": "fallback"});
        assert!(TxId::from_sdk_value(&value).is_err());
    }

    #[test]
    fn test_unmapped_shapes() {
        for value in [
            json!(""),
            json!("   "),
            json!(42),
            json!(null),
            json!(["abc"]),
            json!({"chain": "Solana"}),
            json!({"signature": ""}),
        ] {
            assert!(TxId::from_sdk_value(&value).is_err(), "{} mapped", value);
        }
    }

    #[test]
    fn test_preview_is_bounded() {
        let big = json!({ "blob": "x".repeat(500) });
        // "blob" is not an id field, so this is unmapped with a long rendering
        let err = TxId::from_sdk_value(&big).unwrap_err();
        assert!(err.preview.chars().count() <= PREVIEW_LEN + 3);
        assert!(!err.preview.contains("[object Object]"));
    }
}
