//! Object snapshot kept in private state
//!
//! The snapshot records the last values observed on the platform at object
//! scope, one scalar per attribute. It is stored as versioned JSON under a
//! single key of the host's private-state container:
//!
//! ```json
//! {"version": 1, "values": {"auto_suspend": 600, "warehouse_size": "XSMALL"}}
//! ```
//!
//! Null values are never written. Unknown attribute keys and unknown
//! top-level fields survive a decode/encode cycle.

use crate::error::{ProviderError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tfplug::PrivateStateData;

pub const SNAPSHOT_KEY: &str = "dataplatform_snapshot";
pub const SNAPSHOT_VERSION: u64 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    values: BTreeMap<String, Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSnapshot {
    values: BTreeMap<String, Value>,
    extra: Map<String, Value>,
}

impl ObjectSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the snapshot from a private-state blob; a blob without a
    /// snapshot yields an empty one
    pub fn decode(private: &[u8]) -> Result<Self> {
        let container = PrivateStateData::decode(private)
            .map_err(|e| ProviderError::PrivateStateCorrupt(e.to_string()))?;
        let Some(raw) = container.get_key(SNAPSHOT_KEY) else {
            return Ok(Self::new());
        };

        let envelope: Envelope = serde_json::from_slice(raw)
            .map_err(|e| ProviderError::PrivateStateCorrupt(format!("snapshot: {}", e)))?;
        if envelope.version > SNAPSHOT_VERSION {
            return Err(ProviderError::PrivateStateCorrupt(format!(
                "snapshot version {} is newer than supported version {}",
                envelope.version, SNAPSHOT_VERSION
            )));
        }

        let mut values = BTreeMap::new();
        for (key, value) in envelope.values {
            match value {
                Value::Null => {}
                Value::Array(_) | Value::Object(_) => {
                    return Err(ProviderError::PrivateStateCorrupt(format!(
                        "snapshot value for {} is not a scalar",
                        key
                    )))
                }
                scalar => {
                    values.insert(key, scalar);
                }
            }
        }

        Ok(Self {
            values,
            extra: envelope.extra,
        })
    }

    /// Like [`ObjectSnapshot::decode`], but a corrupt snapshot is replaced by
    /// an empty one. Used where a fresh snapshot is about to be written.
    pub fn decode_or_default(private: &[u8]) -> Self {
        Self::decode(private).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "discarding unreadable snapshot");
            Self::new()
        })
    }

    /// Write the snapshot into `private`, keeping any other keys the
    /// container holds
    pub fn encode(&self, private: &[u8]) -> Result<Vec<u8>> {
        let mut container = PrivateStateData::decode(private).unwrap_or_default();

        if self.values.is_empty() && self.extra.is_empty() {
            container.remove_key(SNAPSHOT_KEY);
        } else {
            let envelope = Envelope {
                version: SNAPSHOT_VERSION,
                values: self.values.clone(),
                extra: self.extra.clone(),
            };
            let raw = serde_json::to_vec(&envelope)
                .map_err(|e| ProviderError::PrivateStateCorrupt(format!("snapshot: {}", e)))?;
            container.set_key(SNAPSHOT_KEY, raw);
        }

        Ok(container.encode()?)
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }

    /// Record an attribute; `None` and JSON null remove it
    pub fn set(&mut self, attribute: &str, value: Option<Value>) {
        match value {
            Some(value) if !value.is_null() => {
                self.values.insert(attribute.to_string(), value);
            }
            _ => {
                self.values.remove(attribute);
            }
        }
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blob(snapshot: Value) -> Vec<u8> {
        let mut container = PrivateStateData::new();
        container.set_key(SNAPSHOT_KEY, serde_json::to_vec(&snapshot).unwrap());
        container.encode().unwrap()
    }

    #[test]
    fn empty_blob_is_empty_snapshot() {
        assert!(ObjectSnapshot::decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn encode_then_decode_is_identity() {
        let mut snapshot = ObjectSnapshot::new();
        snapshot.set("auto_suspend", Some(json!(600)));
        snapshot.set("warehouse_size", Some(json!("XSMALL")));
        snapshot.set("auto_resume", Some(json!(true)));

        let decoded = ObjectSnapshot::decode(&snapshot.encode(&[]).unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn nulls_are_omitted() {
        let mut snapshot = ObjectSnapshot::new();
        snapshot.set("comment", Some(json!("x")));
        snapshot.set("comment", Some(Value::Null));
        assert!(snapshot.is_empty());
        assert!(snapshot.encode(&[]).unwrap().is_empty());
    }

    #[test]
    fn unknown_keys_survive() {
        let private = blob(json!({
            "version": 1,
            "values": {"future_attribute": "kept", "comment": "c"},
            "written_by": "a newer provider"
        }));

        let mut snapshot = ObjectSnapshot::decode(&private).unwrap();
        snapshot.set("comment", None);
        let reencoded = ObjectSnapshot::decode(&snapshot.encode(&private).unwrap()).unwrap();

        assert_eq!(reencoded.get("future_attribute"), Some(&json!("kept")));
        assert_eq!(reencoded.get("comment"), None);
        assert_eq!(reencoded.extra.get("written_by"), Some(&json!("a newer provider")));
    }

    #[test]
    fn other_private_keys_are_kept() {
        let mut container = PrivateStateData::new();
        container.set_key("other", b"value".to_vec());
        let private = container.encode().unwrap();

        let mut snapshot = ObjectSnapshot::new();
        snapshot.set("comment", Some(json!("c")));
        let encoded = snapshot.encode(&private).unwrap();

        let container = PrivateStateData::decode(&encoded).unwrap();
        assert_eq!(container.get_key("other"), Some(&b"value"[..]));
        assert!(container.get_key(SNAPSHOT_KEY).is_some());
    }

    #[test]
    fn newer_versions_are_corrupt() {
        let private = blob(json!({"version": 2, "values": {}}));
        assert!(matches!(
            ObjectSnapshot::decode(&private),
            Err(ProviderError::PrivateStateCorrupt(_))
        ));
    }

    #[test]
    fn garbage_is_corrupt() {
        let mut container = PrivateStateData::new();
        container.set_key(SNAPSHOT_KEY, b"not json".to_vec());
        let private = container.encode().unwrap();

        assert!(ObjectSnapshot::decode(&private).is_err());
        assert!(ObjectSnapshot::decode_or_default(&private).is_empty());
        assert!(ObjectSnapshot::decode(&[0xc1]).is_err());
    }
}
