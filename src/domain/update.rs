//! The payload pushed from server to client.

use serde::{Deserialize, Serialize};

/// One update pushed to a client.
///
/// The body is opaque to the transports: it is produced by the
/// synchronization engine and only serialized on the way out.
///
/// ```json
/// { "version": 4, "body": { "count": 4 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Version of the object this update brings the client to.
    pub version: u64,
    /// `true` when `body` is a patch against the previous version rather
    /// than the whole object.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub delta: bool,
    /// Update payload.
    pub body: serde_json::Value,
}

impl Update {
    /// Creates an update carrying the whole object.
    #[must_use]
    pub const fn full(version: u64, body: serde_json::Value) -> Self {
        Self {
            version,
            delta: false,
            body,
        }
    }

    /// Serializes the update into its wire form.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the body cannot be serialized.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn full_update_omits_delta_flag() {
        let update = Update::full(3, serde_json::json!({ "count": 3 }));
        let Ok(json) = update.to_json() else {
            panic!("update should serialize");
        };
        assert_eq!(json, r#"{"version":3,"body":{"count":3}}"#);
    }

    #[test]
    fn delta_update_carries_flag() {
        let update = Update {
            version: 7,
            delta: true,
            body: serde_json::json!([{ "op": "replace", "path": "/count", "value": 7 }]),
        };
        let Ok(value) = serde_json::to_value(&update) else {
            panic!("update should serialize");
        };
        assert_eq!(value.get("delta"), Some(&serde_json::Value::Bool(true)));
    }
}
