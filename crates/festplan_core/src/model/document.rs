//! Plan document aggregate and legacy snapshot shapes.
//!
//! # Responsibility
//! - Define the user-facing aggregate `{slots, groceries, activity, settings}`.
//! - Define the pre-partition monolithic shape accepted by the legacy import.
//!
//! # Invariants
//! - Slot keys are stable identifiers chosen by clients (e.g.
//!   `2025-12-24_Abendessen`); one storage unit per key.
//! - Grocery and activity entries are opaque; the whole list is replaced on
//!   every write.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Stable identifier for one meal slot.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type SlotKey = String;

/// The full logical document shared by all polling clients.
///
/// Every field is optional on the wire; missing partitions assemble to the
/// empty value so a fresh deployment reads as a valid (empty) plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDocument {
    /// One opaque record per slot key. Deleting a slot is expressed by
    /// omitting its key from a subsequent write.
    #[serde(default)]
    pub slots: BTreeMap<SlotKey, Value>,
    /// Whole-list replacement semantics; entries may be plain strings or
    /// structured objects.
    #[serde(default)]
    pub groceries: Vec<Value>,
    /// Append-mostly client-side log, still replaced wholesale on write.
    #[serde(default)]
    pub activity: Vec<Value>,
    /// Shared settings record (organizer PIN and friends).
    #[serde(default = "empty_settings")]
    pub settings: Value,
}

impl PlanDocument {
    /// Returns the empty aggregate served before any write or migration.
    pub fn empty() -> Self {
        Self {
            slots: BTreeMap::new(),
            groceries: Vec::new(),
            activity: Vec::new(),
            settings: empty_settings(),
        }
    }
}

impl Default for PlanDocument {
    fn default() -> Self {
        Self::empty()
    }
}

/// The pre-partition monolithic document shape.
///
/// Old installations stored the entire plan as one object
/// `{slots, groceries, settings}` (no activity, no version). The very first
/// deployed clients stored the bare slot map without the `slots` wrapper;
/// [`LegacySnapshot::from_value`] accepts both.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacySnapshot {
    #[serde(default)]
    pub slots: BTreeMap<SlotKey, Value>,
    #[serde(default)]
    pub groceries: Vec<Value>,
    #[serde(default = "empty_settings")]
    pub settings: Value,
}

impl LegacySnapshot {
    /// Interprets a stored monolithic body.
    ///
    /// A top-level object without a `slots` key is treated as the bare slot
    /// map itself (the oldest wire format).
    pub fn from_value(value: Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.contains_key("slots") {
            return serde_json::from_value(Value::Object(object.clone())).ok();
        }

        let slots = object
            .iter()
            .map(|(key, slot)| (key.clone(), slot.clone()))
            .collect();
        Some(Self {
            slots,
            groceries: Vec::new(),
            settings: empty_settings(),
        })
    }
}

pub(crate) fn empty_settings() -> Value {
    Value::Object(serde_json::Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_deserializes_with_all_fields_missing() {
        let document: PlanDocument = serde_json::from_value(json!({})).unwrap();
        assert_eq!(document, PlanDocument::empty());
    }

    #[test]
    fn document_settings_default_to_empty_object() {
        let document = PlanDocument::empty();
        assert_eq!(document.settings, json!({}));
    }

    #[test]
    fn legacy_snapshot_accepts_wrapped_shape() {
        let snapshot = LegacySnapshot::from_value(json!({
            "slots": {"2025-12-24_Abendessen": {"proposals": []}},
            "groceries": ["Milch"],
        }))
        .unwrap();
        assert_eq!(snapshot.slots.len(), 1);
        assert_eq!(snapshot.groceries, vec![json!("Milch")]);
        assert_eq!(snapshot.settings, json!({}));
    }

    #[test]
    fn legacy_snapshot_accepts_bare_slot_map() {
        let snapshot = LegacySnapshot::from_value(json!({
            "2025-12-24_Dessert": {"proposals": [{"name": "Stollen"}]},
        }))
        .unwrap();
        assert_eq!(snapshot.slots.len(), 1);
        assert!(snapshot.slots.contains_key("2025-12-24_Dessert"));
        assert!(snapshot.groceries.is_empty());
    }

    #[test]
    fn legacy_snapshot_rejects_non_object_bodies() {
        assert!(LegacySnapshot::from_value(json!([1, 2, 3])).is_none());
        assert!(LegacySnapshot::from_value(json!("text")).is_none());
    }
}
