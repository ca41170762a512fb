//! The `Decision` aggregate and its append-mostly `artifacts` map.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::DecisionState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionMeta {
    pub title: String,
    pub owner_id: String,
    pub source: Option<String>,
    pub parent_decision_id: Option<String>,
    pub fork_checkpoint_hash: Option<String>,
    pub fork_parent_seq: Option<u64>,
    /// Resolution of the "Personal Liability Shield" open question: carried
    /// once as advisory metadata, set from the first event's actor, never
    /// used to gate a transition. See DESIGN.md.
    pub liability_shield: Option<String>,
}

impl Default for DecisionMeta {
    fn default() -> Self {
        Self {
            title: String::new(),
            owner_id: String::new(),
            source: None,
            parent_decision_id: None,
            fork_checkpoint_hash: None,
            fork_parent_seq: None,
            liability_shield: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    pub simulation_snapshot_id: Option<String>,
    pub explain_tree_id: Option<String>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
    pub evidence: Option<serde_json::Value>,
    /// Deduplicated ingested record digests keyed by `(source_system, source_record_id)`.
    #[serde(default)]
    pub ingested_digests: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub event_type: String,
    pub actor_id: String,
    pub actor_type: Option<String>,
    pub at: DateTime<Utc>,
    pub seq_hint: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision_id: String,
    pub state: DecisionState,
    pub version: u64,
    pub meta: DecisionMeta,
    pub artifacts: Artifacts,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Decision {
    pub fn new(decision_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            decision_id: decision_id.into(),
            state: DecisionState::Draft,
            version: 0,
            meta: DecisionMeta::default(),
            artifacts: Artifacts::default(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Deep-merge contract (§9): scalar and array fields are replaced; mapping
/// fields recursively merge with later values winning at the same path.
pub fn deep_merge_extra(
    base: &mut HashMap<String, serde_json::Value>,
    patch: &HashMap<String, serde_json::Value>,
) {
    for (k, v) in patch {
        match (base.get_mut(k), v) {
            (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(incoming)) => {
                deep_merge_value_map(existing, incoming);
            }
            _ => {
                base.insert(k.clone(), v.clone());
            }
        }
    }
}

fn deep_merge_value_map(
    base: &mut serde_json::Map<String, serde_json::Value>,
    patch: &serde_json::Map<String, serde_json::Value>,
) {
    for (k, v) in patch {
        match (base.get_mut(k), v) {
            (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(incoming)) => {
                deep_merge_value_map(existing, incoming);
            }
            _ => {
                base.insert(k.clone(), v.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_replaces_scalars_and_merges_maps() {
        let mut base = HashMap::new();
        base.insert("a".to_string(), json!(1));
        base.insert("nested".to_string(), json!({"x": 1, "y": 2}));

        let mut patch = HashMap::new();
        patch.insert("a".to_string(), json!(2));
        patch.insert("nested".to_string(), json!({"y": 20, "z": 3}));

        deep_merge_extra(&mut base, &patch);

        assert_eq!(base["a"], json!(2));
        assert_eq!(base["nested"], json!({"x": 1, "y": 20, "z": 3}));
    }

    #[test]
    fn deep_merge_replaces_arrays_wholesale() {
        let mut base = HashMap::new();
        base.insert("list".to_string(), json!([1, 2, 3]));
        let mut patch = HashMap::new();
        patch.insert("list".to_string(), json!([9]));
        deep_merge_extra(&mut base, &patch);
        assert_eq!(base["list"], json!([9]));
    }
}
