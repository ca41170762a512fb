//! Event payload shapes (§6): a tagged union parsed once at append time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state_machine::EventType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    #[serde(rename = "VALIDATE")]
    Validate { actor_id: String, actor_type: Option<String> },

    #[serde(rename = "SIMULATE")]
    Simulate { actor_id: String, simulation_snapshot_id: Option<String> },

    #[serde(rename = "EXPLAIN")]
    Explain { actor_id: String, explain_tree_id: Option<String> },

    #[serde(rename = "APPROVE")]
    Approve { actor_id: String, meta: Option<serde_json::Value> },

    #[serde(rename = "REJECT")]
    Reject { actor_id: String, reason: String, meta: Option<serde_json::Value> },

    #[serde(rename = "ATTACH_ARTIFACTS")]
    AttachArtifacts { actor_id: String, artifacts: ArtifactPatch },

    #[serde(rename = "INGEST_RECORDS")]
    IngestRecords { actor_id: String, source: String, records: Vec<IngestedRecord> },

    #[serde(rename = "LINK_DECISIONS")]
    LinkDecisions { actor_id: String, links: Vec<DecisionLink> },

    #[serde(rename = "ENTER_DISPUTE")]
    EnterDispute { actor_id: String, reason: String },

    #[serde(rename = "ATTEST_EXTERNAL")]
    AttestExternal { actor_id: String, target: String, tags: Option<Vec<String>> },

    #[serde(rename = "FORK")]
    Fork { actor_id: String, new_decision_id: String },

    #[serde(rename = "COMMIT_COUNTERFACTUAL")]
    CommitCounterfactual { actor_id: String, counterfactual_decision_id: String, note: Option<String> },

    /// System-originated: moves an `APPROVED`/`REJECTED` decision into
    /// `LOCKED` once its configured immutability delay elapses.
    #[serde(rename = "LOCK")]
    Lock { actor_id: String },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Validate { .. } => EventType::Validate,
            EventPayload::Simulate { .. } => EventType::Simulate,
            EventPayload::Explain { .. } => EventType::Explain,
            EventPayload::Approve { .. } => EventType::Approve,
            EventPayload::Reject { .. } => EventType::Reject,
            EventPayload::AttachArtifacts { .. } => EventType::AttachArtifacts,
            EventPayload::IngestRecords { .. } => EventType::IngestRecords,
            EventPayload::LinkDecisions { .. } => EventType::LinkDecisions,
            EventPayload::EnterDispute { .. } => EventType::EnterDispute,
            EventPayload::AttestExternal { .. } => EventType::AttestExternal,
            EventPayload::Fork { .. } => EventType::Fork,
            EventPayload::CommitCounterfactual { .. } => EventType::CommitCounterfactual,
            EventPayload::Lock { .. } => EventType::Lock,
        }
    }

    pub fn actor_id(&self) -> &str {
        match self {
            EventPayload::Validate { actor_id, .. }
            | EventPayload::Simulate { actor_id, .. }
            | EventPayload::Explain { actor_id, .. }
            | EventPayload::Approve { actor_id, .. }
            | EventPayload::Reject { actor_id, .. }
            | EventPayload::AttachArtifacts { actor_id, .. }
            | EventPayload::IngestRecords { actor_id, .. }
            | EventPayload::LinkDecisions { actor_id, .. }
            | EventPayload::EnterDispute { actor_id, .. }
            | EventPayload::AttestExternal { actor_id, .. }
            | EventPayload::Fork { actor_id, .. }
            | EventPayload::CommitCounterfactual { actor_id, .. }
            | EventPayload::Lock { actor_id, .. } => actor_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPatch {
    pub margin_snapshot_id: Option<String>,
    pub explain_tree_id: Option<String>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
    pub evidence: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestedRecord {
    pub source_system: String,
    pub source_record_id: String,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
    pub entity_type: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLink {
    pub to_decision_id: String,
    pub relation: String,
    pub note: Option<String>,
    pub confidence: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json_with_tag() {
        let ev = EventPayload::Reject { actor_id: "a1".into(), reason: "r".into(), meta: None };
        let s = serde_json::to_string(&ev).unwrap();
        assert!(s.contains("\"type\":\"REJECT\""));
        let back: EventPayload = serde_json::from_str(&s).unwrap();
        assert_eq!(ev, back);
    }

    #[test]
    fn event_type_matches_discriminator() {
        let ev = EventPayload::Validate { actor_id: "a".into(), actor_type: None };
        assert_eq!(ev.event_type(), EventType::Validate);
    }
}
