//! Read-side views over the ledger: timeline, state diff, and lineage.
//! None of these mutate anything; they exist so operators and callers can
//! inspect a decision without hand-rolling the same queries repeatedly.

use serde::Serialize;

use crate::decision::Decision;
use crate::edges::{descendants, DecisionEdge};
use crate::error::LedgerResult;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub seq_hint: Option<u64>,
    pub event_type: String,
    pub actor_id: String,
    pub at: chrono::DateTime<chrono::Utc>,
}

/// Flatten a decision's `history` into a display-ready timeline, oldest first.
pub fn timeline(decision: &Decision) -> Vec<TimelineEntry> {
    decision
        .history
        .iter()
        .map(|h| TimelineEntry {
            seq_hint: h.seq_hint,
            event_type: h.event_type.clone(),
            actor_id: h.actor_id.clone(),
            at: h.at,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionDiff {
    pub state_changed: Option<(crate::state_machine::DecisionState, crate::state_machine::DecisionState)>,
    pub version_delta: i64,
    pub title_changed: Option<(String, String)>,
    pub artifacts_extra_keys_added: Vec<String>,
    pub artifacts_extra_keys_removed: Vec<String>,
}

/// Compare two snapshots of the same decision_id (older to newer); used by
/// the CLI and tests to sanity-check what a batch of events actually did.
pub fn diff(before: &Decision, after: &Decision) -> DecisionDiff {
    let state_changed = if before.state != after.state { Some((before.state, after.state)) } else { None };
    let title_changed = if before.meta.title != after.meta.title {
        Some((before.meta.title.clone(), after.meta.title.clone()))
    } else {
        None
    };

    let before_keys: std::collections::HashSet<_> = before.artifacts.extra.keys().cloned().collect();
    let after_keys: std::collections::HashSet<_> = after.artifacts.extra.keys().cloned().collect();

    DecisionDiff {
        state_changed,
        version_delta: after.version as i64 - before.version as i64,
        title_changed,
        artifacts_extra_keys_added: after_keys.difference(&before_keys).cloned().collect(),
        artifacts_extra_keys_removed: before_keys.difference(&after_keys).cloned().collect(),
    }
}

/// All decisions reachable forward from `decision_id` via `LINK_DECISIONS`
/// and `FORK` edges, for lineage inspection (§2 component table).
pub fn lineage(store: &dyn Store, decision_id: &str) -> LedgerResult<Vec<String>> {
    let edges: Vec<DecisionEdge> = store.list_decision_edges(None)?;
    Ok(descendants(&edges, decision_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::DecisionState;
    use chrono::Utc;

    #[test]
    fn timeline_reflects_history_order() {
        let now = Utc::now();
        let mut d = Decision::new("d1", now);
        d.history.push(crate::decision::HistoryEntry {
            event_type: "VALIDATE".into(),
            actor_id: "a1".into(),
            actor_type: None,
            at: now,
            seq_hint: Some(1),
        });
        let t = timeline(&d);
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].event_type, "VALIDATE");
    }

    #[test]
    fn diff_reports_state_and_version_changes() {
        let now = Utc::now();
        let before = Decision::new("d1", now);
        let mut after = before.clone();
        after.state = DecisionState::Validated;
        after.version = 1;
        after.artifacts.extra.insert("k".into(), serde_json::json!(1));
        let d = diff(&before, &after);
        assert_eq!(d.state_changed, Some((DecisionState::Draft, DecisionState::Validated)));
        assert_eq!(d.version_delta, 1);
        assert_eq!(d.artifacts_extra_keys_added, vec!["k".to_string()]);
    }
}
