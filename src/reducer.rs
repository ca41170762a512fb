//! `apply(decision, event, ctx) -> Outcome<ApplyResult>`: the pure core of
//! the system. Given the same decision, event, and injected `now`, this
//! function is bytewise-deterministic (required for replay, §4.3).

use chrono::{DateTime, Utc};

use crate::decision::{deep_merge_extra, Decision, HistoryEntry};
use crate::error::{LedgerError, Violation};
use crate::event::EventPayload;
use crate::state_machine::{transition, EventType, TransitionOutcome};

/// An edge the caller should persist once the event is durably appended.
/// `via_event_seq` is filled in by the reducer from `ctx.seq_hint`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdge {
    pub from_decision_id: String,
    pub to_decision_id: String,
    pub relation: String,
    pub via_event_seq: u64,
    pub note: Option<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub decision: Decision,
    pub edges: Vec<PendingEdge>,
}

pub struct ApplyContext<'a> {
    pub now: DateTime<Utc>,
    /// The `seq` the event will be assigned once appended; used only to
    /// stamp `history` entries and edges, never to drive control flow.
    pub seq_hint: u64,
    pub allow_locked: &'a [EventType],
    pub require_reject_reason_meta: bool,
    pub compliance_hook: Option<&'a (dyn Fn(&Decision, &EventPayload) -> Result<(), String> + Send + Sync)>,
}

use crate::error::Outcome;

pub fn apply(decision: &Decision, event: &EventPayload, ctx: &ApplyContext) -> Outcome<ApplyResult> {
    let ev_type = event.event_type();

    let outcome = transition(decision.state, ev_type, ctx.allow_locked);
    let next_state = match outcome {
        TransitionOutcome::Move(s) => s,
        TransitionOutcome::Stay => decision.state,
        TransitionOutcome::Invalid => {
            return Outcome::Rejected(vec![Violation::new(
                "INVALID_TRANSITION",
                "state",
                format!("{:?} does not accept {}", decision.state, ev_type),
            )])
        }
        TransitionOutcome::Frozen => {
            return Outcome::Rejected(vec![Violation::new("FROZEN", "state", "decision is disputed")])
        }
        TransitionOutcome::LockedOut => {
            return Outcome::Rejected(vec![Violation::new("LOCKED", "state", "decision is locked")])
        }
    };

    let mut violations = Vec::new();

    if matches!(event, EventPayload::Approve { .. }) {
        if decision.meta.title.trim().is_empty() {
            violations.push(Violation::new("MISSING_REQUIRED_META", "meta.title", "title is required to approve"));
        }
        if decision.meta.owner_id.trim().is_empty() {
            violations.push(Violation::new("MISSING_REQUIRED_META", "meta.owner_id", "owner_id is required to approve"));
        }
    }

    if let EventPayload::Reject { meta, .. } = event {
        if ctx.require_reject_reason_meta {
            let has_reason_key = meta.as_ref().and_then(|m| m.get("reason")).is_some();
            if !has_reason_key {
                violations.push(Violation::new(
                    "MISSING_REQUIRED_META",
                    "meta.reason",
                    "compliance policy requires a reason key in event meta",
                ));
            }
        }
    }

    if !violations.is_empty() {
        return Outcome::Rejected(violations);
    }

    if let Some(hook) = ctx.compliance_hook {
        if let Err(msg) = hook(decision, event) {
            return Outcome::Rejected(vec![Violation::new("COMPLIANCE_BLOCK", "event", msg)]);
        }
    }

    let mut next = decision.clone();
    next.state = next_state;
    next.version += 1;
    next.updated_at = ctx.now;

    if next.meta.liability_shield.is_none() {
        next.meta.liability_shield = Some(format!("shield:{}", event.actor_id()));
    }

    let mut edges = Vec::new();

    match event {
        EventPayload::Approve { meta, .. } => {
            next.meta.title = decision.meta.title.clone();
            if let Some(m) = meta {
                if let Some(title) = m.get("title").and_then(|v| v.as_str()) {
                    next.meta.title = title.to_string();
                }
            }
        }
        EventPayload::Simulate { simulation_snapshot_id, .. } => {
            if let Some(id) = simulation_snapshot_id {
                next.artifacts.simulation_snapshot_id = Some(id.clone());
            }
        }
        EventPayload::Explain { explain_tree_id, .. } => {
            if let Some(id) = explain_tree_id {
                next.artifacts.explain_tree_id = Some(id.clone());
            }
        }
        EventPayload::AttachArtifacts { artifacts, .. } => {
            if let Some(id) = &artifacts.margin_snapshot_id {
                next.artifacts.simulation_snapshot_id = Some(id.clone());
            }
            if let Some(id) = &artifacts.explain_tree_id {
                next.artifacts.explain_tree_id = Some(id.clone());
            }
            if let Some(ev) = &artifacts.evidence {
                next.artifacts.evidence = Some(ev.clone());
            }
            deep_merge_extra(&mut next.artifacts.extra, &artifacts.extra);
        }
        EventPayload::IngestRecords { records, .. } => {
            for r in records {
                let key = format!("{}:{}", r.source_system, r.source_record_id);
                let digest = crate::canonical::hash_canonical(&r.payload).unwrap_or_default();
                next.artifacts.ingested_digests.entry(key).or_insert(digest);
            }
        }
        EventPayload::LinkDecisions { links, .. } => {
            for link in links {
                edges.push(PendingEdge {
                    from_decision_id: decision.decision_id.clone(),
                    to_decision_id: link.to_decision_id.clone(),
                    relation: link.relation.clone(),
                    via_event_seq: ctx.seq_hint,
                    note: link.note.clone(),
                    confidence: link.confidence,
                });
            }
        }
        EventPayload::Fork { new_decision_id, .. } => {
            next.artifacts.extra.insert(
                "forked_to".to_string(),
                serde_json::Value::String(new_decision_id.clone()),
            );
        }
        EventPayload::CommitCounterfactual { counterfactual_decision_id, note, .. } => {
            next.artifacts.extra.insert(
                "counterfactual".to_string(),
                serde_json::json!({ "decision_id": counterfactual_decision_id, "note": note }),
            );
        }
        EventPayload::Validate { .. }
        | EventPayload::Reject { .. }
        | EventPayload::EnterDispute { .. }
        | EventPayload::AttestExternal { .. }
        | EventPayload::Lock { .. } => {}
    }

    next.history.push(HistoryEntry {
        event_type: ev_type.to_string(),
        actor_id: event.actor_id().to_string(),
        actor_type: match event {
            EventPayload::Validate { actor_type, .. } => actor_type.clone(),
            _ => None,
        },
        at: ctx.now,
        seq_hint: Some(ctx.seq_hint),
    });

    Outcome::Accepted(ApplyResult { decision: next, edges })
}

/// Fold `apply` over a sequence of events, starting from `root`. Used for
/// full replay and for replay-from-snapshot (§4.6) when `root` is a
/// snapshot's materialized decision rather than a fresh one.
pub fn replay<'a, I>(
    root: Decision,
    events: I,
    allow_locked: &[EventType],
) -> Result<Decision, (Decision, Vec<Violation>)>
where
    I: IntoIterator<Item = (&'a EventPayload, DateTime<Utc>, u64)>,
{
    let mut current = root;
    for (event, at, seq) in events {
        let ctx = ApplyContext {
            now: at,
            seq_hint: seq,
            allow_locked,
            require_reject_reason_meta: false,
            compliance_hook: None,
        };
        match apply(&current, event, &ctx) {
            Outcome::Accepted(result) => current = result.decision,
            Outcome::Rejected(v) => return Err((current, v)),
        }
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::DecisionState;

    fn ctx(now: DateTime<Utc>, seq: u64) -> ApplyContext<'static> {
        ApplyContext { now, seq_hint: seq, allow_locked: &[], require_reject_reason_meta: false, compliance_hook: None }
    }

    #[test]
    fn validate_advances_and_increments_version() {
        let now = Utc::now();
        let d = Decision::new("dec_1", now);
        let ev = EventPayload::Validate { actor_id: "a1".into(), actor_type: None };
        match apply(&d, &ev, &ctx(now, 1)) {
            Outcome::Accepted(r) => {
                assert_eq!(r.decision.state, DecisionState::Validated);
                assert_eq!(r.decision.version, 1);
                assert_eq!(r.decision.history.len(), 1);
            }
            Outcome::Rejected(v) => panic!("unexpected rejection: {v:?}"),
        }
    }

    #[test]
    fn approve_requires_title_and_owner() {
        let now = Utc::now();
        let mut d = Decision::new("dec_1", now);
        d.state = DecisionState::Explained;
        let ev = EventPayload::Approve { actor_id: "a1".into(), meta: None };
        match apply(&d, &ev, &ctx(now, 5)) {
            Outcome::Rejected(v) => assert!(v.iter().any(|x| x.code == "MISSING_REQUIRED_META")),
            Outcome::Accepted(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn rejected_event_does_not_mutate_decision() {
        let now = Utc::now();
        let d = Decision::new("dec_1", now);
        let ev = EventPayload::Approve { actor_id: "a1".into(), meta: None };
        let before = d.clone();
        let _ = apply(&d, &ev, &ctx(now, 1));
        assert_eq!(d, before);
    }

    #[test]
    fn ingest_records_dedupes_by_source_keys() {
        let now = Utc::now();
        let d = Decision::new("dec_1", now);
        let rec = crate::event::IngestedRecord {
            source_system: "s1".into(),
            source_record_id: "r1".into(),
            occurred_at: now,
            entity_type: "t".into(),
            payload: serde_json::json!({"a": 1}),
        };
        let ev = EventPayload::IngestRecords { actor_id: "a1".into(), source: "s1".into(), records: vec![rec.clone(), rec] };
        match apply(&d, &ev, &ctx(now, 1)) {
            Outcome::Accepted(r) => assert_eq!(r.decision.artifacts.ingested_digests.len(), 1),
            Outcome::Rejected(v) => panic!("{v:?}"),
        }
    }

    #[test]
    fn determinism_same_inputs_same_output() {
        let now = Utc::now();
        let d = Decision::new("dec_1", now);
        let ev = EventPayload::Validate { actor_id: "a1".into(), actor_type: None };
        let r1 = apply(&d, &ev, &ctx(now, 1));
        let r2 = apply(&d, &ev, &ctx(now, 1));
        match (r1, r2) {
            (Outcome::Accepted(a), Outcome::Accepted(b)) => assert_eq!(a.decision, b.decision),
            _ => panic!("expected both accepted"),
        }
    }
}
