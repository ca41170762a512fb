//! `decision_ledger`: an append-only, tamper-evident decision ledger.
//!
//! A `Decision` moves through a fixed state machine (`state_machine`) by way
//! of events folded through a pure reducer (`reducer`). Every applied event
//! is appended to a per-decision hash chain (`chain`) and indexed by a
//! Merkle tree (`merkle`). Snapshots (`snapshot`) checkpoint a decision's
//! state and bind it to a chain position and a Merkle root; a global anchor
//! chain (`anchor`) binds snapshots across decisions into one totally
//! ordered sequence. Receipts (`receipt`) export self-verifying extracts of
//! that anchor chain for offline, store-independent verification. A
//! multi-tenant ledger/federation facade (`ledger`) sits on top for
//! cross-party proposals.

pub mod anchor;
pub mod canonical;
pub mod chain;
pub mod clock;
pub mod config;
pub mod decision;
pub mod edges;
pub mod error;
pub mod event;
pub mod ledger;
pub mod merkle;
pub mod observability;
pub mod receipt;
pub mod reducer;
pub mod signing;
pub mod snapshot;
pub mod state_machine;
pub mod store;

pub use chain::{append, verify, AppendInput, AppendOutcome, EventRow, VerifyReport};
pub use clock::{Clock, StepClock, SystemClock};
pub use config::{maybe_lock, ImmutabilityPolicy, LedgerConfig};
pub use decision::{Artifacts, Decision, DecisionMeta, HistoryEntry};
pub use error::{LedgerError, LedgerResult, Outcome, Violation};
pub use event::EventPayload;
pub use reducer::{apply, replay, ApplyContext, ApplyResult, PendingEdge};
pub use state_machine::{DecisionState, EventType};
pub use store::{memory::MemoryStore, InsertOutcome, Store};

#[derive(Debug, Clone)]
pub struct SubmitResult {
    pub append: AppendOutcome,
    pub decision: Decision,
}

/// The end-to-end pipeline for §4.1-§4.9 against a single decision:
/// `apply` the event against the current decision, append the resulting row
/// to the hash chain, persist the new decision and any emitted edges, then
/// run the snapshot/anchor policies. A rejected event never reaches the
/// store (§7 "no partial mutation on rejection").
#[allow(clippy::too_many_arguments)]
pub fn submit_event(
    store: &dyn Store,
    decision_id: &str,
    event: EventPayload,
    idempotency_key: Option<String>,
    config: &LedgerConfig,
    require_reject_reason_meta: bool,
    compliance_hook: Option<&(dyn Fn(&Decision, &EventPayload) -> Result<(), String> + Send + Sync)>,
    now: chrono::DateTime<chrono::Utc>,
) -> LedgerResult<Outcome<SubmitResult>> {
    if let Some(key) = &idempotency_key {
        if let Some(existing) = store.get_event_by_idempotency_key(decision_id, key)? {
            let decision = store
                .get_decision(decision_id)?
                .ok_or_else(|| LedgerError::DecisionNotFound(decision_id.to_string()))?;
            return Ok(Outcome::Accepted(SubmitResult {
                append: AppendOutcome { row: existing, replayed: true },
                decision,
            }));
        }
    }

    config::maybe_lock(store, decision_id, &config.immutability_policy, now)?;

    let current = store
        .get_decision(decision_id)?
        .ok_or_else(|| LedgerError::DecisionNotFound(decision_id.to_string()))?;

    let last = store.get_last_event(decision_id)?;
    let seq_hint = last.as_ref().map(|r| r.seq + 1).unwrap_or(1);

    let allow_locked = &config.immutability_policy.allow_event_types_while_locked;
    let ctx = ApplyContext { now, seq_hint, allow_locked, require_reject_reason_meta, compliance_hook };

    let result = match reducer::apply(&current, &event, &ctx) {
        Outcome::Accepted(result) => result,
        Outcome::Rejected(violations) => return Ok(Outcome::Rejected(violations)),
    };

    let append_outcome = append(store, AppendInput { decision_id: decision_id.to_string(), event, idempotency_key }, now)?;
    store.put_decision(result.decision.clone())?;
    for pending in &result.edges {
        store.upsert_decision_edge(edges::DecisionEdge::from_pending(pending, now))?;
    }

    if let Some(snap) = snapshot::maybe_snapshot(store, decision_id, &config.snapshot_policy, now)? {
        anchor::maybe_anchor(store, &snap, &config.anchor_policy, now)?;
    }

    Ok(Outcome::Accepted(SubmitResult { append: append_outcome, decision: result.decision }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_config() -> LedgerConfig {
        LedgerConfig {
            snapshot_policy: snapshot::SnapshotPolicy { every_n_events: 1, keep_last_n: 5, prune_events_up_to_latest_snapshot: false },
            anchor_policy: anchor::AnchorPolicy { enabled: true, keep_last_n_anchors: 5 },
            immutability_policy: ImmutabilityPolicy::default(),
        }
    }

    #[test]
    fn submit_event_advances_state_and_maintains_snapshot_and_anchor() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create_decision(Decision::new("d1", now)).unwrap();

        let config = test_config();
        let ev = EventPayload::Validate { actor_id: "a1".into(), actor_type: None };
        let outcome = submit_event(&store, "d1", ev, None, &config, false, None, now).unwrap();

        match outcome {
            Outcome::Accepted(result) => assert_eq!(result.decision.state, DecisionState::Validated),
            Outcome::Rejected(v) => panic!("unexpected rejection: {v:?}"),
        }
        assert!(store.get_latest_snapshot("d1").unwrap().is_some());
        assert!(store.get_last_anchor().unwrap().is_some());
    }

    #[test]
    fn submit_event_rejects_without_mutating_store() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create_decision(Decision::new("d1", now)).unwrap();
        let config = test_config();

        let ev = EventPayload::Approve { actor_id: "a1".into(), meta: None };
        let outcome = submit_event(&store, "d1", ev, None, &config, false, None, now).unwrap();
        assert!(matches!(outcome, Outcome::Rejected(_)));
        assert!(store.list_events("d1").unwrap().is_empty());
        assert_eq!(store.get_decision("d1").unwrap().unwrap().state, DecisionState::Draft);
    }

    #[test]
    fn submit_event_is_idempotent_on_replayed_key() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create_decision(Decision::new("d1", now)).unwrap();
        let config = test_config();

        let ev = EventPayload::Validate { actor_id: "a1".into(), actor_type: None };
        let first = submit_event(&store, "d1", ev.clone(), Some("k1".into()), &config, false, None, now).unwrap();
        let second = submit_event(&store, "d1", ev, Some("k1".into()), &config, false, None, now).unwrap();

        match (first, second) {
            (Outcome::Accepted(a), Outcome::Accepted(b)) => {
                assert!(!a.append.replayed);
                assert!(b.append.replayed);
                assert_eq!(a.append.row.hash, b.append.row.hash);
            }
            _ => panic!("expected both accepted"),
        }
        assert_eq!(store.list_events("d1").unwrap().len(), 1);
    }

    #[test]
    fn submit_event_auto_locks_an_approved_decision_past_its_delay() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut d = Decision::new("d1", now);
        d.state = DecisionState::Approved;
        store.create_decision(d).unwrap();

        let mut config = test_config();
        config.immutability_policy = ImmutabilityPolicy {
            allow_event_types_while_locked: vec![crate::state_machine::EventType::AttestExternal],
            lock_expires_after: Some(chrono::Duration::hours(1)),
        };

        let later = now + chrono::Duration::hours(2);
        let ev = EventPayload::AttestExternal { actor_id: "a1".into(), target: "t".into(), tags: None };
        let outcome = submit_event(&store, "d1", ev, None, &config, false, None, later).unwrap();

        match outcome {
            Outcome::Accepted(result) => assert_eq!(result.decision.state, DecisionState::Locked),
            Outcome::Rejected(v) => panic!("unexpected rejection: {v:?}"),
        }
        // Two rows: the system LOCK event plus the ATTEST_EXTERNAL that followed it.
        assert_eq!(store.list_events("d1").unwrap().len(), 2);
    }
}
