//! The snapshot engine (§4.6): policy-driven materialized checkpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::error::LedgerResult;
use crate::merkle;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub decision_id: String,
    pub up_to_seq: u64,
    pub decision: Decision,
    pub created_at: DateTime<Utc>,
    pub checkpoint_hash: String,
    pub root_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPolicy {
    pub every_n_events: u64,
    pub keep_last_n: u64,
    pub prune_events_up_to_latest_snapshot: bool,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self { every_n_events: 0, keep_last_n: 3, prune_events_up_to_latest_snapshot: false }
    }
}

/// Invoked after a successful append. Writes a snapshot when the policy's
/// cadence is reached, then runs retention (§4.6).
pub fn maybe_snapshot(
    store: &dyn Store,
    decision_id: &str,
    policy: &SnapshotPolicy,
    now: DateTime<Utc>,
) -> LedgerResult<Option<Snapshot>> {
    if policy.every_n_events == 0 {
        return Ok(None);
    }

    let rows = store.list_events(decision_id)?;
    let current_seq = match rows.last() {
        Some(r) => r.seq,
        None => return Ok(None),
    };

    let last_snap_seq = store.get_latest_snapshot(decision_id)?.map(|s| s.up_to_seq).unwrap_or(0);
    if current_seq.saturating_sub(last_snap_seq) < policy.every_n_events {
        return Ok(None);
    }

    let decision = store
        .get_decision(decision_id)?
        .ok_or_else(|| crate::error::LedgerError::DecisionNotFound(decision_id.to_string()))?;

    let checkpoint_hash = rows
        .iter()
        .find(|r| r.seq == current_seq)
        .map(|r| r.hash.clone())
        .ok_or_else(|| crate::error::LedgerError::EventNotFound { decision_id: decision_id.to_string(), seq: current_seq })?;

    let leaves: Vec<String> = rows.iter().filter(|r| r.seq <= current_seq).map(|r| r.hash.clone()).collect();
    let root_hash = merkle::root(&leaves);

    let snapshot = Snapshot {
        decision_id: decision_id.to_string(),
        up_to_seq: current_seq,
        decision,
        created_at: now,
        checkpoint_hash,
        root_hash,
    };

    store.put_snapshot(snapshot.clone())?;
    log::info!("snapshot written: decision={decision_id} up_to_seq={current_seq}");

    run_retention(store, decision_id, policy)?;

    Ok(Some(snapshot))
}

fn run_retention(store: &dyn Store, decision_id: &str, policy: &SnapshotPolicy) -> LedgerResult<()> {
    store.prune_snapshots(decision_id, policy.keep_last_n)?;
    if policy.prune_events_up_to_latest_snapshot {
        if let Some(latest) = store.get_latest_snapshot(decision_id)? {
            store.prune_events_up_to_seq(decision_id, latest.up_to_seq)?;
        }
    }
    Ok(())
}

/// Replay a decision starting from the latest snapshot below or at
/// `up_to_seq`, folding in events after it (§4.6 "Replay after pruning").
pub fn replay_from_latest_snapshot(
    store: &dyn Store,
    decision_id: &str,
    allow_locked: &[crate::state_machine::EventType],
) -> LedgerResult<Option<Decision>> {
    let snapshot = store.get_latest_snapshot(decision_id)?;
    let (root, from_seq) = match &snapshot {
        Some(s) => (s.decision.clone(), s.up_to_seq + 1),
        None => match store.get_decision(decision_id)? {
            Some(d) => (d, 1),
            None => return Ok(None),
        },
    };

    let tail = store.list_events_from(decision_id, from_seq)?;
    let events: Vec<(&crate::event::EventPayload, DateTime<Utc>, u64)> =
        tail.iter().map(|r| (&r.event, r.at, r.seq)).collect();

    match crate::reducer::replay(root, events, allow_locked) {
        Ok(decision) => Ok(Some(decision)),
        Err((_, violations)) => Err(crate::error::LedgerError::InvalidEventPayload(format!(
            "replay failed: {violations:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{append, AppendInput};
    use crate::event::EventPayload;
    use crate::store::memory::MemoryStore;

    #[test]
    fn snapshot_binds_checkpoint_and_root_hash() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create_decision(Decision::new("d1", now)).unwrap();

        let ev = EventPayload::Validate { actor_id: "a".into(), actor_type: None };
        let outcome = append(&store, AppendInput { decision_id: "d1".into(), event: ev, idempotency_key: None }, now).unwrap();
        let mut d = store.get_decision("d1").unwrap().unwrap();
        d.version += 1;
        store.put_decision(d).unwrap();

        let policy = SnapshotPolicy { every_n_events: 1, keep_last_n: 3, prune_events_up_to_latest_snapshot: false };
        let snap = maybe_snapshot(&store, "d1", &policy, now).unwrap().unwrap();
        assert_eq!(snap.checkpoint_hash, outcome.row.hash);
        assert_eq!(snap.root_hash, merkle::root(&[outcome.row.hash]));
    }
}
