//! In-memory `Store` implementation: `Mutex`-guarded maps, one mutex per
//! concern. Single-writer discipline per decision comes from always taking
//! the relevant decision's event-vec lock for the whole CAS check-and-insert.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::anchor::Anchor;
use crate::chain::EventRow;
use crate::decision::Decision;
use crate::edges::DecisionEdge;
use crate::error::LedgerResult;
use crate::ledger::LedgerEntry;
use crate::snapshot::Snapshot;

use super::{InsertOutcome, Store};

#[derive(Default)]
struct Inner {
    decisions: HashMap<String, Decision>,
    events: HashMap<String, Vec<EventRow>>,
    idempotency: HashMap<(String, String), u64>,
    snapshots: HashMap<String, Vec<Snapshot>>,
    anchors: Vec<Anchor>,
    ledger_entries: Vec<LedgerEntry>,
    edges: Vec<DecisionEdge>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    /// Test-only: corrupt a stored event's hash in place to exercise
    /// verification failure paths. Never used by production code paths.
    #[doc(hidden)]
    pub fn tamper_event_hash(&self, decision_id: &str, seq: u64, new_hash: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(rows) = inner.events.get_mut(decision_id) {
            if let Some(row) = rows.iter_mut().find(|r| r.seq == seq) {
                row.hash = new_hash.to_string();
            }
        }
    }
}

impl Store for MemoryStore {
    fn create_decision(&self, decision: Decision) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.decisions.entry(decision.decision_id.clone()).or_insert(decision);
        Ok(())
    }

    fn get_decision(&self, decision_id: &str) -> LedgerResult<Option<Decision>> {
        Ok(self.inner.lock().unwrap().decisions.get(decision_id).cloned())
    }

    fn put_decision(&self, decision: Decision) -> LedgerResult<()> {
        self.inner.lock().unwrap().decisions.insert(decision.decision_id.clone(), decision);
        Ok(())
    }

    fn get_last_event(&self, decision_id: &str) -> LedgerResult<Option<EventRow>> {
        Ok(self.inner.lock().unwrap().events.get(decision_id).and_then(|v| v.last().cloned()))
    }

    fn get_event_by_seq(&self, decision_id: &str, seq: u64) -> LedgerResult<Option<EventRow>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .events
            .get(decision_id)
            .and_then(|v| v.iter().find(|r| r.seq == seq).cloned()))
    }

    fn get_event_by_idempotency_key(&self, decision_id: &str, key: &str) -> LedgerResult<Option<EventRow>> {
        let inner = self.inner.lock().unwrap();
        let Some(&seq) = inner.idempotency.get(&(decision_id.to_string(), key.to_string())) else {
            return Ok(None);
        };
        Ok(inner.events.get(decision_id).and_then(|v| v.iter().find(|r| r.seq == seq).cloned()))
    }

    fn list_events(&self, decision_id: &str) -> LedgerResult<Vec<EventRow>> {
        Ok(self.inner.lock().unwrap().events.get(decision_id).cloned().unwrap_or_default())
    }

    fn list_events_from(&self, decision_id: &str, from_seq: u64) -> LedgerResult<Vec<EventRow>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .events
            .get(decision_id)
            .map(|v| v.iter().filter(|r| r.seq >= from_seq).cloned().collect())
            .unwrap_or_default())
    }

    fn list_events_tail(&self, decision_id: &str, n: usize) -> LedgerResult<Vec<EventRow>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .events
            .get(decision_id)
            .map(|v| v.iter().rev().take(n).rev().cloned().collect())
            .unwrap_or_default())
    }

    fn insert_event_cas(&self, row: EventRow) -> LedgerResult<InsertOutcome> {
        let mut inner = self.inner.lock().unwrap();
        let rows = inner.events.entry(row.decision_id.clone()).or_default();
        let expected_seq = rows.last().map(|r| r.seq + 1).unwrap_or(1);
        if row.seq != expected_seq {
            return Ok(InsertOutcome::Conflict);
        }
        if let Some(key) = row.idempotency_key.clone() {
            inner.idempotency.insert((row.decision_id.clone(), key), row.seq);
        }
        rows.push(row);
        Ok(InsertOutcome::Inserted)
    }

    fn get_latest_snapshot(&self, decision_id: &str) -> LedgerResult<Option<Snapshot>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .snapshots
            .get(decision_id)
            .and_then(|v| v.iter().max_by_key(|s| s.up_to_seq).cloned()))
    }

    fn put_snapshot(&self, snapshot: Snapshot) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let v = inner.snapshots.entry(snapshot.decision_id.clone()).or_default();
        v.retain(|s| s.up_to_seq != snapshot.up_to_seq);
        v.push(snapshot);
        Ok(())
    }

    fn list_snapshots(&self, decision_id: &str) -> LedgerResult<Vec<Snapshot>> {
        let mut v = self.inner.lock().unwrap().snapshots.get(decision_id).cloned().unwrap_or_default();
        v.sort_by_key(|s| s.up_to_seq);
        Ok(v)
    }

    fn prune_snapshots(&self, decision_id: &str, keep_last_n: u64) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(v) = inner.snapshots.get_mut(decision_id) {
            v.sort_by_key(|s| s.up_to_seq);
            let keep = keep_last_n as usize;
            if v.len() > keep {
                let drop_count = v.len() - keep;
                v.drain(0..drop_count);
            }
        }
        Ok(())
    }

    fn prune_events_up_to_seq(&self, decision_id: &str, seq: u64) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(v) = inner.events.get_mut(decision_id) {
            v.retain(|r| r.seq > seq);
        }
        Ok(())
    }

    fn list_anchors(&self) -> LedgerResult<Vec<Anchor>> {
        Ok(self.inner.lock().unwrap().anchors.clone())
    }

    fn get_last_anchor(&self) -> LedgerResult<Option<Anchor>> {
        Ok(self.inner.lock().unwrap().anchors.last().cloned())
    }

    fn get_anchor_by_decision_snapshot(&self, decision_id: &str, up_to_seq: u64) -> LedgerResult<Option<Anchor>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .anchors
            .iter()
            .find(|a| a.decision_id == decision_id && a.snapshot_up_to_seq == up_to_seq)
            .cloned())
    }

    fn append_anchor(&self, anchor: Anchor) -> LedgerResult<()> {
        self.inner.lock().unwrap().anchors.push(anchor);
        Ok(())
    }

    fn prune_anchors(&self, keep_last_n: u64) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let keep = keep_last_n as usize;
        if inner.anchors.len() > keep {
            let drop_count = inner.anchors.len() - keep;
            inner.anchors.drain(0..drop_count);
        }
        Ok(())
    }

    fn list_ledger_entries(&self, tenant_id: Option<&str>) -> LedgerResult<Vec<LedgerEntry>> {
        let inner = self.inner.lock().unwrap();
        Ok(match tenant_id {
            Some(t) => inner.ledger_entries.iter().filter(|e| e.tenant_id == t).cloned().collect(),
            None => inner.ledger_entries.clone(),
        })
    }

    fn append_ledger_entry(&self, entry: LedgerEntry) -> LedgerResult<()> {
        self.inner.lock().unwrap().ledger_entries.push(entry);
        Ok(())
    }

    fn get_last_ledger_entry(&self) -> LedgerResult<Option<LedgerEntry>> {
        Ok(self.inner.lock().unwrap().ledger_entries.last().cloned())
    }

    fn list_decision_edges(&self, from_decision_id: Option<&str>) -> LedgerResult<Vec<DecisionEdge>> {
        let inner = self.inner.lock().unwrap();
        Ok(match from_decision_id {
            Some(f) => inner.edges.iter().filter(|e| e.from_decision_id == f).cloned().collect(),
            None => inner.edges.clone(),
        })
    }

    fn upsert_decision_edge(&self, edge: DecisionEdge) -> LedgerResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.edges.iter_mut().find(|e| e.identity_key() == edge.identity_key()) {
            *existing = edge;
        } else {
            inner.edges.push(edge);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn cas_rejects_out_of_order_seq() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let ev = crate::event::EventPayload::Validate { actor_id: "a".into(), actor_type: None };
        let row = EventRow {
            decision_id: "d1".into(), seq: 2, at: now, event: ev, idempotency_key: None, prev_hash: None,
            hash: "x".into(),
        };
        assert_eq!(store.insert_event_cas(row).unwrap(), InsertOutcome::Conflict);
    }
}
