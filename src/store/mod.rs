//! The abstract store contract (§9 "Store abstraction"): one trait that
//! both the in-memory and SQL-backed implementations satisfy.

pub mod memory;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

use crate::anchor::Anchor;
use crate::chain::EventRow;
use crate::decision::Decision;
use crate::edges::DecisionEdge;
use crate::error::LedgerResult;
use crate::ledger::LedgerEntry;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The row's `seq` did not match `last_seq + 1` at insert time; the
    /// caller must retry (§4.4 "Failure semantics").
    Conflict,
}

/// Abstract persistence contract. Implementations are responsible for their
/// own internal locking; callers rely on `insert_event_cas` for sequencing
/// safety rather than assuming external synchronization.
pub trait Store: Send + Sync {
    fn create_decision(&self, decision: Decision) -> LedgerResult<()>;
    fn get_decision(&self, decision_id: &str) -> LedgerResult<Option<Decision>>;
    fn put_decision(&self, decision: Decision) -> LedgerResult<()>;

    fn get_last_event(&self, decision_id: &str) -> LedgerResult<Option<EventRow>>;
    fn get_event_by_seq(&self, decision_id: &str, seq: u64) -> LedgerResult<Option<EventRow>>;
    fn get_event_by_idempotency_key(&self, decision_id: &str, key: &str) -> LedgerResult<Option<EventRow>>;
    fn list_events(&self, decision_id: &str) -> LedgerResult<Vec<EventRow>>;
    fn list_events_from(&self, decision_id: &str, from_seq: u64) -> LedgerResult<Vec<EventRow>>;
    fn list_events_tail(&self, decision_id: &str, n: usize) -> LedgerResult<Vec<EventRow>>;
    fn insert_event_cas(&self, row: EventRow) -> LedgerResult<InsertOutcome>;

    fn get_latest_snapshot(&self, decision_id: &str) -> LedgerResult<Option<Snapshot>>;
    fn put_snapshot(&self, snapshot: Snapshot) -> LedgerResult<()>;
    fn list_snapshots(&self, decision_id: &str) -> LedgerResult<Vec<Snapshot>>;
    fn prune_snapshots(&self, decision_id: &str, keep_last_n: u64) -> LedgerResult<()>;
    fn prune_events_up_to_seq(&self, decision_id: &str, seq: u64) -> LedgerResult<()>;

    fn list_anchors(&self) -> LedgerResult<Vec<Anchor>>;
    fn get_last_anchor(&self) -> LedgerResult<Option<Anchor>>;
    fn get_anchor_by_decision_snapshot(&self, decision_id: &str, up_to_seq: u64) -> LedgerResult<Option<Anchor>>;
    fn append_anchor(&self, anchor: Anchor) -> LedgerResult<()>;
    fn prune_anchors(&self, keep_last_n: u64) -> LedgerResult<()>;

    fn list_ledger_entries(&self, tenant_id: Option<&str>) -> LedgerResult<Vec<LedgerEntry>>;
    fn append_ledger_entry(&self, entry: LedgerEntry) -> LedgerResult<()>;
    fn get_last_ledger_entry(&self) -> LedgerResult<Option<LedgerEntry>>;

    fn list_decision_edges(&self, from_decision_id: Option<&str>) -> LedgerResult<Vec<DecisionEdge>>;
    fn upsert_decision_edge(&self, edge: DecisionEdge) -> LedgerResult<()>;
}
