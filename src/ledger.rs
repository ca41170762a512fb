//! Ledger / federation facade (§4.10): a single global append-only chain of
//! multi-tenant entries, plus the small `PROPOSED -> COSIGNED -> {EXECUTED
//! | DISPUTED}` federation state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::hash_canonical;
use crate::error::{LedgerError, LedgerResult};
use crate::signing::Signature;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    DecisionEvent,
    SnapshotCheckpoint,
    AnchorAppended,
    FederationProposed,
    FederationCosigned,
    FederationExecuted,
    FederationDisputed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub tenant_id: String,
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    pub decision_id: Option<String>,
    pub event_seq: Option<u64>,
    pub snapshot_up_to_seq: Option<u64>,
    pub anchor_seq: Option<u64>,
    pub payload: serde_json::Value,
    pub signature: Option<Signature>,
    pub prev_hash: Option<String>,
    pub hash: String,
}

#[derive(Serialize)]
struct EntryHashInput<'a> {
    seq: u64,
    at: DateTime<Utc>,
    tenant_id: &'a str,
    #[serde(rename = "type")]
    entry_type: LedgerEntryType,
    decision_id: &'a Option<String>,
    event_seq: &'a Option<u64>,
    snapshot_up_to_seq: &'a Option<u64>,
    anchor_seq: &'a Option<u64>,
    payload: &'a serde_json::Value,
    prev_hash: &'a Option<String>,
}

pub fn compute_entry_hash(entry: &LedgerEntry) -> LedgerResult<String> {
    let input = EntryHashInput {
        seq: entry.seq,
        at: entry.at,
        tenant_id: &entry.tenant_id,
        entry_type: entry.entry_type,
        decision_id: &entry.decision_id,
        event_seq: &entry.event_seq,
        snapshot_up_to_seq: &entry.snapshot_up_to_seq,
        anchor_seq: &entry.anchor_seq,
        payload: &entry.payload,
        prev_hash: &entry.prev_hash,
    };
    Ok(hash_canonical(&input)?)
}

pub struct NewLedgerEntry {
    pub tenant_id: String,
    pub entry_type: LedgerEntryType,
    pub decision_id: Option<String>,
    pub event_seq: Option<u64>,
    pub snapshot_up_to_seq: Option<u64>,
    pub anchor_seq: Option<u64>,
    pub payload: serde_json::Value,
    pub signature: Option<Signature>,
}

/// Append one entry onto the single global ledger chain.
pub fn append_ledger_entry(store: &dyn Store, input: NewLedgerEntry, now: DateTime<Utc>) -> LedgerResult<LedgerEntry> {
    let last = store.get_last_ledger_entry()?;
    let seq = last.as_ref().map(|e| e.seq + 1).unwrap_or(1);
    let prev_hash = last.map(|e| e.hash);

    let mut entry = LedgerEntry {
        seq,
        at: now,
        tenant_id: input.tenant_id,
        entry_type: input.entry_type,
        decision_id: input.decision_id,
        event_seq: input.event_seq,
        snapshot_up_to_seq: input.snapshot_up_to_seq,
        anchor_seq: input.anchor_seq,
        payload: input.payload,
        signature: input.signature,
        prev_hash,
        hash: String::new(),
    };
    entry.hash = compute_entry_hash(&entry)?;

    store.append_ledger_entry(entry.clone())?;
    log::info!("ledger entry appended: seq={} tenant={}", entry.seq, entry.tenant_id);
    Ok(entry)
}

pub fn verify_ledger(store: &dyn Store) -> LedgerResult<crate::anchor::GlobalVerifyReport> {
    let entries = store.list_ledger_entries(None)?;
    let mut prev_hash: Option<String> = entries.first().and_then(|e| e.prev_hash.clone());
    let mut count = 0u64;
    for e in &entries {
        if e.prev_hash != prev_hash {
            return Ok(crate::anchor::GlobalVerifyReport { ok: false, last_seq: e.seq, verified_count: count, reason: Some("prev_hash mismatch".into()) });
        }
        let recomputed = compute_entry_hash(e)?;
        if recomputed != e.hash {
            return Ok(crate::anchor::GlobalVerifyReport { ok: false, last_seq: e.seq, verified_count: count, reason: Some("hash mismatch".into()) });
        }
        prev_hash = Some(e.hash.clone());
        count += 1;
    }
    Ok(crate::anchor::GlobalVerifyReport { ok: true, last_seq: entries.last().map(|e| e.seq).unwrap_or(0), verified_count: count, reason: None })
}

/// Export every ledger entry for `tenant_id`, in chain order.
pub fn export_ledger_range(store: &dyn Store, tenant_id: &str) -> LedgerResult<Vec<LedgerEntry>> {
    store.list_ledger_entries(Some(tenant_id))
}

// ---------------------------------------------------------------------
// Federation state machine
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FederationStatus {
    Proposed,
    Cosigned,
    Executed,
    Disputed,
}

/// Allowed transitions for a federation event. `DISPUTE` freezes business
/// actions (no further co-sign/execute accepted) until arbitration lands an
/// explicit re-resolution, which callers model as a fresh proposal.
pub fn federation_transition(status: FederationStatus, action: &str) -> Option<FederationStatus> {
    match (status, action) {
        (FederationStatus::Proposed, "COSIGN") => Some(FederationStatus::Cosigned),
        (FederationStatus::Cosigned, "EXECUTE") => Some(FederationStatus::Executed),
        (FederationStatus::Proposed | FederationStatus::Cosigned, "DISPUTE") => Some(FederationStatus::Disputed),
        _ => None,
    }
}

pub struct FederationProofBundle {
    pub federation_id: String,
    pub entries: Vec<LedgerEntry>,
    pub verify_report: crate::anchor::GlobalVerifyReport,
}

/// The proof bundle for a federation event: its ledger entries plus the
/// global verify report (§4.10).
pub fn export_federation_proof_bundle(store: &dyn Store, federation_id: &str) -> LedgerResult<FederationProofBundle> {
    let entries = store
        .list_ledger_entries(None)?
        .into_iter()
        .filter(|e| e.payload.get("federation_id").and_then(|v| v.as_str()) == Some(federation_id))
        .collect();
    let verify_report = verify_ledger(store)?;
    Ok(FederationProofBundle { federation_id: federation_id.to_string(), entries, verify_report })
}

pub fn resolve_verifier_key<'a>(
    keys: &'a std::collections::HashMap<(String, String), Vec<u8>>,
    tenant_id: &str,
    key_id: &str,
) -> Option<&'a [u8]> {
    keys.get(&(tenant_id.to_string(), key_id.to_string())).map(|v| v.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[test]
    fn entries_chain_across_tenants() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let e1 = append_ledger_entry(&store, NewLedgerEntry {
            tenant_id: "t1".into(), entry_type: LedgerEntryType::DecisionEvent, decision_id: Some("d1".into()),
            event_seq: Some(1), snapshot_up_to_seq: None, anchor_seq: None, payload: serde_json::json!({}), signature: None,
        }, now).unwrap();
        let e2 = append_ledger_entry(&store, NewLedgerEntry {
            tenant_id: "t2".into(), entry_type: LedgerEntryType::DecisionEvent, decision_id: Some("d2".into()),
            event_seq: Some(1), snapshot_up_to_seq: None, anchor_seq: None, payload: serde_json::json!({}), signature: None,
        }, now).unwrap();
        assert_eq!(e2.prev_hash, Some(e1.hash));
        assert!(verify_ledger(&store).unwrap().ok);
    }

    #[test]
    fn federation_flow_proposed_to_executed() {
        let mut s = FederationStatus::Proposed;
        s = federation_transition(s, "COSIGN").unwrap();
        assert_eq!(s, FederationStatus::Cosigned);
        s = federation_transition(s, "EXECUTE").unwrap();
        assert_eq!(s, FederationStatus::Executed);
        assert_eq!(federation_transition(s, "DISPUTE"), None);
    }

    #[test]
    fn dispute_freezes_from_proposed_or_cosigned() {
        assert_eq!(federation_transition(FederationStatus::Proposed, "DISPUTE"), Some(FederationStatus::Disputed));
        assert_eq!(federation_transition(FederationStatus::Cosigned, "DISPUTE"), Some(FederationStatus::Disputed));
    }
}
