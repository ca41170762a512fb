//! Receipts & the offline verifier (§4.8): self-contained, portable extracts
//! that third parties can check without any store access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anchor::{compute_anchor_hash, Anchor};
use crate::canonical::public_state_hash;
use crate::decision::Decision;
use crate::error::{LedgerError, LedgerResult};
use crate::merkle::{verify_proof, InclusionProof};
use crate::signing::Signature;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorHead {
    pub seq: u64,
    pub hash: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub decision_id: String,
    pub snapshot_up_to_seq: u64,
    pub checkpoint_hash: Option<String>,
    pub root_hash: Option<String>,
    pub state_hash: Option<String>,
    pub prev_hash: Option<String>,
    pub hash: String,
    pub head: Option<AnchorHead>,
    pub signature: Option<Signature>,
}

impl AnchorReceipt {
    pub fn from_anchor(anchor: &Anchor, head: Option<AnchorHead>) -> Self {
        Self {
            seq: anchor.seq,
            at: anchor.at,
            decision_id: anchor.decision_id.clone(),
            snapshot_up_to_seq: anchor.snapshot_up_to_seq,
            checkpoint_hash: anchor.checkpoint_hash.clone(),
            root_hash: anchor.root_hash.clone(),
            state_hash: anchor.state_hash.clone(),
            prev_hash: anchor.prev_hash.clone(),
            hash: anchor.hash.clone(),
            head,
            signature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyResult {
    pub ok: bool,
    pub reason: Option<String>,
}

impl VerifyResult {
    fn ok() -> Self {
        Self { ok: true, reason: None }
    }
    fn fail(reason: impl Into<String>) -> Self {
        Self { ok: false, reason: Some(reason.into()) }
    }
}

/// Recompute `hash` from the receipt body and compare; if `head` is
/// present, additionally reject receipts whose `seq > head.seq`
/// (anti-rollback).
pub fn verify_anchor_receipt(receipt: &AnchorReceipt) -> LedgerResult<VerifyResult> {
    let recomputed = compute_anchor_hash(
        receipt.seq,
        receipt.at,
        &receipt.decision_id,
        receipt.snapshot_up_to_seq,
        receipt.checkpoint_hash.as_deref(),
        receipt.root_hash.as_deref(),
        receipt.state_hash.as_deref(),
        receipt.prev_hash.as_deref(),
    )?;
    if recomputed != receipt.hash {
        return Ok(VerifyResult::fail("receipt hash does not match recomputed anchor hash"));
    }
    if let Some(head) = &receipt.head {
        if receipt.seq > head.seq {
            return Ok(VerifyResult::fail("receipt seq is ahead of pinned head (possible rollback)"));
        }
    }
    Ok(VerifyResult::ok())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReceiptV1 {
    pub version: u8,
    pub anchor: AnchorReceipt,
    pub decision: Option<Decision>,
    pub event_hash: Option<String>,
    pub inclusion_proof: Option<InclusionProof>,
}

pub fn export_decision_receipt_v1(
    store: &dyn Store,
    decision_id: &str,
    up_to_seq: u64,
) -> LedgerResult<DecisionReceiptV1> {
    let anchor = store
        .get_anchor_by_decision_snapshot(decision_id, up_to_seq)?
        .ok_or_else(|| LedgerError::SnapshotMissing(decision_id.to_string()))?;
    let snapshot = store
        .get_latest_snapshot(decision_id)?
        .filter(|s| s.up_to_seq == up_to_seq)
        .ok_or_else(|| LedgerError::SnapshotMissing(decision_id.to_string()))?;

    let head_anchor = store.get_last_anchor()?;
    let head = head_anchor.map(|a| AnchorHead { seq: a.seq, hash: a.hash, at: a.at });

    Ok(DecisionReceiptV1 {
        version: 1,
        anchor: AnchorReceipt::from_anchor(&anchor, head),
        decision: Some(snapshot.decision),
        event_hash: None,
        inclusion_proof: None,
    })
}

/// Attach an inclusion proof for `seq` computed against the leaves covering
/// the latest snapshot, so the receipt is self-verifying without store
/// access (§8 scenario 5).
pub fn with_inclusion_proof(
    store: &dyn Store,
    mut receipt: DecisionReceiptV1,
    decision_id: &str,
    seq: u64,
) -> LedgerResult<DecisionReceiptV1> {
    let rows = store.list_events(decision_id)?;
    let up_to = receipt.anchor.snapshot_up_to_seq;
    let leaves: Vec<String> = rows.iter().filter(|r| r.seq <= up_to).map(|r| r.hash.clone()).collect();
    let index = rows.iter().position(|r| r.seq == seq);
    if let Some(idx) = index {
        if let Some(p) = crate::merkle::proof(&leaves, idx) {
            receipt.event_hash = Some(p.leaf_hash.clone());
            receipt.inclusion_proof = Some(p);
        }
    }
    Ok(receipt)
}

/// Full offline verification per §4.8 (3 steps):
/// 1. anchor self-consistency, 2. decision state hash (if supplied),
/// 3. inclusion proof (if supplied).
pub fn verify_decision_receipt_offline(receipt: &DecisionReceiptV1) -> LedgerResult<VerifyResult> {
    let anchor_check = verify_anchor_receipt(&receipt.anchor)?;
    if !anchor_check.ok {
        return Ok(anchor_check);
    }

    if let Some(decision) = &receipt.decision {
        let computed = public_state_hash(decision)?;
        if Some(computed.as_str()) != receipt.anchor.state_hash.as_deref() {
            return Ok(VerifyResult::fail("decision state hash does not match anchor's claimed state_hash"));
        }
    }

    if let (Some(proof), Some(root)) = (&receipt.inclusion_proof, &receipt.anchor.root_hash) {
        let v = verify_proof(proof, root);
        if !v.ok {
            return Ok(VerifyResult::fail("leaf_hash_mismatch"));
        }
        if let Some(expected_leaf) = &receipt.event_hash {
            if expected_leaf != &proof.leaf_hash {
                return Ok(VerifyResult::fail("leaf_hash_mismatch"));
            }
        }
    }

    Ok(VerifyResult::ok())
}

/// §8 scenario 5: prove inclusion of `seq` from the latest snapshot root,
/// independent of any previously exported receipt.
pub fn verify_event_included_from_latest_snapshot(
    store: &dyn Store,
    decision_id: &str,
    seq: u64,
) -> LedgerResult<VerifyResult> {
    let snapshot = store
        .get_latest_snapshot(decision_id)?
        .ok_or_else(|| LedgerError::SnapshotMissing(decision_id.to_string()))?;
    let rows = store.list_events(decision_id)?;
    let leaves: Vec<String> = rows.iter().filter(|r| r.seq <= snapshot.up_to_seq).map(|r| r.hash.clone()).collect();
    let index = match rows.iter().position(|r| r.seq == seq) {
        Some(i) => i,
        None => return Ok(VerifyResult::fail("event not covered by latest snapshot")),
    };
    let Some(p) = crate::merkle::proof(&leaves, index) else {
        return Ok(VerifyResult::fail("could not build inclusion proof"));
    };
    let Some(root) = &snapshot.root_hash else {
        return Ok(VerifyResult::fail("snapshot has no root_hash"));
    };
    let expected_leaf = rows[index].hash.clone();
    if p.leaf_hash != expected_leaf {
        return Ok(VerifyResult::fail("leaf_hash_mismatch"));
    }
    let v = verify_proof(&p, root);
    if !v.ok {
        return Ok(VerifyResult::fail("leaf_hash_mismatch"));
    }
    Ok(VerifyResult::ok())
}

/// §8 scenario 6: verify the consistency relationship between two
/// snapshots of the same decision.
pub fn verify_snapshot_consistency(
    store: &dyn Store,
    decision_id: &str,
    old_up_to_seq: u64,
    new_up_to_seq: u64,
) -> LedgerResult<VerifyResult> {
    let rows = store.list_events(decision_id)?;
    let leaves: Vec<String> = rows.iter().filter(|r| r.seq <= new_up_to_seq).map(|r| r.hash.clone()).collect();
    let Some(proof) = crate::merkle::consistency(&leaves, old_up_to_seq as usize) else {
        return Ok(VerifyResult::fail("could not build consistency proof"));
    };

    let snapshots = store.list_snapshots(decision_id)?;
    let old_snap = snapshots.iter().find(|s| s.up_to_seq == old_up_to_seq);
    let new_snap = snapshots.iter().find(|s| s.up_to_seq == new_up_to_seq);

    if let Some(s) = old_snap {
        if s.root_hash.as_deref() != Some(proof.old_root.as_str()) {
            return Ok(VerifyResult::fail("old snapshot root_hash does not match recomputed prefix root"));
        }
    }
    if let Some(s) = new_snap {
        if s.root_hash.as_deref() != Some(proof.new_root.as_str()) {
            return Ok(VerifyResult::fail("new snapshot root_hash does not match recomputed full root"));
        }
    }

    if !crate::merkle::verify_consistency(&leaves, &proof) {
        return Ok(VerifyResult::fail("consistency proof does not verify"));
    }

    Ok(VerifyResult::ok())
}
