//! The per-decision hash-chain log (§4.4): `append`, `verify`, and the
//! `EventRow` shape persisted by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::hash_canonical;
use crate::error::{LedgerError, LedgerResult};
use crate::event::EventPayload;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub decision_id: String,
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub event: EventPayload,
    pub idempotency_key: Option<String>,
    pub prev_hash: Option<String>,
    pub hash: String,
}

/// The exact fields hashed into `EventRow::hash`, per §3's invariant.
#[derive(Serialize)]
struct HashInput<'a> {
    decision_id: &'a str,
    seq: u64,
    at: DateTime<Utc>,
    idempotency_key: Option<&'a str>,
    event: &'a EventPayload,
    prev_hash: Option<&'a str>,
}

pub fn compute_event_hash(
    decision_id: &str,
    seq: u64,
    at: DateTime<Utc>,
    idempotency_key: Option<&str>,
    event: &EventPayload,
    prev_hash: Option<&str>,
) -> LedgerResult<String> {
    let input = HashInput { decision_id, seq, at, idempotency_key, event, prev_hash };
    Ok(hash_canonical(&input)?)
}

#[derive(Debug, Clone)]
pub struct AppendInput {
    pub decision_id: String,
    pub event: EventPayload,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub row: EventRow,
    /// True when this call found and returned a prior row for the same
    /// idempotency key rather than inserting a new one (§4.9).
    pub replayed: bool,
}

/// Append one event row to `decision_id`'s chain.
///
/// Idempotency and sequencing are handled here, against the store's CAS
/// primitive (§4.4 step 1-5); callers provide `now` so the caller's own
/// single-writer discipline (a per-decision lock) determines ordering.
pub fn append(store: &dyn Store, input: AppendInput, now: DateTime<Utc>) -> LedgerResult<AppendOutcome> {
    if let Some(key) = &input.idempotency_key {
        if let Some(existing) = store.get_event_by_idempotency_key(&input.decision_id, key)? {
            log::warn!(
                "idempotent replay: decision={} seq={} key={}",
                input.decision_id, existing.seq, key
            );
            return Ok(AppendOutcome { row: existing, replayed: true });
        }
    }

    let last = store.get_last_event(&input.decision_id)?;
    let seq = last.as_ref().map(|r| r.seq + 1).unwrap_or(1);
    let prev_hash = last.as_ref().map(|r| r.hash.clone());

    let hash = compute_event_hash(
        &input.decision_id,
        seq,
        now,
        input.idempotency_key.as_deref(),
        &input.event,
        prev_hash.as_deref(),
    )?;

    let row = EventRow {
        decision_id: input.decision_id.clone(),
        seq,
        at: now,
        event: input.event,
        idempotency_key: input.idempotency_key,
        prev_hash,
        hash,
    };

    match store.insert_event_cas(row.clone())? {
        crate::store::InsertOutcome::Inserted => {
            log::info!("appended event: decision={} seq={}", row.decision_id, row.seq);
            Ok(AppendOutcome { row, replayed: false })
        }
        crate::store::InsertOutcome::Conflict => Err(LedgerError::SeqConflict { decision_id: input_decision_id(&row) }),
    }
}

fn input_decision_id(row: &EventRow) -> String {
    row.decision_id.clone()
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyReport {
    pub ok: bool,
    pub last_seq: u64,
    pub last_hash: Option<String>,
    pub verified_count: u64,
    pub reason: Option<String>,
}

/// Verify the `prev_hash`/`hash` linkage across an entire per-decision chain.
pub fn verify(store: &dyn Store, decision_id: &str) -> LedgerResult<VerifyReport> {
    let rows = store.list_events(decision_id)?;
    let mut prev_hash: Option<String> = None;
    let mut count = 0u64;

    for (i, row) in rows.iter().enumerate() {
        let expected_seq = (i as u64) + 1;
        if row.seq != expected_seq {
            return Ok(VerifyReport {
                ok: false,
                last_seq: row.seq,
                last_hash: Some(row.hash.clone()),
                verified_count: count,
                reason: Some(format!("non-dense seq: expected {expected_seq}, got {}", row.seq)),
            });
        }
        if row.prev_hash != prev_hash {
            log::error!("chain broken for decision={decision_id} at seq={}", row.seq);
            return Ok(VerifyReport {
                ok: false,
                last_seq: row.seq,
                last_hash: Some(row.hash.clone()),
                verified_count: count,
                reason: Some("prev_hash linkage broken".to_string()),
            });
        }
        let recomputed = compute_event_hash(
            &row.decision_id,
            row.seq,
            row.at,
            row.idempotency_key.as_deref(),
            &row.event,
            row.prev_hash.as_deref(),
        )?;
        if recomputed != row.hash {
            log::error!("hash mismatch for decision={decision_id} at seq={}", row.seq);
            return Ok(VerifyReport {
                ok: false,
                last_seq: row.seq,
                last_hash: Some(row.hash.clone()),
                verified_count: count,
                reason: Some("hash mismatch".to_string()),
            });
        }
        prev_hash = Some(row.hash.clone());
        count += 1;
    }

    Ok(VerifyReport {
        ok: true,
        last_seq: rows.last().map(|r| r.seq).unwrap_or(0),
        last_hash: rows.last().map(|r| r.hash.clone()),
        verified_count: count,
        reason: None,
    })
}
