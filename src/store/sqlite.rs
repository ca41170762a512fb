//! SQL-backed `Store` (feature `sqlite-store`): one `rusqlite::Connection`
//! behind a single global writer lock (§5), rows stored as canonical JSON
//! blobs per §6's schema.

use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::anchor::Anchor;
use crate::chain::EventRow;
use crate::decision::Decision;
use crate::edges::DecisionEdge;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::LedgerEntry;
use crate::snapshot::Snapshot;

use super::{InsertOutcome, Store};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open(path).map_err(sqlite_err)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory().map_err(sqlite_err)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> LedgerResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS decisions (
                decision_id TEXT PRIMARY KEY,
                decision_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS decision_events (
                decision_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                at TEXT NOT NULL,
                idempotency_key TEXT,
                event_json TEXT NOT NULL,
                prev_hash TEXT,
                hash TEXT NOT NULL,
                PRIMARY KEY (decision_id, seq)
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_events_idem
                ON decision_events(decision_id, idempotency_key)
                WHERE idempotency_key IS NOT NULL;
            CREATE TABLE IF NOT EXISTS decision_snapshots (
                decision_id TEXT NOT NULL,
                up_to_seq INTEGER NOT NULL,
                decision_json TEXT NOT NULL,
                checkpoint_hash TEXT NOT NULL,
                root_hash TEXT,
                created_at TEXT NOT NULL,
                PRIMARY KEY (decision_id, up_to_seq)
            );
            CREATE TABLE IF NOT EXISTS decision_anchors (
                seq INTEGER PRIMARY KEY,
                at TEXT NOT NULL,
                decision_id TEXT NOT NULL,
                snapshot_up_to_seq INTEGER NOT NULL,
                checkpoint_hash TEXT,
                root_hash TEXT,
                state_hash TEXT,
                prev_hash TEXT,
                hash TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS ledger_entries (
                seq INTEGER PRIMARY KEY,
                at TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                type TEXT NOT NULL,
                decision_id TEXT,
                event_seq INTEGER,
                snapshot_up_to_seq INTEGER,
                anchor_seq INTEGER,
                payload_json TEXT NOT NULL,
                sig_alg TEXT,
                key_id TEXT,
                signature TEXT,
                prev_hash TEXT,
                hash TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS decision_edges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                from_decision_id TEXT NOT NULL,
                to_decision_id TEXT NOT NULL,
                relation TEXT NOT NULL,
                via_event_seq INTEGER NOT NULL,
                edge_hash TEXT NOT NULL,
                meta_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(from_decision_id, to_decision_id, relation, via_event_seq)
            );
            ",
        )
        .map_err(sqlite_err)?;
        Ok(())
    }
}

fn sqlite_err(e: rusqlite::Error) -> LedgerError {
    LedgerError::InvalidEventPayload(format!("sqlite: {e}"))
}

fn row_to_event(decision_id: &str, seq: i64, at: String, idem: Option<String>, event_json: String, prev_hash: Option<String>, hash: String) -> LedgerResult<EventRow> {
    Ok(EventRow {
        decision_id: decision_id.to_string(),
        seq: seq as u64,
        at: at.parse().map_err(|_| LedgerError::InvalidEventPayload("bad timestamp".into()))?,
        event: serde_json::from_str(&event_json)?,
        idempotency_key: idem,
        prev_hash,
        hash,
    })
}

impl Store for SqliteStore {
    fn create_decision(&self, decision: Decision) -> LedgerResult<()> {
        let conn = self.conn.lock().unwrap();
        let json = serde_json::to_string(&decision)?;
        conn.execute(
            "INSERT OR IGNORE INTO decisions (decision_id, decision_json) VALUES (?1, ?2)",
            params![decision.decision_id, json],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    fn get_decision(&self, decision_id: &str) -> LedgerResult<Option<Decision>> {
        let conn = self.conn.lock().unwrap();
        let json: Option<String> = conn
            .query_row("SELECT decision_json FROM decisions WHERE decision_id = ?1", params![decision_id], |r| r.get(0))
            .optional()
            .map_err(sqlite_err)?;
        Ok(json.map(|j| serde_json::from_str(&j)).transpose()?)
    }

    fn put_decision(&self, decision: Decision) -> LedgerResult<()> {
        let conn = self.conn.lock().unwrap();
        let json = serde_json::to_string(&decision)?;
        conn.execute(
            "INSERT INTO decisions (decision_id, decision_json) VALUES (?1, ?2)
             ON CONFLICT(decision_id) DO UPDATE SET decision_json = excluded.decision_json",
            params![decision.decision_id, json],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    fn get_last_event(&self, decision_id: &str) -> LedgerResult<Option<EventRow>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT seq, at, idempotency_key, event_json, prev_hash, hash FROM decision_events
                 WHERE decision_id = ?1 ORDER BY seq DESC LIMIT 1",
                params![decision_id],
                |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, Option<String>>(2)?, r.get::<_, String>(3)?, r.get::<_, Option<String>>(4)?, r.get::<_, String>(5)?)),
            )
            .optional()
            .map_err(sqlite_err)?;
        row.map(|(seq, at, idem, ev, prev, hash)| row_to_event(decision_id, seq, at, idem, ev, prev, hash)).transpose()
    }

    fn get_event_by_seq(&self, decision_id: &str, seq: u64) -> LedgerResult<Option<EventRow>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT seq, at, idempotency_key, event_json, prev_hash, hash FROM decision_events
                 WHERE decision_id = ?1 AND seq = ?2",
                params![decision_id, seq as i64],
                |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, Option<String>>(2)?, r.get::<_, String>(3)?, r.get::<_, Option<String>>(4)?, r.get::<_, String>(5)?)),
            )
            .optional()
            .map_err(sqlite_err)?;
        row.map(|(seq, at, idem, ev, prev, hash)| row_to_event(decision_id, seq, at, idem, ev, prev, hash)).transpose()
    }

    fn get_event_by_idempotency_key(&self, decision_id: &str, key: &str) -> LedgerResult<Option<EventRow>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT seq, at, idempotency_key, event_json, prev_hash, hash FROM decision_events
                 WHERE decision_id = ?1 AND idempotency_key = ?2",
                params![decision_id, key],
                |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, Option<String>>(2)?, r.get::<_, String>(3)?, r.get::<_, Option<String>>(4)?, r.get::<_, String>(5)?)),
            )
            .optional()
            .map_err(sqlite_err)?;
        row.map(|(seq, at, idem, ev, prev, hash)| row_to_event(decision_id, seq, at, idem, ev, prev, hash)).transpose()
    }

    fn list_events(&self, decision_id: &str) -> LedgerResult<Vec<EventRow>> {
        self.list_events_from(decision_id, 1)
    }

    fn list_events_from(&self, decision_id: &str, from_seq: u64) -> LedgerResult<Vec<EventRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT seq, at, idempotency_key, event_json, prev_hash, hash FROM decision_events
                 WHERE decision_id = ?1 AND seq >= ?2 ORDER BY seq ASC",
            )
            .map_err(sqlite_err)?;
        let rows = stmt
            .query_map(params![decision_id, from_seq as i64], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, Option<String>>(2)?, r.get::<_, String>(3)?, r.get::<_, Option<String>>(4)?, r.get::<_, String>(5)?))
            })
            .map_err(sqlite_err)?;
        let mut out = Vec::new();
        for r in rows {
            let (seq, at, idem, ev, prev, hash) = r.map_err(sqlite_err)?;
            out.push(row_to_event(decision_id, seq, at, idem, ev, prev, hash)?);
        }
        Ok(out)
    }

    fn list_events_tail(&self, decision_id: &str, n: usize) -> LedgerResult<Vec<EventRow>> {
        let all = self.list_events(decision_id)?;
        let start = all.len().saturating_sub(n);
        Ok(all[start..].to_vec())
    }

    fn insert_event_cas(&self, row: EventRow) -> LedgerResult<InsertOutcome> {
        let conn = self.conn.lock().unwrap();
        let last_seq: Option<i64> = conn
            .query_row(
                "SELECT MAX(seq) FROM decision_events WHERE decision_id = ?1",
                params![row.decision_id],
                |r| r.get(0),
            )
            .map_err(sqlite_err)?;
        let expected = last_seq.unwrap_or(0) + 1;
        if row.seq as i64 != expected {
            return Ok(InsertOutcome::Conflict);
        }
        let event_json = serde_json::to_string(&row.event)?;
        conn.execute(
            "INSERT INTO decision_events (decision_id, seq, at, idempotency_key, event_json, prev_hash, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![row.decision_id, row.seq as i64, row.at.to_rfc3339(), row.idempotency_key, event_json, row.prev_hash, row.hash],
        )
        .map_err(sqlite_err)?;
        Ok(InsertOutcome::Inserted)
    }

    fn get_latest_snapshot(&self, decision_id: &str) -> LedgerResult<Option<Snapshot>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(i64, String, String, Option<String>, String)> = conn
            .query_row(
                "SELECT up_to_seq, decision_json, checkpoint_hash, root_hash, created_at FROM decision_snapshots
                 WHERE decision_id = ?1 ORDER BY up_to_seq DESC LIMIT 1",
                params![decision_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .optional()
            .map_err(sqlite_err)?;
        row.map(|(up_to_seq, decision_json, checkpoint_hash, root_hash, created_at)| {
            Ok(Snapshot {
                decision_id: decision_id.to_string(),
                up_to_seq: up_to_seq as u64,
                decision: serde_json::from_str(&decision_json)?,
                created_at: created_at.parse().map_err(|_| LedgerError::InvalidEventPayload("bad timestamp".into()))?,
                checkpoint_hash,
                root_hash,
            })
        })
        .transpose()
    }

    fn put_snapshot(&self, snapshot: Snapshot) -> LedgerResult<()> {
        let conn = self.conn.lock().unwrap();
        let decision_json = serde_json::to_string(&snapshot.decision)?;
        conn.execute(
            "INSERT INTO decision_snapshots (decision_id, up_to_seq, decision_json, checkpoint_hash, root_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(decision_id, up_to_seq) DO UPDATE SET decision_json = excluded.decision_json",
            params![snapshot.decision_id, snapshot.up_to_seq as i64, decision_json, snapshot.checkpoint_hash, snapshot.root_hash, snapshot.created_at.to_rfc3339()],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    fn list_snapshots(&self, decision_id: &str) -> LedgerResult<Vec<Snapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT up_to_seq, decision_json, checkpoint_hash, root_hash, created_at FROM decision_snapshots
                 WHERE decision_id = ?1 ORDER BY up_to_seq ASC",
            )
            .map_err(sqlite_err)?;
        let rows = stmt
            .query_map(params![decision_id], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?, r.get::<_, Option<String>>(3)?, r.get::<_, String>(4)?))
            })
            .map_err(sqlite_err)?;
        let mut out = Vec::new();
        for r in rows {
            let (up_to_seq, decision_json, checkpoint_hash, root_hash, created_at) = r.map_err(sqlite_err)?;
            out.push(Snapshot {
                decision_id: decision_id.to_string(),
                up_to_seq: up_to_seq as u64,
                decision: serde_json::from_str(&decision_json)?,
                created_at: created_at.parse().map_err(|_| LedgerError::InvalidEventPayload("bad timestamp".into()))?,
                checkpoint_hash,
                root_hash,
            });
        }
        Ok(out)
    }

    fn prune_snapshots(&self, decision_id: &str, keep_last_n: u64) -> LedgerResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM decision_snapshots WHERE decision_id = ?1 AND up_to_seq NOT IN (
                SELECT up_to_seq FROM decision_snapshots WHERE decision_id = ?1 ORDER BY up_to_seq DESC LIMIT ?2
             )",
            params![decision_id, keep_last_n as i64],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    fn prune_events_up_to_seq(&self, decision_id: &str, seq: u64) -> LedgerResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM decision_events WHERE decision_id = ?1 AND seq <= ?2",
            params![decision_id, seq as i64],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    fn list_anchors(&self) -> LedgerResult<Vec<Anchor>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT seq, at, decision_id, snapshot_up_to_seq, checkpoint_hash, root_hash, state_hash, prev_hash, hash FROM decision_anchors ORDER BY seq ASC")
            .map_err(sqlite_err)?;
        let rows = stmt
            .query_map([], |r| {
                Ok(Anchor {
                    seq: r.get::<_, i64>(0)? as u64,
                    at: r.get::<_, String>(1)?.parse().unwrap_or_default(),
                    decision_id: r.get(2)?,
                    snapshot_up_to_seq: r.get::<_, i64>(3)? as u64,
                    checkpoint_hash: r.get(4)?,
                    root_hash: r.get(5)?,
                    state_hash: r.get(6)?,
                    prev_hash: r.get(7)?,
                    hash: r.get(8)?,
                })
            })
            .map_err(sqlite_err)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(sqlite_err)?);
        }
        Ok(out)
    }

    fn get_last_anchor(&self) -> LedgerResult<Option<Anchor>> {
        Ok(self.list_anchors()?.into_iter().last())
    }

    fn get_anchor_by_decision_snapshot(&self, decision_id: &str, up_to_seq: u64) -> LedgerResult<Option<Anchor>> {
        Ok(self
            .list_anchors()?
            .into_iter()
            .find(|a| a.decision_id == decision_id && a.snapshot_up_to_seq == up_to_seq))
    }

    fn append_anchor(&self, anchor: Anchor) -> LedgerResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO decision_anchors (seq, at, decision_id, snapshot_up_to_seq, checkpoint_hash, root_hash, state_hash, prev_hash, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![anchor.seq as i64, anchor.at.to_rfc3339(), anchor.decision_id, anchor.snapshot_up_to_seq as i64, anchor.checkpoint_hash, anchor.root_hash, anchor.state_hash, anchor.prev_hash, anchor.hash],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    fn prune_anchors(&self, keep_last_n: u64) -> LedgerResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM decision_anchors WHERE seq NOT IN (SELECT seq FROM decision_anchors ORDER BY seq DESC LIMIT ?1)",
            params![keep_last_n as i64],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    fn list_ledger_entries(&self, tenant_id: Option<&str>) -> LedgerResult<Vec<LedgerEntry>> {
        let conn = self.conn.lock().unwrap();
        let sql = match tenant_id {
            Some(_) => "SELECT seq, at, tenant_id, type, decision_id, event_seq, snapshot_up_to_seq, anchor_seq, payload_json, sig_alg, key_id, signature, prev_hash, hash FROM ledger_entries WHERE tenant_id = ?1 ORDER BY seq ASC",
            None => "SELECT seq, at, tenant_id, type, decision_id, event_seq, snapshot_up_to_seq, anchor_seq, payload_json, sig_alg, key_id, signature, prev_hash, hash FROM ledger_entries ORDER BY seq ASC",
        };
        let mut stmt = conn.prepare(sql).map_err(sqlite_err)?;
        let map_row = |r: &rusqlite::Row| -> rusqlite::Result<LedgerEntryRaw> {
            Ok(LedgerEntryRaw {
                seq: r.get(0)?, at: r.get(1)?, tenant_id: r.get(2)?, entry_type: r.get(3)?, decision_id: r.get(4)?,
                event_seq: r.get(5)?, snapshot_up_to_seq: r.get(6)?, anchor_seq: r.get(7)?, payload_json: r.get(8)?,
                sig_alg: r.get(9)?, key_id: r.get(10)?, signature: r.get(11)?, prev_hash: r.get(12)?, hash: r.get(13)?,
            })
        };
        let rows = if tenant_id.is_some() {
            stmt.query_map(params![tenant_id.unwrap()], map_row).map_err(sqlite_err)?
        } else {
            stmt.query_map([], map_row).map_err(sqlite_err)?
        };
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(sqlite_err)?.into_entry()?);
        }
        Ok(out)
    }

    fn append_ledger_entry(&self, entry: LedgerEntry) -> LedgerResult<()> {
        let conn = self.conn.lock().unwrap();
        let payload_json = serde_json::to_string(&entry.payload)?;
        let (sig_alg, key_id, signature) = match &entry.signature {
            Some(s) => (Some(format!("{:?}", s.alg)), Some(s.key_id.clone()), Some(s.signature.clone())),
            None => (None, None, None),
        };
        let type_str = serde_json::to_value(entry.entry_type)?.as_str().unwrap_or_default().to_string();
        conn.execute(
            "INSERT INTO ledger_entries (seq, at, tenant_id, type, decision_id, event_seq, snapshot_up_to_seq, anchor_seq, payload_json, sig_alg, key_id, signature, prev_hash, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![entry.seq as i64, entry.at.to_rfc3339(), entry.tenant_id, type_str, entry.decision_id, entry.event_seq.map(|v| v as i64), entry.snapshot_up_to_seq.map(|v| v as i64), entry.anchor_seq.map(|v| v as i64), payload_json, sig_alg, key_id, signature, entry.prev_hash, entry.hash],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }

    fn get_last_ledger_entry(&self) -> LedgerResult<Option<LedgerEntry>> {
        Ok(self.list_ledger_entries(None)?.into_iter().last())
    }

    fn list_decision_edges(&self, from_decision_id: Option<&str>) -> LedgerResult<Vec<DecisionEdge>> {
        let conn = self.conn.lock().unwrap();
        let sql = match from_decision_id {
            Some(_) => "SELECT from_decision_id, to_decision_id, relation, via_event_seq, edge_hash, meta_json, created_at FROM decision_edges WHERE from_decision_id = ?1",
            None => "SELECT from_decision_id, to_decision_id, relation, via_event_seq, edge_hash, meta_json, created_at FROM decision_edges",
        };
        let mut stmt = conn.prepare(sql).map_err(sqlite_err)?;
        let map_row = |r: &rusqlite::Row| -> rusqlite::Result<(String, String, String, i64, String, String, String)> {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?))
        };
        let rows = if from_decision_id.is_some() {
            stmt.query_map(params![from_decision_id.unwrap()], map_row).map_err(sqlite_err)?
        } else {
            stmt.query_map([], map_row).map_err(sqlite_err)?
        };
        let mut out = Vec::new();
        for r in rows {
            let (from_decision_id, to_decision_id, relation, via_event_seq, edge_hash, meta_json, created_at) = r.map_err(sqlite_err)?;
            let meta: serde_json::Value = serde_json::from_str(&meta_json)?;
            out.push(DecisionEdge {
                from_decision_id,
                to_decision_id,
                relation,
                via_event_seq: via_event_seq as u64,
                edge_hash,
                note: meta.get("note").and_then(|v| v.as_str()).map(|s| s.to_string()),
                confidence: meta.get("confidence").and_then(|v| v.as_f64()),
                created_at: created_at.parse().map_err(|_| LedgerError::InvalidEventPayload("bad timestamp".into()))?,
            });
        }
        Ok(out)
    }

    fn upsert_decision_edge(&self, edge: DecisionEdge) -> LedgerResult<()> {
        let conn = self.conn.lock().unwrap();
        let meta = serde_json::json!({ "note": edge.note, "confidence": edge.confidence });
        conn.execute(
            "INSERT INTO decision_edges (from_decision_id, to_decision_id, relation, via_event_seq, edge_hash, meta_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(from_decision_id, to_decision_id, relation, via_event_seq) DO UPDATE SET edge_hash = excluded.edge_hash, meta_json = excluded.meta_json",
            params![edge.from_decision_id, edge.to_decision_id, edge.relation, edge.via_event_seq as i64, edge.edge_hash, meta.to_string(), edge.created_at.to_rfc3339()],
        )
        .map_err(sqlite_err)?;
        Ok(())
    }
}

struct LedgerEntryRaw {
    seq: i64,
    at: String,
    tenant_id: String,
    entry_type: String,
    decision_id: Option<String>,
    event_seq: Option<i64>,
    snapshot_up_to_seq: Option<i64>,
    anchor_seq: Option<i64>,
    payload_json: String,
    sig_alg: Option<String>,
    key_id: Option<String>,
    signature: Option<String>,
    prev_hash: Option<String>,
    hash: String,
}

impl LedgerEntryRaw {
    fn into_entry(self) -> LedgerResult<LedgerEntry> {
        let signature = match (self.sig_alg, self.key_id, self.signature) {
            (Some(alg), Some(key_id), Some(signature)) => {
                let alg = if alg.contains("Ed25519") {
                    crate::signing::SignatureAlg::Ed25519
                } else {
                    crate::signing::SignatureAlg::HmacSha256
                };
                Some(crate::signing::Signature { alg, key_id, signature })
            }
            _ => None,
        };
        Ok(LedgerEntry {
            seq: self.seq as u64,
            at: self.at.parse().map_err(|_| LedgerError::InvalidEventPayload("bad timestamp".into()))?,
            tenant_id: self.tenant_id,
            entry_type: serde_json::from_value(serde_json::Value::String(self.entry_type))?,
            decision_id: self.decision_id,
            event_seq: self.event_seq.map(|v| v as u64),
            snapshot_up_to_seq: self.snapshot_up_to_seq.map(|v| v as u64),
            anchor_seq: self.anchor_seq.map(|v| v as u64),
            payload: serde_json::from_str(&self.payload_json)?,
            signature,
            prev_hash: self.prev_hash,
            hash: self.hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{append, AppendInput};
    use crate::decision::Decision;
    use crate::event::EventPayload;
    use chrono::Utc;

    #[test]
    fn append_and_verify_round_trips_through_sqlite() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        store.create_decision(Decision::new("d1", now)).unwrap();
        let ev = EventPayload::Validate { actor_id: "a".into(), actor_type: None };
        append(&store, AppendInput { decision_id: "d1".into(), event: ev, idempotency_key: None }, now).unwrap();
        let report = crate::chain::verify(&store, "d1").unwrap();
        assert!(report.ok);
    }
}
