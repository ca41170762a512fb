//! The six concrete end-to-end scenarios a decision ledger must satisfy.

use chrono::Utc;

use decision_ledger::anchor::{maybe_anchor, AnchorPolicy};
use decision_ledger::chain::{append, verify, AppendInput};
use decision_ledger::decision::Decision;
use decision_ledger::event::EventPayload;
use decision_ledger::merkle;
use decision_ledger::receipt::{export_decision_receipt_v1, verify_decision_receipt_offline, verify_event_included_from_latest_snapshot, verify_snapshot_consistency};
use decision_ledger::snapshot::{maybe_snapshot, SnapshotPolicy};
use decision_ledger::state_machine::DecisionState;
use decision_ledger::store::memory::MemoryStore;
use decision_ledger::store::Store;
use decision_ledger::{config::LedgerConfig, submit_event, Outcome};

fn config_with(snapshot_policy: SnapshotPolicy, anchor_policy: AnchorPolicy) -> LedgerConfig {
    LedgerConfig { snapshot_policy, anchor_policy, immutability_policy: Default::default() }
}

#[test]
fn scenario_1_happy_path_reaches_approved() {
    let store = MemoryStore::new();
    let now = Utc::now();
    store.create_decision(Decision::new("dec_1", now)).unwrap();

    // APPROVE requires title/owner_id on the decision, so seed them first
    // via an ATTACH_ARTIFACTS-adjacent path: set directly through the store
    // the way a caller would after an earlier administrative event.
    let mut seeded = store.get_decision("dec_1").unwrap().unwrap();
    seeded.meta.title = "Q3 budget reallocation".to_string();
    seeded.meta.owner_id = "owner_1".to_string();
    store.put_decision(seeded).unwrap();

    let config = config_with(SnapshotPolicy::default(), AnchorPolicy::default());

    for ev in [
        EventPayload::Validate { actor_id: "a1".into(), actor_type: None },
        EventPayload::Simulate { actor_id: "a1".into(), simulation_snapshot_id: None },
        EventPayload::Explain { actor_id: "a1".into(), explain_tree_id: None },
        EventPayload::Approve { actor_id: "a1".into(), meta: None },
    ] {
        let outcome = submit_event(&store, "dec_1", ev, None, &config, false, None, now).unwrap();
        assert!(outcome_accepted(&outcome), "{outcome:?}");
    }

    let decision = store.get_decision("dec_1").unwrap().unwrap();
    assert_eq!(decision.state, DecisionState::Approved);
    assert_eq!(decision.version, 4);

    let report = verify(&store, "dec_1").unwrap();
    assert!(report.ok);
    assert_eq!(report.verified_count, 4);

    let rows = store.list_events("dec_1").unwrap();
    let leaves: Vec<String> = rows.iter().map(|r| r.hash.clone()).collect();
    let root_a = merkle::root(&leaves);
    let root_b = merkle::root(&leaves);
    assert_eq!(root_a, root_b);
    assert!(root_a.is_some());
}

#[test]
fn scenario_2_invalid_transition_adds_no_rows() {
    let store = MemoryStore::new();
    let now = Utc::now();
    store.create_decision(Decision::new("dec_blocked", now)).unwrap();
    let config = config_with(SnapshotPolicy::default(), AnchorPolicy::default());

    let ev = EventPayload::Approve { actor_id: "a1".into(), meta: None };
    let outcome = submit_event(&store, "dec_blocked", ev, None, &config, false, None, now).unwrap();

    match outcome {
        Outcome::Rejected(violations) => {
            // APPROVE from DRAFT fails the state-machine check before the
            // required-meta check even runs; either violation is a valid
            // "blocked before any row is written" result for this scenario.
            assert!(violations.iter().any(|v| v.code == "INVALID_TRANSITION" || v.code == "MISSING_REQUIRED_META"));
        }
        Outcome::Accepted(_) => panic!("expected rejection"),
    }
    assert!(store.list_events("dec_blocked").unwrap().is_empty());
}

#[test]
fn scenario_3_idempotency_key_dedupes_to_one_row() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let ev = EventPayload::Validate { actor_id: "a1".into(), actor_type: None };

    let first = append(&store, AppendInput { decision_id: "dec_3".into(), event: ev.clone(), idempotency_key: Some("v1".into()) }, now).unwrap();
    let second = append(&store, AppendInput { decision_id: "dec_3".into(), event: ev, idempotency_key: Some("v1".into()) }, now).unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.row.seq, 1);
    assert_eq!(second.row.seq, 1);
    assert_eq!(first.row.hash, second.row.hash);
    assert_eq!(store.list_events("dec_3").unwrap().len(), 1);
}

#[test]
fn scenario_4_two_events_yield_two_chained_anchors_and_an_offline_receipt() {
    let store = MemoryStore::new();
    let now = Utc::now();
    store.create_decision(Decision::new("dec_4", now)).unwrap();

    let config = config_with(
        SnapshotPolicy { every_n_events: 1, keep_last_n: 10, prune_events_up_to_latest_snapshot: false },
        AnchorPolicy { enabled: true, keep_last_n_anchors: 10 },
    );

    for ev in [
        EventPayload::Validate { actor_id: "a1".into(), actor_type: None },
        EventPayload::Simulate { actor_id: "a1".into(), simulation_snapshot_id: None },
    ] {
        let outcome = submit_event(&store, "dec_4", ev, None, &config, false, None, now).unwrap();
        assert!(outcome_accepted(&outcome));
    }

    let anchors = store.list_anchors().unwrap();
    assert_eq!(anchors.len(), 2);
    assert_eq!(anchors[1].prev_hash, Some(anchors[0].hash.clone()));

    let receipt = export_decision_receipt_v1(&store, "dec_4", 2).unwrap();
    let result = verify_decision_receipt_offline(&receipt).unwrap();
    assert!(result.ok, "{:?}", result.reason);
}

#[test]
fn scenario_5_inclusion_proof_detects_tampering() {
    let store = MemoryStore::new();
    let now = Utc::now();
    store.create_decision(Decision::new("dec_5", now)).unwrap();

    let snap_policy = SnapshotPolicy { every_n_events: 1, keep_last_n: 10, prune_events_up_to_latest_snapshot: false };
    for ev in [
        EventPayload::Validate { actor_id: "a1".into(), actor_type: None },
        EventPayload::Simulate { actor_id: "a1".into(), simulation_snapshot_id: None },
    ] {
        let append_outcome = append(&store, AppendInput { decision_id: "dec_5".into(), event: ev, idempotency_key: None }, now).unwrap();
        let mut d = store.get_decision("dec_5").unwrap().unwrap();
        d.version += 1;
        store.put_decision(d).unwrap();
        maybe_snapshot(&store, "dec_5", &snap_policy, now).unwrap();
        let _ = append_outcome;
    }

    assert!(verify_event_included_from_latest_snapshot(&store, "dec_5", 2).unwrap().ok);

    store.tamper_event_hash("dec_5", 2, "0000000000000000000000000000000000000000000000000000000000000000");
    let result = verify_event_included_from_latest_snapshot(&store, "dec_5", 2).unwrap();
    assert!(!result.ok);
    assert_eq!(result.reason.as_deref(), Some("leaf_hash_mismatch"));
}

#[test]
fn scenario_6_snapshot_consistency_rejects_foreign_root() {
    let store = MemoryStore::new();
    let now = Utc::now();
    store.create_decision(Decision::new("dec_6", now)).unwrap();

    let snap_policy = SnapshotPolicy { every_n_events: 1, keep_last_n: 10, prune_events_up_to_latest_snapshot: false };
    for ev in [
        EventPayload::Validate { actor_id: "a1".into(), actor_type: None },
        EventPayload::Simulate { actor_id: "a1".into(), simulation_snapshot_id: None },
    ] {
        append(&store, AppendInput { decision_id: "dec_6".into(), event: ev, idempotency_key: None }, now).unwrap();
        let mut d = store.get_decision("dec_6").unwrap().unwrap();
        d.version += 1;
        store.put_decision(d).unwrap();
        maybe_snapshot(&store, "dec_6", &snap_policy, now).unwrap();
    }

    let ok = verify_snapshot_consistency(&store, "dec_6", 1, 2).unwrap();
    assert!(ok.ok, "{:?}", ok.reason);

    let mut snapshots = store.list_snapshots("dec_6").unwrap();
    let old = snapshots.iter_mut().find(|s| s.up_to_seq == 1).unwrap();
    old.root_hash = Some(decision_ledger::canonical::sha256_hex(b"from-a-different-decision"));
    store.put_snapshot(old.clone()).unwrap();

    let bad = verify_snapshot_consistency(&store, "dec_6", 1, 2).unwrap();
    assert!(!bad.ok);
}

fn outcome_accepted<T>(outcome: &Outcome<T>) -> bool {
    outcome.is_accepted()
}
