//! Ledger-wide configuration (§4.12 `[ADD]`): bundles the per-concern
//! policies so a caller constructs one value instead of threading four.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anchor::AnchorPolicy;
use crate::decision::Decision;
use crate::error::{LedgerError, LedgerResult, Outcome};
use crate::event::EventPayload;
use crate::reducer::ApplyContext;
use crate::snapshot::SnapshotPolicy;
use crate::state_machine::{DecisionState, EventType};
use crate::store::Store;

/// Governs which event types are still accepted while a decision is
/// `LOCKED`, and how long an `APPROVED`/`REJECTED` decision stays unlocked
/// before `maybe_lock` moves it into `LOCKED` on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImmutabilityPolicy {
    pub allow_event_types_while_locked: Vec<EventType>,
    /// `None` means a decision never auto-locks; it stays `APPROVED`/`REJECTED`
    /// until an explicit `LOCK` event is appended.
    pub lock_expires_after: Option<chrono::Duration>,
}

impl Default for ImmutabilityPolicy {
    fn default() -> Self {
        Self {
            allow_event_types_while_locked: vec![EventType::AttachArtifacts, EventType::AttestExternal],
            lock_expires_after: None,
        }
    }
}

impl ImmutabilityPolicy {
    pub fn allows_while_locked(&self, event: &EventType) -> bool {
        self.allow_event_types_while_locked.contains(event)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub snapshot_policy: SnapshotPolicy,
    pub anchor_policy: AnchorPolicy,
    pub immutability_policy: ImmutabilityPolicy,
}

/// Moves an `APPROVED`/`REJECTED` decision into `LOCKED` once its immutability
/// delay has elapsed (§4.2), by appending a system-originated `LOCK` event
/// through the normal reducer/chain path. A no-op when no delay is
/// configured, the decision isn't in `APPROVED`/`REJECTED`, or the delay
/// hasn't elapsed yet. Called by `submit_event` before it processes an
/// incoming event so a stale `APPROVED`/`REJECTED` decision locks before any
/// new event is evaluated against it.
pub fn maybe_lock(
    store: &dyn Store,
    decision_id: &str,
    policy: &ImmutabilityPolicy,
    now: DateTime<Utc>,
) -> LedgerResult<Option<Decision>> {
    let delay = match policy.lock_expires_after {
        Some(d) => d,
        None => return Ok(None),
    };

    let decision = store
        .get_decision(decision_id)?
        .ok_or_else(|| LedgerError::DecisionNotFound(decision_id.to_string()))?;

    if !matches!(decision.state, DecisionState::Approved | DecisionState::Rejected) {
        return Ok(None);
    }
    if now < decision.updated_at + delay {
        return Ok(None);
    }

    let last = store.get_last_event(decision_id)?;
    let seq_hint = last.as_ref().map(|r| r.seq + 1).unwrap_or(1);
    let event = EventPayload::Lock { actor_id: "system".to_string() };

    let ctx = ApplyContext {
        now,
        seq_hint,
        allow_locked: &policy.allow_event_types_while_locked,
        require_reject_reason_meta: false,
        compliance_hook: None,
    };

    let result = match crate::reducer::apply(&decision, &event, &ctx) {
        Outcome::Accepted(result) => result,
        Outcome::Rejected(_) => return Ok(None),
    };

    crate::chain::append(
        store,
        crate::chain::AppendInput { decision_id: decision_id.to_string(), event, idempotency_key: None },
        now,
    )?;
    store.put_decision(result.decision.clone())?;
    log::info!("decision auto-locked: decision={decision_id}");

    Ok(Some(result.decision))
}
