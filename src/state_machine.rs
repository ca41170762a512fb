//! The fixed state machine a `Decision` moves through.
//!
//! `transition` is the single source of truth for §4.2's transition table;
//! the reducer never branches on state directly, it asks this module.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionState {
    Draft,
    Validated,
    Simulated,
    Explained,
    Approved,
    Rejected,
    Disputed,
    Locked,
}

impl DecisionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DecisionState::Locked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Validate,
    Simulate,
    Explain,
    Approve,
    Reject,
    AttachArtifacts,
    IngestRecords,
    LinkDecisions,
    EnterDispute,
    AttestExternal,
    Fork,
    CommitCounterfactual,
    Lock,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Event types accepted while a decision is `DISPUTED`: audit-safe, never
/// state-advancing.
const DISPUTE_SAFE_EVENTS: &[EventType] = &[EventType::AttachArtifacts, EventType::AttestExternal];

/// Side transitions available from any non-terminal, non-disputed state.
fn side_transition(state: DecisionState, ev: EventType) -> Option<DecisionState> {
    match (state, ev) {
        (DecisionState::Draft | DecisionState::Validated | DecisionState::Simulated | DecisionState::Explained,
            EventType::EnterDispute) => Some(DecisionState::Disputed),
        _ => None,
    }
}

/// Compute the next state for `(state, event)`, or `None` if the event is
/// not accepted from `state` at all (caller distinguishes `FROZEN`/`LOCKED`
/// from a plain `INVALID_TRANSITION`).
pub fn transition(state: DecisionState, ev: EventType, allow_locked: &[EventType]) -> TransitionOutcome {
    if state == DecisionState::Disputed {
        return if DISPUTE_SAFE_EVENTS.contains(&ev) {
            TransitionOutcome::Stay
        } else {
            TransitionOutcome::Frozen
        };
    }
    if state == DecisionState::Locked {
        return if allow_locked.contains(&ev) {
            TransitionOutcome::Stay
        } else {
            TransitionOutcome::LockedOut
        };
    }
    if let Some(next) = side_transition(state, ev) {
        return TransitionOutcome::Move(next);
    }
    let next = match (state, ev) {
        (DecisionState::Draft, EventType::Validate) => Some(DecisionState::Validated),
        (DecisionState::Draft, EventType::AttachArtifacts) => Some(DecisionState::Draft),
        (DecisionState::Draft, EventType::IngestRecords) => Some(DecisionState::Draft),

        (DecisionState::Validated, EventType::Simulate) => Some(DecisionState::Simulated),
        (DecisionState::Validated, EventType::AttachArtifacts) => Some(DecisionState::Validated),
        (DecisionState::Validated, EventType::LinkDecisions) => Some(DecisionState::Validated),

        (DecisionState::Simulated, EventType::Explain) => Some(DecisionState::Explained),
        (DecisionState::Simulated, EventType::AttachArtifacts) => Some(DecisionState::Simulated),
        (DecisionState::Simulated, EventType::LinkDecisions) => Some(DecisionState::Simulated),

        (DecisionState::Explained, EventType::Approve) => Some(DecisionState::Approved),
        (DecisionState::Explained, EventType::Reject) => Some(DecisionState::Rejected),

        // Immutability window expiry (§4.2): a terminal decision outcome
        // becomes LOCKED once `ImmutabilityPolicy.lock_expires_after` elapses.
        (DecisionState::Approved | DecisionState::Rejected, EventType::Lock) => Some(DecisionState::Locked),

        // Fork / counterfactual operations never move the originating
        // decision's own state; they only record history/artifacts.
        (_, EventType::Fork) => Some(state),
        (_, EventType::CommitCounterfactual) => Some(state),

        _ => None,
    };
    match next {
        Some(s) => TransitionOutcome::Move(s),
        None => TransitionOutcome::Invalid,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Moves to a new (possibly identical) state.
    Move(DecisionState),
    /// Event accepted but defined to leave state unchanged (dispute-safe / locked-allow list).
    Stay,
    Invalid,
    Frozen,
    LockedOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_approved() {
        let mut s = DecisionState::Draft;
        for ev in [EventType::Validate, EventType::Simulate, EventType::Explain, EventType::Approve] {
            match transition(s, ev, &[]) {
                TransitionOutcome::Move(next) => s = next,
                other => panic!("unexpected outcome {other:?} for {ev:?} from {s:?}"),
            }
        }
        assert_eq!(s, DecisionState::Approved);
    }

    #[test]
    fn approve_from_draft_is_invalid() {
        assert_eq!(transition(DecisionState::Draft, EventType::Approve, &[]), TransitionOutcome::Invalid);
    }

    #[test]
    fn dispute_freezes_non_safe_events() {
        assert_eq!(transition(DecisionState::Disputed, EventType::Validate, &[]), TransitionOutcome::Frozen);
        assert_eq!(transition(DecisionState::Disputed, EventType::AttachArtifacts, &[]), TransitionOutcome::Stay);
    }

    #[test]
    fn locked_only_allows_configured_events() {
        assert_eq!(transition(DecisionState::Locked, EventType::AttestExternal, &[]), TransitionOutcome::LockedOut);
        assert_eq!(
            transition(DecisionState::Locked, EventType::AttestExternal, &[EventType::AttestExternal]),
            TransitionOutcome::Stay
        );
    }

    #[test]
    fn approved_or_rejected_locks_on_a_lock_event() {
        assert_eq!(transition(DecisionState::Approved, EventType::Lock, &[]), TransitionOutcome::Move(DecisionState::Locked));
        assert_eq!(transition(DecisionState::Rejected, EventType::Lock, &[]), TransitionOutcome::Move(DecisionState::Locked));
    }

    #[test]
    fn lock_from_a_non_terminal_state_is_invalid() {
        assert_eq!(transition(DecisionState::Draft, EventType::Lock, &[]), TransitionOutcome::Invalid);
    }

    #[test]
    fn enter_dispute_from_any_non_terminal() {
        for s in [DecisionState::Draft, DecisionState::Validated, DecisionState::Simulated, DecisionState::Explained] {
            assert_eq!(transition(s, EventType::EnterDispute, &[]), TransitionOutcome::Move(DecisionState::Disputed));
        }
    }
}
