//! Error taxonomy for the decision ledger.
//!
//! Domain errors (rejected transitions, integrity failures, policy denial)
//! are returned as values, never panics. Only infrastructure faults that
//! `std::io` or `serde_json` surface are wrapped via `#[from]`.

use crate::state_machine::DecisionState;
use thiserror::Error;

/// A single structured violation returned by the reducer on a rejected event.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Violation {
    pub code: String,
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(code: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), path: path.into(), message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid event payload: {0}")]
    InvalidEventPayload(String),

    #[error("invalid transition: state {from:?} does not accept {event}")]
    InvalidTransition { from: DecisionState, event: String },

    #[error("decision is frozen (disputed)")]
    Frozen,

    #[error("decision is locked")]
    Locked,

    #[error("missing required meta field: {0}")]
    MissingRequiredMeta(String),

    #[error("compliance blocked: {0}")]
    ComplianceBlock(String),

    #[error("sequence conflict on decision {decision_id}")]
    SeqConflict { decision_id: String },

    #[error("idempotent replay of existing event at seq {seq}")]
    IdempotentReplay { seq: u64 },

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("snapshot missing for decision {0}")]
    SnapshotMissing(String),

    #[error("anchor chain broken at seq {0}")]
    AnchorChainBroken(u64),

    #[error("signature invalid")]
    SignatureInvalid,

    #[error("store operation timed out")]
    StoreTimeout,

    #[error("cycle detected during canonicalization")]
    Cycle,

    #[error("decision not found: {0}")]
    DecisionNotFound(String),

    #[error("event not found: decision {decision_id} seq {seq}")]
    EventNotFound { decision_id: String, seq: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result of a reducer or append call that may be rejected without mutating
/// any state. Distinct from `Result<T, LedgerError>` because a rejected
/// event is an expected, structured outcome, not an error to propagate.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Accepted(T),
    Rejected(Vec<Violation>),
}

impl<T> Outcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    pub fn into_result(self) -> Result<T, Vec<Violation>> {
        match self {
            Outcome::Accepted(v) => Ok(v),
            Outcome::Rejected(v) => Err(v),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
