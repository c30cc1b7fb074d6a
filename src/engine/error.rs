use ulid::Ulid;

use crate::model::ReservationStatus;

use super::state::TransitionAction;

#[derive(Debug)]
pub enum EngineError {
    /// Malformed or missing input — never retried internally.
    Validation(&'static str),
    /// The availability check failed at create or approve time. Carries the
    /// remaining capacity so the caller can adjust; may be negative after an
    /// administrative capacity cut.
    CapacityExceeded {
        resource_id: Ulid,
        requested: u32,
        remaining: i64,
    },
    /// Illegal state-machine move, including re-applying an action whose
    /// target state was already reached.
    InvalidTransition {
        from: ReservationStatus,
        action: TransitionAction,
    },
    /// Actor lacks rights for the requested operation.
    NotAuthorized(&'static str),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Resource exists but accepts no new reservations.
    Inactive(Ulid),
    /// Resource still has reservations in an active status.
    HasReservations(Ulid),
    LimitExceeded(&'static str),
    /// Durable-log I/O failure.
    Wal(String),
    /// The engine is shutting down or its WAL writer is unavailable.
    /// Retryable, unlike every other kind.
    Transient(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "validation failed: {msg}"),
            EngineError::CapacityExceeded {
                resource_id,
                requested,
                remaining,
            } => write!(
                f,
                "capacity exceeded on {resource_id}: requested {requested}, remaining {remaining}"
            ),
            EngineError::InvalidTransition { from, action } => {
                write!(f, "invalid transition: {action} from {from}")
            }
            EngineError::NotAuthorized(msg) => write!(f, "not authorized: {msg}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Inactive(id) => write!(f, "resource inactive: {id}"),
            EngineError::HasReservations(id) => {
                write!(f, "cannot delete resource {id}: active reservations exist")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Wal(e) => write!(f, "WAL error: {e}"),
            EngineError::Transient(e) => write!(f, "transient failure: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
