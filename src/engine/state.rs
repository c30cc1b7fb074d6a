use std::fmt;

use crate::model::{ActorRef, Reservation, ReservationStatus};

use super::EngineError;

/// The four triggers that move a reservation forward after admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    Approve,
    Reject,
    Cancel,
    MarkReturned,
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransitionAction::Approve => "approve",
            TransitionAction::Reject => "reject",
            TransitionAction::Cancel => "cancel",
            TransitionAction::MarkReturned => "mark returned",
        };
        f.write_str(s)
    }
}

/// Legality of a transition, independent of who asks. Re-applying an action
/// whose target state was already reached fails here too — an explicit
/// conflict, never a silent success.
pub fn next_status(
    from: ReservationStatus,
    action: TransitionAction,
) -> Result<ReservationStatus, EngineError> {
    use crate::model::ReservationStatus::*;
    use self::TransitionAction::*;
    match (from, action) {
        (Pending, Approve) => Ok(Confirmed),
        (Pending, Reject) => Ok(Rejected),
        (Pending, Cancel) | (Confirmed, Cancel) => Ok(Canceled),
        (Confirmed, MarkReturned) => Ok(Returned),
        (from, action) => Err(EngineError::InvalidTransition { from, action }),
    }
}

/// Authorization for a legal transition. Approve, reject and mark-returned
/// are administrator actions; cancel is open to the owner while the
/// reservation is still pending.
pub fn authorize(
    action: TransitionAction,
    reservation: &Reservation,
    actor: &ActorRef,
) -> Result<(), EngineError> {
    match action {
        TransitionAction::Approve | TransitionAction::Reject | TransitionAction::MarkReturned => {
            if actor.is_admin {
                Ok(())
            } else {
                Err(EngineError::NotAuthorized("administrator action"))
            }
        }
        TransitionAction::Cancel => {
            if actor.is_admin {
                Ok(())
            } else if !reservation.is_owned_by(actor) {
                Err(EngineError::NotAuthorized("not the reservation owner"))
            } else if reservation.status == ReservationStatus::Pending {
                Ok(())
            } else {
                Err(EngineError::NotAuthorized(
                    "confirmed reservations are canceled by an administrator",
                ))
            }
        }
    }
}
