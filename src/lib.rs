//! gearbook — a reservation engine for rental inventory and exclusive
//! studio slots. Capacity-bounded resources, half-open time windows, an
//! append-only event log, and race-free admission under per-resource
//! exclusion. Transport, authentication and notification delivery are the
//! embedding host's concern.

pub mod clock;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod reaper;
pub mod wal;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{BundleItem, Engine, EngineError, TransitionAction};
pub use model::{
    ActorRef, AvailabilityReport, Event, Ms, PartyRef, Reservation, ReservationStatus,
    ResourceInfo, Span, ACTIVE_STATUSES, DAY_MS,
};
pub use notify::NotifyHub;
