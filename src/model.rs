use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// One rental day, the pricing unit.
pub const DAY_MS: Ms = 86_400_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Billable rental days; a partial trailing day counts as a full one.
    pub fn rental_days(&self) -> i64 {
        (self.duration_ms() + DAY_MS - 1) / DAY_MS
    }
}

/// Reservation lifecycle. `Pending` and `Confirmed` consume capacity;
/// the three terminal states release it permanently and are kept for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Canceled,
    Rejected,
    Returned,
}

impl ReservationStatus {
    pub fn is_active(self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Canceled => "canceled",
            ReservationStatus::Rejected => "rejected",
            ReservationStatus::Returned => "returned",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The statuses that consume capacity.
pub const ACTIVE_STATUSES: [ReservationStatus; 2] =
    [ReservationStatus::Pending, ReservationStatus::Confirmed];

/// Who a reservation is for: an authenticated principal, or a named walk-in
/// recorded at the counter by an administrator. Never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyRef {
    Registered(Ulid),
    WalkIn(String),
}

/// Opaque caller identity plus capability flag. Token formats and session
/// handling live in the auth layer; the engine only sees this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorRef {
    pub id: Ulid,
    pub is_admin: bool,
}

/// A time-windowed claim of `quantity` units against one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    /// Reservations admitted by one request share a bundle id.
    pub bundle_id: Ulid,
    pub resource_id: Ulid,
    pub requester: PartyRef,
    pub contact: Option<String>,
    pub span: Span,
    pub quantity: u32,
    /// Price quoted at admission time, in minor currency units.
    pub price_minor: i64,
    pub status: ReservationStatus,
    pub created_at: Ms,
    /// Actor who moved the reservation to its current status, if any.
    pub decided_by: Option<Ulid>,
    pub decided_at: Option<Ms>,
}

impl Reservation {
    pub fn is_owned_by(&self, actor: &ActorRef) -> bool {
        matches!(self.requester, PartyRef::Registered(uid) if uid == actor.id)
    }
}

/// A rentable resource plus its reservation ledger. Capacity = 1 models an
/// exclusive slot (studio session); capacity > 1 models N physical units.
#[derive(Debug, Clone)]
pub struct ResourceState {
    pub id: Ulid,
    pub name: String,
    pub capacity: u32,
    /// Price per rental day, minor currency units.
    pub daily_rate: i64,
    /// Inactive resources accept no new reservations.
    pub active: bool,
    /// All reservations ever admitted, sorted by `span.start`.
    pub ledger: Vec<Reservation>,
}

impl ResourceState {
    pub fn new(id: Ulid, name: String, capacity: u32, daily_rate: i64) -> Self {
        Self {
            id,
            name,
            capacity,
            daily_rate,
            active: true,
            ledger: Vec::new(),
        }
    }

    /// Insert a reservation maintaining sort order by span.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .ledger
            .binary_search_by_key(&reservation.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.ledger.insert(pos, reservation);
    }

    pub fn reservation(&self, id: &Ulid) -> Option<&Reservation> {
        self.ledger.iter().find(|r| r.id == *id)
    }

    pub fn reservation_mut(&mut self, id: &Ulid) -> Option<&mut Reservation> {
        self.ledger.iter_mut().find(|r| r.id == *id)
    }

    /// Return only ledger entries whose span overlaps the query window.
    /// Uses binary search to skip entries starting at or after `query.end`;
    /// the exact half-open predicate is the final filter.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        // Everything at index >= right_bound starts at or after query.end → can't overlap.
        let right_bound = self.ledger.partition_point(|r| r.span.start < query.end);
        self.ledger[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ResourceCreated {
        id: Ulid,
        name: String,
        capacity: u32,
        daily_rate: i64,
    },
    ResourceUpdated {
        id: Ulid,
        name: String,
        capacity: u32,
        daily_rate: i64,
        active: bool,
    },
    ResourceDeleted {
        id: Ulid,
    },
    ReservationOpened {
        id: Ulid,
        bundle_id: Ulid,
        resource_id: Ulid,
        requester: PartyRef,
        contact: Option<String>,
        span: Span,
        quantity: u32,
        price_minor: i64,
        created_at: Ms,
    },
    ReservationTransitioned {
        id: Ulid,
        resource_id: Ulid,
        to: ReservationStatus,
        decided_by: Option<Ulid>,
        at: Ms,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub id: Ulid,
    pub name: String,
    pub capacity: u32,
    pub daily_rate: i64,
    pub active: bool,
}

/// Answer to "can `quantity` units be granted over this window?".
/// `remaining` may be negative after an administrative capacity cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityReport {
    pub available: bool,
    pub remaining: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(start: Ms, end: Ms, quantity: u32) -> Reservation {
        Reservation {
            id: Ulid::new(),
            bundle_id: Ulid::new(),
            resource_id: Ulid::new(),
            requester: PartyRef::WalkIn("counter".into()),
            contact: None,
            span: Span::new(start, end),
            quantity,
            price_minor: 0,
            status: ReservationStatus::Pending,
            created_at: 0,
            decided_by: None,
            decided_at: None,
        }
    }

    #[test]
    fn span_basics() {
        let s = Span::new(100, 200);
        assert_eq!(s.duration_ms(), 100);
        assert!(s.contains_instant(100));
        assert!(s.contains_instant(199));
        assert!(!s.contains_instant(200)); // half-open
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
    }

    #[test]
    fn rental_days_rounds_up() {
        assert_eq!(Span::new(0, DAY_MS).rental_days(), 1);
        assert_eq!(Span::new(0, DAY_MS + 1).rental_days(), 2);
        assert_eq!(Span::new(0, 3 * DAY_MS).rental_days(), 3);
        // Sub-day rentals still bill one day
        assert_eq!(Span::new(0, 1000).rental_days(), 1);
    }

    #[test]
    fn status_activity() {
        assert!(ReservationStatus::Pending.is_active());
        assert!(ReservationStatus::Confirmed.is_active());
        assert!(ReservationStatus::Canceled.is_terminal());
        assert!(ReservationStatus::Rejected.is_terminal());
        assert!(ReservationStatus::Returned.is_terminal());
    }

    #[test]
    fn ledger_ordering() {
        let mut rs = ResourceState::new(Ulid::new(), "tripod".into(), 3, 500);
        rs.insert_reservation(pending(300, 400, 1));
        rs.insert_reservation(pending(100, 200, 1));
        rs.insert_reservation(pending(200, 300, 1));
        assert_eq!(rs.ledger[0].span.start, 100);
        assert_eq!(rs.ledger[1].span.start, 200);
        assert_eq!(rs.ledger[2].span.start, 300);
    }

    #[test]
    fn overlapping_skips_disjoint() {
        let mut rs = ResourceState::new(Ulid::new(), "tripod".into(), 3, 500);
        rs.insert_reservation(pending(100, 200, 1)); // ends before query
        rs.insert_reservation(pending(450, 600, 1)); // overlapping
        rs.insert_reservation(pending(1000, 1100, 1)); // starts after query end

        let query = Span::new(500, 800);
        let hits: Vec<_> = rs.overlapping(&query).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].span, Span::new(450, 600));
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        // Entry ending exactly at query.start is NOT overlapping (half-open)
        let mut rs = ResourceState::new(Ulid::new(), "tripod".into(), 3, 500);
        rs.insert_reservation(pending(100, 200, 1));
        let query = Span::new(200, 300);
        assert_eq!(rs.overlapping(&query).count(), 0);
    }

    #[test]
    fn overlapping_single_ms() {
        let mut rs = ResourceState::new(Ulid::new(), "tripod".into(), 3, 500);
        rs.insert_reservation(pending(100, 201, 1));
        let query = Span::new(200, 300);
        assert_eq!(rs.overlapping(&query).count(), 1);
    }

    #[test]
    fn overlapping_spanning_entry() {
        let mut rs = ResourceState::new(Ulid::new(), "tripod".into(), 3, 500);
        rs.insert_reservation(pending(0, 10_000, 1));
        let query = Span::new(500, 600);
        assert_eq!(rs.overlapping(&query).count(), 1);
    }

    #[test]
    fn reservation_lookup_by_id() {
        let mut rs = ResourceState::new(Ulid::new(), "tripod".into(), 3, 500);
        let r = pending(100, 200, 2);
        let id = r.id;
        rs.insert_reservation(r);
        assert_eq!(rs.reservation(&id).unwrap().quantity, 2);
        assert!(rs.reservation(&Ulid::new()).is_none());
    }

    #[test]
    fn ownership() {
        let uid = Ulid::new();
        let mut r = pending(0, 100, 1);
        r.requester = PartyRef::Registered(uid);
        assert!(r.is_owned_by(&ActorRef { id: uid, is_admin: false }));
        assert!(!r.is_owned_by(&ActorRef { id: Ulid::new(), is_admin: false }));

        r.requester = PartyRef::WalkIn("counter".into());
        assert!(!r.is_owned_by(&ActorRef { id: uid, is_admin: false }));
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::ReservationOpened {
            id: Ulid::new(),
            bundle_id: Ulid::new(),
            resource_id: Ulid::new(),
            requester: PartyRef::Registered(Ulid::new()),
            contact: Some("0917-555-0134".into()),
            span: Span::new(1000, 2000),
            quantity: 2,
            price_minor: 12_000,
            created_at: 500,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
