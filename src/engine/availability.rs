use ulid::Ulid;

use crate::model::*;

// ── Availability arithmetic ──────────────────────────────────────
//
// One policy for everything: exclusive slots (capacity 1) and multi-unit
// products run through the same functions. Only reservations whose status is
// in the caller-supplied set consume capacity; terminal states never do.

/// Sum of reserved quantity over ledger entries that overlap `span` and whose
/// status is in `statuses`, skipping `exclude` if given. The exclusion exists
/// so re-validating a reservation already in the ledger (at approval time)
/// does not double-count its own contribution.
pub fn reserved_quantity(
    rs: &ResourceState,
    span: &Span,
    statuses: &[ReservationStatus],
    exclude: Option<Ulid>,
) -> u64 {
    rs.overlapping(span)
        .filter(|r| statuses.contains(&r.status))
        .filter(|r| exclude != Some(r.id))
        .map(|r| r.quantity as u64)
        .sum()
}

/// `capacity - reserved_quantity`. Negative when capacity was administratively
/// reduced below committed demand — callers treat that as "nothing can be
/// granted", never as an error to panic on.
pub fn remaining_capacity(
    rs: &ResourceState,
    span: &Span,
    statuses: &[ReservationStatus],
    exclude: Option<Ulid>,
) -> i64 {
    rs.capacity as i64 - reserved_quantity(rs, span, statuses, exclude) as i64
}

/// Quantity-weighted sweep line: the maximum concurrently-reserved quantity
/// at any instant across the given (span, quantity) claims. The capacity
/// invariant is exactly `peak_reserved(active claims) <= capacity`.
pub fn peak_reserved(claims: &[(Span, u32)]) -> u64 {
    if claims.is_empty() {
        return 0;
    }

    // +q at start, -q at end; ends sort before starts at the same timestamp
    // so half-open adjacency never counts as concurrent.
    let mut events: Vec<(Ms, i64)> = Vec::with_capacity(claims.len() * 2);
    for (span, quantity) in claims {
        events.push((span.start, *quantity as i64));
        events.push((span.end, -(*quantity as i64)));
    }
    events.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut current: i64 = 0;
    let mut peak: i64 = 0;
    for (_, delta) in &events {
        current += delta;
        peak = peak.max(current);
    }
    peak as u64
}

/// Active (span, quantity) claims of a ledger, ready for `peak_reserved`.
pub fn active_claims(rs: &ResourceState) -> Vec<(Span, u32)> {
    rs.ledger
        .iter()
        .filter(|r| r.status.is_active())
        .map(|r| (r.span, r.quantity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReservationStatus::*;

    fn entry(start: Ms, end: Ms, quantity: u32, status: ReservationStatus) -> Reservation {
        Reservation {
            id: Ulid::new(),
            bundle_id: Ulid::new(),
            resource_id: Ulid::new(),
            requester: PartyRef::WalkIn("counter".into()),
            contact: None,
            span: Span::new(start, end),
            quantity,
            price_minor: 0,
            status,
            created_at: 0,
            decided_by: None,
            decided_at: None,
        }
    }

    fn make_resource(capacity: u32, entries: Vec<Reservation>) -> ResourceState {
        let mut rs = ResourceState::new(Ulid::new(), "lens kit".into(), capacity, 800);
        for e in entries {
            rs.insert_reservation(e);
        }
        rs
    }

    // ── reserved_quantity ────────────────────────────────

    #[test]
    fn reserved_sums_overlapping_active() {
        let rs = make_resource(
            10,
            vec![
                entry(100, 200, 2, Pending),
                entry(150, 250, 3, Confirmed),
                entry(300, 400, 4, Pending), // disjoint from query
            ],
        );
        let q = Span::new(120, 220);
        assert_eq!(reserved_quantity(&rs, &q, &ACTIVE_STATUSES, None), 5);
    }

    #[test]
    fn reserved_ignores_terminal_statuses() {
        let rs = make_resource(
            10,
            vec![
                entry(100, 200, 2, Canceled),
                entry(100, 200, 3, Rejected),
                entry(100, 200, 4, Returned),
                entry(100, 200, 1, Confirmed),
            ],
        );
        let q = Span::new(100, 200);
        assert_eq!(reserved_quantity(&rs, &q, &ACTIVE_STATUSES, None), 1);
    }

    #[test]
    fn reserved_respects_status_set() {
        let rs = make_resource(
            10,
            vec![entry(100, 200, 2, Pending), entry(100, 200, 3, Confirmed)],
        );
        let q = Span::new(100, 200);
        assert_eq!(reserved_quantity(&rs, &q, &[Confirmed], None), 3);
        assert_eq!(reserved_quantity(&rs, &q, &[Pending], None), 2);
    }

    #[test]
    fn reserved_excludes_given_id() {
        let own = entry(100, 200, 4, Pending);
        let own_id = own.id;
        let rs = make_resource(10, vec![own, entry(100, 200, 3, Pending)]);
        let q = Span::new(100, 200);
        assert_eq!(reserved_quantity(&rs, &q, &ACTIVE_STATUSES, Some(own_id)), 3);
        assert_eq!(reserved_quantity(&rs, &q, &ACTIVE_STATUSES, None), 7);
    }

    #[test]
    fn reserved_touching_window_is_free() {
        let rs = make_resource(5, vec![entry(100, 200, 5, Confirmed)]);
        let q = Span::new(200, 300);
        assert_eq!(reserved_quantity(&rs, &q, &ACTIVE_STATUSES, None), 0);
    }

    // ── remaining_capacity ───────────────────────────────

    #[test]
    fn remaining_basic() {
        let rs = make_resource(5, vec![entry(100, 200, 3, Confirmed)]);
        assert_eq!(
            remaining_capacity(&rs, &Span::new(150, 250), &ACTIVE_STATUSES, None),
            2
        );
    }

    #[test]
    fn remaining_goes_negative_after_capacity_cut() {
        let mut rs = make_resource(5, vec![entry(100, 200, 5, Confirmed)]);
        rs.capacity = 3; // admin cut below committed demand
        assert_eq!(
            remaining_capacity(&rs, &Span::new(100, 200), &ACTIVE_STATUSES, None),
            -2
        );
    }

    #[test]
    fn remaining_capacity_one_slot() {
        // Exclusive slot is the degenerate case of the same arithmetic
        let rs = make_resource(1, vec![entry(100, 200, 1, Confirmed)]);
        assert_eq!(
            remaining_capacity(&rs, &Span::new(150, 250), &ACTIVE_STATUSES, None),
            0
        );
        assert_eq!(
            remaining_capacity(&rs, &Span::new(200, 300), &ACTIVE_STATUSES, None),
            1
        );
    }

    // ── peak_reserved ────────────────────────────────────

    #[test]
    fn peak_basic() {
        let claims = vec![
            (Span::new(0, 100), 2),
            (Span::new(50, 150), 3),
            (Span::new(200, 300), 4),
        ];
        assert_eq!(peak_reserved(&claims), 5);
    }

    #[test]
    fn peak_adjacent_not_concurrent() {
        let claims = vec![(Span::new(0, 100), 3), (Span::new(100, 200), 4)];
        assert_eq!(peak_reserved(&claims), 4);
    }

    #[test]
    fn peak_empty() {
        assert_eq!(peak_reserved(&[]), 0);
    }

    #[test]
    fn peak_triple_stack() {
        let claims = vec![
            (Span::new(0, 100), 1),
            (Span::new(25, 75), 1),
            (Span::new(50, 150), 1),
        ];
        assert_eq!(peak_reserved(&claims), 3);
    }

    #[test]
    fn active_claims_skip_terminal() {
        let rs = make_resource(
            5,
            vec![
                entry(0, 100, 2, Pending),
                entry(0, 100, 3, Canceled),
                entry(50, 150, 1, Confirmed),
            ],
        );
        let claims = active_claims(&rs);
        assert_eq!(claims.len(), 2);
        assert_eq!(peak_reserved(&claims), 3);
    }
}
