use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::availability::remaining_capacity;
use super::state::{authorize, next_status, TransitionAction};
use super::{Engine, EngineError, WalCommand};

/// One line of an admission request: `quantity` units of one resource over
/// `[start, end)`. A request may bundle several items; admission is
/// all-or-nothing across the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleItem {
    pub resource_id: Ulid,
    pub quantity: u32,
    pub start: Ms,
    pub end: Ms,
}

/// Check a raw window and turn it into a Span.
pub(super) fn validate_window(start: Ms, end: Ms) -> Result<Span, EngineError> {
    if start >= end {
        return Err(EngineError::Validation("window start must precede its end"));
    }
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    let span = Span::new(start, end);
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("window too wide"));
    }
    Ok(span)
}

fn quote_price(daily_rate: i64, span: &Span, quantity: u32) -> i64 {
    daily_rate * span.rental_days() * quantity as i64
}

impl Engine {
    // ── Resource administration ──────────────────────────────

    pub async fn create_resource(
        &self,
        actor: &ActorRef,
        id: Ulid,
        name: String,
        capacity: u32,
        daily_rate: i64,
    ) -> Result<(), EngineError> {
        if !actor.is_admin {
            return Err(EngineError::NotAuthorized("administrator action"));
        }
        if name.is_empty() {
            return Err(EngineError::Validation("resource name required"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("resource name too long"));
        }
        if capacity == 0 {
            return Err(EngineError::Validation("capacity must be positive"));
        }
        if daily_rate < 0 {
            return Err(EngineError::Validation("daily rate must not be negative"));
        }
        if self.store.resource_count() >= MAX_RESOURCES {
            return Err(EngineError::LimitExceeded("too many resources"));
        }
        if self.store.contains_resource(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::ResourceCreated { id, name: name.clone(), capacity, daily_rate };
        self.wal_append(&event).await?;
        let rs = ResourceState::new(id, name, capacity, daily_rate);
        self.store.insert_resource(id, Arc::new(RwLock::new(rs)));
        self.notify.send(id, &event);
        Ok(())
    }

    /// Capacity is mutable; reducing it below committed demand is the
    /// caller's judgment call — availability then reports negative remaining.
    pub async fn update_resource(
        &self,
        actor: &ActorRef,
        id: Ulid,
        name: String,
        capacity: u32,
        daily_rate: i64,
        active: bool,
    ) -> Result<(), EngineError> {
        if !actor.is_admin {
            return Err(EngineError::NotAuthorized("administrator action"));
        }
        if name.is_empty() {
            return Err(EngineError::Validation("resource name required"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("resource name too long"));
        }
        if capacity == 0 {
            return Err(EngineError::Validation("capacity must be positive"));
        }
        if daily_rate < 0 {
            return Err(EngineError::Validation("daily rate must not be negative"));
        }
        let rs = self.get_resource(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;

        let event = Event::ResourceUpdated { id, name, capacity, daily_rate, active };
        self.persist_and_apply(id, &mut guard, &event).await
    }

    pub async fn set_resource_active(
        &self,
        actor: &ActorRef,
        id: Ulid,
        active: bool,
    ) -> Result<(), EngineError> {
        if !actor.is_admin {
            return Err(EngineError::NotAuthorized("administrator action"));
        }
        let rs = self.get_resource(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;

        let event = Event::ResourceUpdated {
            id,
            name: guard.name.clone(),
            capacity: guard.capacity,
            daily_rate: guard.daily_rate,
            active,
        };
        self.persist_and_apply(id, &mut guard, &event).await
    }

    /// Delete a resource. Refused while any reservation is still in an
    /// active status; terminal history goes with the resource.
    pub async fn delete_resource(&self, actor: &ActorRef, id: Ulid) -> Result<(), EngineError> {
        if !actor.is_admin {
            return Err(EngineError::NotAuthorized("administrator action"));
        }
        let rs = self.get_resource(&id).ok_or(EngineError::NotFound(id))?;
        let guard = rs.read().await;
        if guard.ledger.iter().any(|r| r.status.is_active()) {
            return Err(EngineError::HasReservations(id));
        }
        for r in &guard.ledger {
            self.store.unmap_reservation(&r.id);
            self.store.drop_bundle_member(&r.bundle_id, &r.id);
        }
        drop(guard);

        let event = Event::ResourceDeleted { id };
        self.wal_append(&event).await?;
        self.store.remove_resource(&id);
        self.notify.send(id, &event);
        self.notify.remove(&id);
        Ok(())
    }

    // ── Admission ────────────────────────────────────────────

    /// Admit a bundle of reservations as `pending`, all-or-nothing: every
    /// item must clear its resource's capacity check (ledger plus the earlier
    /// items of this same bundle) or nothing is committed. Write locks are
    /// taken in sorted resource-id order to prevent deadlock between
    /// concurrent bundles.
    pub async fn create_reservations(
        &self,
        actor: &ActorRef,
        requester: PartyRef,
        contact: Option<String>,
        items: &[BundleItem],
    ) -> Result<Vec<Reservation>, EngineError> {
        if items.is_empty() {
            return Err(EngineError::Validation("bundle must contain at least one item"));
        }
        if items.len() > MAX_BUNDLE_SIZE {
            return Err(EngineError::LimitExceeded("bundle too large"));
        }

        match &requester {
            PartyRef::WalkIn(name) => {
                if !actor.is_admin {
                    return Err(EngineError::NotAuthorized(
                        "walk-in entries are recorded by an administrator",
                    ));
                }
                if name.is_empty() {
                    return Err(EngineError::Validation("walk-in name required"));
                }
                if name.len() > MAX_NAME_LEN {
                    return Err(EngineError::LimitExceeded("walk-in name too long"));
                }
            }
            PartyRef::Registered(uid) => {
                if !actor.is_admin && *uid != actor.id {
                    return Err(EngineError::NotAuthorized(
                        "reservations are created for the requesting principal",
                    ));
                }
            }
        }
        match &contact {
            Some(c) => {
                if c.is_empty() {
                    return Err(EngineError::Validation("contact number required"));
                }
                if c.len() > MAX_CONTACT_LEN {
                    return Err(EngineError::LimitExceeded("contact too long"));
                }
            }
            None => {
                if !actor.is_admin {
                    return Err(EngineError::Validation("contact number required"));
                }
            }
        }

        let now = self.clock.now_ms();
        let mut spans = Vec::with_capacity(items.len());
        for item in items {
            let span = validate_window(item.start, item.end)?;
            if span.start < now {
                return Err(EngineError::Validation("window starts in the past"));
            }
            if item.quantity == 0 {
                return Err(EngineError::Validation("quantity must be at least 1"));
            }
            spans.push(span);
        }

        // Acquire write locks in sorted order to prevent deadlocks.
        let mut resource_ids: Vec<Ulid> = items.iter().map(|i| i.resource_id).collect();
        resource_ids.sort();
        resource_ids.dedup();

        let mut guards = Vec::with_capacity(resource_ids.len());
        let mut rs_map = HashMap::new();

        for rid in &resource_ids {
            let rs = self
                .get_resource(rid)
                .ok_or(EngineError::NotFound(*rid))?;
            let guard = rs.write_owned().await;
            if !guard.active {
                return Err(EngineError::Inactive(*rid));
            }
            let incoming = items.iter().filter(|i| i.resource_id == *rid).count();
            if guard.ledger.len() + incoming > MAX_LEDGER_LEN {
                return Err(EngineError::LimitExceeded("resource ledger full"));
            }
            rs_map.insert(*rid, guards.len());
            guards.push(guard);
        }

        // Phase 1: every item must fit against the ledger plus the earlier
        // items of this bundle that overlap it.
        let mut accepted: Vec<(usize, Span, u32, i64)> = Vec::with_capacity(items.len());
        for (item, span) in items.iter().zip(&spans) {
            let idx = rs_map[&item.resource_id];
            let guard = &guards[idx];

            let mut reserved =
                super::availability::reserved_quantity(guard, span, &ACTIVE_STATUSES, None);
            for (other_idx, other_span, other_qty, _) in &accepted {
                if *other_idx == idx && other_span.overlaps(span) {
                    reserved += *other_qty as u64;
                }
            }
            let remaining = guard.capacity as i64 - reserved as i64;
            if remaining < item.quantity as i64 {
                metrics::counter!(observability::CAPACITY_REJECTIONS_TOTAL).increment(1);
                return Err(EngineError::CapacityExceeded {
                    resource_id: item.resource_id,
                    requested: item.quantity,
                    remaining,
                });
            }

            let price = quote_price(guard.daily_rate, span, item.quantity);
            accepted.push((idx, *span, item.quantity, price));
        }

        // Phase 2: all validated — commit the whole bundle as one durable unit.
        let bundle_id = Ulid::new();
        let mut events = Vec::with_capacity(items.len());
        for (item, (_, span, quantity, price)) in items.iter().zip(&accepted) {
            events.push(Event::ReservationOpened {
                id: Ulid::new(),
                bundle_id,
                resource_id: item.resource_id,
                requester: requester.clone(),
                contact: contact.clone(),
                span: *span,
                quantity: *quantity,
                price_minor: *price,
                created_at: now,
            });
        }
        self.wal_append_batch(events.clone()).await?;

        let mut admitted = Vec::with_capacity(events.len());
        for event in &events {
            let (id, resource_id) = match event {
                Event::ReservationOpened { id, resource_id, .. } => (*id, *resource_id),
                _ => unreachable!(),
            };
            let guard = &mut guards[rs_map[&resource_id]];
            self.store.apply_event(guard, event);
            self.notify.send(resource_id, event);
            admitted.push(
                guard
                    .reservation(&id)
                    .expect("reservation applied under lock")
                    .clone(),
            );
        }

        metrics::counter!(observability::ADMISSIONS_TOTAL).increment(admitted.len() as u64);
        info!(
            "admitted bundle {bundle_id}: {} reservation(s) as pending",
            admitted.len()
        );
        Ok(admitted)
    }

    // ── Lifecycle transitions ────────────────────────────────

    /// Approve a pending reservation. The capacity re-check runs under the
    /// resource's write lock, excluding the reservation's own pending
    /// contribution — the authoritative gate before a claim counts as
    /// committed.
    pub async fn approve_reservation(
        &self,
        id: Ulid,
        actor: &ActorRef,
    ) -> Result<Reservation, EngineError> {
        self.transition(id, actor, TransitionAction::Approve).await
    }

    pub async fn reject_reservation(
        &self,
        id: Ulid,
        actor: &ActorRef,
    ) -> Result<Reservation, EngineError> {
        self.transition(id, actor, TransitionAction::Reject).await
    }

    /// Cancel releases capacity and needs no availability check; the shared
    /// lock discipline still serializes it against admissions on the same
    /// resource.
    pub async fn cancel_reservation(
        &self,
        id: Ulid,
        actor: &ActorRef,
    ) -> Result<Reservation, EngineError> {
        self.transition(id, actor, TransitionAction::Cancel).await
    }

    pub async fn mark_returned(
        &self,
        id: Ulid,
        actor: &ActorRef,
    ) -> Result<Reservation, EngineError> {
        self.transition(id, actor, TransitionAction::MarkReturned)
            .await
    }

    async fn transition(
        &self,
        id: Ulid,
        actor: &ActorRef,
        action: TransitionAction,
    ) -> Result<Reservation, EngineError> {
        let (resource_id, mut guard) = self.resolve_reservation_write(&id).await?;

        let (from, span, quantity) = {
            let r = guard.reservation(&id).ok_or(EngineError::NotFound(id))?;
            (r.status, r.span, r.quantity)
        };
        let to = next_status(from, action)?;
        {
            let r = guard
                .reservation(&id)
                .expect("reservation present under lock");
            authorize(action, r, actor)?;
        }

        if action == TransitionAction::Approve {
            // Capacity may have been consumed by admissions accepted since
            // this reservation was created; exclude its own pending claim.
            let remaining = remaining_capacity(&guard, &span, &ACTIVE_STATUSES, Some(id));
            if remaining < quantity as i64 {
                metrics::counter!(observability::CAPACITY_REJECTIONS_TOTAL).increment(1);
                return Err(EngineError::CapacityExceeded {
                    resource_id,
                    requested: quantity,
                    remaining,
                });
            }
        }

        let event = Event::ReservationTransitioned {
            id,
            resource_id,
            to,
            decided_by: Some(actor.id),
            at: self.clock.now_ms(),
        };
        self.persist_and_apply(resource_id, &mut guard, &event).await?;

        metrics::counter!(
            observability::TRANSITIONS_TOTAL,
            "action" => observability::action_label(action)
        )
        .increment(1);
        info!("reservation {id} → {to}");
        Ok(guard
            .reservation(&id)
            .expect("reservation present under lock")
            .clone())
    }

    // ── Stale-pending sweep support ──────────────────────────

    /// Reservations still pending at or before `cutoff` (creation time).
    /// Returns (reservation_id, resource_id) pairs.
    pub fn collect_stale_pending(&self, cutoff: Ms) -> Vec<(Ulid, Ulid)> {
        let mut stale = Vec::new();
        for rid in self.store.resource_ids() {
            if let Some(rs) = self.get_resource(&rid)
                && let Ok(guard) = rs.try_read() {
                    for r in &guard.ledger {
                        if r.status == ReservationStatus::Pending && r.created_at <= cutoff {
                            stale.push((r.id, guard.id));
                        }
                    }
                }
        }
        stale
    }

    /// System cancel of a stale pending reservation — same transition the
    /// owner would take, no actor recorded. Fails if the reservation was
    /// decided in the meantime.
    pub async fn expire_pending(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let (resource_id, mut guard) = self.resolve_reservation_write(&id).await?;

        let from = guard
            .reservation(&id)
            .ok_or(EngineError::NotFound(id))?
            .status;
        let to = next_status(from, TransitionAction::Cancel)?;

        let event = Event::ReservationTransitioned {
            id,
            resource_id,
            to,
            decided_by: None,
            at: self.clock.now_ms(),
        };
        self.persist_and_apply(resource_id, &mut guard, &event).await?;
        Ok(guard
            .reservation(&id)
            .expect("reservation present under lock")
            .clone())
    }

    // ── WAL compaction ───────────────────────────────────────

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        for rid in self.store.resource_ids() {
            let Some(rs) = self.get_resource(&rid) else { continue };
            let guard = rs.try_read().expect("compact: uncontended read");

            events.push(Event::ResourceCreated {
                id: guard.id,
                name: guard.name.clone(),
                capacity: guard.capacity,
                daily_rate: guard.daily_rate,
            });
            if !guard.active {
                events.push(Event::ResourceUpdated {
                    id: guard.id,
                    name: guard.name.clone(),
                    capacity: guard.capacity,
                    daily_rate: guard.daily_rate,
                    active: false,
                });
            }

            for r in &guard.ledger {
                events.push(Event::ReservationOpened {
                    id: r.id,
                    bundle_id: r.bundle_id,
                    resource_id: guard.id,
                    requester: r.requester.clone(),
                    contact: r.contact.clone(),
                    span: r.span,
                    quantity: r.quantity,
                    price_minor: r.price_minor,
                    created_at: r.created_at,
                });
                if r.status != ReservationStatus::Pending {
                    events.push(Event::ReservationTransitioned {
                        id: r.id,
                        resource_id: guard.id,
                        to: r.status,
                        decided_by: r.decided_by,
                        at: r.decided_at.unwrap_or(r.created_at),
                    });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Transient("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Transient("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
