use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

use super::SharedResourceState;

/// In-memory state: every resource with its ledger, plus the secondary
/// indexes the read paths need. Rebuilt from the WAL on open.
pub struct InMemoryStore {
    resources: DashMap<Ulid, SharedResourceState>,
    /// Reverse lookup: reservation id → resource id.
    reservation_to_resource: DashMap<Ulid, Ulid>,
    /// Bundle id → member reservation ids, in admission order.
    bundles: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            reservation_to_resource: DashMap::new(),
            bundles: DashMap::new(),
        }
    }

    // ── Resources ────────────────────────────────────────────

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn contains_resource(&self, id: &Ulid) -> bool {
        self.resources.contains_key(id)
    }

    pub fn get_resource(&self, id: &Ulid) -> Option<SharedResourceState> {
        self.resources.get(id).map(|e| e.value().clone())
    }

    pub fn insert_resource(&self, id: Ulid, state: SharedResourceState) {
        self.resources.insert(id, state);
    }

    pub fn remove_resource(&self, id: &Ulid) -> Option<(Ulid, SharedResourceState)> {
        self.resources.remove(id)
    }

    pub fn resource_ids(&self) -> Vec<Ulid> {
        self.resources.iter().map(|e| *e.key()).collect()
    }

    // ── Reservation index ────────────────────────────────────

    pub fn resource_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.reservation_to_resource
            .get(reservation_id)
            .map(|e| *e.value())
    }

    pub fn unmap_reservation(&self, reservation_id: &Ulid) {
        self.reservation_to_resource.remove(reservation_id);
    }

    // ── Bundle index ─────────────────────────────────────────

    pub fn bundle_members(&self, bundle_id: &Ulid) -> Vec<Ulid> {
        self.bundles
            .get(bundle_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    pub fn drop_bundle_member(&self, bundle_id: &Ulid, reservation_id: &Ulid) {
        if let Some(mut members) = self.bundles.get_mut(bundle_id) {
            members.retain(|m| m != reservation_id);
        }
    }

    // ── Event application ────────────────────────────────────

    /// Apply a reservation-level event to a ResourceState and keep the
    /// indexes in step. No locking — the caller holds the resource lock.
    /// Resource create/delete are handled at the map level, not here.
    pub fn apply_event(&self, rs: &mut ResourceState, event: &Event) {
        match event {
            Event::ReservationOpened {
                id,
                bundle_id,
                resource_id,
                requester,
                contact,
                span,
                quantity,
                price_minor,
                created_at,
            } => {
                rs.insert_reservation(Reservation {
                    id: *id,
                    bundle_id: *bundle_id,
                    resource_id: *resource_id,
                    requester: requester.clone(),
                    contact: contact.clone(),
                    span: *span,
                    quantity: *quantity,
                    price_minor: *price_minor,
                    status: ReservationStatus::Pending,
                    created_at: *created_at,
                    decided_by: None,
                    decided_at: None,
                });
                self.reservation_to_resource.insert(*id, *resource_id);
                self.bundles.entry(*bundle_id).or_default().push(*id);
            }
            Event::ReservationTransitioned {
                id,
                to,
                decided_by,
                at,
                ..
            } => {
                if let Some(r) = rs.reservation_mut(id) {
                    r.status = *to;
                    r.decided_by = *decided_by;
                    r.decided_at = Some(*at);
                }
            }
            Event::ResourceUpdated {
                name,
                capacity,
                daily_rate,
                active,
                ..
            } => {
                rs.name = name.clone();
                rs.capacity = *capacity;
                rs.daily_rate = *daily_rate;
                rs.active = *active;
            }
            Event::ResourceCreated { .. } | Event::ResourceDeleted { .. } => {}
        }
    }
}
