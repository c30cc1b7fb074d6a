use futures::future::join_all;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::admission::validate_window;
use super::availability::remaining_capacity;
use super::{Engine, EngineError, SharedResourceState};

impl Engine {
    /// Can `quantity` units be granted over `[start, end)`? Advisory only —
    /// the authoritative check re-runs under the resource lock at admission
    /// and approval time.
    pub async fn check_availability(
        &self,
        resource_id: Ulid,
        start: Ms,
        end: Ms,
        quantity: u32,
    ) -> Result<AvailabilityReport, EngineError> {
        let span = validate_window(start, end)?;
        if quantity == 0 {
            return Err(EngineError::Validation("quantity must be at least 1"));
        }
        let rs = self
            .get_resource(&resource_id)
            .ok_or(EngineError::NotFound(resource_id))?;
        let guard = rs.read().await;

        let remaining = remaining_capacity(&guard, &span, &ACTIVE_STATUSES, None);
        Ok(AvailabilityReport {
            available: guard.active && remaining >= quantity as i64,
            remaining,
        })
    }

    /// Every reservation of `resource_id` whose status is in `statuses` and
    /// whose window overlaps `[start, end)`. Exact half-open overlap — the
    /// sorted-ledger scan only narrows candidates.
    pub async fn overlapping_reservations(
        &self,
        resource_id: Ulid,
        start: Ms,
        end: Ms,
        statuses: &[ReservationStatus],
    ) -> Result<Vec<Reservation>, EngineError> {
        if start >= end {
            return Err(EngineError::Validation("window start must precede its end"));
        }
        if end - start > MAX_QUERY_WINDOW_MS {
            return Err(EngineError::LimitExceeded("query window too wide"));
        }
        let rs = self
            .get_resource(&resource_id)
            .ok_or(EngineError::NotFound(resource_id))?;
        let guard = rs.read().await;

        let query = Span::new(start, end);
        Ok(guard
            .overlapping(&query)
            .filter(|r| statuses.contains(&r.status))
            .cloned()
            .collect())
    }

    pub async fn get_reservation(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let resource_id = self
            .store
            .resource_for_reservation(&id)
            .ok_or(EngineError::NotFound(id))?;
        let rs = self
            .get_resource(&resource_id)
            .ok_or(EngineError::NotFound(resource_id))?;
        let guard = rs.read().await;
        guard
            .reservation(&id)
            .cloned()
            .ok_or(EngineError::NotFound(id))
    }

    /// All reservations of one requester, newest first.
    pub async fn reservations_for_requester(&self, requester_id: Ulid) -> Vec<Reservation> {
        let handles: Vec<SharedResourceState> = self
            .store
            .resource_ids()
            .iter()
            .filter_map(|id| self.store.get_resource(id))
            .collect();
        let guards = join_all(handles.iter().map(|rs| rs.read())).await;

        let mut out = Vec::new();
        for guard in &guards {
            for r in &guard.ledger {
                if matches!(r.requester, PartyRef::Registered(uid) if uid == requester_id) {
                    out.push(r.clone());
                }
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Members of one admission bundle, in admission order.
    pub async fn bundle(&self, bundle_id: Ulid) -> Vec<Reservation> {
        let mut out = Vec::new();
        for id in self.store.bundle_members(&bundle_id) {
            if let Ok(r) = self.get_reservation(id).await {
                out.push(r);
            }
        }
        out
    }

    /// A resource's full ledger, optionally narrowed to one status.
    pub async fn reservations_for_resource(
        &self,
        resource_id: Ulid,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<Reservation>, EngineError> {
        let rs = self
            .get_resource(&resource_id)
            .ok_or(EngineError::NotFound(resource_id))?;
        let guard = rs.read().await;
        Ok(guard
            .ledger
            .iter()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect())
    }

    pub async fn get_resource_info(&self, id: Ulid) -> Result<ResourceInfo, EngineError> {
        let rs = self.get_resource(&id).ok_or(EngineError::NotFound(id))?;
        let guard = rs.read().await;
        Ok(ResourceInfo {
            id: guard.id,
            name: guard.name.clone(),
            capacity: guard.capacity,
            daily_rate: guard.daily_rate,
            active: guard.active,
        })
    }

    pub async fn list_resources(&self) -> Vec<ResourceInfo> {
        let handles: Vec<SharedResourceState> = self
            .store
            .resource_ids()
            .iter()
            .filter_map(|id| self.store.get_resource(id))
            .collect();
        let guards = join_all(handles.iter().map(|rs| rs.read())).await;

        guards
            .iter()
            .map(|guard| ResourceInfo {
                id: guard.id,
                name: guard.name.clone(),
                capacity: guard.capacity,
                daily_rate: guard.daily_rate,
                active: guard.active,
            })
            .collect()
    }
}
