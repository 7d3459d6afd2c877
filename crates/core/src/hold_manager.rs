//! §4.8 HoldManager — temporary capacity reservation bridging UI selection
//! and confirmed booking.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{CoreError, CoreResult, StateReason};
use crate::feasibility::{FeasibilityEngine, RideRequest};
use crate::geo::Location;
use crate::persistence::Persistence;
use crate::rider_behavior::NoHistory;
use crate::schedule_state::{RideStatus, ScheduleState, ScheduledRide};
use crate::slot_catalog::{SlotCatalog, SlotId};
use crate::time_context::PlanType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoldStatus {
    Active,
    Confirmed,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldAddresses {
    pub origin_label: Option<String>,
    pub dest_label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotHold {
    pub hold_id: Uuid,
    pub slot_id: SlotId,
    pub rider_id: String,
    pub plan_type: PlanType,
    pub origin: Location,
    pub dest: Location,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: HoldStatus,
    pub addresses: Option<HoldAddresses>,
    pub confirmed_ride_id: Option<Uuid>,
}

pub struct HoldManager<'a> {
    config: &'a Config,
    catalog: &'a SlotCatalog,
    persistence: &'a dyn Persistence,
    clock: &'a dyn Clock,
}

impl<'a> HoldManager<'a> {
    pub fn new(
        config: &'a Config,
        catalog: &'a SlotCatalog,
        persistence: &'a dyn Persistence,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            config,
            catalog,
            persistence,
            clock,
        }
    }

    /// Cancels any existing active hold, runs quick + full feasibility,
    /// reserves capacity, and inserts the hold row. Reservation is rolled
    /// back if the insert step fails (§4.8).
    pub async fn create_hold(
        &self,
        slot_id: SlotId,
        rider_id: &str,
        plan_type: PlanType,
        origin: Location,
        dest: Location,
        addresses: Option<HoldAddresses>,
        feasibility: &FeasibilityEngine<'_>,
        schedule: &ScheduleState,
        day_of_week: u8,
    ) -> CoreResult<SlotHold> {
        let _rider_lock = self.persistence.lock_rider(rider_id).await;

        if let Some(existing) = self.persistence.active_hold_for_rider(rider_id).await {
            self.cancel_hold_locked(&existing).await?;
        }

        let conflicts = schedule.find_conflicting_rides(rider_id, slot_id.arrival_start_minute, self.config);
        if !conflicts.is_empty() {
            return Err(CoreError::state(StateReason::RiderConflict));
        }

        let slot = self
            .catalog
            .get_slot_by_id(&slot_id)
            .ok_or_else(|| CoreError::state(StateReason::NotFound))?;

        let request = RideRequest {
            rider_id: rider_id.to_string(),
            plan_type,
            origin,
            dest,
        };
        feasibility.can_insert_ride_into_slot(&request, &slot, schedule, day_of_week, &NoHistory)?;

        let is_premium = plan_type.is_premium();
        if !self.catalog.reserve_slot_capacity(&slot_id, is_premium) {
            return Err(CoreError::capacity(crate::error::CapacityReason::NoCapacity));
        }

        let now = self.clock.now();
        let hold = SlotHold {
            hold_id: Uuid::new_v4(),
            slot_id: slot_id.clone(),
            rider_id: rider_id.to_string(),
            plan_type,
            origin,
            dest,
            created_at: now,
            expires_at: now + chrono::Duration::minutes(self.config.hold_expiry_minutes),
            status: HoldStatus::Active,
            addresses,
            confirmed_ride_id: None,
        };

        self.persistence.insert_hold(hold.clone()).await;
        Ok(hold)
    }

    /// Transactionally locks the hold, rejects if not `active` or already
    /// expired, derives pickup/arrival windows, inserts a `ScheduledRide`,
    /// and marks the hold `confirmed`.
    pub async fn confirm_hold(
        &self,
        hold_id: Uuid,
        pickup_time_minute: f64,
        predicted_arrival_minute: f64,
    ) -> CoreResult<ScheduledRide> {
        let _lock = self.persistence.lock_hold(&hold_id).await;
        let mut hold = self
            .persistence
            .get_hold(&hold_id)
            .await
            .ok_or_else(|| CoreError::state(StateReason::NotFound))?;

        if hold.status != HoldStatus::Active {
            return Err(CoreError::state(StateReason::WrongStatus));
        }
        if hold.expires_at <= self.clock.now() {
            return Err(CoreError::state(StateReason::Expired));
        }

        let slot = self
            .catalog
            .get_slot_by_id(&hold.slot_id)
            .ok_or_else(|| CoreError::state(StateReason::NotFound))?;

        let ride = ScheduledRide {
            id: Uuid::new_v4(),
            rider_id: hold.rider_id.clone(),
            date: hold.slot_id.date,
            slot_id: hold.slot_id.clone(),
            plan_type: hold.plan_type,
            arrival_start_minute: slot.arrival_start_minute,
            arrival_end_minute: slot.arrival_end_minute,
            origin: hold.origin,
            dest: hold.dest,
            pickup_time_minute: Some(pickup_time_minute),
            predicted_arrival_minute: Some(predicted_arrival_minute),
            status: RideStatus::Scheduled,
        };

        self.persistence.insert_ride(ride.clone()).await;

        hold.status = HoldStatus::Confirmed;
        hold.confirmed_ride_id = Some(ride.id);
        self.persistence.update_hold(hold).await;

        Ok(ride)
    }

    pub async fn cancel_hold(&self, hold_id: Uuid) -> CoreResult<()> {
        let _lock = self.persistence.lock_hold(&hold_id).await;
        let hold = self
            .persistence
            .get_hold(&hold_id)
            .await
            .ok_or_else(|| CoreError::state(StateReason::NotFound))?;
        self.cancel_hold_locked(&hold).await
    }

    async fn cancel_hold_locked(&self, hold: &SlotHold) -> CoreResult<()> {
        if hold.status != HoldStatus::Active {
            return Ok(());
        }
        let mut updated = hold.clone();
        updated.status = HoldStatus::Cancelled;
        self.catalog
            .release_slot_capacity(&hold.slot_id, hold.plan_type.is_premium());
        self.persistence.update_hold(updated).await;
        Ok(())
    }

    /// For every hold whose `status == active` and `expires_at < now`,
    /// marks it `expired` and releases capacity. Idempotent (§8 invariant 6).
    pub async fn expire_holds(&self, date: NaiveDate) -> usize {
        let now = self.clock.now();
        let mut expired_count = 0;
        for hold in self.persistence.holds_for_date(date).await {
            let _lock = self.persistence.lock_hold(&hold.hold_id).await;
            // Re-fetch under the lock: a confirm/cancel may have raced ahead.
            let Some(mut current) = self.persistence.get_hold(&hold.hold_id).await else {
                continue;
            };
            if current.status != HoldStatus::Active || current.expires_at >= now {
                continue;
            }
            current.status = HoldStatus::Expired;
            self.catalog
                .release_slot_capacity(&current.slot_id, current.plan_type.is_premium());
            self.persistence.update_hold(current).await;
            expired_count += 1;
        }
        expired_count
    }
}
