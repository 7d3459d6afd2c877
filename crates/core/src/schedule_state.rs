//! §4.5 ScheduleState — a date's rides, grouped by block and slot.
//!
//! `ScheduleState` is a read-only snapshot, loaded once from
//! [`crate::persistence::Persistence`] and then queried synchronously —
//! the same "immutable snapshot of the day's rides" pattern the spec's
//! design notes call for Monte Carlo workers to use (§9), reused here for
//! every synchronous simulation caller (`FeasibilityEngine` included).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{Config, DayBlock};
use crate::geo::Location;
use crate::hold_manager::SlotHold;
use crate::slot_catalog::SlotId;
use crate::time_context::PlanType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RideStatus {
    Scheduled,
    Completed,
    CancelledByRider,
    CancelledBySystem,
    NoShow,
}

impl RideStatus {
    /// §4.5: rides in these states are excluded from `ScheduleState::rides`.
    pub fn counts_against_capacity(&self) -> bool {
        !matches!(
            self,
            RideStatus::CancelledByRider | RideStatus::CancelledBySystem | RideStatus::NoShow
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledRide {
    pub id: Uuid,
    pub rider_id: String,
    pub date: NaiveDate,
    pub slot_id: SlotId,
    pub plan_type: PlanType,
    pub arrival_start_minute: u32,
    pub arrival_end_minute: u32,
    pub origin: Location,
    pub dest: Location,
    pub pickup_time_minute: Option<f64>,
    pub predicted_arrival_minute: Option<f64>,
    pub status: RideStatus,
}

/// A read-only snapshot of one date's rides and active holds.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    pub date: NaiveDate,
    rides: Vec<ScheduledRide>,
    holds: Vec<SlotHold>,
}

impl ScheduleState {
    pub fn from_parts(date: NaiveDate, all_rides: Vec<ScheduledRide>, all_holds: Vec<SlotHold>) -> Self {
        let mut rides: Vec<ScheduledRide> = all_rides
            .into_iter()
            .filter(|r| r.status.counts_against_capacity())
            .collect();
        rides.sort_by_key(|r| r.arrival_start_minute);
        Self { date, rides, holds: all_holds }
    }

    pub fn rides(&self) -> &[ScheduledRide] {
        &self.rides
    }

    pub fn get_ride_in_time_block(&self, block: DayBlock) -> Vec<&ScheduledRide> {
        let range = block.minute_range();
        self.rides
            .iter()
            .filter(|r| range.contains(&r.arrival_start_minute))
            .collect()
    }

    pub fn active_holds(&self) -> Vec<&SlotHold> {
        self.holds
            .iter()
            .filter(|h| h.status == crate::hold_manager::HoldStatus::Active)
            .collect()
    }

    /// A rider cannot have two rides whose `arrivalStart` differ by less
    /// than `buffer_minutes` (default 30, §4.5).
    pub fn find_conflicting_rides(
        &self,
        rider_id: &str,
        arrival_start_minute: u32,
        config: &Config,
    ) -> Vec<&ScheduledRide> {
        let buffer = config.rider_conflict_buffer_minutes as i64;
        self.rides
            .iter()
            .filter(|r| {
                r.rider_id == rider_id
                    && (r.arrival_start_minute as i64 - arrival_start_minute as i64).abs() < buffer
            })
            .collect()
    }

    pub fn get_block_for_time(minute_of_day: u32) -> DayBlock {
        DayBlock::for_minute_of_day(minute_of_day)
    }
}
