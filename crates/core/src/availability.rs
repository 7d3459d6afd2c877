//! §4.9 Availability — turns a rider's desired trip into a ranked list of
//! arrival windows, reusing `FeasibilityEngine::batch_feasibility_check` so
//! the block load for a given date/direction is simulated once per slot.

use chrono::NaiveDate;

use crate::config::Config;
use crate::feasibility::{FeasibilityEngine, RideRequest, RiskLevel};
use crate::geo::Location;
use crate::rider_behavior::NoHistory;
use crate::schedule_state::ScheduleState;
use crate::slot_catalog::{SlotCatalog, TimeSlot};
use crate::time_context::{Direction, PlanType, TimeContext, Weather};

#[derive(Debug, Clone)]
pub struct AvailabilityQuery {
    pub rider_id: String,
    pub plan_type: PlanType,
    pub date: NaiveDate,
    pub day_of_week: u8,
    pub origin: Location,
    pub dest: Location,
    pub campus: Location,
    /// Minutes since local midnight, if the rider expressed a preference.
    pub desired_arrival_minute: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct AvailableWindow {
    pub slot_id_arrival_start_minute: u32,
    pub arrival_start_minute: u32,
    pub arrival_end_minute: u32,
    pub estimated_pickup_time_minute: f64,
    pub predicted_arrival_minute: f64,
    pub risk_level: RiskLevel,
}

const DESIRED_WINDOW_MINUTES: i64 = 90;
const MAX_RESULTS: usize = 10;

/// Infers travel direction from which endpoint sits within
/// `campus_proximity_km` of campus (§4.9 step 1).
pub fn infer_direction(origin: &Location, dest: &Location, campus: &Location, config: &Config) -> Direction {
    let origin_is_campus = origin.haversine_km(campus) <= config.campus_proximity_km;
    let dest_is_campus = dest.haversine_km(campus) <= config.campus_proximity_km;
    match (origin_is_campus, dest_is_campus) {
        (false, true) => Direction::HomeToCampus,
        (true, false) => Direction::CampusToHome,
        _ => Direction::Other,
    }
}

pub struct Availability<'a> {
    config: &'a Config,
    catalog: &'a SlotCatalog,
    feasibility: &'a FeasibilityEngine<'a>,
}

impl<'a> Availability<'a> {
    pub fn new(config: &'a Config, catalog: &'a SlotCatalog, feasibility: &'a FeasibilityEngine<'a>) -> Self {
        Self {
            config,
            catalog,
            feasibility,
        }
    }

    /// §4.9 `getAvailableArrivalWindows`.
    pub fn get_available_arrival_windows(
        &self,
        query: &AvailabilityQuery,
        travel_model: &crate::travel_time::TravelTimeModel,
        schedule: &ScheduleState,
    ) -> Vec<AvailableWindow> {
        let direction = infer_direction(&query.origin, &query.dest, &query.campus, self.config);
        let is_premium = query.plan_type.is_premium();

        let mut slots = self.catalog.get_slots_for_date(query.date, Some(direction));
        slots.retain(|s| {
            is_premium || s.slot_type == crate::time_context::SlotType::OffPeak
        });
        if let Some(desired) = query.desired_arrival_minute {
            slots.retain(|s| {
                (s.arrival_start_minute as i64 - desired as i64).abs() <= DESIRED_WINDOW_MINUTES
            });
        }
        slots.retain(|s| self.catalog.has_availability(&s.id, is_premium));

        let request = RideRequest {
            rider_id: query.rider_id.clone(),
            plan_type: query.plan_type,
            origin: query.origin,
            dest: query.dest,
        };

        let checked = self
            .feasibility
            .batch_feasibility_check(&request, &slots, schedule, query.day_of_week);

        let mut windows: Vec<AvailableWindow> = checked
            .into_iter()
            .filter_map(|(slot, outcome)| {
                let outcome = outcome.ok()?;
                Some(self.to_window(&slot, &outcome, query, travel_model))
            })
            .collect();

        let desired = query.desired_arrival_minute.unwrap_or(0) as i64;
        windows.sort_by(|a, b| {
            let dist_a = (a.arrival_start_minute as i64 - desired).abs();
            let dist_b = (b.arrival_start_minute as i64 - desired).abs();
            dist_a
                .cmp(&dist_b)
                .then_with(|| risk_rank(a.risk_level).cmp(&risk_rank(b.risk_level)))
        });
        windows.truncate(MAX_RESULTS);
        windows
    }

    /// `getAvailableWindowsForRider`: as above, minus slots that collide
    /// with the rider's existing rides (§4.5 conflict buffer).
    pub fn get_available_windows_for_rider(
        &self,
        query: &AvailabilityQuery,
        travel_model: &crate::travel_time::TravelTimeModel,
        schedule: &ScheduleState,
    ) -> Vec<AvailableWindow> {
        let mut windows = self.get_available_arrival_windows(query, travel_model, schedule);
        windows.retain(|w| {
            schedule
                .find_conflicting_rides(&query.rider_id, w.arrival_start_minute, self.config)
                .is_empty()
        });
        windows
    }

    fn to_window(
        &self,
        slot: &TimeSlot,
        outcome: &crate::feasibility::FeasibilityOutcome,
        query: &AvailabilityQuery,
        travel_model: &crate::travel_time::TravelTimeModel,
    ) -> AvailableWindow {
        let ctx = TimeContext::new(query.date, slot.arrival_start_minute, query.day_of_week, Weather::Clear);
        let p95_travel = travel_model.p95_minutes(&ctx, &query.origin, &query.dest);
        let estimated_pickup_time_minute =
            slot.arrival_end_minute as f64 - p95_travel - self.config.arrive_early_minutes as f64;

        AvailableWindow {
            slot_id_arrival_start_minute: slot.id.arrival_start_minute,
            arrival_start_minute: slot.arrival_start_minute,
            arrival_end_minute: slot.arrival_end_minute,
            estimated_pickup_time_minute,
            predicted_arrival_minute: outcome.predicted_arrival_minute,
            risk_level: outcome.risk_level,
        }
    }
}

fn risk_rank(level: RiskLevel) -> u8 {
    match level {
        RiskLevel::Low => 0,
        RiskLevel::Medium => 1,
        RiskLevel::High => 2,
    }
}
