//! §4.6 FeasibilityEngine — block simulation and the "5-min-early" rule.

use chrono::NaiveDate;

use crate::config::{Config, DayBlock};
use crate::error::{CapacityReason, CoreError, CoreResult, FeasibilityReason};
use crate::geo::Location;
use crate::rider_behavior::{NoHistory, RiderBehaviorModel, RiderHistoryProvider};
use crate::schedule_state::ScheduleState;
use crate::slot_catalog::{SlotCatalog, TimeSlot};
use crate::time_context::{PlanType, TimeContext, Weather};
use crate::travel_time::TravelTimeModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_buffer_minutes(buffer: f64) -> Self {
        if buffer >= 10.0 {
            RiskLevel::Low
        } else if buffer >= 5.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

#[derive(Debug, Clone)]
pub struct RideRequest {
    pub rider_id: String,
    pub plan_type: PlanType,
    pub origin: Location,
    pub dest: Location,
}

#[derive(Debug, Clone, Copy)]
pub struct FeasibilityOutcome {
    pub predicted_arrival_minute: f64,
    pub buffer_minutes: f64,
    pub risk_level: RiskLevel,
}

/// One ride in the block simulation — either an existing `ScheduledRide`
/// or the synthetic candidate appended per step 2 of §4.6.
#[derive(Debug, Clone)]
struct SimRide<'a> {
    rider_id: &'a str,
    plan_type: PlanType,
    origin: Location,
    dest: Location,
    arrival_start_minute: u32,
    arrival_end_minute: u32,
    is_candidate: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum ImpactLevel {
    Positive,
    Neutral,
    Negative,
    Critical,
}

#[derive(Debug, Clone, Copy)]
pub struct RideImpact {
    pub current_buffer_minutes: f64,
    pub new_buffer_minutes: f64,
    pub impact: ImpactLevel,
}

pub struct FeasibilityEngine<'a> {
    config: &'a Config,
    catalog: &'a SlotCatalog,
    travel_model: &'a TravelTimeModel,
    depot: Location,
}

impl<'a> FeasibilityEngine<'a> {
    pub fn new(
        config: &'a Config,
        catalog: &'a SlotCatalog,
        travel_model: &'a TravelTimeModel,
        depot: Location,
    ) -> Self {
        Self {
            config,
            catalog,
            travel_model,
            depot,
        }
    }

    /// Capacity/peak gate only, no simulation (§4.6 `quickFeasibilityCheck`).
    pub fn quick_feasibility_check(&self, slot: &TimeSlot, plan_type: PlanType) -> CoreResult<()> {
        let is_premium = plan_type.is_premium();
        if !self.catalog.has_availability(&slot.id, is_premium) {
            let reason = if !is_premium && slot.slot_type == crate::time_context::SlotType::Peak {
                CapacityReason::PeakClosed
            } else if slot.fragile && !is_premium {
                CapacityReason::FragileSlot
            } else {
                CapacityReason::NoCapacity
            };
            return Err(CoreError::capacity(reason));
        }
        Ok(())
    }

    fn ctx_for(&self, date: NaiveDate, minute_of_day: u32, day_of_week: u8) -> TimeContext {
        TimeContext::new(date, minute_of_day, day_of_week, Weather::Clear)
    }

    /// Runs the block simulation with `candidate` appended, returning the
    /// per-ride predicted arrival minute in the same order as `rides`.
    fn simulate_block(
        &self,
        rides: &[SimRide<'_>],
        date: NaiveDate,
        day_of_week: u8,
        block: DayBlock,
        history: &dyn RiderHistoryProvider,
    ) -> Vec<f64> {
        let behavior_model = RiderBehaviorModel::new(self.config);
        let mut ordered: Vec<&SimRide<'_>> = rides.iter().collect();
        // Tie-break identical arrivalStart by riderId lex (§4.6).
        ordered.sort_by(|a, b| {
            a.arrival_start_minute
                .cmp(&b.arrival_start_minute)
                .then_with(|| a.rider_id.cmp(b.rider_id))
        });

        let mut clock_minute = block.minute_range().start as f64;
        let mut driver_loc = self.depot;
        let mut arrivals_by_identity = std::collections::HashMap::new();

        for ride in &ordered {
            let ctx = self.ctx_for(date, clock_minute.round() as u32 % 1440, day_of_week);
            let travel_to_pickup = self.travel_model.p95_minutes(&ctx, &driver_loc, &ride.origin);
            let ready_delay = behavior_model
                .stats(ride.rider_id, &ctx, history)
                .p95_ready_delay;
            let pickup_time = clock_minute + travel_to_pickup + ready_delay;

            let ctx_at_pickup = self.ctx_for(date, pickup_time.round() as u32 % 1440, day_of_week);
            let travel_to_dest = self
                .travel_model
                .p95_minutes(&ctx_at_pickup, &ride.origin, &ride.dest);
            let arrival_time = pickup_time + travel_to_dest;

            // Monotonic time: never rewind, even if this ride's arrival is
            // earlier than the previous dropoff (§4.6 tie-break note).
            clock_minute = clock_minute.max(arrival_time);
            driver_loc = ride.dest;

            arrivals_by_identity.insert((ride.rider_id, ride.arrival_start_minute, ride.is_candidate), arrival_time);
        }

        rides
            .iter()
            .map(|r| arrivals_by_identity[&(r.rider_id, r.arrival_start_minute, r.is_candidate)])
            .collect()
    }

    /// §4.6 full algorithm.
    pub fn can_insert_ride_into_slot(
        &self,
        request: &RideRequest,
        slot: &TimeSlot,
        schedule: &ScheduleState,
        day_of_week: u8,
        history: &dyn RiderHistoryProvider,
    ) -> CoreResult<FeasibilityOutcome> {
        self.quick_feasibility_check(slot, request.plan_type)?;

        let block = DayBlock::for_minute_of_day(slot.arrival_start_minute);
        let existing = schedule.get_ride_in_time_block(block);

        let mut sim_rides: Vec<SimRide<'_>> = existing
            .iter()
            .map(|r| SimRide {
                rider_id: &r.rider_id,
                plan_type: r.plan_type,
                origin: r.origin,
                dest: r.dest,
                arrival_start_minute: r.arrival_start_minute,
                arrival_end_minute: r.arrival_end_minute,
                is_candidate: false,
            })
            .collect();

        let candidate = SimRide {
            rider_id: &request.rider_id,
            plan_type: request.plan_type,
            origin: request.origin,
            dest: request.dest,
            arrival_start_minute: slot.arrival_start_minute,
            arrival_end_minute: slot.arrival_end_minute,
            is_candidate: true,
        };
        sim_rides.push(candidate);

        let arrivals = self.simulate_block(&sim_rides, schedule.date, day_of_week, block, history);

        let arrive_early = self.config.arrive_early_minutes as f64;
        let mut candidate_outcome: Option<(f64, f64)> = None; // (arrival, buffer)
        let mut premium_late = false;
        let mut other_late = false;

        for (ride, predicted_arrival) in sim_rides.iter().zip(arrivals.iter()) {
            let deadline = ride.arrival_end_minute as f64 - arrive_early;
            let buffer = deadline - predicted_arrival;
            let meets_deadline = *predicted_arrival <= deadline;

            if ride.is_candidate {
                candidate_outcome = Some((*predicted_arrival, buffer));
                continue;
            }
            if !meets_deadline {
                if ride.plan_type.is_premium() {
                    premium_late = true;
                } else {
                    other_late = true;
                }
            }
        }

        let (candidate_arrival, candidate_buffer) = candidate_outcome.expect("candidate always present");

        if premium_late {
            return Err(CoreError::feasibility(FeasibilityReason::WouldDelayPremium));
        }
        if candidate_buffer < 0.0 {
            return Err(CoreError::feasibility(FeasibilityReason::CandidateLate));
        }
        if other_late {
            return Err(CoreError::feasibility(FeasibilityReason::WouldDelayOther));
        }

        Ok(FeasibilityOutcome {
            predicted_arrival_minute: candidate_arrival,
            buffer_minutes: candidate_buffer,
            risk_level: RiskLevel::from_buffer_minutes(candidate_buffer),
        })
    }

    /// §4.6 `batchFeasibilityCheck`: reuses the block load across slots.
    pub fn batch_feasibility_check(
        &self,
        request: &RideRequest,
        slots: &[TimeSlot],
        schedule: &ScheduleState,
        day_of_week: u8,
    ) -> Vec<(TimeSlot, CoreResult<FeasibilityOutcome>)> {
        slots
            .iter()
            .map(|slot| {
                let outcome =
                    self.can_insert_ride_into_slot(request, slot, schedule, day_of_week, &NoHistory);
                (slot.clone(), outcome)
            })
            .collect()
    }

    /// §4.6 `analyzeRideImpact`: per-existing-ride buffer delta from
    /// inserting `request` into `slot`.
    pub fn analyze_ride_impact(
        &self,
        request: &RideRequest,
        slot: &TimeSlot,
        schedule: &ScheduleState,
        day_of_week: u8,
    ) -> Vec<(String, RideImpact)> {
        let block = DayBlock::for_minute_of_day(slot.arrival_start_minute);
        let existing = schedule.get_ride_in_time_block(block);
        let arrive_early = self.config.arrive_early_minutes as f64;

        let before_rides: Vec<SimRide<'_>> = existing
            .iter()
            .map(|r| SimRide {
                rider_id: &r.rider_id,
                plan_type: r.plan_type,
                origin: r.origin,
                dest: r.dest,
                arrival_start_minute: r.arrival_start_minute,
                arrival_end_minute: r.arrival_end_minute,
                is_candidate: false,
            })
            .collect();
        let before_arrivals = self.simulate_block(&before_rides, schedule.date, day_of_week, block, &NoHistory);
        let before_buffers: std::collections::HashMap<&str, f64> = before_rides
            .iter()
            .zip(before_arrivals.iter())
            .map(|(r, arrival)| (r.rider_id, r.arrival_end_minute as f64 - arrive_early - arrival))
            .collect();

        let mut after_rides = before_rides.clone();
        after_rides.push(SimRide {
            rider_id: &request.rider_id,
            plan_type: request.plan_type,
            origin: request.origin,
            dest: request.dest,
            arrival_start_minute: slot.arrival_start_minute,
            arrival_end_minute: slot.arrival_end_minute,
            is_candidate: true,
        });
        let after_arrivals = self.simulate_block(&after_rides, schedule.date, day_of_week, block, &NoHistory);

        after_rides
            .iter()
            .zip(after_arrivals.iter())
            .filter(|(r, _)| !r.is_candidate)
            .map(|(r, arrival)| {
                let current = *before_buffers.get(r.rider_id).unwrap_or(&0.0);
                let new_buffer = r.arrival_end_minute as f64 - arrive_early - arrival;
                let delta = new_buffer - current;
                let impact = if new_buffer < 0.0 {
                    ImpactLevel::Critical
                } else if delta < -2.0 {
                    ImpactLevel::Negative
                } else if delta > 0.0 {
                    ImpactLevel::Positive
                } else {
                    ImpactLevel::Neutral
                };
                (
                    r.rider_id.to_string(),
                    RideImpact {
                        current_buffer_minutes: current,
                        new_buffer_minutes: new_buffer,
                        impact,
                    },
                )
            })
            .collect()
    }
}
