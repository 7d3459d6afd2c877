//! §4.10 MonteCarloSimulator — pure, sync single-run logic and the
//! aggregation math. `crates/simrunner` is the only place that actually
//! dispatches `N` runs across a worker pool; this module never spawns
//! threads, keeping it a pure library per §5's "feasibility simulation is
//! pure CPU" split.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{Config, DayBlock};
use crate::geo::Location;
use crate::rider_behavior::{RiderBehaviorModel, RiderHistoryProvider};
use crate::slot_catalog::SlotId;
use crate::time_context::{PlanType, TimeContext, Weather};
use crate::travel_time::{TravelTimeModel, VarianceLevel};

/// One ride on the simulated day — a frozen snapshot, never mutated during
/// a run (§9: "each worker runs on an immutable snapshot of the day's rides").
#[derive(Debug, Clone)]
pub struct RiderSpec {
    pub rider_id: String,
    pub plan_type: PlanType,
    pub slot_id: SlotId,
    pub origin: Location,
    pub dest: Location,
    pub arrival_start_minute: u32,
    pub arrival_end_minute: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub variance_level: VarianceLevel,
    pub weather: Weather,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            variance_level: VarianceLevel::Normal,
            weather: Weather::Clear,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedRideOutcome {
    pub rider_id: String,
    pub plan_type: PlanType,
    pub slot_id: SlotId,
    pub lateness_minutes: f64,
    pub was_on_time: bool,
}

/// Runs one simulated day: samples `TravelTimeModel::sample` and
/// `RiderBehaviorModel::sample` per ride instead of taking the p95
/// (§4.10: "same iteration as §4.6 but sampling"). No-show riders never
/// board — they contribute no outcome and do not advance the driver clock.
pub fn run_single_simulation<R: Rng + ?Sized>(
    config: &Config,
    travel_model: &TravelTimeModel,
    depot: Location,
    rides: &[RiderSpec],
    date: NaiveDate,
    day_of_week: u8,
    scenario: &Scenario,
    history: &dyn RiderHistoryProvider,
    rng: &mut R,
) -> Vec<SimulatedRideOutcome> {
    let behavior_model = RiderBehaviorModel::new(config);

    let mut by_block: HashMap<DayBlock, Vec<&RiderSpec>> = HashMap::new();
    for ride in rides {
        by_block
            .entry(DayBlock::for_minute_of_day(ride.arrival_start_minute))
            .or_default()
            .push(ride);
    }

    let mut blocks: Vec<DayBlock> = by_block.keys().copied().collect();
    blocks.sort_by_key(|b| b.minute_range().start);

    let mut outcomes = Vec::with_capacity(rides.len());
    for block in blocks {
        let mut block_rides = by_block.remove(&block).unwrap_or_default();
        block_rides.sort_by(|a, b| {
            a.arrival_start_minute
                .cmp(&b.arrival_start_minute)
                .then_with(|| a.rider_id.cmp(&b.rider_id))
        });

        let mut clock_minute = block.minute_range().start as f64;
        let mut driver_loc = depot;

        for ride in block_rides {
            let ctx = TimeContext::new(date, clock_minute.round() as u32 % 1440, day_of_week, scenario.weather);
            let travel_to_pickup =
                travel_model.sample(&ctx, &driver_loc, &ride.origin, scenario.variance_level, rng);
            let rider_sample = behavior_model.sample(&ride.rider_id, &ctx, history, rng);

            if rider_sample.is_no_show {
                continue;
            }

            let pickup_time = clock_minute + travel_to_pickup + rider_sample.delay_minutes;
            let ctx_at_pickup =
                TimeContext::new(date, pickup_time.round() as u32 % 1440, day_of_week, scenario.weather);
            let travel_to_dest =
                travel_model.sample(&ctx_at_pickup, &ride.origin, &ride.dest, scenario.variance_level, rng);
            let arrival_time = pickup_time + travel_to_dest;

            clock_minute = clock_minute.max(arrival_time);
            driver_loc = ride.dest;

            let deadline = ride.arrival_end_minute as f64 - config.arrive_early_minutes as f64;
            let lateness_minutes = (arrival_time - deadline).max(0.0);
            outcomes.push(SimulatedRideOutcome {
                rider_id: ride.rider_id.clone(),
                plan_type: ride.plan_type,
                slot_id: ride.slot_id.clone(),
                lateness_minutes,
                was_on_time: lateness_minutes <= 1e-9,
            });
        }
    }
    outcomes
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunRates {
    pub premium_on_time_rate: f64,
    pub non_premium_on_time_rate: f64,
    pub max_lateness_minutes: f64,
}

pub fn summarize_run(outcomes: &[SimulatedRideOutcome]) -> RunRates {
    let (mut premium_total, mut premium_on_time) = (0u32, 0u32);
    let (mut non_premium_total, mut non_premium_on_time) = (0u32, 0u32);
    let mut max_lateness = 0.0_f64;

    for outcome in outcomes {
        max_lateness = max_lateness.max(outcome.lateness_minutes);
        if outcome.plan_type.is_premium() {
            premium_total += 1;
            premium_on_time += outcome.was_on_time as u32;
        } else {
            non_premium_total += 1;
            non_premium_on_time += outcome.was_on_time as u32;
        }
    }

    RunRates {
        premium_on_time_rate: rate(premium_on_time, premium_total),
        non_premium_on_time_rate: rate(non_premium_on_time, non_premium_total),
        max_lateness_minutes: max_lateness,
    }
}

fn rate(on_time: u32, total: u32) -> f64 {
    if total == 0 {
        1.0
    } else {
        on_time as f64 / total as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityAdjustment {
    pub slot_id_arrival_start_minute: u32,
    pub current_non_premium: u32,
    pub suggested_non_premium: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub run_count: usize,
    pub premium_on_time_rate: f64,
    pub non_premium_on_time_rate: f64,
    /// 5th percentile of the per-run rate (the worst 5% of runs).
    pub premium_p95_rate: f64,
    pub non_premium_p95_rate: f64,
    pub premium_worst_run_rate: f64,
    pub non_premium_worst_run_rate: f64,
    pub max_lateness_minutes: f64,
    pub avg_max_lateness_minutes: f64,
    pub recommendations: Vec<String>,
    pub suggested_capacity_adjustments: Vec<CapacityAdjustment>,
}

const SLOT_LATE_RATE_THRESHOLD: f64 = 0.10;

/// Aggregates `N` independent runs (§4.10). `current_non_premium_capacity`
/// supplies the present `maxRidersNonPremium` per slot so adjustment
/// suggestions can propose a concrete halved value.
pub fn compute_summary(
    config: &Config,
    runs: &[Vec<SimulatedRideOutcome>],
    current_non_premium_capacity: &HashMap<u32, u32>,
) -> SimulationSummary {
    let mut premium_rates = Vec::with_capacity(runs.len());
    let mut non_premium_rates = Vec::with_capacity(runs.len());
    let mut per_run_max_lateness = Vec::with_capacity(runs.len());
    let mut overall_max_lateness = 0.0_f64;

    let mut slot_late = HashMap::<u32, (u32, u32)>::new(); // slot -> (late, total)

    for run in runs {
        let rates = summarize_run(run);
        premium_rates.push(rates.premium_on_time_rate);
        non_premium_rates.push(rates.non_premium_on_time_rate);
        per_run_max_lateness.push(rates.max_lateness_minutes);
        overall_max_lateness = overall_max_lateness.max(rates.max_lateness_minutes);

        for outcome in run {
            let entry = slot_late.entry(outcome.slot_id.arrival_start_minute).or_insert((0, 0));
            entry.1 += 1;
            if !outcome.was_on_time {
                entry.0 += 1;
            }
        }
    }

    let run_count = runs.len();
    let premium_on_time_rate = mean(&premium_rates);
    let non_premium_on_time_rate = mean(&non_premium_rates);
    let premium_p95_rate = fifth_percentile(&premium_rates);
    let non_premium_p95_rate = fifth_percentile(&non_premium_rates);
    let premium_worst_run_rate = premium_rates.iter().cloned().fold(f64::INFINITY, f64::min).min(1.0);
    let non_premium_worst_run_rate = non_premium_rates.iter().cloned().fold(f64::INFINITY, f64::min).min(1.0);
    let avg_max_lateness_minutes = mean(&per_run_max_lateness);

    let mut recommendations = Vec::new();
    if premium_on_time_rate < config.premium_on_time_target {
        recommendations.push("reduce non-premium capacity".to_string());
    }
    if non_premium_on_time_rate < config.non_premium_on_time_target {
        recommendations.push("reduce non-premium capacity in hot hours".to_string());
    }
    if overall_max_lateness > 15.0 {
        recommendations.push("review density".to_string());
    }

    let mut suggested_capacity_adjustments = Vec::new();
    let mut hot_slots: Vec<(u32, f64)> = slot_late
        .iter()
        .filter(|(_, (_, total))| *total > 0)
        .map(|(slot, (late, total))| (*slot, *late as f64 / *total as f64))
        .filter(|(_, late_rate)| *late_rate > SLOT_LATE_RATE_THRESHOLD)
        .collect();
    hot_slots.sort_by_key(|(slot, _)| *slot);

    for (slot, _late_rate) in hot_slots {
        let current = *current_non_premium_capacity.get(&slot).unwrap_or(&0);
        if current > 0 {
            suggested_capacity_adjustments.push(CapacityAdjustment {
                slot_id_arrival_start_minute: slot,
                current_non_premium: current,
                suggested_non_premium: current / 2,
            });
        }
    }

    SimulationSummary {
        run_count,
        premium_on_time_rate,
        non_premium_on_time_rate,
        premium_p95_rate,
        non_premium_p95_rate,
        premium_worst_run_rate,
        non_premium_worst_run_rate,
        max_lateness_minutes: overall_max_lateness,
        avg_max_lateness_minutes,
        recommendations,
        suggested_capacity_adjustments,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 1.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 5th percentile, i.e. the value below which the worst 5% of runs fall.
fn fifth_percentile(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 1.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let index = ((sorted.len() as f64) * 0.05).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// §6 `simulation_jobs` row. Status transitions are driven by the caller
/// (`crates/simrunner`); the core only defines the shape and the legal
/// transitions (`mark_running`, `mark_completed`, `mark_failed`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationJob {
    pub job_id: Uuid,
    pub date: NaiveDate,
    pub run_count: u32,
    pub status: SimulationJobStatus,
    pub results: Option<SimulationSummary>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SimulationJob {
    pub fn pending(date: NaiveDate, run_count: u32) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            date,
            run_count,
            status: SimulationJobStatus::Pending,
            results: None,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self, started_at: DateTime<Utc>) {
        self.status = SimulationJobStatus::Running;
        self.started_at = Some(started_at);
    }

    pub fn mark_completed(&mut self, results: SimulationSummary, completed_at: DateTime<Utc>) {
        self.status = SimulationJobStatus::Completed;
        self.results = Some(results);
        self.completed_at = Some(completed_at);
    }

    pub fn mark_failed(&mut self, error: String, completed_at: DateTime<Utc>) {
        self.status = SimulationJobStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(completed_at);
    }
}
