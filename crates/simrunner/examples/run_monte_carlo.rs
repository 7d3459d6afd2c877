//! Runs a small Monte Carlo reliability sweep for one simulated day and
//! exports the aggregate summary to `./monte_carlo_summary.json` and the
//! suggested capacity adjustments to `./monte_carlo_adjustments.csv`.
//!
//! Run with: `cargo run -p campus_ride_simrunner --example run_monte_carlo`

use std::collections::HashMap;

use campus_ride_core::config::Config;
use campus_ride_core::geo::Location;
use campus_ride_core::monte_carlo::{RiderSpec, Scenario};
use campus_ride_core::rider_behavior::NoHistory;
use campus_ride_core::slot_catalog::SlotId;
use campus_ride_core::time_context::{Direction, PlanType};
use campus_ride_core::travel_time::{TravelTimeModel, VarianceLevel};
use campus_ride_simrunner::{export_capacity_adjustments_to_csv, export_summary_to_json, run_monte_carlo, MonteCarloRequest};
use chrono::NaiveDate;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::default();
    let travel_model = TravelTimeModel::new(config.clone());
    let depot = Location::new(49.8075, -97.1325);
    let date = NaiveDate::from_ymd_opt(2025, 11, 18).expect("valid date");

    let rides: Vec<RiderSpec> = (0..20)
        .map(|i| {
            let arrival_start = 8 * 60 + (i % 4) * 15;
            RiderSpec {
                rider_id: format!("rider-{i}"),
                plan_type: if i % 5 == 0 { PlanType::Premium } else { PlanType::Standard },
                slot_id: SlotId::new(date, Direction::HomeToCampus, arrival_start),
                origin: Location::new(49.83 + (i as f64) * 0.001, -97.14 - (i as f64) * 0.001),
                dest: depot,
                arrival_start_minute: arrival_start,
                arrival_end_minute: arrival_start + 5,
            }
        })
        .collect();

    let mut current_non_premium_capacity = HashMap::new();
    for start in [8 * 60, 8 * 60 + 15, 8 * 60 + 30, 8 * 60 + 45] {
        current_non_premium_capacity.insert(start, 4u32);
    }

    let request = MonteCarloRequest {
        config: &config,
        travel_model: &travel_model,
        depot,
        rides: &rides,
        date,
        day_of_week: 2,
        scenario: Scenario {
            variance_level: VarianceLevel::Normal,
            weather: campus_ride_core::time_context::Weather::Clear,
        },
        run_count: 500,
        seed: 20251118,
        current_non_premium_capacity: &current_non_premium_capacity,
    };

    let summary = run_monte_carlo(&request, &NoHistory, true);
    println!(
        "premium on-time: {:.4}  non-premium on-time: {:.4}  max lateness: {:.1}min",
        summary.premium_on_time_rate, summary.non_premium_on_time_rate, summary.max_lateness_minutes
    );

    export_summary_to_json(&summary, "monte_carlo_summary.json")?;
    export_capacity_adjustments_to_csv(&summary, "monte_carlo_adjustments.csv")?;
    Ok(())
}
