//! Parallel Monte Carlo dispatch using rayon.
//!
//! This is the only place in the workspace that actually spawns `N`
//! independent simulation runs; `campus_ride_core::monte_carlo` stays a
//! pure, single-threaded library (§5: "Feasibility simulation is pure CPU,
//! Monte Carlo runs ... should be parallelized across runs with a bounded
//! worker pool").

use std::collections::HashMap;

use campus_ride_core::config::Config;
use campus_ride_core::geo::Location;
use campus_ride_core::monte_carlo::{
    compute_summary, run_single_simulation, RiderSpec, Scenario, SimulatedRideOutcome, SimulationSummary,
};
use campus_ride_core::rider_behavior::RiderHistoryProvider;
use campus_ride_core::travel_time::TravelTimeModel;
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

pub struct MonteCarloRequest<'a> {
    pub config: &'a Config,
    pub travel_model: &'a TravelTimeModel,
    pub depot: Location,
    pub rides: &'a [RiderSpec],
    pub date: NaiveDate,
    pub day_of_week: u8,
    pub scenario: Scenario,
    pub run_count: u32,
    /// Seeds every run deterministically as `seed + run_index`, so a given
    /// request reproduces byte-identical results (§9: "seeded RNG injected
    /// into MonteCarloSimulator").
    pub seed: u64,
    /// Present `maxRidersNonPremium` per slot (keyed by `arrivalStartMinute`),
    /// used to size suggested capacity adjustments.
    pub current_non_premium_capacity: &'a HashMap<u32, u32>,
}

/// Runs `request.run_count` independent simulated days across rayon's
/// default global thread pool and aggregates the results.
pub fn run_monte_carlo(
    request: &MonteCarloRequest<'_>,
    history: &dyn RiderHistoryProvider,
    show_progress: bool,
) -> SimulationSummary {
    run_monte_carlo_with_threads(request, history, show_progress, None)
}

/// As [`run_monte_carlo`], but with an explicit worker count instead of
/// rayon's default (available-parallelism) pool.
pub fn run_monte_carlo_with_threads(
    request: &MonteCarloRequest<'_>,
    history: &dyn RiderHistoryProvider,
    show_progress: bool,
    num_threads: Option<usize>,
) -> SimulationSummary {
    let total = request.run_count as u64;
    let pb = if show_progress && total > 0 {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(bar)
    } else {
        None
    };

    let pool = if let Some(threads) = num_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("failed to build rayon thread pool")
    } else {
        rayon::ThreadPoolBuilder::new()
            .build()
            .expect("failed to build rayon thread pool")
    };

    let pb_clone = pb.clone();
    let runs: Vec<Vec<SimulatedRideOutcome>> = pool.install(|| {
        (0..request.run_count)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(request.seed.wrapping_add(i as u64));
                let outcomes = run_single_simulation(
                    request.config,
                    request.travel_model,
                    request.depot,
                    request.rides,
                    request.date,
                    request.day_of_week,
                    &request.scenario,
                    history,
                    &mut rng,
                );
                if let Some(ref bar) = pb_clone {
                    bar.inc(1);
                }
                outcomes
            })
            .collect()
    });

    if let Some(ref bar) = pb {
        bar.finish_with_message("completed");
    }

    compute_summary(request.config, &runs, request.current_non_premium_capacity)
}
