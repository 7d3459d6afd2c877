//! # Campus Ride Simrunner
//!
//! Parallel driver for `campus_ride_core::monte_carlo`: dispatches `N`
//! independent simulated days across a rayon worker pool, reports progress,
//! and exports the aggregate summary to JSON/CSV.
//!
//! `campus_ride_core` stays single-threaded and deterministic; this crate
//! is the only place that actually spawns concurrent work, mirroring the
//! core/runner split the rest of the workspace uses.

pub mod executor;
pub mod export;

pub use executor::{run_monte_carlo, run_monte_carlo_with_threads, MonteCarloRequest};
pub use export::{export_capacity_adjustments_to_csv, export_summary_to_json};
