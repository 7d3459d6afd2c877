//! # Campus Ride Core
//!
//! Decision engine for a campus shared-ride scheduling and routing service.
//!
//! ## Overview
//!
//! This crate holds the pure, deterministic core described by the external
//! API in `routing_engine`/`hold_manager`/`availability`, plus the ambient
//! collaborators (`clock`, `persistence`, `routing_provider`,
//! `notification`) it is built against as trait boundaries:
//!
//! - **Capacity**: `slot_catalog`, `capacity_planner` — per-slot Premium /
//!   non-Premium seat counters and daily/hourly caps.
//! - **Feasibility**: `travel_time`, `rider_behavior`, `feasibility` — block
//!   simulation enforcing the 5-minute-early rule.
//! - **Holds**: `hold_manager` — reserve/confirm/cancel/expire lifecycle.
//! - **Routing**: `routing_engine` — anchor-model best-insertion detour
//!   search for multi-stop shared windows.
//! - **Availability**: `availability` — ranked arrival-window search.
//! - **Simulation**: `monte_carlo` — single-run sampling and aggregate
//!   statistics; `crates/simrunner` dispatches the parallel sweep.
//!
//! ## Concurrency
//!
//! `Persistence` and `RoutingProvider` are `#[async_trait]` boundaries; the
//! rest of the core is synchronous and safe to call from any task. Row-level
//! locking is modeled as owned mutex guards returned by `Persistence::lock_*`.

pub mod availability;
pub mod capacity_planner;
pub mod clock;
pub mod config;
pub mod error;
pub mod feasibility;
pub mod geo;
pub mod hold_manager;
pub mod monte_carlo;
pub mod notification;
pub mod persistence;
pub mod rider_behavior;
pub mod routing_engine;
pub mod routing_provider;
pub mod schedule_state;
pub mod slot_catalog;
pub mod time_context;
pub mod travel_time;

pub use config::Config;
pub use error::{CoreError, CoreResult};
