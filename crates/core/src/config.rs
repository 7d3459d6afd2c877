//! Single configuration value carried through the engine.
//!
//! Every tunable named in the specification lives here instead of as a
//! hidden global. Components take `&Config` at construction time; only the
//! premium-subscriber counter (`PremiumRegistry`, see [`crate::capacity_planner`])
//! is allowed to be process-wide shared state, and even that is a CAS
//! counter rather than ambient mutability.

use std::ops::Range;

/// Half-open local-time window, e.g. `07:00..10:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDayWindow {
    pub start_minute: u32,
    pub end_minute: u32,
}

impl TimeOfDayWindow {
    pub const fn new(start_hh: u32, start_mm: u32, end_hh: u32, end_mm: u32) -> Self {
        Self {
            start_minute: start_hh * 60 + start_mm,
            end_minute: end_hh * 60 + end_mm,
        }
    }

    /// Half-open containment: `[start, end)`.
    pub fn contains_minute_of_day(&self, minute_of_day: u32) -> bool {
        minute_of_day >= self.start_minute && minute_of_day < self.end_minute
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub max_premium_subscribers: u32,
    pub max_riders_per_ride: u32,
    pub max_rides_per_hour: u32,
    pub max_rides_per_day: u32,

    pub peak_morning: TimeOfDayWindow,
    pub peak_evening: TimeOfDayWindow,

    pub arrive_early_minutes: i64,
    pub hold_expiry_minutes: i64,
    pub slot_window_minutes: i64,

    pub travel_time_safety_multiplier: f64,
    pub default_rider_delay_minutes: f64,

    pub premium_on_time_target: f64,
    pub non_premium_on_time_target: f64,

    pub monte_carlo_default_runs: u32,

    pub max_detour_seconds: i64,
    pub road_distance_factor: f64,
    pub base_speed_kmh: f64,

    /// Fallback provider speed when the primary `RoutingProvider` is
    /// unavailable (§4.7).
    pub fallback_speed_kmh: f64,

    /// Rider-conflict buffer used by `findConflictingRides` (§4.5).
    pub rider_conflict_buffer_minutes: i64,

    /// Campus-proximity radius used to infer ride `direction` (§4.9).
    pub campus_proximity_km: f64,

    /// IANA timezone name all wall-clock local times are evaluated in.
    pub timezone: chrono_tz::Tz,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_premium_subscribers: 20,
            max_riders_per_ride: 2,
            max_rides_per_hour: 3,
            max_rides_per_day: 40,

            peak_morning: TimeOfDayWindow::new(7, 0, 10, 0),
            peak_evening: TimeOfDayWindow::new(15, 0, 18, 0),

            arrive_early_minutes: 5,
            hold_expiry_minutes: 5,
            slot_window_minutes: 5,

            travel_time_safety_multiplier: 1.3,
            default_rider_delay_minutes: 2.0,

            premium_on_time_target: 0.99,
            non_premium_on_time_target: 0.95,

            monte_carlo_default_runs: 1000,

            max_detour_seconds: 120,
            road_distance_factor: 1.3,
            base_speed_kmh: 28.0,

            fallback_speed_kmh: 25.0,

            rider_conflict_buffer_minutes: 30,
            campus_proximity_km: 2.0,

            timezone: chrono_tz::America::Winnipeg,
        }
    }
}

/// Named contiguous ranges of the day used to scope feasibility simulation (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayBlock {
    PreDawn,
    MorningPeak,
    MidDay,
    EveningPeak,
    Evening,
}

impl DayBlock {
    /// `[start, end)` minute-of-day range for this block. Tiles the day exactly once.
    pub fn minute_range(&self) -> Range<u32> {
        match self {
            DayBlock::PreDawn => 0..360,
            DayBlock::MorningPeak => 360..600,
            DayBlock::MidDay => 600..900,
            DayBlock::EveningPeak => 900..1080,
            DayBlock::Evening => 1080..1440,
        }
    }

    pub fn for_minute_of_day(minute_of_day: u32) -> Self {
        for block in [
            DayBlock::PreDawn,
            DayBlock::MorningPeak,
            DayBlock::MidDay,
            DayBlock::EveningPeak,
            DayBlock::Evening,
        ] {
            if block.minute_range().contains(&minute_of_day) {
                return block;
            }
        }
        DayBlock::Evening
    }
}
