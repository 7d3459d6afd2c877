//! §4.2 RiderBehaviorModel — rider readiness and no-show modeling.

use crate::config::Config;
use crate::time_context::TimeContext;
use crate::travel_time::sample_normal;
use rand::Rng;

/// Minimum "walk to curb" delay baked into the default profile.
pub const MIN_WALK_TO_CURB_MINUTES: f64 = 1.5;

#[derive(Debug, Clone, Copy)]
pub struct RiderBehaviorStats {
    pub expected_ready_delay: f64,
    pub std_ready_delay: f64,
    pub p95_ready_delay: f64,
    pub no_show_probability: f64,
    pub reliability_score: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct RiderSample {
    pub delay_minutes: f64,
    pub is_no_show: bool,
}

/// Aggregated history for a rider, eligible to override the default profile
/// only once at least 5 completed rides have been recorded (§4.2).
#[derive(Debug, Clone, Copy)]
pub struct RiderHistoricalStats {
    pub completed_rides: u32,
    pub mean_ready_delay: f64,
    pub std_ready_delay: f64,
    pub no_show_count: u32,
}

impl RiderHistoricalStats {
    pub const MIN_COMPLETED_RIDES_FOR_OVERRIDE: u32 = 5;

    pub fn is_eligible(&self) -> bool {
        self.completed_rides >= Self::MIN_COMPLETED_RIDES_FOR_OVERRIDE
    }

    /// Append-only, monotonic update after a completed or no-show ride.
    pub fn record_completed_ride(&mut self, ready_delay_minutes: f64) {
        let n = self.completed_rides as f64;
        let new_mean = (self.mean_ready_delay * n + ready_delay_minutes) / (n + 1.0);
        let variance_component = (ready_delay_minutes - self.mean_ready_delay).powi(2);
        self.std_ready_delay =
            ((self.std_ready_delay.powi(2) * n + variance_component) / (n + 1.0)).sqrt();
        self.mean_ready_delay = new_mean;
        self.completed_rides += 1;
    }

    pub fn record_no_show(&mut self) {
        self.no_show_count += 1;
    }
}

impl Default for RiderHistoricalStats {
    fn default() -> Self {
        Self {
            completed_rides: 0,
            mean_ready_delay: 0.0,
            std_ready_delay: 0.0,
            no_show_count: 0,
        }
    }
}

/// Functional interface for historical-stats lookup (§9): default path
/// requires no DB.
pub trait RiderHistoryProvider: Send + Sync {
    fn history_for(&self, rider_id: &str) -> Option<RiderHistoricalStats>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl RiderHistoryProvider for NoHistory {
    fn history_for(&self, _rider_id: &str) -> Option<RiderHistoricalStats> {
        None
    }
}

pub struct RiderBehaviorModel<'a> {
    config: &'a Config,
}

impl<'a> RiderBehaviorModel<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    fn time_of_day_shift_minutes(ctx: &TimeContext) -> f64 {
        // Riders run later during peak hours; a small additive shift.
        let hour = ctx.hour_of_day();
        if (7..10).contains(&hour) || (15..18).contains(&hour) {
            0.75
        } else {
            0.0
        }
    }

    pub fn stats(
        &self,
        rider_id: &str,
        ctx: &TimeContext,
        history: &dyn RiderHistoryProvider,
    ) -> RiderBehaviorStats {
        let shift = Self::time_of_day_shift_minutes(ctx);

        let (mut expected, mut std_delay, no_show_probability) =
            match history.history_for(rider_id) {
                Some(hist) if hist.is_eligible() => {
                    let total = hist.completed_rides + hist.no_show_count;
                    let no_show_prob = if total > 0 {
                        hist.no_show_count as f64 / total as f64
                    } else {
                        0.02
                    };
                    (hist.mean_ready_delay, hist.std_ready_delay.max(0.5), no_show_prob)
                }
                _ => (self.config.default_rider_delay_minutes, 1.0, 0.02),
            };

        expected = (expected + MIN_WALK_TO_CURB_MINUTES).max(MIN_WALK_TO_CURB_MINUTES) + shift;
        std_delay = std_delay.max(0.5);
        let p95 = expected + 1.645 * std_delay;

        let reliability_score = (1.0 - no_show_probability).clamp(0.0, 1.0);

        RiderBehaviorStats {
            expected_ready_delay: expected,
            std_ready_delay: std_delay,
            p95_ready_delay: p95,
            no_show_probability,
            reliability_score,
        }
    }

    /// Sample one outcome: Bernoulli no-show, else normal-distributed delay
    /// clamped to `[-3, +15]` minutes (§4.2).
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rider_id: &str,
        ctx: &TimeContext,
        history: &dyn RiderHistoryProvider,
        rng: &mut R,
    ) -> RiderSample {
        let stats = self.stats(rider_id, ctx, history);
        if rng.gen_bool(stats.no_show_probability.clamp(0.0, 1.0)) {
            return RiderSample {
                delay_minutes: 0.0,
                is_no_show: true,
            };
        }
        let delay = sample_normal(rng, stats.expected_ready_delay, stats.std_ready_delay)
            .clamp(-3.0, 15.0);
        RiderSample {
            delay_minutes: delay,
            is_no_show: false,
        }
    }
}
