//! §4.1 TravelTimeModel — purely functional travel-time statistics and
//! sampling. No I/O; safe to call from any number of concurrent tasks.
//!
//! Grounded in the teacher's `traffic.rs` (hourly multiplier tables) and
//! `distributions.rs`/`speed.rs` (seeded-RNG sampling around a mean).

use crate::config::Config;
use crate::geo::Location;
use crate::time_context::{TimeContext, Weather};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Variance level used to scale the sampled standard deviation (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarianceLevel {
    Low,
    Normal,
    High,
}

impl VarianceLevel {
    fn factor(self) -> f64 {
        match self {
            VarianceLevel::Low => 0.7,
            VarianceLevel::Normal => 1.0,
            VarianceLevel::High => 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TravelTimeStats {
    pub mean_minutes: f64,
    pub std_minutes: f64,
    pub p95_minutes: f64,
}

/// A fixed heavy-traffic rectangle; when either endpoint falls inside it
/// during peak hours, an additive multiplier is applied on top of the
/// hour/day/weather product.
#[derive(Debug, Clone, Copy)]
pub struct CorridorOverlay {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
    pub additive_multiplier: f64,
}

impl CorridorOverlay {
    fn contains(&self, loc: &Location) -> bool {
        loc.lat >= self.min_lat
            && loc.lat <= self.max_lat
            && loc.lng >= self.min_lng
            && loc.lng <= self.max_lng
    }
}

/// Deterministic, stateless travel time model. Holds only configuration
/// tables — no mutable interior state, so a single instance may be shared
/// across tasks.
#[derive(Debug, Clone)]
pub struct TravelTimeModel {
    config: Config,
    hour_of_day_table: [f64; 24],
    day_of_week_table: [f64; 7],
    corridors: Vec<CorridorOverlay>,
}

impl TravelTimeModel {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            hour_of_day_table: default_hour_of_day_table(),
            day_of_week_table: [1.0; 7],
            corridors: Vec::new(),
        }
    }

    pub fn with_corridors(mut self, corridors: Vec<CorridorOverlay>) -> Self {
        self.corridors = corridors;
        self
    }

    pub fn with_hour_of_day_table(mut self, table: [f64; 24]) -> Self {
        self.hour_of_day_table = table;
        self
    }

    fn weather_multiplier(weather: Weather) -> f64 {
        match weather {
            Weather::Clear => 1.0,
            Weather::Rain => 1.2,
            Weather::Snow => 1.5,
            Weather::Storm => 1.8,
        }
    }

    fn traffic_multiplier(&self, ctx: &TimeContext, origin: &Location, dest: &Location) -> f64 {
        let hour_mult = self.hour_of_day_table[ctx.hour_of_day() as usize % 24];
        let day_mult = self.day_of_week_table[ctx.day_of_week as usize % 7];
        let weather_mult = Self::weather_multiplier(ctx.weather);
        let mut multiplier = hour_mult * day_mult * weather_mult;

        let in_peak = self
            .config
            .peak_morning
            .contains_minute_of_day(ctx.minute_of_day)
            || self
                .config
                .peak_evening
                .contains_minute_of_day(ctx.minute_of_day);
        if in_peak {
            for corridor in &self.corridors {
                if corridor.contains(origin) || corridor.contains(dest) {
                    multiplier += corridor.additive_multiplier;
                }
            }
        }
        multiplier
    }

    /// `meanMinutes`, `stdMinutes`, `p95Minutes` for a trip at a given time (§4.1).
    pub fn stats(&self, ctx: &TimeContext, origin: &Location, dest: &Location) -> TravelTimeStats {
        let distance_km = origin.road_distance_km(dest, self.config.road_distance_factor);
        let traffic_mult = self.traffic_multiplier(ctx, origin, dest);
        let effective_speed_kmh = (self.config.base_speed_kmh / traffic_mult).max(1.0);

        let mean_minutes = distance_km / effective_speed_kmh * 60.0;
        let variance_boost = if traffic_mult > 1.2 { 1.3 } else { 1.0 };
        let std_minutes = mean_minutes * 0.15 * variance_boost;
        let p95_minutes = mean_minutes * self.config.travel_time_safety_multiplier;

        TravelTimeStats {
            mean_minutes,
            std_minutes,
            p95_minutes,
        }
    }

    pub fn p95_minutes(&self, ctx: &TimeContext, origin: &Location, dest: &Location) -> f64 {
        self.stats(ctx, origin, dest).p95_minutes
    }

    /// Draw one sample from a normal distribution around `mean_minutes`
    /// with `std_minutes * variance.factor()`, clamped to `[0.6*mean, 2.0*mean]`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        ctx: &TimeContext,
        origin: &Location,
        dest: &Location,
        variance: VarianceLevel,
        rng: &mut R,
    ) -> f64 {
        let stats = self.stats(ctx, origin, dest);
        let std = stats.std_minutes * variance.factor();
        let sample = sample_normal(rng, stats.mean_minutes, std);
        sample.clamp(stats.mean_minutes * 0.6, stats.mean_minutes * 2.0)
    }
}

/// One normal-distributed sample with the given mean/std. `std <= 0.0`
/// degenerates to the mean rather than panicking on an invalid `Normal`.
pub fn sample_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std: f64) -> f64 {
    if std <= 0.0 {
        return mean;
    }
    Normal::new(mean, std)
        .expect("std already checked positive")
        .sample(rng)
}

fn default_hour_of_day_table() -> [f64; 24] {
    // Free-flow overnight, two rush-hour humps; peak hours exceed 1.3 per §4.1.
    let mut table = [1.0_f64; 24];
    for hour in 7..10 {
        table[hour] = 1.6;
    }
    for hour in 15..18 {
        table[hour] = 1.7;
    }
    table[10] = 1.1;
    table[11] = 1.1;
    table[12] = 1.2;
    table[13] = 1.2;
    table[14] = 1.2;
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ctx_at(minute_of_day: u32) -> TimeContext {
        TimeContext::new(
            NaiveDate::from_ymd_opt(2025, 11, 18).unwrap(),
            minute_of_day,
            2,
            Weather::Clear,
        )
    }

    #[test]
    fn peak_hours_increase_travel_time_over_off_peak() {
        let model = TravelTimeModel::new(Config::default());
        let origin = Location::new(49.83, -97.14);
        let dest = Location::new(49.8075, -97.1325);

        let off_peak = model.stats(&ctx_at(11 * 60), &origin, &dest);
        let peak = model.stats(&ctx_at(8 * 60), &origin, &dest);
        assert!(peak.mean_minutes > off_peak.mean_minutes);
    }

    #[test]
    fn p95_exceeds_mean_by_safety_multiplier() {
        let config = Config::default();
        let model = TravelTimeModel::new(config.clone());
        let origin = Location::new(49.83, -97.14);
        let dest = Location::new(49.8075, -97.1325);
        let stats = model.stats(&ctx_at(8 * 60), &origin, &dest);
        assert!((stats.p95_minutes - stats.mean_minutes * config.travel_time_safety_multiplier).abs() < 1e-9);
    }

    #[test]
    fn samples_stay_within_clamp_bounds() {
        let model = TravelTimeModel::new(Config::default());
        let origin = Location::new(49.83, -97.14);
        let dest = Location::new(49.8075, -97.1325);
        let ctx = ctx_at(8 * 60);
        let stats = model.stats(&ctx, &origin, &dest);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let sample = model.sample(&ctx, &origin, &dest, VarianceLevel::High, &mut rng);
            assert!(sample >= stats.mean_minutes * 0.6 - 1e-9);
            assert!(sample <= stats.mean_minutes * 2.0 + 1e-9);
        }
    }
}
