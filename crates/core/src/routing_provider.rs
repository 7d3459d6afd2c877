//! §4.7 / §6 RoutingProvider — pluggable routing backend.
//!
//! Mirrors the teacher's `RouteProvider` trait (`routing.rs`): a small
//! `Send + Sync` interface with a concrete haversine-based fallback
//! implementation selected when the primary provider errors or times out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::error::CoreResult;
use crate::geo::Location;

#[derive(Debug, Clone, Copy)]
pub struct LegEstimate {
    pub duration_seconds: f64,
    pub distance_meters: f64,
}

#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    /// `legs[i][j]` is the origin-`i` to destination-`j` estimate.
    pub legs: Vec<Vec<LegEstimate>>,
}

#[derive(Debug, Clone)]
pub struct Directions {
    pub duration_seconds: f64,
    pub distance_meters: f64,
    /// Opaque polyline bytes; never interpreted by the core.
    pub polyline: Vec<u8>,
}

#[async_trait]
pub trait RoutingProvider: Send + Sync {
    async fn distance_matrix(
        &self,
        origins: &[Location],
        destinations: &[Location],
        depart_at: DateTime<Utc>,
    ) -> CoreResult<DistanceMatrix>;

    async fn directions(
        &self,
        origin: Location,
        destination: Location,
        waypoints: &[Location],
        depart_at: DateTime<Utc>,
    ) -> CoreResult<Directions>;
}

/// Haversine × nominal-speed fallback (§4.7). Always succeeds; this is the
/// implementation selected when the primary provider times out or errors.
#[derive(Debug, Clone)]
pub struct HaversineFallbackProvider {
    speed_kmh: f64,
    road_distance_factor: f64,
}

impl HaversineFallbackProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            speed_kmh: config.fallback_speed_kmh,
            road_distance_factor: config.road_distance_factor,
        }
    }

    fn leg(&self, from: &Location, to: &Location) -> LegEstimate {
        let distance_km = from.road_distance_km(to, self.road_distance_factor);
        let duration_seconds = distance_km / self.speed_kmh * 3600.0;
        LegEstimate {
            duration_seconds,
            distance_meters: distance_km * 1000.0,
        }
    }
}

#[async_trait]
impl RoutingProvider for HaversineFallbackProvider {
    async fn distance_matrix(
        &self,
        origins: &[Location],
        destinations: &[Location],
        _depart_at: DateTime<Utc>,
    ) -> CoreResult<DistanceMatrix> {
        let legs = origins
            .iter()
            .map(|o| destinations.iter().map(|d| self.leg(o, d)).collect())
            .collect();
        Ok(DistanceMatrix { legs })
    }

    async fn directions(
        &self,
        origin: Location,
        destination: Location,
        waypoints: &[Location],
        _depart_at: DateTime<Utc>,
    ) -> CoreResult<Directions> {
        let mut stops = Vec::with_capacity(waypoints.len() + 2);
        stops.push(origin);
        stops.extend_from_slice(waypoints);
        stops.push(destination);

        let mut duration_seconds = 0.0;
        let mut distance_meters = 0.0;
        for pair in stops.windows(2) {
            let leg = self.leg(&pair[0], &pair[1]);
            duration_seconds += leg.duration_seconds;
            distance_meters += leg.distance_meters;
        }

        Ok(Directions {
            duration_seconds,
            distance_meters,
            polyline: Vec::new(),
        })
    }
}

/// Per-call timeout + one-shot retry for `distance_matrix`, zero retries
/// for `directions` (§5, §7), falling back to haversine on timeout/error.
pub struct RetryingRoutingProvider<P: RoutingProvider> {
    primary: P,
    fallback: HaversineFallbackProvider,
    timeout: std::time::Duration,
}

impl<P: RoutingProvider> RetryingRoutingProvider<P> {
    pub fn new(primary: P, config: &Config, timeout: std::time::Duration) -> Self {
        Self {
            primary,
            fallback: HaversineFallbackProvider::new(config),
            timeout,
        }
    }
}

#[async_trait]
impl<P: RoutingProvider> RoutingProvider for RetryingRoutingProvider<P> {
    async fn distance_matrix(
        &self,
        origins: &[Location],
        destinations: &[Location],
        depart_at: DateTime<Utc>,
    ) -> CoreResult<DistanceMatrix> {
        for attempt in 0..2 {
            let call = self.primary.distance_matrix(origins, destinations, depart_at);
            match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(err)) => {
                    if attempt == 0 {
                        continue;
                    }
                    tracing::warn!(?err, "routing provider distance_matrix failed, using fallback");
                }
                Err(_) => {
                    if attempt == 0 {
                        continue;
                    }
                    tracing::warn!("routing provider distance_matrix timed out, using fallback");
                }
            }
        }
        self.fallback.distance_matrix(origins, destinations, depart_at).await
    }

    async fn directions(
        &self,
        origin: Location,
        destination: Location,
        waypoints: &[Location],
        depart_at: DateTime<Utc>,
    ) -> CoreResult<Directions> {
        let call = self.primary.directions(origin, destination, waypoints, depart_at);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => {
                tracing::warn!(?err, "routing provider directions failed, using fallback");
                self.fallback.directions(origin, destination, waypoints, depart_at).await
            }
            Err(_) => {
                tracing::warn!("routing provider directions timed out, using fallback");
                self.fallback.directions(origin, destination, waypoints, depart_at).await
            }
        }
    }
}
