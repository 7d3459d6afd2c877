//! §4.7 RoutingEngine — anchor model + best-insertion detour search for
//! multi-stop shared trips.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{CapacityReason, CoreError, CoreResult, FeasibilityReason, StateReason};
use crate::geo::Location;
use crate::persistence::Persistence;
use crate::routing_provider::RoutingProvider;

#[derive(Debug, Clone)]
pub struct ServiceZone {
    pub campus: Location,
    pub max_detour_seconds: i64,
    pub max_riders_per_trip: u32,
    pub max_anchor_distance_meters: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TimeWindow {
    pub id: String,
    pub active: bool,
    pub window_type: String,
    pub service_date: NaiveDate,
    /// Minutes since local midnight.
    pub campus_target_time_minute: u32,
    pub start_pickup_time_minute: u32,
    pub max_riders: u32,
    pub zone: ServiceZone,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutePlanKey {
    pub time_window_id: String,
    pub service_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlan {
    pub key: RoutePlanKey,
    pub campus: Location,
    pub planned_departure_minute: f64,
    pub ordered_assignment_ids: Vec<Uuid>,
    pub anchor_assignment_id: Option<Uuid>,
    pub polyline: Option<Vec<u8>>,
    pub base_duration_seconds: Option<f64>,
    pub total_distance_meters: Option<f64>,
}

impl RoutePlan {
    pub fn empty(key: RoutePlanKey, campus: Location, planned_departure_minute: f64) -> Self {
        Self {
            key,
            campus,
            planned_departure_minute,
            ordered_assignment_ids: Vec::new(),
            anchor_assignment_id: None,
            polyline: None,
            base_duration_seconds: None,
            total_distance_meters: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentStatus {
    Confirmed,
    Waitlisted,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowAssignment {
    pub id: Uuid,
    pub user_id: String,
    pub time_window_id: String,
    pub service_date: NaiveDate,
    pub pickup: Location,
    pub status: AssignmentStatus,
    pub estimated_pickup_minute: Option<f64>,
    pub estimated_arrival_minute: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct InsertionPlan {
    pub best_insertion_index: usize,
    pub extra_seconds: f64,
    pub estimated_arrival_minute: f64,
    pub estimated_pickup_minute: f64,
    pub is_anchor: bool,
}

pub struct RoutingEngine<'a> {
    config: &'a Config,
    provider: &'a dyn RoutingProvider,
    persistence: &'a dyn Persistence,
    clock: &'a dyn Clock,
}

impl<'a> RoutingEngine<'a> {
    pub fn new(
        config: &'a Config,
        provider: &'a dyn RoutingProvider,
        persistence: &'a dyn Persistence,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            config,
            provider,
            persistence,
            clock,
        }
    }

    /// Up to three alternative windows of the same type/date with seats.
    async fn alternatives(&self, window: &TimeWindow, candidates: &[TimeWindow]) -> Vec<String> {
        let mut alts = Vec::new();
        for candidate in candidates {
            if candidate.id == window.id
                || candidate.window_type != window.window_type
                || candidate.service_date != window.service_date
                || !candidate.active
            {
                continue;
            }
            let key = RoutePlanKey {
                time_window_id: candidate.id.clone(),
                service_date: candidate.service_date,
            };
            let confirmed = self.confirmed_count(&key).await;
            if confirmed < candidate.max_riders {
                alts.push(candidate.id.clone());
            }
            if alts.len() == 3 {
                break;
            }
        }
        alts
    }

    async fn confirmed_count(&self, key: &RoutePlanKey) -> u32 {
        let Some(plan) = self.persistence.get_route_plan(key).await else {
            return 0;
        };
        let mut count = 0;
        for id in &plan.ordered_assignment_ids {
            if let Some(assignment) = self.persistence.get_assignment(id).await {
                if assignment.status == AssignmentStatus::Confirmed {
                    count += 1;
                }
            }
        }
        count
    }

    async fn ordered_pickups(&self, plan: &RoutePlan) -> Vec<Location> {
        let mut pickups = Vec::with_capacity(plan.ordered_assignment_ids.len());
        for id in &plan.ordered_assignment_ids {
            if let Some(assignment) = self.persistence.get_assignment(id).await {
                pickups.push(assignment.pickup);
            }
        }
        pickups
    }

    /// §4.7 steps 1–8, without mutating any state.
    pub async fn can_add_rider_to_window(
        &self,
        window: &TimeWindow,
        pickup: Location,
        same_type_windows: &[TimeWindow],
    ) -> CoreResult<InsertionPlan> {
        if !window.active {
            return Err(CoreError::state(StateReason::NotFound));
        }

        let key = RoutePlanKey {
            time_window_id: window.id.clone(),
            service_date: window.service_date,
        };
        let confirmed = self.confirmed_count(&key).await;
        if confirmed >= window.max_riders {
            let alts = self.alternatives(window, same_type_windows).await;
            return Err(CoreError::capacity(CapacityReason::WindowFull).with_alternatives(alts));
        }

        let plan = self
            .persistence
            .get_route_plan(&key)
            .await
            .unwrap_or_else(|| RoutePlan::empty(key.clone(), window.zone.campus, window.start_pickup_time_minute as f64));

        let campus = window.zone.campus;
        let target_deadline = window.campus_target_time_minute as f64 + 2.0;

        if plan.ordered_assignment_ids.is_empty() {
            // Anchor case: feasibility reduces to a direct route to campus.
            let direct = self
                .provider
                .directions(pickup, campus, &[], self.clock.now())
                .await?;
            let arrival_minute = plan.planned_departure_minute + direct.duration_seconds / 60.0;
            if arrival_minute > target_deadline {
                return Err(CoreError::feasibility(FeasibilityReason::CannotMeetTargetTime));
            }
            return Ok(InsertionPlan {
                best_insertion_index: 0,
                extra_seconds: 0.0,
                estimated_arrival_minute: arrival_minute,
                estimated_pickup_minute: plan.planned_departure_minute,
                is_anchor: true,
            });
        }

        let anchor_pickup = self.ordered_pickups(&plan).await[0];
        if let Some(max_anchor_m) = window.zone.max_anchor_distance_meters {
            let distance_m = pickup.haversine_km(&anchor_pickup) * 1000.0;
            if distance_m > max_anchor_m {
                return Err(CoreError::feasibility(FeasibilityReason::TooFarFromAnchor));
            }
        }

        let stops = self.ordered_pickups(&plan).await;
        let mut best: Option<(usize, f64)> = None;
        // Position 0 would insert ahead of the anchor, which §4.7/E4 never
        // allows — the anchor's position is locked. Start at 1 so the
        // earliest candidate position is "right after the anchor".
        for i in 1..=stops.len() {
            let from = stops[i - 1];
            let to = if i == stops.len() { campus } else { stops[i] };

            let direct = self.provider.directions(from, to, &[], self.clock.now()).await?;
            let detour = self
                .provider
                .directions(from, to, &[pickup], self.clock.now())
                .await?;
            let extra = detour.duration_seconds - direct.duration_seconds;

            if extra <= window.zone.max_detour_seconds as f64 {
                if best.map_or(true, |(_, best_extra)| extra < best_extra) {
                    best = Some((i, extra));
                }
            }
        }

        let Some((best_index, extra_seconds)) = best else {
            let alts = self.alternatives(window, same_type_windows).await;
            return Err(CoreError::feasibility(FeasibilityReason::DetourTooLarge).with_alternatives(alts));
        };

        let base_duration = plan.base_duration_seconds.unwrap_or(0.0);
        let new_total_seconds = base_duration + extra_seconds;
        let arrival_minute = plan.planned_departure_minute + new_total_seconds / 60.0;
        if arrival_minute > target_deadline {
            return Err(CoreError::feasibility(FeasibilityReason::CannotMeetTargetTime));
        }

        let estimated_pickup_minute =
            plan.planned_departure_minute + (best_index as f64) * (new_total_seconds / 60.0 / (stops.len() as f64 + 1.0).max(1.0));

        Ok(InsertionPlan {
            best_insertion_index: best_index,
            extra_seconds,
            estimated_arrival_minute: arrival_minute,
            estimated_pickup_minute,
            is_anchor: false,
        })
    }

    /// Inserts at `plan.best_insertion_index`, recomputes the full
    /// multi-stop route, and writes the new polyline/duration/distance
    /// under the plan's row lock. Re-verifies feasibility before
    /// committing; returns `PLAN_CHANGED_RETRY` if the plan mutated
    /// concurrently (§5).
    pub async fn create_window_assignment(
        &self,
        window: &TimeWindow,
        user_id: &str,
        pickup: Location,
        same_type_windows: &[TimeWindow],
    ) -> CoreResult<WindowAssignment> {
        let key = RoutePlanKey {
            time_window_id: window.id.clone(),
            service_date: window.service_date,
        };
        let _lock = self.persistence.lock_route_plan(&key).await;

        let plan_before = self.persistence.get_route_plan(&key).await;
        let insertion = self.can_add_rider_to_window(window, pickup, same_type_windows).await?;

        let plan_after_check = self.persistence.get_route_plan(&key).await;
        if plan_before.as_ref().map(|p| &p.ordered_assignment_ids)
            != plan_after_check.as_ref().map(|p| &p.ordered_assignment_ids)
        {
            return Err(CoreError::state(StateReason::PlanChangedRetry));
        }

        let mut plan = plan_after_check
            .unwrap_or_else(|| RoutePlan::empty(key.clone(), window.zone.campus, window.start_pickup_time_minute as f64));

        let assignment = WindowAssignment {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            time_window_id: window.id.clone(),
            service_date: window.service_date,
            pickup,
            status: AssignmentStatus::Confirmed,
            estimated_pickup_minute: Some(insertion.estimated_pickup_minute),
            estimated_arrival_minute: Some(insertion.estimated_arrival_minute),
            created_at: self.clock.now(),
        };

        let insert_at = insertion.best_insertion_index.min(plan.ordered_assignment_ids.len());
        plan.ordered_assignment_ids.insert(insert_at, assignment.id);
        if plan.anchor_assignment_id.is_none() {
            plan.anchor_assignment_id = Some(assignment.id);
            // Anchor must always be first in the ordered list (§3 invariant).
            plan.ordered_assignment_ids.retain(|id| *id != assignment.id);
            plan.ordered_assignment_ids.insert(0, assignment.id);
        }

        self.recompute_route(&mut plan).await?;

        self.persistence.insert_assignment(assignment.clone()).await;
        self.persistence.upsert_route_plan(plan).await;

        Ok(assignment)
    }

    /// Removes `assignment_id`; promotes the earliest-created remaining
    /// assignment to anchor if it was the anchor (§3 supplementary field:
    /// tie-break by `createdAt`). Clears route fields if the plan empties.
    pub async fn cancel_window_assignment(&self, assignment_id: Uuid) -> CoreResult<()> {
        let assignment = self
            .persistence
            .get_assignment(&assignment_id)
            .await
            .ok_or_else(|| CoreError::state(StateReason::NotFound))?;

        let key = RoutePlanKey {
            time_window_id: assignment.time_window_id.clone(),
            service_date: assignment.service_date,
        };
        let _lock = self.persistence.lock_route_plan(&key).await;

        let Some(mut plan) = self.persistence.get_route_plan(&key).await else {
            return Ok(());
        };

        plan.ordered_assignment_ids.retain(|id| *id != assignment_id);

        if plan.anchor_assignment_id == Some(assignment_id) {
            let mut remaining: Vec<WindowAssignment> = Vec::new();
            for id in &plan.ordered_assignment_ids {
                if let Some(a) = self.persistence.get_assignment(id).await {
                    remaining.push(a);
                }
            }
            remaining.sort_by_key(|a| a.created_at);
            let new_anchor_id = remaining.first().map(|a| a.id);
            plan.anchor_assignment_id = new_anchor_id;
            // Anchor must always be first in the ordered list (§3 invariant).
            if let Some(new_anchor_id) = new_anchor_id {
                plan.ordered_assignment_ids.retain(|id| *id != new_anchor_id);
                plan.ordered_assignment_ids.insert(0, new_anchor_id);
            }
        }

        let mut cancelled = assignment;
        cancelled.status = AssignmentStatus::Cancelled;
        self.persistence.update_assignment(cancelled).await;

        if plan.ordered_assignment_ids.is_empty() {
            plan.anchor_assignment_id = None;
            plan.polyline = None;
            plan.base_duration_seconds = None;
            plan.total_distance_meters = None;
        } else {
            self.recompute_route(&mut plan).await?;
        }

        self.persistence.upsert_route_plan(plan).await;
        Ok(())
    }

    async fn recompute_route(&self, plan: &mut RoutePlan) -> CoreResult<()> {
        let pickups = self.ordered_pickups(plan).await;
        if pickups.is_empty() {
            return Ok(());
        }
        let origin = pickups[0];
        let waypoints = if pickups.len() > 1 { &pickups[1..] } else { &[] };
        let directions = self
            .provider
            .directions(origin, plan.campus, waypoints, self.clock.now())
            .await?;
        plan.base_duration_seconds = Some(directions.duration_seconds);
        plan.total_distance_meters = Some(directions.distance_meters);
        plan.polyline = Some(directions.polyline);
        Ok(())
    }
}
