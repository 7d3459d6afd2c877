mod support;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use support::{campus, config, far_home, test_date};

use campus_ride_core::clock::{Clock, FixedClock};
use campus_ride_core::error::{CapacityReason, CoreError, CoreResult, FeasibilityReason};
use campus_ride_core::feasibility::{FeasibilityEngine, RideRequest};
use campus_ride_core::geo::Location;
use campus_ride_core::hold_manager::HoldManager;
use campus_ride_core::monte_carlo::{compute_summary, run_single_simulation, RiderSpec, Scenario};
use campus_ride_core::persistence::{InMemoryPersistence, Persistence};
use campus_ride_core::rider_behavior::NoHistory;
use campus_ride_core::routing_engine::{RoutePlan, RoutePlanKey, RoutingEngine, ServiceZone, TimeWindow, WindowAssignment};
use campus_ride_core::routing_provider::{DistanceMatrix, Directions, RoutingProvider};
use campus_ride_core::schedule_state::{RideStatus, ScheduleState, ScheduledRide};
use campus_ride_core::slot_catalog::{SlotCatalog, SlotId};
use campus_ride_core::time_context::{Direction, PlanType, Weather};
use campus_ride_core::travel_time::{TravelTimeModel, VarianceLevel};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use uuid::Uuid;

fn availability_query_ctx() -> campus_ride_core::availability::AvailabilityQuery {
    campus_ride_core::availability::AvailabilityQuery {
        rider_id: "R1".to_string(),
        plan_type: PlanType::Premium,
        date: test_date(),
        day_of_week: 2,
        origin: far_home(),
        dest: campus(),
        campus: campus(),
        desired_arrival_minute: Some(8 * 60 + 30),
    }
}

#[tokio::test]
async fn e1_happy_path_premium() {
    let config = config();
    let catalog = SlotCatalog::new(config.clone());
    catalog.initialize_slots_for_date(test_date(), 5);
    let travel_model = TravelTimeModel::new(config.clone());
    let feasibility = FeasibilityEngine::new(&config, &catalog, &travel_model, campus());
    let availability = campus_ride_core::availability::Availability::new(&config, &catalog, &feasibility);
    let schedule = ScheduleState::from_parts(test_date(), vec![], vec![]);

    let query = availability_query_ctx();
    let windows = availability.get_available_arrival_windows(&query, &travel_model, &schedule);
    assert!(windows.len() >= 3, "expected at least 3 candidate windows, got {}", windows.len());
    assert!(windows.iter().any(|w| w.arrival_start_minute == 8 * 60 + 30));

    let persistence = InMemoryPersistence::new();
    let clock = FixedClock::new(Utc::now());
    let manager = HoldManager::new(&config, &catalog, &persistence, &clock);

    let slot_id = SlotId::new(test_date(), Direction::HomeToCampus, 8 * 60 + 30);
    let hold = manager
        .create_hold(
            slot_id.clone(),
            "R1",
            PlanType::Premium,
            far_home(),
            campus(),
            None,
            &feasibility,
            &schedule,
            2,
        )
        .await
        .expect("hold should succeed");

    let slot = catalog.get_slot_by_id(&slot_id).unwrap();
    assert_eq!(slot.used_riders_premium, 1);

    let p95_travel = travel_model.p95_minutes(
        &campus_ride_core::time_context::TimeContext::new(test_date(), 8 * 60 + 30, 2, Weather::Clear),
        &far_home(),
        &campus(),
    );
    let expected_pickup = (8 * 60 + 30) as f64 - p95_travel - config.arrive_early_minutes as f64;

    let ride = manager
        .confirm_hold(hold.hold_id, expected_pickup, (8 * 60 + 30) as f64 - config.arrive_early_minutes as f64)
        .await
        .expect("confirm should succeed");
    assert!((ride.pickup_time_minute.unwrap() - expected_pickup).abs() < 1e-6);

    // A second Premium rider at the same slot still sees it (maxPremium > 1).
    let second_query = campus_ride_core::availability::AvailabilityQuery {
        rider_id: "R2".to_string(),
        ..availability_query_ctx()
    };
    let windows_for_r2 = availability.get_available_arrival_windows(&second_query, &travel_model, &schedule);
    assert!(windows_for_r2.iter().any(|w| w.arrival_start_minute == 8 * 60 + 30));
}

#[tokio::test]
async fn e2_non_premium_blocked_by_peak() {
    let config = config();
    let catalog = SlotCatalog::new(config.clone());
    catalog.initialize_slots_for_date(test_date(), 5);
    let travel_model = TravelTimeModel::new(config.clone());
    let feasibility = FeasibilityEngine::new(&config, &catalog, &travel_model, campus());
    let availability = campus_ride_core::availability::Availability::new(&config, &catalog, &feasibility);
    let schedule = ScheduleState::from_parts(test_date(), vec![], vec![]);

    let query = campus_ride_core::availability::AvailabilityQuery {
        rider_id: "R2".to_string(),
        plan_type: PlanType::Standard,
        ..availability_query_ctx()
    };
    let windows = availability.get_available_arrival_windows(&query, &travel_model, &schedule);
    assert!(
        windows.iter().all(|w| !config.peak_morning.contains_minute_of_day(w.arrival_start_minute)),
        "non-Premium availability must exclude peak slots"
    );

    let persistence = InMemoryPersistence::new();
    let clock = FixedClock::new(Utc::now());
    let manager = HoldManager::new(&config, &catalog, &persistence, &clock);
    let slot_id = SlotId::new(test_date(), Direction::HomeToCampus, 8 * 60 + 30);

    let result = manager
        .create_hold(slot_id, "R2", PlanType::Standard, far_home(), campus(), None, &feasibility, &schedule, 2)
        .await;

    match result {
        Err(CoreError::Capacity { reason: CapacityReason::PeakClosed, .. }) => {}
        other => panic!("expected PEAK_CLOSED, got {other:?}"),
    }
}

#[test]
fn e3_feasibility_rejection_for_overloaded_block() {
    let config = config();
    let catalog = SlotCatalog::new(config.clone());
    catalog.initialize_slots_for_date(test_date(), 5);
    let travel_model = TravelTimeModel::new(config.clone());
    let feasibility = FeasibilityEngine::new(&config, &catalog, &travel_model, campus());

    let packed_rides: Vec<ScheduledRide> = [450u32, 455, 460, 465]
        .into_iter()
        .enumerate()
        .map(|(i, arrival_start)| ScheduledRide {
            id: Uuid::new_v4(),
            rider_id: format!("premium-{i}"),
            date: test_date(),
            slot_id: SlotId::new(test_date(), Direction::HomeToCampus, arrival_start),
            plan_type: PlanType::Premium,
            arrival_start_minute: arrival_start,
            arrival_end_minute: arrival_start + 5,
            origin: campus(),
            dest: campus(),
            pickup_time_minute: None,
            predicted_arrival_minute: None,
            status: RideStatus::Scheduled,
        })
        .collect();
    let schedule = ScheduleState::from_parts(test_date(), packed_rides, vec![]);

    let far_origin = Location::new(50.33, -97.14); // roughly 55km north of campus
    let request = RideRequest {
        rider_id: "R5".to_string(),
        plan_type: PlanType::Premium,
        origin: far_origin,
        dest: campus(),
    };
    let slot_id = SlotId::new(test_date(), Direction::HomeToCampus, 470);
    let slot = catalog.get_slot_by_id(&slot_id).expect("slot exists");

    let outcome = feasibility.can_insert_ride_into_slot(&request, &slot, &schedule, 2, &NoHistory);
    match outcome {
        Err(CoreError::Feasibility { reason: FeasibilityReason::CandidateLate, .. }) => {}
        other => panic!("expected CANDIDATE_LATE, got {other:?}"),
    }
}

struct MockDetourProvider {
    anchor: Location,
    stop_b: Location,
    campus: Location,
}

fn same_loc(a: Location, b: Location) -> bool {
    (a.lat - b.lat).abs() < 1e-9 && (a.lng - b.lng).abs() < 1e-9
}

#[async_trait]
impl RoutingProvider for MockDetourProvider {
    async fn distance_matrix(&self, _o: &[Location], _d: &[Location], _t: DateTime<Utc>) -> CoreResult<DistanceMatrix> {
        Ok(DistanceMatrix { legs: vec![] })
    }

    async fn directions(
        &self,
        origin: Location,
        destination: Location,
        waypoints: &[Location],
        _depart_at: DateTime<Utc>,
    ) -> CoreResult<Directions> {
        let duration_seconds = if same_loc(origin, self.anchor) && same_loc(destination, self.anchor) {
            if waypoints.is_empty() { 0.0 } else { 200.0 }
        } else if same_loc(origin, self.anchor) && same_loc(destination, self.stop_b) {
            if waypoints.is_empty() { 100.0 } else { 190.0 }
        } else if same_loc(origin, self.stop_b) && same_loc(destination, self.campus) {
            if waypoints.is_empty() { 200.0 } else { 350.0 }
        } else {
            300.0
        };
        Ok(Directions { duration_seconds, distance_meters: 0.0, polyline: Vec::new() })
    }
}

#[tokio::test]
async fn e4_routing_best_insertion() {
    let config = config();
    let anchor = Location::new(49.85, -97.18);
    let stop_b = Location::new(49.86, -97.17);
    let new_pickup = Location::new(49.855, -97.175);
    let provider = MockDetourProvider { anchor, stop_b, campus: campus() };
    let persistence = InMemoryPersistence::new();
    let clock = FixedClock::new(Utc::now());
    let engine = RoutingEngine::new(&config, &provider, &persistence, &clock);

    let key = RoutePlanKey { time_window_id: "W".to_string(), service_date: test_date() };
    let anchor_id = Uuid::new_v4();
    let b_id = Uuid::new_v4();
    persistence
        .insert_assignment(WindowAssignment {
            id: anchor_id,
            user_id: "anchor-rider".to_string(),
            time_window_id: "W".to_string(),
            service_date: test_date(),
            pickup: anchor,
            status: campus_ride_core::routing_engine::AssignmentStatus::Confirmed,
            estimated_pickup_minute: None,
            estimated_arrival_minute: None,
            created_at: Utc::now(),
        })
        .await;
    persistence
        .insert_assignment(WindowAssignment {
            id: b_id,
            user_id: "b-rider".to_string(),
            time_window_id: "W".to_string(),
            service_date: test_date(),
            pickup: stop_b,
            status: campus_ride_core::routing_engine::AssignmentStatus::Confirmed,
            estimated_pickup_minute: None,
            estimated_arrival_minute: None,
            created_at: Utc::now(),
        })
        .await;

    let mut plan = RoutePlan::empty(key.clone(), campus(), 0.0);
    plan.ordered_assignment_ids = vec![anchor_id, b_id];
    plan.anchor_assignment_id = Some(anchor_id);
    plan.base_duration_seconds = Some(100.0);
    persistence.upsert_route_plan(plan).await;

    let window = TimeWindow {
        id: "W".to_string(),
        active: true,
        window_type: "standard".to_string(),
        service_date: test_date(),
        campus_target_time_minute: 600,
        start_pickup_time_minute: 0,
        max_riders: 10,
        zone: ServiceZone {
            campus: campus(),
            max_detour_seconds: 120,
            max_riders_per_trip: 10,
            max_anchor_distance_meters: None,
        },
    };

    let insertion = engine
        .can_add_rider_to_window(&window, new_pickup, &[])
        .await
        .expect("insertion should be accepted");

    assert_eq!(insertion.best_insertion_index, 1);
    assert!((insertion.extra_seconds - 90.0).abs() < 1e-6, "extra_seconds was {}", insertion.extra_seconds);
}

/// A pickup coincident with the anchor makes the anchor->new->anchor round
/// trip (position 0) free, which is exactly the case a provider with real
/// geometry (not a hand-tuned mock) would expose if position 0 were ever a
/// candidate. The anchor's slot must stay locked regardless.
#[tokio::test]
async fn best_insertion_never_chooses_position_before_anchor() {
    let config = config();
    let provider = campus_ride_core::routing_provider::HaversineFallbackProvider::new(&config);
    let anchor = Location::new(49.85, -97.18);
    let stop_b = Location::new(49.95, -97.35);
    let new_pickup = anchor;

    let persistence = InMemoryPersistence::new();
    let clock = FixedClock::new(Utc::now());
    let engine = RoutingEngine::new(&config, &provider, &persistence, &clock);

    let key = RoutePlanKey { time_window_id: "W".to_string(), service_date: test_date() };
    let anchor_id = Uuid::new_v4();
    let b_id = Uuid::new_v4();
    persistence
        .insert_assignment(WindowAssignment {
            id: anchor_id,
            user_id: "anchor-rider".to_string(),
            time_window_id: "W".to_string(),
            service_date: test_date(),
            pickup: anchor,
            status: campus_ride_core::routing_engine::AssignmentStatus::Confirmed,
            estimated_pickup_minute: None,
            estimated_arrival_minute: None,
            created_at: Utc::now(),
        })
        .await;
    persistence
        .insert_assignment(WindowAssignment {
            id: b_id,
            user_id: "b-rider".to_string(),
            time_window_id: "W".to_string(),
            service_date: test_date(),
            pickup: stop_b,
            status: campus_ride_core::routing_engine::AssignmentStatus::Confirmed,
            estimated_pickup_minute: None,
            estimated_arrival_minute: None,
            created_at: Utc::now(),
        })
        .await;

    let mut plan = RoutePlan::empty(key.clone(), campus(), 0.0);
    plan.ordered_assignment_ids = vec![anchor_id, b_id];
    plan.anchor_assignment_id = Some(anchor_id);
    persistence.upsert_route_plan(plan).await;

    let window = TimeWindow {
        id: "W".to_string(),
        active: true,
        window_type: "standard".to_string(),
        service_date: test_date(),
        campus_target_time_minute: 100_000,
        start_pickup_time_minute: 0,
        max_riders: 10,
        zone: ServiceZone {
            campus: campus(),
            max_detour_seconds: 120,
            max_riders_per_trip: 10,
            max_anchor_distance_meters: None,
        },
    };

    let insertion = engine
        .can_add_rider_to_window(&window, new_pickup, &[])
        .await
        .expect("a pickup coincident with the anchor should still find a qualifying detour");

    assert!(
        insertion.best_insertion_index >= 1,
        "position 0 would insert ahead of the locked anchor, got {}",
        insertion.best_insertion_index
    );
}

/// Cancelling the anchor must promote the earliest-created remaining
/// assignment *and* move it to the front of `ordered_assignment_ids` -
/// the vector's prior order (by insertion index) need not agree with
/// `created_at` order.
#[tokio::test]
async fn cancelling_anchor_promotes_earliest_created_to_front() {
    let config = config();
    let provider = campus_ride_core::routing_provider::HaversineFallbackProvider::new(&config);
    let persistence = InMemoryPersistence::new();
    let clock = FixedClock::new(Utc::now());
    let engine = RoutingEngine::new(&config, &provider, &persistence, &clock);

    let anchor_loc = Location::new(49.85, -97.18);
    let b_loc = Location::new(49.86, -97.17);
    let c_loc = Location::new(49.87, -97.16);

    let anchor_id = Uuid::new_v4();
    let b_id = Uuid::new_v4();
    let c_id = Uuid::new_v4();
    let base_time = Utc::now();

    persistence
        .insert_assignment(WindowAssignment {
            id: anchor_id,
            user_id: "anchor-rider".to_string(),
            time_window_id: "W".to_string(),
            service_date: test_date(),
            pickup: anchor_loc,
            status: campus_ride_core::routing_engine::AssignmentStatus::Confirmed,
            estimated_pickup_minute: None,
            estimated_arrival_minute: None,
            created_at: base_time,
        })
        .await;
    // b is created before c, so b is the one promoted to anchor.
    persistence
        .insert_assignment(WindowAssignment {
            id: b_id,
            user_id: "b-rider".to_string(),
            time_window_id: "W".to_string(),
            service_date: test_date(),
            pickup: b_loc,
            status: campus_ride_core::routing_engine::AssignmentStatus::Confirmed,
            estimated_pickup_minute: None,
            estimated_arrival_minute: None,
            created_at: base_time + chrono::Duration::seconds(10),
        })
        .await;
    persistence
        .insert_assignment(WindowAssignment {
            id: c_id,
            user_id: "c-rider".to_string(),
            time_window_id: "W".to_string(),
            service_date: test_date(),
            pickup: c_loc,
            status: campus_ride_core::routing_engine::AssignmentStatus::Confirmed,
            estimated_pickup_minute: None,
            estimated_arrival_minute: None,
            created_at: base_time + chrono::Duration::seconds(20),
        })
        .await;

    let key = RoutePlanKey { time_window_id: "W".to_string(), service_date: test_date() };
    let mut plan = RoutePlan::empty(key.clone(), campus(), 0.0);
    // Deliberately not created_at order: after anchor_id is removed, the
    // remaining ids (c_id, b_id) are NOT already anchor-first by position.
    plan.ordered_assignment_ids = vec![anchor_id, c_id, b_id];
    plan.anchor_assignment_id = Some(anchor_id);
    plan.base_duration_seconds = Some(100.0);
    persistence.upsert_route_plan(plan).await;

    engine.cancel_window_assignment(anchor_id).await.expect("cancel should succeed");

    let updated = persistence.get_route_plan(&key).await.expect("plan still exists");
    assert_eq!(updated.anchor_assignment_id, Some(b_id));
    assert_eq!(
        updated.ordered_assignment_ids.first(),
        Some(&b_id),
        "promoted anchor must be moved to the front of ordered_assignment_ids"
    );
    assert_eq!(updated.ordered_assignment_ids, vec![b_id, c_id]);
}

#[tokio::test]
async fn e5_hold_expiry_race() {
    let config = config();
    let catalog = SlotCatalog::new(config.clone());
    catalog.initialize_slots_for_date(test_date(), 1); // only one Premium seat
    let travel_model = TravelTimeModel::new(config.clone());
    let feasibility = FeasibilityEngine::new(&config, &catalog, &travel_model, campus());
    let persistence = InMemoryPersistence::new();
    let clock = FixedClock::new(Utc::now());
    let manager = HoldManager::new(&config, &catalog, &persistence, &clock);
    let schedule = ScheduleState::from_parts(test_date(), vec![], vec![]);
    let slot_id = SlotId::new(test_date(), Direction::HomeToCampus, 8 * 60 + 30);

    let r1_hold = manager
        .create_hold(slot_id.clone(), "R1", PlanType::Premium, far_home(), campus(), None, &feasibility, &schedule, 2)
        .await
        .expect("R1 hold should succeed");

    clock.advance(chrono::Duration::seconds(4 * 60 + 59));
    let r2_attempt = manager
        .create_hold(slot_id.clone(), "R2", PlanType::Premium, far_home(), campus(), None, &feasibility, &schedule, 2)
        .await;
    match r2_attempt {
        Err(CoreError::Capacity { reason: CapacityReason::NoCapacity, .. }) => {}
        other => panic!("expected NO_CAPACITY before expiry, got {other:?}"),
    }

    clock.advance(chrono::Duration::seconds(1));
    let expired = manager.expire_holds(test_date()).await;
    assert_eq!(expired, 1);

    let r2_retry = manager
        .create_hold(slot_id.clone(), "R2", PlanType::Premium, far_home(), campus(), None, &feasibility, &schedule, 2)
        .await
        .expect("R2 retry should succeed after expiry");

    let slot = catalog.get_slot_by_id(&slot_id).unwrap();
    assert_eq!(slot.used_riders_premium, 1, "usedPremium should be unchanged net-net");

    let _ = r1_hold;
    let _ = r2_retry;
}

#[test]
fn e6_monte_carlo_recommends_reducing_non_premium_capacity() {
    let config = config();
    let travel_model = TravelTimeModel::new(config.clone());
    let depot = campus();
    let far_origin = Location::new(49.97, -97.02); // far corridor, induces lateness under high variance

    let mut rides = Vec::new();
    for i in 0..8 {
        let arrival_start = 8 * 60 + i * 5;
        rides.push(RiderSpec {
            rider_id: format!("premium-{i}"),
            plan_type: PlanType::Premium,
            slot_id: SlotId::new(test_date(), Direction::HomeToCampus, arrival_start),
            origin: far_home(),
            dest: depot,
            arrival_start_minute: arrival_start,
            arrival_end_minute: arrival_start + 5,
        });
    }
    // Dense evening-peak non-Premium block, all crammed into one slot start
    // so the block simulation cannot keep every rider's buffer positive.
    let evening_peak_start = 16 * 60;
    for i in 0..12 {
        rides.push(RiderSpec {
            rider_id: format!("nonpremium-{i}"),
            plan_type: PlanType::Standard,
            slot_id: SlotId::new(test_date(), Direction::CampusToHome, evening_peak_start),
            origin: depot,
            dest: far_origin,
            arrival_start_minute: evening_peak_start,
            arrival_end_minute: evening_peak_start + 5,
        });
    }

    let scenario = Scenario { variance_level: VarianceLevel::High, weather: Weather::Clear };
    let mut runs = Vec::new();
    for seed in 0..150u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        runs.push(run_single_simulation(&config, &travel_model, depot, &rides, test_date(), 2, &scenario, &NoHistory, &mut rng));
    }

    let mut current_non_premium_capacity = HashMap::new();
    current_non_premium_capacity.insert(evening_peak_start, 4u32);

    let summary = compute_summary(&config, &runs, &current_non_premium_capacity);
    assert!(summary.non_premium_on_time_rate < config.non_premium_on_time_target);
    assert!(
        !summary.suggested_capacity_adjustments.is_empty(),
        "overloaded evening-peak slot should trigger a capacity adjustment"
    );
    for adjustment in &summary.suggested_capacity_adjustments {
        assert!(adjustment.suggested_non_premium < adjustment.current_non_premium);
    }
    assert!(summary.recommendations.iter().any(|r| r.contains("non-premium")));
}
