//! §6 Persistence — transactional key/row store abstraction.
//!
//! The core treats persistence as an external collaborator (§1): only the
//! trait and a row-locking in-memory reference implementation live here.
//! Production backends (Postgres, etc.) implement the same trait; nothing
//! in `core` depends on a specific store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::hold_manager::SlotHold;
use crate::monte_carlo::SimulationJob;
use crate::routing_engine::{RoutePlan, RoutePlanKey, WindowAssignment};
use crate::schedule_state::ScheduledRide;

/// A held row lock; dropping it releases the lock. Mirrors §5's
/// "row-level lock on the slot" / "row lock on the plan" language.
pub type RowLock = OwnedMutexGuard<()>;

#[async_trait]
pub trait Persistence: Send + Sync {
    async fn lock_slot(&self, slot_id: &str) -> RowLock;
    async fn lock_route_plan(&self, key: &RoutePlanKey) -> RowLock;
    async fn lock_hold(&self, hold_id: &Uuid) -> RowLock;
    async fn lock_rider(&self, rider_id: &str) -> RowLock;

    async fn insert_ride(&self, ride: ScheduledRide);
    async fn get_ride(&self, id: &Uuid) -> Option<ScheduledRide>;
    async fn update_ride(&self, ride: ScheduledRide);
    async fn rides_for_date(&self, date: NaiveDate) -> Vec<ScheduledRide>;

    async fn insert_hold(&self, hold: SlotHold);
    async fn get_hold(&self, id: &Uuid) -> Option<SlotHold>;
    async fn update_hold(&self, hold: SlotHold);
    async fn active_hold_for_rider(&self, rider_id: &str) -> Option<SlotHold>;
    async fn holds_for_date(&self, date: NaiveDate) -> Vec<SlotHold>;

    async fn get_route_plan(&self, key: &RoutePlanKey) -> Option<RoutePlan>;
    async fn upsert_route_plan(&self, plan: RoutePlan);

    async fn insert_assignment(&self, assignment: WindowAssignment);
    async fn get_assignment(&self, id: &Uuid) -> Option<WindowAssignment>;
    async fn update_assignment(&self, assignment: WindowAssignment);

    async fn insert_simulation_job(&self, job: SimulationJob);
    async fn get_simulation_job(&self, job_id: &Uuid) -> Option<SimulationJob>;
    async fn update_simulation_job(&self, job: SimulationJob);
}

/// Reference implementation: row locks are per-key `tokio::sync::Mutex`
/// guards, created on first use and retained for the process lifetime.
#[derive(Default)]
pub struct InMemoryPersistence {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    rides: Mutex<HashMap<Uuid, ScheduledRide>>,
    holds: Mutex<HashMap<Uuid, SlotHold>>,
    route_plans: Mutex<HashMap<RoutePlanKey, RoutePlan>>,
    assignments: Mutex<HashMap<Uuid, WindowAssignment>>,
    simulation_jobs: Mutex<HashMap<Uuid, SimulationJob>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_key(&self, key: String) -> RowLock {
        let mutex = {
            let mut locks = self.locks.lock().await;
            locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        mutex.lock_owned().await
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn lock_slot(&self, slot_id: &str) -> RowLock {
        self.lock_key(format!("slot:{slot_id}")).await
    }

    async fn lock_route_plan(&self, key: &RoutePlanKey) -> RowLock {
        self.lock_key(format!("plan:{}:{}", key.time_window_id, key.service_date)).await
    }

    async fn lock_hold(&self, hold_id: &Uuid) -> RowLock {
        self.lock_key(format!("hold:{hold_id}")).await
    }

    async fn lock_rider(&self, rider_id: &str) -> RowLock {
        self.lock_key(format!("rider:{rider_id}")).await
    }

    async fn insert_ride(&self, ride: ScheduledRide) {
        self.rides.lock().await.insert(ride.id, ride);
    }

    async fn get_ride(&self, id: &Uuid) -> Option<ScheduledRide> {
        self.rides.lock().await.get(id).cloned()
    }

    async fn update_ride(&self, ride: ScheduledRide) {
        self.rides.lock().await.insert(ride.id, ride);
    }

    async fn rides_for_date(&self, date: NaiveDate) -> Vec<ScheduledRide> {
        self.rides
            .lock()
            .await
            .values()
            .filter(|r| r.date == date)
            .cloned()
            .collect()
    }

    async fn insert_hold(&self, hold: SlotHold) {
        self.holds.lock().await.insert(hold.hold_id, hold);
    }

    async fn get_hold(&self, id: &Uuid) -> Option<SlotHold> {
        self.holds.lock().await.get(id).cloned()
    }

    async fn update_hold(&self, hold: SlotHold) {
        self.holds.lock().await.insert(hold.hold_id, hold);
    }

    async fn active_hold_for_rider(&self, rider_id: &str) -> Option<SlotHold> {
        self.holds
            .lock()
            .await
            .values()
            .find(|h| h.rider_id == rider_id && h.status == crate::hold_manager::HoldStatus::Active)
            .cloned()
    }

    async fn holds_for_date(&self, date: NaiveDate) -> Vec<SlotHold> {
        self.holds
            .lock()
            .await
            .values()
            .filter(|h| h.slot_id.date == date)
            .cloned()
            .collect()
    }

    async fn get_route_plan(&self, key: &RoutePlanKey) -> Option<RoutePlan> {
        self.route_plans.lock().await.get(key).cloned()
    }

    async fn upsert_route_plan(&self, plan: RoutePlan) {
        self.route_plans.lock().await.insert(plan.key.clone(), plan);
    }

    async fn insert_assignment(&self, assignment: WindowAssignment) {
        self.assignments.lock().await.insert(assignment.id, assignment);
    }

    async fn get_assignment(&self, id: &Uuid) -> Option<WindowAssignment> {
        self.assignments.lock().await.get(id).cloned()
    }

    async fn update_assignment(&self, assignment: WindowAssignment) {
        self.assignments.lock().await.insert(assignment.id, assignment);
    }

    async fn insert_simulation_job(&self, job: SimulationJob) {
        self.simulation_jobs.lock().await.insert(job.job_id, job);
    }

    async fn get_simulation_job(&self, job_id: &Uuid) -> Option<SimulationJob> {
        self.simulation_jobs.lock().await.get(job_id).cloned()
    }

    async fn update_simulation_job(&self, job: SimulationJob) {
        self.simulation_jobs.lock().await.insert(job.job_id, job);
    }
}
