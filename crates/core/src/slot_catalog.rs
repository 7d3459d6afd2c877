//! §4.3 SlotCatalog — canonical time-slot entities per date/direction.
//!
//! Slot counters are guarded by a single mutex over the whole catalog, the
//! same coarse-but-correct approach the teacher uses for its LRU distance
//! cache (`spatial::get_distance_cache`): every slot mutation takes the
//! lock for the duration of the read-modify-write, so `reserve`/`release`
//! are linearizable per `slotId` (§3, §5) even though the lock scope is the
//! whole catalog rather than a per-row lock.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::time_context::{Direction, SlotType};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId {
    pub date: NaiveDate,
    pub direction: Direction,
    /// Minutes since local midnight.
    pub arrival_start_minute: u32,
}

impl SlotId {
    pub fn new(date: NaiveDate, direction: Direction, arrival_start_minute: u32) -> Self {
        Self {
            date,
            direction,
            arrival_start_minute,
        }
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{:?}_{}", self.date, self.direction, self.arrival_start_minute)
    }
}

#[derive(Debug, Clone)]
pub struct TimeSlot {
    pub id: SlotId,
    pub slot_type: SlotType,
    pub arrival_start_minute: u32,
    pub arrival_end_minute: u32,
    pub max_riders_premium: u32,
    pub used_riders_premium: u32,
    pub max_riders_non_premium: u32,
    pub used_riders_non_premium: u32,
    pub fragile: bool,
}

impl TimeSlot {
    fn new(id: SlotId, slot_type: SlotType, window_minutes: u32, max_premium: u32) -> Self {
        let max_non_premium = if slot_type == SlotType::Peak { 0 } else { 3 };
        Self {
            arrival_start_minute: id.arrival_start_minute,
            arrival_end_minute: id.arrival_start_minute + window_minutes,
            id,
            slot_type,
            max_riders_premium: max_premium,
            used_riders_premium: 0,
            max_riders_non_premium: max_non_premium,
            used_riders_non_premium: 0,
            fragile: false,
        }
    }

    pub fn has_availability(&self, is_premium: bool) -> bool {
        if is_premium {
            self.used_riders_premium < self.max_riders_premium
        } else {
            self.slot_type == SlotType::OffPeak
                && !self.fragile
                && self.used_riders_non_premium < self.max_riders_non_premium
        }
    }
}

#[derive(Debug, Default)]
struct CatalogInner {
    slots: HashMap<SlotId, TimeSlot>,
    initialized_dates: std::collections::HashSet<NaiveDate>,
}

pub struct SlotCatalog {
    config: Config,
    inner: Mutex<CatalogInner>,
}

const GENERATED_DIRECTIONS: [Direction; 4] = [
    Direction::HomeToCampus,
    Direction::CampusToHome,
    Direction::HomeToWork,
    Direction::WorkToHome,
];

impl SlotCatalog {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            inner: Mutex::new(CatalogInner::default()),
        }
    }

    /// Generates one slot per 5-minute arrival window per direction for
    /// `date`. Idempotent: a second call for an already-initialized date is
    /// a no-op (§4.3: "upserts on (date, direction, arrival_start)").
    pub fn initialize_slots_for_date(&self, date: NaiveDate, max_premium_per_slot: u32) {
        let mut inner = self.inner.lock().expect("slot catalog mutex poisoned");
        if inner.initialized_dates.contains(&date) {
            return;
        }

        let window = self.config.slot_window_minutes as u32;
        for direction in GENERATED_DIRECTIONS {
            let mut minute = 0u32;
            while minute < 24 * 60 {
                let slot_type = if self.config.peak_morning.contains_minute_of_day(minute)
                    || self.config.peak_evening.contains_minute_of_day(minute)
                {
                    SlotType::Peak
                } else {
                    SlotType::OffPeak
                };
                let id = SlotId::new(date, direction, minute);
                let slot = TimeSlot::new(id.clone(), slot_type, window, max_premium_per_slot);
                inner.slots.insert(id, slot);
                minute += window;
            }
        }
        inner.initialized_dates.insert(date);
    }

    pub fn get_slots_for_date(&self, date: NaiveDate, direction: Option<Direction>) -> Vec<TimeSlot> {
        let inner = self.inner.lock().expect("slot catalog mutex poisoned");
        inner
            .slots
            .values()
            .filter(|s| s.id.date == date && direction.map_or(true, |d| s.id.direction == d))
            .cloned()
            .collect()
    }

    pub fn get_slot_by_id(&self, id: &SlotId) -> Option<TimeSlot> {
        let inner = self.inner.lock().expect("slot catalog mutex poisoned");
        inner.slots.get(id).cloned()
    }

    /// Atomically increments the relevant `used*` counter if below `max*`.
    /// Returns `false` (never errors) when full, peak-closed for
    /// non-Premium, or fragile-disallowed.
    pub fn reserve_slot_capacity(&self, id: &SlotId, is_premium: bool) -> bool {
        let mut inner = self.inner.lock().expect("slot catalog mutex poisoned");
        let Some(slot) = inner.slots.get_mut(id) else {
            return false;
        };
        if !slot.has_availability(is_premium) {
            return false;
        }
        if is_premium {
            slot.used_riders_premium += 1;
        } else {
            slot.used_riders_non_premium += 1;
        }
        true
    }

    /// Atomic decrement, never below zero.
    pub fn release_slot_capacity(&self, id: &SlotId, is_premium: bool) {
        let mut inner = self.inner.lock().expect("slot catalog mutex poisoned");
        if let Some(slot) = inner.slots.get_mut(id) {
            if is_premium {
                slot.used_riders_premium = slot.used_riders_premium.saturating_sub(1);
            } else {
                slot.used_riders_non_premium = slot.used_riders_non_premium.saturating_sub(1);
            }
        }
    }

    pub fn set_slot_fragility(&self, id: &SlotId, fragile: bool) {
        let mut inner = self.inner.lock().expect("slot catalog mutex poisoned");
        if let Some(slot) = inner.slots.get_mut(id) {
            slot.fragile = fragile;
        }
    }

    pub fn update_slot_max_non_premium(&self, id: &SlotId, max_non_premium: u32) {
        let mut inner = self.inner.lock().expect("slot catalog mutex poisoned");
        if let Some(slot) = inner.slots.get_mut(id) {
            slot.max_riders_non_premium = max_non_premium;
        }
    }

    pub fn has_availability(&self, id: &SlotId, is_premium: bool) -> bool {
        self.get_slot_by_id(id)
            .map(|slot| slot.has_availability(is_premium))
            .unwrap_or(false)
    }
}
