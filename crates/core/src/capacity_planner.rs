//! §4.4 CapacityPlanner — daily Premium/non-Premium capacity computation.

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::NaiveDate;

use crate::config::Config;
use crate::slot_catalog::{SlotCatalog, SlotId};
use crate::time_context::{Direction, SlotType};

/// Process-wide monotone counter capped at `max_premium_subscribers`,
/// updated with a CAS loop rather than a lock (§9: "Avoid hidden
/// process-wide state" — this is the one explicitly sanctioned exception).
#[derive(Debug, Default)]
pub struct PremiumRegistry {
    count: AtomicU32,
}

impl PremiumRegistry {
    pub fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn can_add_premium_subscriber(&self, config: &Config) -> bool {
        self.count() < config.max_premium_subscribers
    }

    /// Attempts to add one subscriber. Returns `true` on success, `false`
    /// if the cap was already reached (no error, matching §4.3/§4.4's
    /// "fails by returning false" convention for capacity gates).
    pub fn try_add_subscriber(&self, config: &Config) -> bool {
        loop {
            let current = self.count.load(Ordering::SeqCst);
            if current >= config.max_premium_subscribers {
                return false;
            }
            if self
                .count
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DailyCapacity {
    pub premium_capacity: u32,
    pub non_premium_capacity: u32,
}

pub struct CapacityPlanner<'a> {
    config: &'a Config,
    catalog: &'a SlotCatalog,
    premium_registry: &'a PremiumRegistry,
}

impl<'a> CapacityPlanner<'a> {
    pub fn new(config: &'a Config, catalog: &'a SlotCatalog, premium_registry: &'a PremiumRegistry) -> Self {
        Self {
            config,
            catalog,
            premium_registry,
        }
    }

    /// Premium capacity is fixed by subscriber count; non-Premium capacity
    /// is the per-day cap minus Premium reservations, bounded by the
    /// per-hour cap aggregated across the day.
    pub fn compute_daily_capacity(&self) -> DailyCapacity {
        let premium_capacity = self.premium_registry.count();
        let hourly_ceiling = self.config.max_rides_per_hour * 24;
        let non_premium_capacity = self
            .config
            .max_rides_per_day
            .saturating_sub(premium_capacity)
            .min(hourly_ceiling);
        DailyCapacity {
            premium_capacity,
            non_premium_capacity,
        }
    }

    pub fn check_hourly_capacity(&self, date: NaiveDate, direction: Direction, hour: u32) -> bool {
        let used: u32 = self
            .catalog
            .get_slots_for_date(date, Some(direction))
            .into_iter()
            .filter(|s| s.arrival_start_minute / 60 == hour)
            .map(|s| s.used_riders_non_premium)
            .sum();
        used < self.config.max_rides_per_hour
    }

    pub fn check_daily_capacity(&self, date: NaiveDate) -> bool {
        let used: u32 = self
            .catalog
            .get_slots_for_date(date, None)
            .into_iter()
            .map(|s| s.used_riders_non_premium + s.used_riders_premium)
            .sum();
        used < self.config.max_rides_per_day
    }

    pub fn can_add_premium_ride(&self, id: &SlotId) -> bool {
        self.catalog.has_availability(id, true)
    }

    pub fn can_add_non_premium_ride(&self, id: &SlotId) -> bool {
        self.catalog.has_availability(id, false)
            && self.check_hourly_capacity(id.date, id.direction, id.arrival_start_minute / 60)
            && self.check_daily_capacity(id.date)
    }

    /// Adjusts `maxRidersNonPremium` on off-peak slots to fit the day's
    /// budget, preferring the lowest-utilization slots first so already
    /// busy slots are left untouched (§4.4).
    pub fn auto_balance_non_premium_capacity(&self, date: NaiveDate) {
        let capacity = self.compute_daily_capacity();
        let mut off_peak_slots: Vec<_> = self
            .catalog
            .get_slots_for_date(date, None)
            .into_iter()
            .filter(|s| s.slot_type == SlotType::OffPeak)
            .collect();
        if off_peak_slots.is_empty() {
            return;
        }

        off_peak_slots.sort_by_key(|s| s.used_riders_non_premium);
        let per_slot_budget = capacity.non_premium_capacity / off_peak_slots.len() as u32;
        let remainder = capacity.non_premium_capacity % off_peak_slots.len() as u32;

        for (idx, slot) in off_peak_slots.iter().enumerate() {
            let extra = if (idx as u32) < remainder { 1 } else { 0 };
            let target = (per_slot_budget + extra).max(slot.used_riders_non_premium);
            self.catalog.update_slot_max_non_premium(&slot.id, target);
        }
    }
}
