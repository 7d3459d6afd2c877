//! Shared time/direction/plan vocabulary used across every component.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    HomeToCampus,
    CampusToHome,
    HomeToWork,
    WorkToHome,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotType {
    Peak,
    OffPeak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanType {
    Premium,
    Standard,
    OffPeak,
}

impl PlanType {
    pub fn is_premium(&self) -> bool {
        matches!(self, PlanType::Premium)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weather {
    Clear,
    Rain,
    Snow,
    Storm,
}

impl Default for Weather {
    fn default() -> Self {
        Weather::Clear
    }
}

/// Parameterizes travel/behavior model sampling deterministically (§3).
#[derive(Debug, Clone, Copy)]
pub struct TimeContext {
    pub date: NaiveDate,
    /// Minutes since local midnight.
    pub minute_of_day: u32,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    pub weather: Weather,
}

impl TimeContext {
    pub fn new(date: NaiveDate, minute_of_day: u32, day_of_week: u8, weather: Weather) -> Self {
        Self {
            date,
            minute_of_day,
            day_of_week,
            weather,
        }
    }

    pub fn hour_of_day(&self) -> u32 {
        self.minute_of_day / 60
    }
}
