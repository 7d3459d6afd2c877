//! Abstract wall-clock, evaluated in the configured timezone.
//!
//! Production uses [`SystemClock`]; tests and Monte Carlo snapshots use
//! [`FixedClock`] so scenarios are deterministic.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub trait Clock: Send + Sync {
    /// Current instant, in UTC. Callers convert to the configured
    /// timezone via [`Clock::now_local`].
    fn now(&self) -> DateTime<Utc>;

    fn now_local(&self, tz: Tz) -> DateTime<Tz> {
        self.now().with_timezone(&tz)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a fixed instant, advanced manually. Used by hold-expiry
/// race tests (E5) and by Monte Carlo runs, which must not depend on wall
/// time during a run.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: std::sync::Arc<std::sync::Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: std::sync::Arc::new(std::sync::Mutex::new(instant)),
        }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut guard = self.instant.lock().expect("fixed clock mutex poisoned");
        *guard = *guard + duration;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock().expect("fixed clock mutex poisoned") = instant;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().expect("fixed clock mutex poisoned")
    }
}
