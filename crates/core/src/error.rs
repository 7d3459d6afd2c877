//! Closed error taxonomy (§7). Capacity/feasibility/state errors are
//! returned as values, never via panic; external errors are caught at the
//! `RoutingEngine`/`TravelTimeModel` boundary and converted to a fallback
//! path rather than surfaced here.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityReason {
    NoCapacity,
    PeakClosed,
    FragileSlot,
    WindowFull,
    TripFull,
    HourlyCapExceeded,
    DailyCapExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeasibilityReason {
    CandidateLate,
    WouldDelayPremium,
    WouldDelayOther,
    DetourTooLarge,
    TooFarFromAnchor,
    CannotMeetTargetTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateReason {
    NotFound,
    WrongStatus,
    Expired,
    DupActiveHold,
    RiderConflict,
    PlanChangedRetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalReason {
    RoutingProviderTimeout,
    RoutingProviderError,
}

impl std::fmt::Display for CapacityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CapacityReason::NoCapacity => "NO_CAPACITY",
            CapacityReason::PeakClosed => "PEAK_CLOSED",
            CapacityReason::FragileSlot => "FRAGILE_SLOT",
            CapacityReason::WindowFull => "WINDOW_FULL",
            CapacityReason::TripFull => "TRIP_FULL",
            CapacityReason::HourlyCapExceeded => "HOURLY_CAP_EXCEEDED",
            CapacityReason::DailyCapExceeded => "DAILY_CAP_EXCEEDED",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for FeasibilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FeasibilityReason::CandidateLate => "CANDIDATE_LATE",
            FeasibilityReason::WouldDelayPremium => "WOULD_DELAY_PREMIUM",
            FeasibilityReason::WouldDelayOther => "WOULD_DELAY_OTHER",
            FeasibilityReason::DetourTooLarge => "DETOUR_TOO_LARGE",
            FeasibilityReason::TooFarFromAnchor => "TOO_FAR_FROM_ANCHOR",
            FeasibilityReason::CannotMeetTargetTime => "CANNOT_MEET_TARGET_TIME",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for StateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StateReason::NotFound => "NOT_FOUND",
            StateReason::WrongStatus => "WRONG_STATUS",
            StateReason::Expired => "EXPIRED",
            StateReason::DupActiveHold => "DUP_ACTIVE_HOLD",
            StateReason::RiderConflict => "RIDER_CONFLICT",
            StateReason::PlanChangedRetry => "PLAN_CHANGED_RETRY",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for ExternalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExternalReason::RoutingProviderTimeout => "ROUTING_PROVIDER_TIMEOUT",
            ExternalReason::RoutingProviderError => "ROUTING_PROVIDER_ERROR",
        };
        f.write_str(s)
    }
}

/// Per-existing-ride or per-alternative detail attached to some errors.
/// Alternatives are stringly-typed (slot or time-window ids) since the two
/// callers (`Availability`/`HoldManager` and `RoutingEngine`) key on
/// different id types.
#[derive(Debug, Clone, Default)]
pub struct ErrorDetails {
    pub alternatives: Vec<String>,
    pub risk_level: Option<crate::feasibility::RiskLevel>,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("CAPACITY: {reason}")]
    Capacity {
        reason: CapacityReason,
        details: ErrorDetails,
    },
    #[error("FEASIBILITY: {reason}")]
    Feasibility {
        reason: FeasibilityReason,
        details: ErrorDetails,
    },
    #[error("STATE: {reason}")]
    State {
        reason: StateReason,
        details: ErrorDetails,
    },
    #[error("EXTERNAL: {reason}")]
    External { reason: ExternalReason },
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn capacity(reason: CapacityReason) -> Self {
        CoreError::Capacity {
            reason,
            details: ErrorDetails::default(),
        }
    }

    pub fn feasibility(reason: FeasibilityReason) -> Self {
        CoreError::Feasibility {
            reason,
            details: ErrorDetails::default(),
        }
    }

    pub fn state(reason: StateReason) -> Self {
        CoreError::State {
            reason,
            details: ErrorDetails::default(),
        }
    }

    pub fn with_alternatives(mut self, alternatives: Vec<String>) -> Self {
        match &mut self {
            CoreError::Capacity { details, .. }
            | CoreError::Feasibility { details, .. }
            | CoreError::State { details, .. } => details.alternatives = alternatives,
            _ => {}
        }
        self
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
