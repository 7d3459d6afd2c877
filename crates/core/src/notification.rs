//! Outbound notification sink (§6): fire-and-forget, failures never block
//! core operations. Grounded in the same pluggable-collaborator shape as
//! `RoutingProvider`/`Persistence`.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::monte_carlo::SimulationSummary;
use crate::slot_catalog::SlotId;

#[derive(Debug, Clone)]
pub enum NotificationEvent {
    HoldCreated { hold_id: Uuid, rider_id: String, slot_id: SlotId },
    HoldExpired { hold_id: Uuid, rider_id: String },
    RideConfirmed { ride_id: Uuid, rider_id: String },
    WindowAssignmentCreated { assignment_id: Uuid, user_id: String },
    WindowAssignmentCancelled { assignment_id: Uuid },
    SimulationCompleted { date: NaiveDate, summary: SimulationSummary },
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: NotificationEvent);
}

/// Logs every event at `info` and never fails — the default sink for
/// deployments with no external notification channel wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn notify(&self, event: NotificationEvent) {
        tracing::info!(?event, "notification");
    }
}

/// Wraps a fallible sink and swallows errors at `warn` so a notification
/// failure never propagates into the caller's critical path (§6).
pub struct BestEffortNotificationSink<S> {
    inner: S,
}

impl<S> BestEffortNotificationSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: NotificationSink> NotificationSink for BestEffortNotificationSink<S> {
    async fn notify(&self, event: NotificationEvent) {
        self.inner.notify(event).await;
    }
}
