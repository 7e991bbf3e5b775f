use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::AuditEvent;

/// Envelope wrapping an audit event with metadata
#[derive(Debug, Clone)]
pub struct AuditEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
}

impl AuditEventEnvelope {
    fn now(event: AuditEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Handle for emitting audit events
///
/// Cheap to clone. Events go through a bounded channel to the `AuditWriter`;
/// emitting never fails the caller.
#[derive(Clone)]
pub struct AuditHandle {
    tx: Option<mpsc::Sender<AuditEventEnvelope>>,
}

impl AuditHandle {
    /// Create a new audit handle from a channel sender
    pub fn new(tx: mpsc::Sender<AuditEventEnvelope>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A handle that discards every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Emit an event, waiting for channel capacity.
    pub async fn emit(&self, event: AuditEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.send(AuditEventEnvelope::now(event)).await {
            tracing::error!("Failed to emit audit event: {}", e);
        }
    }

    /// Emit an event without waiting. Returns false if it was dropped.
    ///
    /// Used on request paths, where a full channel must not stall the
    /// ticket operation that already committed.
    pub fn try_emit(&self, event: AuditEvent) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        let event_type = event.event_type();
        match tx.try_send(AuditEventEnvelope::now(event)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(event_type, "Audit channel full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!(event_type, "Audit channel closed, dropping event");
                false
            }
        }
    }
}
