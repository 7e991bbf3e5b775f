use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::{Ticket, TicketStatus};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Ticket lifecycle
    TicketCreated {
        ticket_id: String,
        ticket_number: String,
        owner_id: String,
        service_type: String,
        scheduled_date: String,
        scheduled_time: String,
        queue_number: u32,
    },
    TicketStarted {
        ticket_id: String,
        ticket_number: String,
        operator_id: String,
    },
    TicketCompleted {
        ticket_id: String,
        ticket_number: String,
        operator_id: String,
        /// Time between start and completion
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_secs: Option<i64>,
    },
    TicketCancelled {
        ticket_id: String,
        ticket_number: String,
        cancelled_by: String,
        /// Role of the canceller (VISITOR, ADMIN, ...)
        actor_role: String,
        previous_status: TicketStatus,
    },
    FeedbackSubmitted {
        ticket_id: String,
        user_id: String,
        rating: u8,
    },

    /// An operation gave up after repeated write conflicts.
    TransitionConflict {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ticket_id: Option<String>,
        operation: String,
        user_id: String,
        attempts: u32,
    },
}

impl AuditEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::TicketCreated { .. } => "ticket_created",
            Self::TicketStarted { .. } => "ticket_started",
            Self::TicketCompleted { .. } => "ticket_completed",
            Self::TicketCancelled { .. } => "ticket_cancelled",
            Self::FeedbackSubmitted { .. } => "feedback_submitted",
            Self::TransitionConflict { .. } => "transition_conflict",
        }
    }

    /// Get the ticket ID if this event is ticket-related
    pub fn ticket_id(&self) -> Option<&str> {
        match self {
            Self::TicketCreated { ticket_id, .. }
            | Self::TicketStarted { ticket_id, .. }
            | Self::TicketCompleted { ticket_id, .. }
            | Self::TicketCancelled { ticket_id, .. }
            | Self::FeedbackSubmitted { ticket_id, .. } => Some(ticket_id),
            Self::TransitionConflict { ticket_id, .. } => ticket_id.as_deref(),
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
        }
    }

    /// Get the user who caused the event
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::TicketCreated { owner_id, .. } => Some(owner_id),
            Self::TicketStarted { operator_id, .. } | Self::TicketCompleted { operator_id, .. } => {
                Some(operator_id)
            }
            Self::TicketCancelled { cancelled_by, .. } => Some(cancelled_by),
            Self::FeedbackSubmitted { user_id, .. } | Self::TransitionConflict { user_id, .. } => {
                Some(user_id)
            }
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
        }
    }

    pub fn ticket_created(ticket: &Ticket) -> Self {
        Self::TicketCreated {
            ticket_id: ticket.id.clone(),
            ticket_number: ticket.ticket_number.clone(),
            owner_id: ticket.owner_id.clone(),
            service_type: ticket.service_type.as_str().to_string(),
            scheduled_date: ticket.scheduled_date.format("%Y-%m-%d").to_string(),
            scheduled_time: ticket.scheduled_time.clone(),
            queue_number: ticket.queue_number,
        }
    }
}

/// Stored audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub ticket_id: Option<String>,
    pub user_id: Option<String>,
    pub data: AuditEvent,
}
