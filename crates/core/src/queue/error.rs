//! Errors returned by queue operations.

use chrono::NaiveDate;
use thiserror::Error;

use crate::ticket::{TicketError, TicketStatus};

/// Malformed or missing input. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Unknown service type: {0}")]
    InvalidServiceType(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Malformed ticket number '{0}', expected PREFIX-YYYYMMDD-SEQ")]
    InvalidTicketNumber(String),

    #[error("Time slot '{0}' is not available")]
    InvalidTimeSlot(String),

    #[error("Scheduled date {date} is in the past (today is {today})")]
    DateInPast { date: NaiveDate, today: NaiveDate },

    #[error("Scheduled date {date} is more than {max_days} days ahead")]
    DateTooFar { date: NaiveDate, max_days: u32 },

    #[error("Rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(i64),

    #[error("Comment is longer than {0} characters")]
    CommentTooLong(usize),
}

/// Failure of a queue operation.
///
/// Business-rule violations are typed; infrastructure failures collapse into
/// `Store` and leave nothing applied.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Ticket not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Cannot {operation} ticket {ticket_number}: status is {status}")]
    InvalidState {
        ticket_id: String,
        ticket_number: String,
        status: TicketStatus,
        operation: &'static str,
    },

    #[error("Operator {operator_id} is already serving ticket {active_ticket_number}")]
    OperatorBusy {
        operator_id: String,
        active_ticket_id: String,
        active_ticket_number: String,
    },

    #[error("Ticket {ticket_number} is already {status}")]
    AlreadyTerminal {
        ticket_id: String,
        ticket_number: String,
        status: TicketStatus,
    },

    #[error("Feedback was already submitted for ticket {0}")]
    AlreadyExists(String),

    #[error("Could not {operation} after {attempts} attempts due to concurrent updates, please retry")]
    Contention {
        operation: &'static str,
        attempts: u32,
    },

    #[error("Storage failure: {0}")]
    Store(String),
}

impl QueueError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::Validation(_) => "validation_error",
            QueueError::NotFound(_) => "not_found",
            QueueError::Forbidden(_) => "forbidden",
            QueueError::InvalidState { .. } => "invalid_state",
            QueueError::OperatorBusy { .. } => "operator_busy",
            QueueError::AlreadyTerminal { .. } => "already_terminal",
            QueueError::AlreadyExists(_) => "already_exists",
            QueueError::Contention { .. } => "contention",
            QueueError::Store(_) => "store_error",
        }
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        QueueError::Forbidden(message.into())
    }
}

impl From<TicketError> for QueueError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::NotFound(id) => QueueError::NotFound(id),
            TicketError::OperatorBusy {
                operator_id,
                active_ticket_id,
                active_ticket_number,
            } => QueueError::OperatorBusy {
                operator_id,
                active_ticket_id,
                active_ticket_number,
            },
            TicketError::FeedbackExists(ticket_id) => QueueError::AlreadyExists(ticket_id),
            TicketError::StatusChanged { .. } | TicketError::Conflict(_) => {
                QueueError::Contention {
                    operation: "write",
                    attempts: 1,
                }
            }
            TicketError::Database(msg) => QueueError::Store(msg),
        }
    }
}
