//! Ticket storage trait and types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Feedback, ServiceType, Ticket, TicketStatus, UserProfile};

/// Error type for ticket store operations.
#[derive(Debug, Error)]
pub enum TicketError {
    /// Ticket not found.
    #[error("Ticket not found: {0}")]
    NotFound(String),

    /// A compare-and-swap update found the ticket in a different status.
    #[error("Ticket {ticket_id} is {actual}, expected {expected}")]
    StatusChanged {
        ticket_id: String,
        expected: TicketStatus,
        actual: TicketStatus,
    },

    /// The operator already has a ticket in ON_PROCESS.
    #[error("Operator {operator_id} is already serving ticket {active_ticket_number}")]
    OperatorBusy {
        operator_id: String,
        active_ticket_id: String,
        active_ticket_number: String,
    },

    /// Unique constraint violation or lock timeout. Safe to retry.
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Feedback already recorded for the ticket.
    #[error("Feedback already exists for ticket {0}")]
    FeedbackExists(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl TicketError {
    /// Returns true if the operation may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TicketError::Conflict(_) | TicketError::StatusChanged { .. }
        )
    }
}

/// Request to create a new ticket.
///
/// The store assigns id, queue number and ticket number.
#[derive(Debug, Clone)]
pub struct CreateTicketRequest {
    pub owner_id: String,
    pub service_type: ServiceType,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
}

/// Request to record feedback on a ticket.
#[derive(Debug, Clone)]
pub struct CreateFeedbackRequest {
    pub ticket_id: String,
    pub user_id: String,
    pub rating: u8,
    pub comment: Option<String>,
}

/// Sort order for ticket listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TicketOrder {
    /// Newest first.
    #[default]
    CreatedDesc,
    /// Scheduled date, then queue number.
    QueueAsc,
    /// Oldest start first.
    StartedAsc,
    /// Most recently completed first.
    CompletedDesc,
    /// Most recently updated first.
    UpdatedDesc,
}

impl TicketOrder {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            TicketOrder::CreatedDesc => "created_at DESC, queue_number DESC",
            TicketOrder::QueueAsc => "scheduled_date ASC, queue_number ASC",
            TicketOrder::StartedAsc => "started_at ASC, queue_number ASC",
            TicketOrder::CompletedDesc => "completed_at DESC",
            TicketOrder::UpdatedDesc => "updated_at DESC, created_at DESC",
        }
    }
}

/// Filter for querying tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub service_type: Option<ServiceType>,
    pub owner_id: Option<String>,
    pub operator_id: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    /// Inclusive lower bound on `completed_at`.
    pub completed_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `completed_at`.
    pub completed_to: Option<DateTime<Utc>>,
    pub order: TicketOrder,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TicketFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = Some(service_type);
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_operator(mut self, operator_id: impl Into<String>) -> Self {
        self.operator_id = Some(operator_id.into());
        self
    }

    pub fn with_scheduled_date(mut self, date: NaiveDate) -> Self {
        self.scheduled_date = Some(date);
        self
    }

    /// Only tickets completed in `[from, to)`.
    pub fn with_completed_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.completed_from = Some(from);
        self.completed_to = Some(to);
        self
    }

    pub fn with_order(mut self, order: TicketOrder) -> Self {
        self.order = order;
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Number of tickets per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub on_process: i64,
    pub done: i64,
    pub cancelled: i64,
}

impl StatusCounts {
    pub fn add(&mut self, status: TicketStatus, count: i64) {
        match status {
            TicketStatus::Pending => self.pending += count,
            TicketStatus::OnProcess => self.on_process += count,
            TicketStatus::Done => self.done += count,
            TicketStatus::Cancelled => self.cancelled += count,
        }
    }

    pub fn get(&self, status: TicketStatus) -> i64 {
        match status {
            TicketStatus::Pending => self.pending,
            TicketStatus::OnProcess => self.on_process,
            TicketStatus::Done => self.done,
            TicketStatus::Cancelled => self.cancelled,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.on_process + self.done + self.cancelled
    }
}

/// Trait for ticket storage backends.
///
/// Every mutating method is atomic: it either applies completely or leaves
/// the store untouched.
pub trait TicketStore: Send + Sync {
    /// Create a PENDING ticket, assigning the next queue number for its
    /// scheduled date and the matching ticket number.
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError>;

    /// Get a ticket by ID.
    fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError>;

    /// Get a ticket by its exact ticket number.
    fn get_by_number(&self, ticket_number: &str) -> Result<Option<Ticket>, TicketError>;

    /// List tickets matching the filter.
    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError>;

    /// Count tickets matching the filter.
    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError>;

    /// Count tickets per status, ignoring the filter's status, order and paging.
    fn count_by_status(&self, filter: &TicketFilter) -> Result<StatusCounts, TicketError>;

    /// The operator's ON_PROCESS ticket, if any.
    fn active_for_operator(&self, operator_id: &str) -> Result<Option<Ticket>, TicketError>;

    /// PENDING → ON_PROCESS.
    ///
    /// Checks that the operator has no other ON_PROCESS ticket and claims
    /// the ticket in one transaction.
    fn start(&self, id: &str, operator_id: &str) -> Result<Ticket, TicketError>;

    /// ON_PROCESS → DONE, only while still assigned to `operator_id`.
    fn complete(&self, id: &str, operator_id: &str) -> Result<Ticket, TicketError>;

    /// `expected` → CANCELLED, only if the ticket is still in `expected`.
    fn cancel(&self, id: &str, expected: TicketStatus) -> Result<Ticket, TicketError>;

    /// Store the rendered QR image for a ticket.
    fn attach_qr_code(&self, id: &str, qr_code: &str) -> Result<(), TicketError>;

    /// Insert or refresh a cached user profile.
    fn upsert_user(&self, profile: &UserProfile) -> Result<(), TicketError>;

    fn get_user(&self, id: &str) -> Result<Option<UserProfile>, TicketError>;

    /// Record feedback. Fails with `FeedbackExists` on a second attempt.
    fn create_feedback(&self, request: CreateFeedbackRequest) -> Result<Feedback, TicketError>;

    fn get_feedback(&self, ticket_id: &str) -> Result<Option<Feedback>, TicketError>;
}
