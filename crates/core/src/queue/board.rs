//! Read-only queue views for the counter and the waiting-room screen.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::{QueueError, SchedulingPolicy};
use crate::auth::Actor;
use crate::ticket::{ServiceType, Ticket, TicketFilter, TicketOrder, TicketStatus, TicketStore};

const NEXT_UP: i64 = 10;
const RECENT_COMPLETED: i64 = 5;
const BOARD_ROWS: i64 = 5;

/// What an operator sees at their counter.
#[derive(Debug, Clone, Serialize)]
pub struct OperatorQueue {
    pub today: NaiveDate,
    /// The ticket this operator is serving.
    pub current: Option<Ticket>,
    /// PENDING tickets for today, by queue number.
    pub next: Vec<Ticket>,
    pub completed_today: i64,
    pub recent_completed: Vec<Ticket>,
}

/// One row on the public display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardEntry {
    pub ticket_number: String,
    pub service_type: ServiceType,
    /// Display name of the service, e.g. "Penjualan Data Mikro".
    pub service_label: &'static str,
    pub scheduled_time: String,
    pub queue_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl From<&Ticket> for BoardEntry {
    fn from(ticket: &Ticket) -> Self {
        Self {
            ticket_number: ticket.ticket_number.clone(),
            service_type: ticket.service_type,
            service_label: ticket.service_type.label(),
            scheduled_time: ticket.scheduled_time.clone(),
            queue_number: ticket.queue_number,
            operator_name: None,
            started_at: ticket.started_at,
        }
    }
}

/// Public waiting-room screen. Carries no owner information.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayBoard {
    pub today: NaiveDate,
    pub serving: Vec<BoardEntry>,
    pub waiting: Vec<BoardEntry>,
    pub generated_at: DateTime<Utc>,
}

pub struct QueueBoard {
    store: Arc<dyn TicketStore>,
    policy: Arc<SchedulingPolicy>,
}

impl QueueBoard {
    pub fn new(store: Arc<dyn TicketStore>, policy: Arc<SchedulingPolicy>) -> Self {
        Self { store, policy }
    }

    fn pending_today(&self, today: NaiveDate, limit: i64) -> Result<Vec<Ticket>, QueueError> {
        let filter = TicketFilter::new()
            .with_status(TicketStatus::Pending)
            .with_scheduled_date(today)
            .with_order(TicketOrder::QueueAsc)
            .with_limit(limit);
        Ok(self.store.list(&filter)?)
    }

    pub fn operator_queue(
        &self,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<OperatorQueue, QueueError> {
        let operator_id = actor
            .as_operator()
            .ok_or_else(|| QueueError::forbidden("Only operators have a counter queue"))?;
        let today = self.policy.today(now);
        let (day_start, day_end) = self.policy.day_bounds(today);

        let current = self.store.active_for_operator(operator_id)?;
        let next = self.pending_today(today, NEXT_UP)?;

        let completed = TicketFilter::new()
            .with_status(TicketStatus::Done)
            .with_operator(operator_id)
            .with_completed_between(day_start, day_end);
        let completed_today = self.store.count(&completed)?;

        let recent = TicketFilter::new()
            .with_status(TicketStatus::Done)
            .with_operator(operator_id)
            .with_order(TicketOrder::CompletedDesc)
            .with_limit(RECENT_COMPLETED);
        let recent_completed = self.store.list(&recent)?;

        Ok(OperatorQueue {
            today,
            current,
            next,
            completed_today,
            recent_completed,
        })
    }

    /// Tickets being served and the next ones waiting, for today.
    pub fn display_board(&self, now: DateTime<Utc>) -> Result<DisplayBoard, QueueError> {
        let today = self.policy.today(now);

        let serving_filter = TicketFilter::new()
            .with_status(TicketStatus::OnProcess)
            .with_scheduled_date(today)
            .with_order(TicketOrder::StartedAsc)
            .with_limit(BOARD_ROWS);
        let mut serving = Vec::new();
        for ticket in self.store.list(&serving_filter)? {
            let mut entry = BoardEntry::from(&ticket);
            if let Some(operator_id) = ticket.operator_id.as_deref() {
                entry.operator_name = self
                    .store
                    .get_user(operator_id)?
                    .and_then(|profile| profile.name);
            }
            serving.push(entry);
        }

        let waiting = self
            .pending_today(today, BOARD_ROWS)?
            .iter()
            .map(BoardEntry::from)
            .collect();

        Ok(DisplayBoard {
            today,
            serving,
            waiting,
            generated_at: now,
        })
    }
}
