//! Ticket state machine: start, complete, cancel, plus reads and feedback.
//!
//! ```text
//! PENDING --start(operator)--> ON_PROCESS --complete(same operator)--> DONE
//! PENDING --cancel(owner|admin)--> CANCELLED
//! ON_PROCESS --cancel(admin)--> CANCELLED
//! ```
//!
//! Every transition re-reads the ticket, validates it against the caller and
//! issues a compare-and-swap write. A lost race re-runs the whole attempt.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::retry::{retry_on_conflict, Step};
use super::{QueueError, SchedulingPolicy, ValidationError};
use crate::audit::{AuditEvent, AuditHandle};
use crate::auth::Actor;
use crate::ticket::{
    number, CreateFeedbackRequest, Feedback, ServiceType, StatusCounts, Ticket, TicketDetail,
    TicketFilter, TicketOrder, TicketStatus, TicketStore, UserSummary,
};

/// Longest accepted feedback comment, in characters.
pub const MAX_COMMENT_CHARS: usize = 1000;

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 100;

/// Feedback as submitted by a visitor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackInput {
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Listing parameters. Only admins may filter freely.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<TicketStatus>,
    pub service_type: Option<ServiceType>,
    /// `YYYY-MM-DD`
    pub scheduled_date: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A page of tickets.
#[derive(Debug, Clone, Serialize)]
pub struct TicketList {
    pub tickets: Vec<Ticket>,
    /// Matches across all pages.
    pub total: i64,
    /// Per-status counts, for admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<StatusCounts>,
}

/// Applies ticket transitions on behalf of an actor.
pub struct TicketLifecycle {
    store: Arc<dyn TicketStore>,
    policy: Arc<SchedulingPolicy>,
    audit: AuditHandle,
}

impl TicketLifecycle {
    pub fn new(store: Arc<dyn TicketStore>, policy: Arc<SchedulingPolicy>) -> Self {
        Self {
            store,
            policy,
            audit: AuditHandle::disabled(),
        }
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = audit;
        self
    }

    fn load(&self, ticket_id: &str) -> Result<Ticket, QueueError> {
        self.store
            .get(ticket_id)?
            .ok_or_else(|| QueueError::NotFound(ticket_id.to_string()))
    }

    /// Emit a `transition_conflict` event when retries ran out.
    fn report<T>(
        &self,
        result: Result<T, QueueError>,
        ticket_id: &str,
        actor: &Actor,
    ) -> Result<T, QueueError> {
        if let Err(QueueError::Contention {
            operation,
            attempts,
        }) = &result
        {
            self.audit.try_emit(AuditEvent::TransitionConflict {
                ticket_id: Some(ticket_id.to_string()),
                operation: operation.to_string(),
                user_id: actor.id().to_string(),
                attempts: *attempts,
            });
        }
        result
    }

    /// PENDING → ON_PROCESS, assigning the calling operator.
    pub fn start(&self, ticket_id: &str, actor: &Actor) -> Result<Ticket, QueueError> {
        let operator_id = actor
            .as_operator()
            .ok_or_else(|| QueueError::forbidden("Only operators can start tickets"))?;

        let result = retry_on_conflict(self.policy.max_attempts(), "start", || {
            let ticket = self.load(ticket_id)?;
            if ticket.status != TicketStatus::Pending {
                return Err(Step::Fail(invalid_state(&ticket, "start")));
            }
            self.store
                .start(&ticket.id, operator_id)
                .map_err(Step::from_store)
        });
        let ticket = self.report(result, ticket_id, actor)?;

        info!(
            ticket_id = %ticket.id,
            ticket_number = %ticket.ticket_number,
            operator_id,
            "Ticket started"
        );
        self.audit.try_emit(AuditEvent::TicketStarted {
            ticket_id: ticket.id.clone(),
            ticket_number: ticket.ticket_number.clone(),
            operator_id: operator_id.to_string(),
        });
        Ok(ticket)
    }

    /// ON_PROCESS → DONE, by the operator serving the ticket.
    pub fn complete(&self, ticket_id: &str, actor: &Actor) -> Result<Ticket, QueueError> {
        let operator_id = actor
            .as_operator()
            .ok_or_else(|| QueueError::forbidden("Only operators can complete tickets"))?;

        let result = retry_on_conflict(self.policy.max_attempts(), "complete", || {
            let ticket = self.load(ticket_id)?;
            if ticket.status != TicketStatus::OnProcess {
                return Err(Step::Fail(invalid_state(&ticket, "complete")));
            }
            if !ticket.is_assigned_to(operator_id) {
                return Err(Step::Fail(QueueError::forbidden(
                    "Ticket is being served by another operator",
                )));
            }
            self.store
                .complete(&ticket.id, operator_id)
                .map_err(Step::from_store)
        });
        let ticket = self.report(result, ticket_id, actor)?;

        let duration_secs = ticket.service_duration_secs();
        info!(
            ticket_id = %ticket.id,
            ticket_number = %ticket.ticket_number,
            operator_id,
            duration_secs,
            "Ticket completed"
        );
        self.audit.try_emit(AuditEvent::TicketCompleted {
            ticket_id: ticket.id.clone(),
            ticket_number: ticket.ticket_number.clone(),
            operator_id: operator_id.to_string(),
            duration_secs,
        });
        Ok(ticket)
    }

    /// PENDING/ON_PROCESS → CANCELLED.
    ///
    /// The owner may cancel while PENDING; an admin may cancel any
    /// non-terminal ticket. The assigned operator, if any, is kept.
    pub fn cancel(&self, ticket_id: &str, actor: &Actor) -> Result<Ticket, QueueError> {
        let result = retry_on_conflict(self.policy.max_attempts(), "cancel", || {
            let ticket = self.load(ticket_id)?;
            if !actor.is_admin() && !ticket.is_owned_by(actor.id()) {
                return Err(Step::Fail(QueueError::forbidden(
                    "Only the ticket owner or an admin can cancel this ticket",
                )));
            }
            if ticket.status.is_terminal() {
                return Err(Step::Fail(QueueError::AlreadyTerminal {
                    ticket_id: ticket.id,
                    ticket_number: ticket.ticket_number,
                    status: ticket.status,
                }));
            }
            if !actor.is_admin() && ticket.status != TicketStatus::Pending {
                return Err(Step::Fail(QueueError::forbidden(
                    "Tickets already being served can only be cancelled by an admin",
                )));
            }
            let previous = ticket.status;
            self.store
                .cancel(&ticket.id, previous)
                .map(|cancelled| (cancelled, previous))
                .map_err(Step::from_store)
        });
        let (ticket, previous_status) = self.report(result, ticket_id, actor)?;

        info!(
            ticket_id = %ticket.id,
            ticket_number = %ticket.ticket_number,
            cancelled_by = actor.id(),
            previous_status = %previous_status,
            "Ticket cancelled"
        );
        self.audit.try_emit(AuditEvent::TicketCancelled {
            ticket_id: ticket.id.clone(),
            ticket_number: ticket.ticket_number.clone(),
            cancelled_by: actor.id().to_string(),
            actor_role: actor.role().as_str().to_string(),
            previous_status,
        });
        Ok(ticket)
    }

    /// A ticket with owner, operator and feedback attached.
    ///
    /// Visible to admins, the owner and the assigned operator.
    pub fn get_ticket(&self, ticket_id: &str, actor: &Actor) -> Result<TicketDetail, QueueError> {
        let ticket = self.load(ticket_id)?;
        let allowed = actor.is_admin()
            || ticket.is_owned_by(actor.id())
            || actor
                .as_operator()
                .is_some_and(|operator_id| ticket.is_assigned_to(operator_id));
        if !allowed {
            return Err(QueueError::forbidden(
                "You do not have access to this ticket",
            ));
        }
        self.detail(ticket)
    }

    /// Exact lookup by ticket number, for operators at the counter.
    pub fn find_by_ticket_number(
        &self,
        ticket_number: &str,
        actor: &Actor,
    ) -> Result<TicketDetail, QueueError> {
        if actor.as_operator().is_none() {
            return Err(QueueError::forbidden(
                "Only operators can search tickets",
            ));
        }
        let ticket_number = ticket_number.trim();
        if ticket_number.is_empty() {
            return Err(ValidationError::MissingField("ticket_number").into());
        }
        if number::parse(ticket_number).is_none() {
            return Err(ValidationError::InvalidTicketNumber(ticket_number.to_string()).into());
        }
        let ticket = self
            .store
            .get_by_number(ticket_number)?
            .ok_or_else(|| QueueError::NotFound(ticket_number.to_string()))?;
        self.detail(ticket)
    }

    fn summary(&self, user_id: &str) -> Result<UserSummary, QueueError> {
        Ok(self
            .store
            .get_user(user_id)?
            .map(UserSummary::from)
            .unwrap_or_else(|| UserSummary::unknown(user_id)))
    }

    fn detail(&self, ticket: Ticket) -> Result<TicketDetail, QueueError> {
        let owner = self.summary(&ticket.owner_id)?;
        let operator = match ticket.operator_id.as_deref() {
            Some(id) => Some(self.summary(id)?),
            None => None,
        };
        let feedback = self.store.get_feedback(&ticket.id)?;
        Ok(TicketDetail {
            ticket,
            owner,
            operator,
            feedback,
        })
    }

    /// Rate a finished visit. Owner only, once per ticket.
    pub fn submit_feedback(
        &self,
        ticket_id: &str,
        actor: &Actor,
        input: FeedbackInput,
    ) -> Result<Feedback, QueueError> {
        let rating = input.rating.ok_or(ValidationError::MissingField("rating"))?;
        let rating = u8::try_from(rating)
            .ok()
            .filter(|r| (1..=5).contains(r))
            .ok_or(ValidationError::RatingOutOfRange(rating))?;
        let comment = input
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if comment
            .as_ref()
            .is_some_and(|c| c.chars().count() > MAX_COMMENT_CHARS)
        {
            return Err(ValidationError::CommentTooLong(MAX_COMMENT_CHARS).into());
        }

        let ticket = self.load(ticket_id)?;
        if !ticket.is_owned_by(actor.id()) {
            return Err(QueueError::forbidden(
                "Only the ticket owner can give feedback",
            ));
        }
        if ticket.status != TicketStatus::Done {
            return Err(invalid_state(&ticket, "rate"));
        }

        let feedback = self.store.create_feedback(CreateFeedbackRequest {
            ticket_id: ticket.id.clone(),
            user_id: actor.id().to_string(),
            rating,
            comment,
        })?;

        info!(ticket_id = %ticket.id, rating, "Feedback submitted");
        self.audit.try_emit(AuditEvent::FeedbackSubmitted {
            ticket_id: ticket.id,
            user_id: feedback.user_id.clone(),
            rating,
        });
        Ok(feedback)
    }

    /// Tickets visible to the actor, one page at a time.
    pub fn list_tickets(&self, actor: &Actor, query: ListQuery) -> Result<TicketList, QueueError> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
        let offset = query.offset.unwrap_or(0).max(0);

        let mut filter = match actor {
            Actor::Visitor { id } => TicketFilter::new()
                .with_owner(id.clone())
                .with_order(TicketOrder::CreatedDesc),
            Actor::Operator { id } => TicketFilter::new()
                .with_operator(id.clone())
                .with_order(TicketOrder::UpdatedDesc),
            Actor::Admin { .. } => TicketFilter::new().with_order(TicketOrder::CreatedDesc),
        };
        if let Some(status) = query.status {
            filter = filter.with_status(status);
        }
        if actor.is_admin() {
            if let Some(service_type) = query.service_type {
                filter = filter.with_service_type(service_type);
            }
            if let Some(date) = query.scheduled_date.as_deref() {
                filter = filter.with_scheduled_date(SchedulingPolicy::parse_date(date)?);
            }
        }
        let filter = filter.with_limit(limit).with_offset(offset);

        let tickets = self.store.list(&filter)?;
        let total = self.store.count(&filter)?;
        let counts = if actor.is_admin() {
            Some(self.store.count_by_status(&filter)?)
        } else {
            None
        };

        Ok(TicketList {
            tickets,
            total,
            counts,
        })
    }
}

fn invalid_state(ticket: &Ticket, operation: &'static str) -> QueueError {
    QueueError::InvalidState {
        ticket_id: ticket.id.clone(),
        ticket_number: ticket.ticket_number.clone(),
        status: ticket.status,
        operation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::{CreateTicketRequest, Role, SqliteTicketStore, UserProfile};
    use chrono::NaiveDate;

    struct Fixture {
        store: Arc<SqliteTicketStore>,
        lifecycle: TicketLifecycle,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteTicketStore::in_memory().unwrap());
        let lifecycle = TicketLifecycle::new(store.clone(), Arc::new(SchedulingPolicy::default()));
        Fixture { store, lifecycle }
    }

    fn visitor(id: &str) -> Actor {
        Actor::Visitor { id: id.to_string() }
    }

    fn operator(id: &str) -> Actor {
        Actor::Operator { id: id.to_string() }
    }

    fn admin() -> Actor {
        Actor::Admin {
            id: "admin-1".to_string(),
        }
    }

    impl Fixture {
        fn pending(&self, owner: &str) -> Ticket {
            self.store
                .create(CreateTicketRequest {
                    owner_id: owner.to_string(),
                    service_type: ServiceType::KonsultasiStatistik,
                    scheduled_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
                    scheduled_time: "08:00".to_string(),
                })
                .unwrap()
        }

        fn done(&self, owner: &str) -> Ticket {
            let ticket = self.pending(owner);
            self.lifecycle.start(&ticket.id, &operator("op-9")).unwrap();
            self.lifecycle.complete(&ticket.id, &operator("op-9")).unwrap()
        }

        fn reload(&self, id: &str) -> Ticket {
            self.store.get(id).unwrap().unwrap()
        }
    }

    #[test]
    fn test_start_assigns_operator() {
        let f = fixture();
        let ticket = f.pending("v1");

        let started = f.lifecycle.start(&ticket.id, &operator("op-1")).unwrap();

        assert_eq!(started.status, TicketStatus::OnProcess);
        assert_eq!(started.operator_id.as_deref(), Some("op-1"));
        assert!(started.started_at.is_some());
        assert!(started.timestamps_consistent());
    }

    #[test]
    fn test_start_requires_operator() {
        let f = fixture();
        let ticket = f.pending("v1");

        for actor in [visitor("v1"), admin()] {
            let err = f.lifecycle.start(&ticket.id, &actor).unwrap_err();
            assert!(matches!(err, QueueError::Forbidden(_)));
        }
        assert_eq!(f.reload(&ticket.id).status, TicketStatus::Pending);
    }

    #[test]
    fn test_start_non_pending_is_invalid_state() {
        let f = fixture();
        let ticket = f.pending("v1");
        f.lifecycle.start(&ticket.id, &operator("op-1")).unwrap();

        let err = f.lifecycle.start(&ticket.id, &operator("op-2")).unwrap_err();
        assert!(matches!(
            err,
            QueueError::InvalidState {
                status: TicketStatus::OnProcess,
                operation: "start",
                ..
            }
        ));
        assert_eq!(f.reload(&ticket.id).operator_id.as_deref(), Some("op-1"));
    }

    #[test]
    fn test_start_missing_ticket() {
        let f = fixture();
        let err = f.lifecycle.start("nope", &operator("op-1")).unwrap_err();
        assert!(matches!(err, QueueError::NotFound(_)));
    }

    #[test]
    fn test_operator_busy_then_free() {
        let f = fixture();
        let first = f.pending("v1");
        let second = f.pending("v2");
        let op = operator("op-1");

        f.lifecycle.start(&first.id, &op).unwrap();
        match f.lifecycle.start(&second.id, &op).unwrap_err() {
            QueueError::OperatorBusy {
                active_ticket_id,
                active_ticket_number,
                ..
            } => {
                assert_eq!(active_ticket_id, first.id);
                assert_eq!(active_ticket_number, first.ticket_number);
            }
            other => panic!("expected OperatorBusy, got {:?}", other),
        }
        assert_eq!(f.reload(&second.id).status, TicketStatus::Pending);

        f.lifecycle.complete(&first.id, &op).unwrap();
        let started = f.lifecycle.start(&second.id, &op).unwrap();
        assert_eq!(started.status, TicketStatus::OnProcess);
    }

    #[test]
    fn test_complete_by_other_operator_forbidden() {
        let f = fixture();
        let ticket = f.pending("v1");
        f.lifecycle.start(&ticket.id, &operator("op-1")).unwrap();

        let err = f
            .lifecycle
            .complete(&ticket.id, &operator("op-2"))
            .unwrap_err();
        assert!(matches!(err, QueueError::Forbidden(_)));
        assert_eq!(f.reload(&ticket.id).status, TicketStatus::OnProcess);
    }

    #[test]
    fn test_complete_pending_is_invalid_state() {
        let f = fixture();
        let ticket = f.pending("v1");
        let err = f
            .lifecycle
            .complete(&ticket.id, &operator("op-1"))
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidState { .. }));
    }

    #[test]
    fn test_complete_sets_completed_at() {
        let f = fixture();
        let done = f.done("v1");
        assert_eq!(done.status, TicketStatus::Done);
        assert!(done.completed_at.is_some());
        assert!(done.timestamps_consistent());
    }

    #[test]
    fn test_owner_cancels_pending_then_already_terminal() {
        let f = fixture();
        let ticket = f.pending("v1");

        let cancelled = f.lifecycle.cancel(&ticket.id, &visitor("v1")).unwrap();
        assert_eq!(cancelled.status, TicketStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        let err = f.lifecycle.cancel(&ticket.id, &visitor("v1")).unwrap_err();
        assert!(matches!(
            err,
            QueueError::AlreadyTerminal {
                status: TicketStatus::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn test_stranger_cancel_forbidden_even_when_terminal() {
        let f = fixture();
        let ticket = f.pending("v1");
        let err = f.lifecycle.cancel(&ticket.id, &visitor("v2")).unwrap_err();
        assert!(matches!(err, QueueError::Forbidden(_)));

        f.lifecycle.cancel(&ticket.id, &visitor("v1")).unwrap();
        let err = f.lifecycle.cancel(&ticket.id, &visitor("v2")).unwrap_err();
        assert!(matches!(err, QueueError::Forbidden(_)));
    }

    #[test]
    fn test_operator_cannot_cancel() {
        let f = fixture();
        let ticket = f.pending("v1");
        f.lifecycle.start(&ticket.id, &operator("op-1")).unwrap();
        let err = f
            .lifecycle
            .cancel(&ticket.id, &operator("op-1"))
            .unwrap_err();
        assert!(matches!(err, QueueError::Forbidden(_)));
    }

    #[test]
    fn test_owner_cannot_cancel_on_process_but_admin_can() {
        let f = fixture();
        let ticket = f.pending("v1");
        f.lifecycle.start(&ticket.id, &operator("op-1")).unwrap();

        let err = f.lifecycle.cancel(&ticket.id, &visitor("v1")).unwrap_err();
        assert!(matches!(err, QueueError::Forbidden(_)));
        assert_eq!(f.reload(&ticket.id).status, TicketStatus::OnProcess);

        let cancelled = f.lifecycle.cancel(&ticket.id, &admin()).unwrap();
        assert_eq!(cancelled.status, TicketStatus::Cancelled);
        assert_eq!(cancelled.operator_id.as_deref(), Some("op-1"));
        assert!(cancelled.timestamps_consistent());
    }

    #[test]
    fn test_cancel_done_is_already_terminal() {
        let f = fixture();
        let done = f.done("v1");
        let err = f.lifecycle.cancel(&done.id, &admin()).unwrap_err();
        assert!(matches!(err, QueueError::AlreadyTerminal { .. }));
    }

    #[test]
    fn test_get_ticket_access() {
        let f = fixture();
        let ticket = f.pending("v1");
        f.store
            .upsert_user(&UserProfile {
                id: "v1".to_string(),
                role: Role::Visitor,
                name: Some("Siti".to_string()),
                email: None,
            })
            .unwrap();

        let detail = f.lifecycle.get_ticket(&ticket.id, &visitor("v1")).unwrap();
        assert_eq!(detail.owner.name.as_deref(), Some("Siti"));
        assert!(detail.operator.is_none());

        assert!(f.lifecycle.get_ticket(&ticket.id, &admin()).is_ok());
        assert!(matches!(
            f.lifecycle.get_ticket(&ticket.id, &visitor("v2")),
            Err(QueueError::Forbidden(_))
        ));
        assert!(matches!(
            f.lifecycle.get_ticket(&ticket.id, &operator("op-1")),
            Err(QueueError::Forbidden(_))
        ));

        f.lifecycle.start(&ticket.id, &operator("op-1")).unwrap();
        let detail = f
            .lifecycle
            .get_ticket(&ticket.id, &operator("op-1"))
            .unwrap();
        assert_eq!(detail.operator, Some(UserSummary::unknown("op-1")));
    }

    #[test]
    fn test_find_by_ticket_number() {
        let f = fixture();
        let ticket = f.pending("v1");
        let op = operator("op-1");

        let found = f
            .lifecycle
            .find_by_ticket_number(&format!(" {} ", ticket.ticket_number), &op)
            .unwrap();
        assert_eq!(found.ticket.id, ticket.id);

        assert!(matches!(
            f.lifecycle.find_by_ticket_number("KS-20260310-999", &op),
            Err(QueueError::NotFound(_))
        ));
        assert!(matches!(
            f.lifecycle.find_by_ticket_number("  ", &op),
            Err(QueueError::Validation(ValidationError::MissingField(
                "ticket_number"
            )))
        ));
        for malformed in ["KS-001", "XX-20260310-001", "ks-20260310-001"] {
            assert!(matches!(
                f.lifecycle.find_by_ticket_number(malformed, &op),
                Err(QueueError::Validation(ValidationError::InvalidTicketNumber(_)))
            ));
        }
        assert!(matches!(
            f.lifecycle
                .find_by_ticket_number(&ticket.ticket_number, &visitor("v1")),
            Err(QueueError::Forbidden(_))
        ));
    }

    #[test]
    fn test_feedback_rules() {
        let f = fixture();
        let pending = f.pending("v1");
        let rate = |id: &str, actor: &Actor, rating: i64| {
            f.lifecycle.submit_feedback(
                id,
                actor,
                FeedbackInput {
                    rating: Some(rating),
                    comment: Some("  Helpful  ".to_string()),
                },
            )
        };

        assert!(matches!(
            rate(&pending.id, &visitor("v1"), 5),
            Err(QueueError::InvalidState {
                operation: "rate",
                ..
            })
        ));

        let done = f.done("v1");
        assert!(matches!(
            rate(&done.id, &visitor("v1"), 6),
            Err(QueueError::Validation(ValidationError::RatingOutOfRange(6)))
        ));
        assert!(matches!(
            rate(&done.id, &visitor("v2"), 4),
            Err(QueueError::Forbidden(_))
        ));

        let feedback = rate(&done.id, &visitor("v1"), 4).unwrap();
        assert_eq!(feedback.rating, 4);
        assert_eq!(feedback.comment.as_deref(), Some("Helpful"));

        assert!(matches!(
            rate(&done.id, &visitor("v1"), 3),
            Err(QueueError::AlreadyExists(_))
        ));

        let detail = f.lifecycle.get_ticket(&done.id, &visitor("v1")).unwrap();
        assert_eq!(detail.feedback.map(|fb| fb.rating), Some(4));
    }

    #[test]
    fn test_feedback_comment_limit() {
        let f = fixture();
        let done = f.done("v1");
        let err = f
            .lifecycle
            .submit_feedback(
                &done.id,
                &visitor("v1"),
                FeedbackInput {
                    rating: Some(5),
                    comment: Some("x".repeat(MAX_COMMENT_CHARS + 1)),
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            QueueError::Validation(ValidationError::CommentTooLong(_))
        ));

        let err = f
            .lifecycle
            .submit_feedback(&done.id, &visitor("v1"), FeedbackInput::default())
            .unwrap_err();
        assert!(matches!(
            err,
            QueueError::Validation(ValidationError::MissingField("rating"))
        ));
    }

    #[test]
    fn test_list_tickets_by_role() {
        let f = fixture();
        f.pending("v1");
        f.pending("v1");
        let other = f.pending("v2");
        f.lifecycle.start(&other.id, &operator("op-1")).unwrap();

        let mine = f
            .lifecycle
            .list_tickets(&visitor("v1"), ListQuery::default())
            .unwrap();
        assert_eq!(mine.total, 2);
        assert!(mine.tickets.iter().all(|t| t.owner_id == "v1"));
        assert!(mine.counts.is_none());

        let assigned = f
            .lifecycle
            .list_tickets(&operator("op-1"), ListQuery::default())
            .unwrap();
        assert_eq!(assigned.total, 1);
        assert_eq!(assigned.tickets[0].id, other.id);

        let all = f
            .lifecycle
            .list_tickets(
                &admin(),
                ListQuery {
                    status: Some(TicketStatus::Pending),
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(all.tickets.len(), 1);
        assert_eq!(all.total, 2);
        let counts = all.counts.unwrap();
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.on_process, 1);
    }

    #[test]
    fn test_list_rejects_bad_date_for_admin() {
        let f = fixture();
        let err = f
            .lifecycle
            .list_tickets(
                &admin(),
                ListQuery {
                    scheduled_date: Some("10-03-2026".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            QueueError::Validation(ValidationError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_transitions_are_audited() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(10);
        let store = Arc::new(SqliteTicketStore::in_memory().unwrap());
        let lifecycle = TicketLifecycle::new(store.clone(), Arc::new(SchedulingPolicy::default()))
            .with_audit(AuditHandle::new(tx));
        let f = Fixture { store, lifecycle };

        let ticket = f.pending("v1");
        f.lifecycle.start(&ticket.id, &operator("op-1")).unwrap();
        f.lifecycle.cancel(&ticket.id, &admin()).unwrap();

        assert_eq!(rx.try_recv().unwrap().event.event_type(), "ticket_started");
        match rx.try_recv().unwrap().event {
            AuditEvent::TicketCancelled {
                previous_status,
                actor_role,
                ..
            } => {
                assert_eq!(previous_status, TicketStatus::OnProcess);
                assert_eq!(actor_role, "ADMIN");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
