//! Ticket creation: queue number and ticket number assignment.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::retry::{retry_on_conflict, Step};
use super::{QueueError, SchedulingPolicy, ValidationError};
use crate::audit::{AuditEvent, AuditHandle};
use crate::auth::Actor;
use crate::qr::{QrEncoder, TicketQrPayload};
use crate::ticket::{CreateTicketRequest, ServiceType, Ticket, TicketStore};

/// Raw ticket request as submitted by a visitor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTicket {
    #[serde(default)]
    pub service_type: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub scheduled_date: Option<String>,
    /// `HH:MM`
    #[serde(default)]
    pub scheduled_time: Option<String>,
}

impl NewTicket {
    pub fn new(
        service_type: impl Into<String>,
        scheduled_date: impl Into<String>,
        scheduled_time: impl Into<String>,
    ) -> Self {
        Self {
            service_type: Some(service_type.into()),
            scheduled_date: Some(scheduled_date.into()),
            scheduled_time: Some(scheduled_time.into()),
        }
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTicket {
    pub service_type: ServiceType,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, ValidationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingField(field))
}

/// Assigns queue and ticket numbers and persists new tickets.
pub struct QueueSequencer {
    store: Arc<dyn TicketStore>,
    policy: Arc<SchedulingPolicy>,
    qr: Option<Arc<dyn QrEncoder>>,
    audit: AuditHandle,
}

impl QueueSequencer {
    pub fn new(store: Arc<dyn TicketStore>, policy: Arc<SchedulingPolicy>) -> Self {
        Self {
            store,
            policy,
            qr: None,
            audit: AuditHandle::disabled(),
        }
    }

    /// Attach a QR image to every new ticket.
    pub fn with_qr_encoder(mut self, qr: Arc<dyn QrEncoder>) -> Self {
        self.qr = Some(qr);
        self
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = audit;
        self
    }

    /// Check a raw request against the scheduling rules.
    pub fn validate(
        &self,
        request: &NewTicket,
        now: DateTime<Utc>,
    ) -> Result<ValidatedTicket, ValidationError> {
        let service_type = required(&request.service_type, "service_type")?;
        let scheduled_date = required(&request.scheduled_date, "scheduled_date")?;
        let scheduled_time = required(&request.scheduled_time, "scheduled_time")?;

        let service_type = service_type
            .parse::<ServiceType>()
            .map_err(|e| ValidationError::InvalidServiceType(e.0))?;
        let scheduled_date = SchedulingPolicy::parse_date(scheduled_date)?;
        self.policy
            .check_schedule(scheduled_date, scheduled_time, now)?;

        Ok(ValidatedTicket {
            service_type,
            scheduled_date,
            scheduled_time: scheduled_time.to_string(),
        })
    }

    /// Create a PENDING ticket for a visitor.
    ///
    /// The queue number is the next one for the scheduled date, shared by all
    /// service types. QR rendering failures are logged and leave `qr_code`
    /// empty.
    pub fn create_ticket(&self, actor: &Actor, request: NewTicket) -> Result<Ticket, QueueError> {
        let Actor::Visitor { id: owner_id } = actor else {
            return Err(QueueError::forbidden("Only visitors can create tickets"));
        };

        let validated = self.validate(&request, Utc::now())?;

        let result = retry_on_conflict(self.policy.max_attempts(), "create", || {
            self.store
                .create(CreateTicketRequest {
                    owner_id: owner_id.clone(),
                    service_type: validated.service_type,
                    scheduled_date: validated.scheduled_date,
                    scheduled_time: validated.scheduled_time.clone(),
                })
                .map_err(Step::from_store)
        });

        let mut ticket = match result {
            Ok(ticket) => ticket,
            Err(err) => {
                if let QueueError::Contention { attempts, .. } = err {
                    self.audit.try_emit(AuditEvent::TransitionConflict {
                        ticket_id: None,
                        operation: "create".to_string(),
                        user_id: owner_id.clone(),
                        attempts,
                    });
                }
                return Err(err);
            }
        };

        if let Some(qr_code) = self.render_qr(&ticket) {
            match self.store.attach_qr_code(&ticket.id, &qr_code) {
                Ok(()) => ticket.qr_code = Some(qr_code),
                Err(e) => warn!(ticket_id = %ticket.id, error = %e, "Failed to store QR code"),
            }
        }

        info!(
            ticket_id = %ticket.id,
            ticket_number = %ticket.ticket_number,
            queue_number = ticket.queue_number,
            owner_id = %ticket.owner_id,
            "Ticket created"
        );
        self.audit.try_emit(AuditEvent::ticket_created(&ticket));

        Ok(ticket)
    }

    fn render_qr(&self, ticket: &Ticket) -> Option<String> {
        let qr = self.qr.as_ref()?;
        let encoded = TicketQrPayload::from(ticket)
            .to_json()
            .and_then(|payload| qr.encode(&payload));
        match encoded {
            Ok(data_url) => Some(data_url),
            Err(e) => {
                warn!(ticket_number = %ticket.ticket_number, error = %e, "QR encoding failed");
                None
            }
        }
    }
}
