//! Core ticket data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Service Types
// ============================================================================

/// Statistics-office service a visitor can queue for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    /// Consultation about statistical data and methodology.
    KonsultasiStatistik,
    /// Purchase of micro data for research.
    PenjualanDataMikro,
    /// Access to the statistics library collection.
    PerpustakaanStatistik,
    /// Recommendation letter for a statistical activity.
    RekomendasiKegiatanStatistik,
}

impl ServiceType {
    /// All service types, in display order.
    pub const ALL: [ServiceType; 4] = [
        ServiceType::KonsultasiStatistik,
        ServiceType::PenjualanDataMikro,
        ServiceType::PerpustakaanStatistik,
        ServiceType::RekomendasiKegiatanStatistik,
    ];

    /// Two-letter code used as the ticket number prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            ServiceType::KonsultasiStatistik => "KS",
            ServiceType::PenjualanDataMikro => "DM",
            ServiceType::PerpustakaanStatistik => "PS",
            ServiceType::RekomendasiKegiatanStatistik => "RK",
        }
    }

    /// Wire representation (also the stored column value).
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::KonsultasiStatistik => "KONSULTASI_STATISTIK",
            ServiceType::PenjualanDataMikro => "PENJUALAN_DATA_MIKRO",
            ServiceType::PerpustakaanStatistik => "PERPUSTAKAAN_STATISTIK",
            ServiceType::RekomendasiKegiatanStatistik => "REKOMENDASI_KEGIATAN_STATISTIK",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceType::KonsultasiStatistik => "Konsultasi Statistik",
            ServiceType::PenjualanDataMikro => "Penjualan Data Mikro",
            ServiceType::PerpustakaanStatistik => "Perpustakaan Statistik",
            ServiceType::RekomendasiKegiatanStatistik => "Rekomendasi Kegiatan Statistik",
        }
    }

    /// Look up a service type by its ticket number prefix.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.prefix() == prefix)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known service type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownServiceType(pub String);

impl fmt::Display for UnknownServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown service type: {}", self.0)
    }
}

impl std::error::Error for UnknownServiceType {}

impl FromStr for ServiceType {
    type Err = UnknownServiceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownServiceType(s.to_string()))
    }
}

// ============================================================================
// Ticket Status
// ============================================================================

/// Lifecycle status of a ticket.
///
/// ```text
/// Pending --start--> OnProcess --complete--> Done
///    |                   |
///    +------cancel-------+-----> Cancelled
/// ```
///
/// `Done` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Waiting in the queue.
    Pending,
    /// Being served by an operator.
    OnProcess,
    /// Served (terminal).
    Done,
    /// Cancelled by the owner or an admin (terminal).
    Cancelled,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Pending,
        TicketStatus::OnProcess,
        TicketStatus::Done,
        TicketStatus::Cancelled,
    ];

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Done | TicketStatus::Cancelled)
    }

    /// Returns the status as stored in the database and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "PENDING",
            TicketStatus::OnProcess => "ON_PROCESS",
            TicketStatus::Done => "DONE",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown ticket status: {}", s))
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// A single visit request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Unique identifier (UUID).
    pub id: String,

    /// Human-readable `PREFIX-YYYYMMDD-SEQ` identifier, globally unique.
    pub ticket_number: String,

    /// Visitor who requested the ticket. Never changes.
    pub owner_id: String,

    pub service_type: ServiceType,

    pub scheduled_date: NaiveDate,

    /// Time slot, e.g. "08:30".
    pub scheduled_time: String,

    /// Position within `scheduled_date`, starting at 1.
    pub queue_number: u32,

    pub status: TicketStatus,

    /// Operator who claimed the ticket. Set on start and kept afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<String>,

    /// QR image as a data URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Returns true if the given user owns this ticket.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// Returns true if the given operator claimed this ticket.
    pub fn is_assigned_to(&self, operator_id: &str) -> bool {
        self.operator_id.as_deref() == Some(operator_id)
    }

    /// Checks that the lifecycle timestamps match the status.
    ///
    /// Pending has none, OnProcess only `started_at`, Done `started_at` and
    /// `completed_at`, Cancelled has `cancelled_at` (plus `started_at` when it
    /// was cancelled while being served).
    pub fn timestamps_consistent(&self) -> bool {
        match self.status {
            TicketStatus::Pending => {
                self.started_at.is_none()
                    && self.completed_at.is_none()
                    && self.cancelled_at.is_none()
                    && self.operator_id.is_none()
            }
            TicketStatus::OnProcess => {
                self.started_at.is_some()
                    && self.completed_at.is_none()
                    && self.cancelled_at.is_none()
                    && self.operator_id.is_some()
            }
            TicketStatus::Done => {
                self.started_at.is_some()
                    && self.completed_at.is_some()
                    && self.cancelled_at.is_none()
            }
            TicketStatus::Cancelled => {
                self.cancelled_at.is_some()
                    && self.completed_at.is_none()
                    && self.started_at.is_some() == self.operator_id.is_some()
            }
        }
    }

    /// Seconds between start and completion, if both are set.
    pub fn service_duration_secs(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }
}

// ============================================================================
// Users and Feedback
// ============================================================================

/// Role supplied by the session provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Visitor,
    Operator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Visitor => "VISITOR",
            Role::Operator => "OPERATOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VISITOR" => Ok(Role::Visitor),
            "OPERATOR" => Ok(Role::Operator),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile cached from the session provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Minimal user info attached to ticket details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserSummary {
    /// Summary for a user we have no profile for.
    pub fn unknown(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
        }
    }
}

impl From<UserProfile> for UserSummary {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            name: profile.name,
            email: profile.email,
        }
    }
}

/// Visitor feedback on a completed ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    pub id: String,
    pub ticket_id: String,
    pub user_id: String,
    /// 1 to 5.
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ticket enriched with owner, operator and feedback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub owner: UserSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_ticket() -> Ticket {
        let now = Utc::now();
        Ticket {
            id: "t-1".to_string(),
            ticket_number: "KS-20260310-001".to_string(),
            owner_id: "visitor-1".to_string(),
            service_type: ServiceType::KonsultasiStatistik,
            scheduled_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            scheduled_time: "08:00".to_string(),
            queue_number: 1,
            status: TicketStatus::Pending,
            operator_id: None,
            qr_code: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn test_service_prefixes() {
        assert_eq!(ServiceType::KonsultasiStatistik.prefix(), "KS");
        assert_eq!(ServiceType::PenjualanDataMikro.prefix(), "DM");
        assert_eq!(ServiceType::PerpustakaanStatistik.prefix(), "PS");
        assert_eq!(ServiceType::RekomendasiKegiatanStatistik.prefix(), "RK");
    }

    #[test]
    fn test_service_type_from_str() {
        assert_eq!(
            "PENJUALAN_DATA_MIKRO".parse::<ServiceType>().unwrap(),
            ServiceType::PenjualanDataMikro
        );
        let err = "PIZZA_DELIVERY".parse::<ServiceType>().unwrap_err();
        assert_eq!(err.0, "PIZZA_DELIVERY");
    }

    #[test]
    fn test_service_type_from_prefix() {
        assert_eq!(
            ServiceType::from_prefix("RK"),
            Some(ServiceType::RekomendasiKegiatanStatistik)
        );
        assert_eq!(ServiceType::from_prefix("XX"), None);
    }

    #[test]
    fn test_service_type_serialization() {
        let json = serde_json::to_string(&ServiceType::PerpustakaanStatistik).unwrap();
        assert_eq!(json, "\"PERPUSTAKAAN_STATISTIK\"");
    }

    #[test]
    fn test_status_terminal() {
        assert!(!TicketStatus::Pending.is_terminal());
        assert!(!TicketStatus::OnProcess.is_terminal());
        assert!(TicketStatus::Done.is_terminal());
        assert!(TicketStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_strings_round_trip() {
        for status in TicketStatus::ALL {
            assert_eq!(status.as_str().parse::<TicketStatus>().unwrap(), status);
        }
        assert!("WAITING".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TicketStatus::OnProcess).unwrap();
        assert_eq!(json, "\"ON_PROCESS\"");
    }

    #[test]
    fn test_role_parsing_is_case_insensitive() {
        assert_eq!("operator".parse::<Role>().unwrap(), Role::Operator);
        assert_eq!(" ADMIN ".parse::<Role>().unwrap(), Role::Admin);
        assert!("guest".parse::<Role>().is_err());
    }

    #[test]
    fn test_pending_timestamps_consistent() {
        let ticket = pending_ticket();
        assert!(ticket.timestamps_consistent());
    }

    #[test]
    fn test_on_process_without_started_at_is_inconsistent() {
        let mut ticket = pending_ticket();
        ticket.status = TicketStatus::OnProcess;
        ticket.operator_id = Some("op-1".to_string());
        assert!(!ticket.timestamps_consistent());

        ticket.started_at = Some(Utc::now());
        assert!(ticket.timestamps_consistent());
    }

    #[test]
    fn test_service_duration() {
        let mut ticket = pending_ticket();
        assert_eq!(ticket.service_duration_secs(), None);

        let start = Utc::now();
        ticket.started_at = Some(start);
        ticket.completed_at = Some(start + chrono::Duration::seconds(90));
        assert_eq!(ticket.service_duration_secs(), Some(90));
    }

    #[test]
    fn test_ownership_helpers() {
        let mut ticket = pending_ticket();
        assert!(ticket.is_owned_by("visitor-1"));
        assert!(!ticket.is_assigned_to("op-1"));
        ticket.operator_id = Some("op-1".to_string());
        assert!(ticket.is_assigned_to("op-1"));
    }

    #[test]
    fn test_ticket_serialization_skips_empty_timestamps() {
        let ticket = pending_ticket();
        let json = serde_json::to_value(&ticket).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["scheduled_date"], "2026-03-10");
        assert!(json.get("started_at").is_none());
        assert!(json.get("operator_id").is_none());
    }

    #[test]
    fn test_ticket_detail_flattens_ticket() {
        let detail = TicketDetail {
            ticket: pending_ticket(),
            owner: UserSummary::unknown("visitor-1"),
            operator: None,
            feedback: None,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["ticket_number"], "KS-20260310-001");
        assert_eq!(json["owner"]["id"], "visitor-1");
    }
}
