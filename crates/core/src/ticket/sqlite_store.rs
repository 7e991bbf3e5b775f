//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use super::number;
use super::{
    CreateFeedbackRequest, CreateTicketRequest, Feedback, Role, ServiceType, StatusCounts, Ticket,
    TicketError, TicketFilter, TicketStatus, TicketStore, UserProfile,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const TICKET_COLUMNS: &str = "id, ticket_number, owner_id, service_type, scheduled_date, \
     scheduled_time, queue_number, status, operator_id, qr_code, created_at, updated_at, \
     started_at, completed_at, cancelled_at";

/// Bumps the per-date counter and returns the new value. A missing row is
/// seeded from the highest queue number already stored for that date.
const NEXT_QUEUE_NUMBER_SQL: &str = r#"
    INSERT INTO queue_counters (scheduled_date, last_value)
    VALUES (?1, (SELECT COALESCE(MAX(queue_number), 0) + 1 FROM tickets WHERE scheduled_date = ?1))
    ON CONFLICT(scheduled_date) DO UPDATE SET last_value = last_value + 1
    RETURNING last_value
"#;

/// SQLite-backed ticket store.
///
/// Mutations run in `BEGIN IMMEDIATE` transactions, so writers are
/// serialized across every connection to the same database file.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TicketError> {
        Self::open(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a file-backed store with an explicit lock wait.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, TicketError> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.busy_timeout(busy_timeout).map_err(db_err)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY,
                ticket_number TEXT NOT NULL UNIQUE,
                owner_id TEXT NOT NULL,
                service_type TEXT NOT NULL,
                scheduled_date TEXT NOT NULL,
                scheduled_time TEXT NOT NULL,
                queue_number INTEGER NOT NULL CHECK (queue_number > 0),
                status TEXT NOT NULL
                    CHECK (status IN ('PENDING', 'ON_PROCESS', 'DONE', 'CANCELLED')),
                operator_id TEXT,
                qr_code TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                cancelled_at TEXT,
                UNIQUE (scheduled_date, queue_number)
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_owner ON tickets(owner_id);
            CREATE INDEX IF NOT EXISTS idx_tickets_operator ON tickets(operator_id);
            CREATE INDEX IF NOT EXISTS idx_tickets_status_date ON tickets(status, scheduled_date);

            -- One active ticket per operator.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_operator_active
                ON tickets(operator_id) WHERE status = 'ON_PROCESS';

            CREATE TABLE IF NOT EXISTS queue_counters (
                scheduled_date TEXT PRIMARY KEY,
                last_value INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                role TEXT NOT NULL,
                name TEXT,
                email TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS feedback (
                id TEXT PRIMARY KEY,
                ticket_id TEXT NOT NULL UNIQUE REFERENCES tickets(id),
                user_id TEXT NOT NULL,
                rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, TicketError> {
        self.conn
            .lock()
            .map_err(|_| TicketError::Database("connection mutex poisoned".to_string()))
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(service_type) = filter.service_type {
            conditions.push("service_type = ?");
            params.push(Box::new(service_type.as_str()));
        }

        if let Some(ref owner_id) = filter.owner_id {
            conditions.push("owner_id = ?");
            params.push(Box::new(owner_id.clone()));
        }

        if let Some(ref operator_id) = filter.operator_id {
            conditions.push("operator_id = ?");
            params.push(Box::new(operator_id.clone()));
        }

        if let Some(date) = filter.scheduled_date {
            conditions.push("scheduled_date = ?");
            params.push(Box::new(date.format(DATE_FORMAT).to_string()));
        }

        if let Some(from) = filter.completed_from {
            conditions.push("completed_at >= ?");
            params.push(Box::new(format_timestamp(&from)));
        }

        if let Some(to) = filter.completed_to {
            conditions.push("completed_at < ?");
            params.push(Box::new(format_timestamp(&to)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let service_type: String = row.get(3)?;
        let scheduled_date: String = row.get(4)?;
        let status: String = row.get(7)?;

        Ok(Ticket {
            id: row.get(0)?,
            ticket_number: row.get(1)?,
            owner_id: row.get(2)?,
            service_type: service_type
                .parse::<ServiceType>()
                .map_err(|e| conversion_error(3, e))?,
            scheduled_date: NaiveDate::parse_from_str(&scheduled_date, DATE_FORMAT)
                .map_err(|e| conversion_error(4, e))?,
            scheduled_time: row.get(5)?,
            queue_number: row.get(6)?,
            status: status
                .parse::<TicketStatus>()
                .map_err(|e| conversion_error(7, e))?,
            operator_id: row.get(8)?,
            qr_code: row.get(9)?,
            created_at: parse_timestamp(10, row.get(10)?)?,
            updated_at: parse_timestamp(11, row.get(11)?)?,
            started_at: parse_optional_timestamp(12, row.get(12)?)?,
            completed_at: parse_optional_timestamp(13, row.get(13)?)?,
            cancelled_at: parse_optional_timestamp(14, row.get(14)?)?,
        })
    }

    fn fetch(conn: &Connection, column: &str, value: &str) -> Result<Option<Ticket>, TicketError> {
        let sql = format!("SELECT {} FROM tickets WHERE {} = ?1", TICKET_COLUMNS, column);
        conn.query_row(&sql, params![value], Self::row_to_ticket)
            .optional()
            .map_err(db_err)
    }

    fn fetch_active(conn: &Connection, operator_id: &str) -> Result<Option<Ticket>, TicketError> {
        let sql = format!(
            "SELECT {} FROM tickets WHERE operator_id = ?1 AND status = 'ON_PROCESS' LIMIT 1",
            TICKET_COLUMNS
        );
        conn.query_row(&sql, params![operator_id], Self::row_to_ticket)
            .optional()
            .map_err(db_err)
    }

    /// Explains why a compare-and-swap update touched no rows.
    fn cas_failure(conn: &Connection, id: &str, expected: TicketStatus) -> TicketError {
        match Self::fetch(conn, "id", id) {
            Ok(Some(ticket)) => TicketError::StatusChanged {
                ticket_id: id.to_string(),
                expected,
                actual: ticket.status,
            },
            Ok(None) => TicketError::NotFound(id.to_string()),
            Err(e) => e,
        }
    }
}

impl TicketStore for SqliteTicketStore {
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(write_err)?;

        let date = request.scheduled_date.format(DATE_FORMAT).to_string();
        let queue_number: u32 = tx
            .query_row(NEXT_QUEUE_NUMBER_SQL, params![date], |row| row.get(0))
            .map_err(write_err)?;

        let ticket_number =
            number::compose(request.service_type, request.scheduled_date, queue_number);
        let id = uuid::Uuid::new_v4().to_string();
        let now = now();

        tx.execute(
            "INSERT INTO tickets (id, ticket_number, owner_id, service_type, scheduled_date, scheduled_time, queue_number, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'PENDING', ?8, ?8)",
            params![
                id,
                ticket_number,
                request.owner_id,
                request.service_type.as_str(),
                date,
                request.scheduled_time,
                queue_number,
                format_timestamp(&now),
            ],
        )
        .map_err(write_err)?;

        tx.commit().map_err(write_err)?;

        Ok(Ticket {
            id,
            ticket_number,
            owner_id: request.owner_id,
            service_type: request.service_type,
            scheduled_date: request.scheduled_date,
            scheduled_time: request.scheduled_time,
            queue_number,
            status: TicketStatus::Pending,
            operator_id: None,
            qr_code: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError> {
        let conn = self.lock()?;
        Self::fetch(&conn, "id", id)
    }

    fn get_by_number(&self, ticket_number: &str) -> Result<Option<Ticket>, TicketError> {
        let conn = self.lock()?;
        Self::fetch(&conn, "ticket_number", ticket_number)
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY {} LIMIT ? OFFSET ?",
            TICKET_COLUMNS,
            where_clause,
            filter.order.sql()
        );

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_ticket)
            .map_err(db_err)?;

        let mut tickets = Vec::new();
        for row_result in rows {
            tickets.push(row_result.map_err(db_err)?);
        }

        Ok(tickets)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(db_err)
    }

    fn count_by_status(&self, filter: &TicketFilter) -> Result<StatusCounts, TicketError> {
        let conn = self.lock()?;

        let mut filter = filter.clone();
        filter.status = None;
        let (where_clause, params) = Self::build_where_clause(&filter);
        let sql = format!(
            "SELECT status, COUNT(*) FROM tickets {} GROUP BY status",
            where_clause
        );
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((status, count))
            })
            .map_err(db_err)?;

        let mut counts = StatusCounts::default();
        for row_result in rows {
            let (status, count) = row_result.map_err(db_err)?;
            let status: TicketStatus = status.parse().map_err(TicketError::Database)?;
            counts.add(status, count);
        }

        Ok(counts)
    }

    fn active_for_operator(&self, operator_id: &str) -> Result<Option<Ticket>, TicketError> {
        let conn = self.lock()?;
        Self::fetch_active(&conn, operator_id)
    }

    fn start(&self, id: &str, operator_id: &str) -> Result<Ticket, TicketError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(write_err)?;

        let current =
            Self::fetch(&tx, "id", id)?.ok_or_else(|| TicketError::NotFound(id.to_string()))?;

        if current.status != TicketStatus::Pending {
            return Err(TicketError::StatusChanged {
                ticket_id: id.to_string(),
                expected: TicketStatus::Pending,
                actual: current.status,
            });
        }

        if let Some(active) = Self::fetch_active(&tx, operator_id)? {
            return Err(TicketError::OperatorBusy {
                operator_id: operator_id.to_string(),
                active_ticket_id: active.id,
                active_ticket_number: active.ticket_number,
            });
        }

        let now = now();
        let changed = tx
            .execute(
                "UPDATE tickets SET status = 'ON_PROCESS', operator_id = ?1, started_at = ?2, updated_at = ?2 WHERE id = ?3 AND status = 'PENDING'",
                params![operator_id, format_timestamp(&now), id],
            )
            .map_err(write_err)?;

        if changed != 1 {
            return Err(Self::cas_failure(&tx, id, TicketStatus::Pending));
        }

        tx.commit().map_err(write_err)?;

        Ok(Ticket {
            status: TicketStatus::OnProcess,
            operator_id: Some(operator_id.to_string()),
            started_at: Some(now),
            updated_at: now,
            ..current
        })
    }

    fn complete(&self, id: &str, operator_id: &str) -> Result<Ticket, TicketError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(write_err)?;

        let now = now();
        let changed = tx
            .execute(
                "UPDATE tickets SET status = 'DONE', completed_at = ?1, updated_at = ?1 WHERE id = ?2 AND status = 'ON_PROCESS' AND operator_id = ?3",
                params![format_timestamp(&now), id, operator_id],
            )
            .map_err(write_err)?;

        if changed != 1 {
            return Err(Self::cas_failure(&tx, id, TicketStatus::OnProcess));
        }

        let ticket =
            Self::fetch(&tx, "id", id)?.ok_or_else(|| TicketError::NotFound(id.to_string()))?;
        tx.commit().map_err(write_err)?;

        Ok(ticket)
    }

    fn cancel(&self, id: &str, expected: TicketStatus) -> Result<Ticket, TicketError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(write_err)?;

        let now = now();
        let changed = tx
            .execute(
                "UPDATE tickets SET status = 'CANCELLED', cancelled_at = ?1, updated_at = ?1 WHERE id = ?2 AND status = ?3 AND status IN ('PENDING', 'ON_PROCESS')",
                params![format_timestamp(&now), id, expected.as_str()],
            )
            .map_err(write_err)?;

        if changed != 1 {
            return Err(Self::cas_failure(&tx, id, expected));
        }

        let ticket =
            Self::fetch(&tx, "id", id)?.ok_or_else(|| TicketError::NotFound(id.to_string()))?;
        tx.commit().map_err(write_err)?;

        Ok(ticket)
    }

    fn attach_qr_code(&self, id: &str, qr_code: &str) -> Result<(), TicketError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE tickets SET qr_code = ?1 WHERE id = ?2",
                params![qr_code, id],
            )
            .map_err(write_err)?;

        if changed == 0 {
            return Err(TicketError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn upsert_user(&self, profile: &UserProfile) -> Result<(), TicketError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO users (id, role, name, email, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                role = excluded.role,
                name = COALESCE(excluded.name, users.name),
                email = COALESCE(excluded.email, users.email),
                updated_at = excluded.updated_at
            "#,
            params![
                profile.id,
                profile.role.as_str(),
                profile.name,
                profile.email,
                format_timestamp(&now()),
            ],
        )
        .map_err(write_err)?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<UserProfile>, TicketError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, role, name, email FROM users WHERE id = ?1",
            params![id],
            |row| {
                let role: String = row.get(1)?;
                Ok(UserProfile {
                    id: row.get(0)?,
                    role: role.parse::<Role>().map_err(|e| conversion_error(1, e))?,
                    name: row.get(2)?,
                    email: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(db_err)
    }

    fn create_feedback(&self, request: CreateFeedbackRequest) -> Result<Feedback, TicketError> {
        let conn = self.lock()?;

        let feedback = Feedback {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_id: request.ticket_id,
            user_id: request.user_id,
            rating: request.rating,
            comment: request.comment,
            created_at: now(),
        };

        let result = conn.execute(
            "INSERT INTO feedback (id, ticket_id, user_id, rating, comment, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                feedback.id,
                feedback.ticket_id,
                feedback.user_id,
                feedback.rating,
                feedback.comment,
                format_timestamp(&feedback.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(feedback),
            Err(e) if extended_code(&e) == Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                Err(TicketError::FeedbackExists(feedback.ticket_id))
            }
            Err(e) if extended_code(&e) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                Err(TicketError::NotFound(feedback.ticket_id))
            }
            Err(e) => Err(write_err(e)),
        }
    }

    fn get_feedback(&self, ticket_id: &str) -> Result<Option<Feedback>, TicketError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, ticket_id, user_id, rating, comment, created_at FROM feedback WHERE ticket_id = ?1",
            params![ticket_id],
            |row| {
                Ok(Feedback {
                    id: row.get(0)?,
                    ticket_id: row.get(1)?,
                    user_id: row.get(2)?,
                    rating: row.get(3)?,
                    comment: row.get(4)?,
                    created_at: parse_timestamp(5, row.get(5)?)?,
                })
            },
        )
        .optional()
        .map_err(db_err)
    }
}

fn db_err(e: rusqlite::Error) -> TicketError {
    TicketError::Database(e.to_string())
}

fn extended_code(e: &rusqlite::Error) -> Option<i32> {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => Some(err.extended_code),
        _ => None,
    }
}

/// Like `db_err`, but reports uniqueness violations and lock timeouts as
/// retryable conflicts.
fn write_err(e: rusqlite::Error) -> TicketError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || err.code == ErrorCode::DatabaseBusy
                || err.code == ErrorCode::DatabaseLocked =>
        {
            TicketError::Conflict(e.to_string())
        }
        _ => TicketError::Database(e.to_string()),
    }
}

/// Current time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width UTC timestamps, so they sort correctly as text.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, err.into())
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_optional_timestamp(
    idx: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(idx, v)).transpose()
}
