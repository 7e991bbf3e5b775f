//! Scheduling rules: office time zone, time slots and booking window.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeDelta, Utc};

use super::ValidationError;
use crate::config::{is_valid_slot, QueueConfig};

/// Scheduling rules derived from `[queue]` configuration.
#[derive(Debug, Clone)]
pub struct SchedulingPolicy {
    offset: FixedOffset,
    enforce_time_slots: bool,
    time_slots: Vec<String>,
    max_days_ahead: u32,
    allow_past_dates: bool,
    max_attempts: u32,
}

impl SchedulingPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600).unwrap_or(Utc.fix());
        Self {
            offset,
            enforce_time_slots: config.enforce_time_slots,
            time_slots: config.time_slots.clone(),
            max_days_ahead: config.max_days_ahead,
            allow_past_dates: config.allow_past_dates,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Attempts per operation when it hits a write conflict.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Office-local calendar date at `now`.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// `[start, end)` of an office-local day, in UTC.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let shift = TimeDelta::seconds(i64::from(self.offset.local_minus_utc()));
        let start = (date.and_time(NaiveTime::MIN) - shift).and_utc();
        (start, start + TimeDelta::days(1))
    }

    /// Parse a `YYYY-MM-DD` date.
    pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
        let value = value.trim();
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| ValidationError::InvalidDate(value.to_string()))
    }

    /// Check a requested visit against the booking window and time slots.
    pub fn check_schedule(
        &self,
        date: NaiveDate,
        time: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        let today = self.today(now);

        if !self.allow_past_dates && date < today {
            return Err(ValidationError::DateInPast { date, today });
        }

        if self.max_days_ahead > 0 {
            let limit = today + TimeDelta::days(i64::from(self.max_days_ahead));
            if date > limit {
                return Err(ValidationError::DateTooFar {
                    date,
                    max_days: self.max_days_ahead,
                });
            }
        }

        let accepted = if self.enforce_time_slots {
            self.time_slots.iter().any(|slot| slot == time)
        } else {
            is_valid_slot(time)
        };
        if !accepted {
            return Err(ValidationError::InvalidTimeSlot(time.to_string()));
        }

        Ok(())
    }
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}
