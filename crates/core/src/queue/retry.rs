//! Bounded retry for operations that race on the store.

use super::QueueError;
use crate::ticket::TicketError;

/// Outcome of one failed attempt.
pub(crate) enum Step {
    /// Lost a race; worth another attempt after re-reading.
    Conflict(TicketError),
    /// Final.
    Fail(QueueError),
}

impl Step {
    pub(crate) fn from_store(err: TicketError) -> Self {
        if err.is_retryable() {
            Step::Conflict(err)
        } else {
            Step::Fail(err.into())
        }
    }
}

impl From<QueueError> for Step {
    fn from(err: QueueError) -> Self {
        Step::Fail(err)
    }
}

/// Run `attempt` until it succeeds, fails for good, or `max_attempts` is
/// reached. Exhaustion yields `QueueError::Contention`.
pub(crate) fn retry_on_conflict<T>(
    max_attempts: u32,
    operation: &'static str,
    mut attempt: impl FnMut() -> Result<T, Step>,
) -> Result<T, QueueError> {
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        match attempt() {
            Ok(value) => return Ok(value),
            Err(Step::Fail(err)) => return Err(err),
            Err(Step::Conflict(err)) if attempts < max_attempts => {
                tracing::debug!(operation, attempts, error = %err, "Retrying after conflict");
            }
            Err(Step::Conflict(err)) => {
                tracing::warn!(operation, attempts, error = %err, "Giving up after repeated conflicts");
                return Err(QueueError::Contention {
                    operation,
                    attempts,
                });
            }
        }
    }
}
