//! Queue operations: numbering, transitions and queue views.

mod board;
mod error;
mod lifecycle;
mod policy;
mod retry;
mod sequencer;

pub use board::{BoardEntry, DisplayBoard, OperatorQueue, QueueBoard};
pub use error::{QueueError, ValidationError};
pub use lifecycle::{FeedbackInput, ListQuery, TicketLifecycle, TicketList, MAX_COMMENT_CHARS};
pub use policy::SchedulingPolicy;
pub use sequencer::{NewTicket, QueueSequencer, ValidatedTicket};
