//! Tickets: data model, numbering and storage.

pub mod number;
mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteTicketStore;
pub use store::{
    CreateFeedbackRequest, CreateTicketRequest, StatusCounts, TicketError, TicketFilter,
    TicketOrder, TicketStore,
};
pub use types::{
    Feedback, Role, ServiceType, Ticket, TicketDetail, TicketStatus, UnknownServiceType,
    UserProfile, UserSummary,
};
