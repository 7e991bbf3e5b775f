pub mod audit;
pub mod auth;
pub mod config;
pub mod qr;
pub mod queue;
pub mod testing;
pub mod ticket;

pub use auth::{
    create_authenticator, Actor, AuthError, AuthRequest, Authenticator, Identity,
    TrustedHeaderAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use queue::{
    QueueBoard, QueueError, QueueSequencer, SchedulingPolicy, TicketLifecycle, ValidationError,
};
pub use ticket::{SqliteTicketStore, Ticket, TicketStatus, TicketStore};
