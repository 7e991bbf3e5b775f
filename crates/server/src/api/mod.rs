pub mod audit;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod queue;
pub mod routes;
pub mod tickets;

pub use error::ApiError;
pub use routes::create_router;
