//! Resume API crate - axum HTTP server and route handlers.
//!
//! Exposes document upload and similarity search over the resume index,
//! plus health and store statistics.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
