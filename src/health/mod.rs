//! Health and queue-depth HTTP reporting.

pub mod routes;

pub use routes::{build_router, AppState};
