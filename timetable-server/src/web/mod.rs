//! Web layer for the timetable server.
//!
//! Thin axum wiring over [`CachedTimetable`](crate::timetable::CachedTimetable)
//! and the review store.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, DATA_SOURCE_HEADER, create_router};
pub use state::AppState;
