//! Store error types.

/// Errors from the relational store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database could not be reached (pool closed, timed out, I/O)
    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    /// A statement failed
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// A stored row could not be turned back into a record
    #[error("invalid {table} row {id}: {reason}")]
    InvalidRow {
        table: &'static str,
        id: i64,
        reason: String,
    },

    /// A review was submitted for a user that does not exist
    #[error("user {0} not found")]
    UserNotFound(i64),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err),
            other => StoreError::Query(other),
        }
    }
}
