//! Error types for the reservation engine

use thiserror::Error;

/// Result type for reservation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reservation engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Database error (sqlx). Transactions roll back fully; the caller
    /// may retry verbatim since the diff is recomputed from fresh state.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Some requested books have no available stock. Nothing was mutated.
    #[error("out of stock: books {book_ids:?}")]
    OutOfStock {
        /// The offending book ids
        book_ids: Vec<i64>,
    },

    /// No cart exists for the user
    #[error("cart not found for user {0}")]
    CartNotFound(i64),

    /// Malformed input, rejected before any transaction opens
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Stable slug for transport-layer error mapping.
    pub fn slug(&self) -> &'static str {
        match self {
            Error::Database(_) | Error::Migrate(_) => "internal",
            Error::OutOfStock { .. } => "out-of-stock",
            Error::CartNotFound(_) => "not-found",
            Error::Validation(_) => "invalid-request",
            Error::Config(_) => "invalid-config",
        }
    }

    /// True when the caller may safely retry the operation verbatim.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Database(_))
    }
}
