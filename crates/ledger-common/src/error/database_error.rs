//! Database connection/query/transaction errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("transaction failed: {message}")]
    TransactionFailed { message: String },

    #[error("migration failed: {version}")]
    MigrationFailed { version: String },

    #[error("constraint violation: {constraint}")]
    ConstraintViolation { constraint: String },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
}
