//! Error types for pgcompose

use crate::shape::ResultMode;
use thiserror::Error;

/// Result type alias for pgcompose operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for statement building and execution.
///
/// Variants fall into three groups:
/// - build-time errors, raised while compiling a statement and always before
///   anything is sent to the database (see [`DbError::is_build_error`]);
/// - execution errors, passed through from the executor;
/// - shape-mismatch errors, detected while reshaping returned rows.
#[derive(Debug, Error)]
pub enum DbError {
    /// A self reference was used outside a whereable entry or an assignment
    #[error("Unresolved self reference: no column is being compared here")]
    UnresolvedSelf,

    /// A parent reference could not be resolved against the alias chain
    #[error("Unresolved parent reference to '{column}' ({levels} level(s) up): not inside a lateral subquery that deep")]
    UnresolvedParent { column: String, levels: usize },

    /// A row-shaped statement was embedded where a scalar value is expected
    #[error("Nested statement must produce a column value, got {0:?} mode")]
    NonScalarNested(ResultMode),

    /// Malformed range arguments
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Upsert without any conflict target column
    #[error("Upsert requires at least one conflict target column")]
    EmptyConflictTarget,

    /// Table not present in the schema descriptor
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Column not present in the schema descriptor
    #[error("Unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Returned rows do not fit the declared result mode
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl DbError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a shape-mismatch error
    pub fn shape_mismatch(message: impl Into<String>) -> Self {
        Self::ShapeMismatch(message.into())
    }

    /// Check if this error was raised while building a statement.
    ///
    /// Build errors never reach the database.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedSelf
                | Self::UnresolvedParent { .. }
                | Self::NonScalarNested(_)
                | Self::InvalidRange(_)
                | Self::EmptyConflictTarget
                | Self::UnknownTable(_)
                | Self::UnknownColumn { .. }
                | Self::Validation(_)
        )
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a shape-mismatch error
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::ShapeMismatch(_))
    }

    /// Parse a tokio_postgres error into a more specific DbError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for DbError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
