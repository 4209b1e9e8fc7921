use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("no database session is bound to the current task")]
    NoCurrentSession,

    #[error("a database session is already bound to the current task")]
    SessionAlreadyOpen,

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("no active transaction")]
    NoActiveTransaction,

    #[error("transaction already active")]
    TransactionAlreadyActive,

    #[error("table '{0}' already exists")]
    TableExists(String),

    #[error("table '{0}' not found")]
    TableNotFound(String),

    #[error("column '{0}' not found in table '{1}'")]
    UnknownColumn(String, String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("row with key {0} not found in table '{1}'")]
    RowNotFound(String, String),

    #[error("connection pool timeout: no connections available")]
    PoolTimeout,

    #[error("invalid configuration: {0}")]
    ConfigError(String),

    #[error("lock error: {0}")]
    LockError(String),

    #[error("execution error: {0}")]
    ExecutionError(String),
}

pub type Result<T, E = DbError> = std::result::Result<T, E>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
