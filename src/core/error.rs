/// Txsql Error Module
///
/// This module defines the closed error taxonomy for the access layer.
/// Driver-native errors are mapped into these variants once, inside the
/// driver adapter, so the connection manager and executor never inspect
/// engine-specific error types.
use thiserror::Error;

/// Error type for every fallible operation in txsql.
///
/// The variants cover:
/// - Connecting and reconnecting to the database
/// - Statement execution against a live connection
/// - Local validation of identifiers and arguments
/// - Batch and transaction failures, which keep their cause attached
/// - Configuration loading
#[derive(Error, Debug)]
pub enum TxsqlError {
    /// Connect or reconnect failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement failed against a live connection
    #[error("Query error: {0}")]
    Query(String),

    /// Caller-supplied identifiers or arguments were rejected locally
    #[error("Validation error: {0}")]
    Validation(String),

    /// A chunk within a batch failed; the batch was rolled back as a unit
    #[error("Batch error: {message}: {source}")]
    Batch {
        message: String,
        #[source]
        source: Box<TxsqlError>,
    },

    /// Rollback (or the closing commit) of a transaction failed
    #[error("Transaction error: {message}")]
    Transaction {
        message: String,
        #[source]
        source: Option<Box<TxsqlError>>,
    },

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failures raised by application code running inside a transaction scope
    #[error("Application error: {0}")]
    App(String),
}

/// Closed classification of [`TxsqlError`] variants.
///
/// Rollback trigger sets are expressed in terms of this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    Connection,
    Query,
    Validation,
    Batch,
    Transaction,
    Config,
    Io,
    App,
}

impl TxsqlError {
    /// Create a batch error wrapping the failing chunk's cause.
    pub fn batch(message: impl Into<String>, source: TxsqlError) -> Self {
        Self::Batch {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Create a transaction error, optionally wrapping the failure that caused it.
    pub fn transaction(message: impl Into<String>, source: Option<TxsqlError>) -> Self {
        Self::Transaction {
            message: message.into(),
            source: source.map(Box::new),
        }
    }

    /// Create an application error for use inside transaction blocks.
    pub fn app(message: impl Into<String>) -> Self {
        Self::App(message.into())
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) => ErrorKind::Connection,
            Self::Query(_) => ErrorKind::Query,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Batch { .. } => ErrorKind::Batch,
            Self::Transaction { .. } => ErrorKind::Transaction,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::App(_) => ErrorKind::App,
        }
    }
}

/// Type alias for Result to use TxsqlError as the error type.
pub type Result<T> = std::result::Result<T, TxsqlError>;
