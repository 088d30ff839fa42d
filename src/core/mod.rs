/// Core Module for txsql
///
/// Shared infrastructure: the database access layer and the error taxonomy.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{ErrorKind, Result, TxsqlError};
