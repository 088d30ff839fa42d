//! A thin, synchronous relational access layer.
//!
//! One [`ConnectionManager`] owns one connection; a [`TransactionalExecutor`]
//! runs CRUD, batch and transactional work over it; the builder functions
//! produce parameterized SQL with sanitized identifiers.
//!
//! ```
//! use txsql::{values, Comparator, Condition, ConnectionConfig, TransactionalExecutor};
//!
//! let mut db = TransactionalExecutor::new(ConnectionConfig::in_memory());
//! db.create("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", &[])?;
//! db.transaction(|tx| {
//!     tx.create("INSERT INTO t (id, name) VALUES (?, ?)", &values![1, "a"])?;
//!     tx.update("UPDATE t SET name = ? WHERE id = ?", &values!["b", 1])
//! })?;
//! let rows = db.select("t", &[Condition::and("id", Comparator::Eq, 1)], None::<&[&str]>)?;
//! assert_eq!(rows[0].get("name").and_then(|v| v.as_str()), Some("b"));
//! # Ok::<(), txsql::TxsqlError>(())
//! ```

// Core infrastructure modules
pub mod config;
pub mod core;

#[cfg(test)]
mod test_utils;

pub use crate::config::{load_config, BatchSettings, Config, ConnectionConfig};
pub use crate::core::db::*;
pub use crate::core::{ErrorKind, Result, TxsqlError};
