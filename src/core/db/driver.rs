/// Driver Contract Module
///
/// The blocking call contract the connection manager and executor rely on.
/// Any relational driver that implements these traits is substitutable; the
/// SQLite adapter in `sqlite.rs` is the one shipped with the crate.
///
/// Implementations map their native errors into [`TxsqlError`](crate::core::TxsqlError)
/// before returning: connect failures as `Connection`, statement failures as `Query`.
use crate::config::ConnectionConfig;
use crate::core::db::value::{Row, RowShape, Value};
use crate::core::Result;

/// Establishes physical connections from a [`ConnectionConfig`].
pub trait Connector {
    type Connection: DriverConnection;

    fn connect(&self, config: &ConnectionConfig) -> Result<Self::Connection>;
}

/// A live physical connection.
pub trait DriverConnection {
    /// Opens a cursor producing rows of the given shape.
    fn cursor(&mut self, shape: RowShape) -> Result<Box<dyn Cursor + '_>>;

    /// Starts an explicit transaction.
    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Liveness probe. Must not fail; an unreachable connection reports `false`.
    fn is_live(&mut self) -> bool;

    /// Whether the connection is in autocommit mode (no transaction open).
    fn autocommit(&self) -> bool;

    fn close(&mut self) -> Result<()>;
}

/// Executes statements and hands back their results.
pub trait Cursor {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()>;

    /// Executes `sql` once per parameter row.
    fn execute_many(&mut self, sql: &str, param_rows: &[Vec<Value>]) -> Result<()>;

    /// Returns all rows produced by the last `execute`.
    fn fetch_all(&mut self) -> Result<Vec<Row>>;

    /// Rows affected (or returned) by the last statement.
    fn row_count(&self) -> u64;

    fn close(&mut self);
}
