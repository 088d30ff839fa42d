/// SQLite Driver Adapter
///
/// Implements the driver contract on top of `rusqlite`. This is the only
/// place where `rusqlite::Error` is seen; every failure leaves here as a
/// [`TxsqlError`].
use crate::config::ConnectionConfig;
use crate::core::db::driver::{Connector, Cursor, DriverConnection};
use crate::core::db::value::{Row, RowShape, Value};
use crate::core::{Result, TxsqlError};
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info, warn};

fn query_error(e: rusqlite::Error) -> TxsqlError {
    TxsqlError::Query(e.to_string())
}

/// Opens SQLite connections; `host`, `username` and `password` are accepted
/// for contract compatibility and not used by the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

impl Connector for SqliteConnector {
    type Connection = SqliteConnection;

    fn connect(&self, config: &ConnectionConfig) -> Result<SqliteConnection> {
        let path = config.database();
        let conn = Connection::open(path).map_err(|e| {
            TxsqlError::Connection(format!("Failed to connect to SQLite database '{}': {}", path, e))
        })?;

        if let Some(timeout) = config.busy_timeout()? {
            conn.busy_timeout(timeout)
                .map_err(|e| TxsqlError::Connection(format!("Failed to set busy timeout: {}", e)))?;
        }
        if let Some(enabled) = config.foreign_keys()? {
            let pragma = if enabled { "PRAGMA foreign_keys = ON;" } else { "PRAGMA foreign_keys = OFF;" };
            conn.execute_batch(pragma)
                .map_err(|e| TxsqlError::Connection(format!("Failed to configure connection: {}", e)))?;
        }

        info!(database = %path, "Connected to SQLite database");
        Ok(SqliteConnection { conn: Some(conn) })
    }
}

/// A single SQLite connection. `None` once closed.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: Option<Connection>,
}

impl SqliteConnection {
    fn inner(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| TxsqlError::Connection("Connection is closed".to_string()))
    }
}

impl DriverConnection for SqliteConnection {
    fn cursor(&mut self, shape: RowShape) -> Result<Box<dyn Cursor + '_>> {
        let conn = self.inner()?;
        Ok(Box::new(SqliteCursor {
            conn,
            shape,
            rows: Vec::new(),
            row_count: 0,
        }))
    }

    fn begin(&mut self) -> Result<()> {
        self.inner()?.execute_batch("BEGIN").map_err(query_error)
    }

    // SQLite in autocommit mode has nothing pending, so commit and rollback are no-ops there.
    fn commit(&mut self) -> Result<()> {
        let conn = self.inner()?;
        if conn.is_autocommit() {
            return Ok(());
        }
        conn.execute_batch("COMMIT").map_err(query_error)
    }

    fn rollback(&mut self) -> Result<()> {
        let conn = self.inner()?;
        if conn.is_autocommit() {
            return Ok(());
        }
        conn.execute_batch("ROLLBACK").map_err(query_error)
    }

    fn is_live(&mut self) -> bool {
        match &self.conn {
            Some(conn) => conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok(),
            None => false,
        }
    }

    fn autocommit(&self) -> bool {
        self.conn.as_ref().map(Connection::is_autocommit).unwrap_or(true)
    }

    fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(conn, e)| {
                warn!(error = %e, "SQLite connection did not close cleanly");
                drop(conn);
                TxsqlError::Connection(format!("Failed to close connection: {}", e))
            }),
            None => Ok(()),
        }
    }
}

/// Cursor over a borrowed SQLite connection. Result rows are buffered at
/// execute time and handed out by `fetch_all`.
pub struct SqliteCursor<'c> {
    conn: &'c Connection,
    shape: RowShape,
    rows: Vec<Row>,
    row_count: u64,
}

impl Cursor for SqliteCursor<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        debug!(sql = %sql, params = params.len(), "Executing statement");
        let mut stmt = self.conn.prepare(sql).map_err(query_error)?;
        self.rows.clear();

        if stmt.column_count() == 0 {
            let changed = stmt.execute(params_from_iter(params.iter())).map_err(query_error)?;
            self.row_count = changed as u64;
            return Ok(());
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(params.iter())).map_err(query_error)?;
        while let Some(row) = rows.next().map_err(query_error)? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(Value::from(row.get_ref(i).map_err(query_error)?));
            }
            self.rows.push(Row::shaped(self.shape, &columns, values));
        }
        self.row_count = self.rows.len() as u64;
        Ok(())
    }

    fn execute_many(&mut self, sql: &str, param_rows: &[Vec<Value>]) -> Result<()> {
        debug!(sql = %sql, rows = param_rows.len(), "Executing statement for many rows");
        let mut stmt = self.conn.prepare(sql).map_err(query_error)?;
        self.rows.clear();

        let mut total = 0u64;
        for params in param_rows {
            total += stmt.execute(params_from_iter(params.iter())).map_err(query_error)? as u64;
        }
        self.row_count = total;
        Ok(())
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>> {
        Ok(std::mem::take(&mut self.rows))
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn close(&mut self) {
        self.rows.clear();
    }
}
