/// Connection Management Module
///
/// Owns the connection parameters and at most one live driver connection.
/// The connection is established lazily, liveness-checked before every use
/// and replaced wholesale (never patched) when the probe fails, unless a
/// transaction is open on it.

use crate::config::ConnectionConfig;
use crate::core::db::driver::{Connector, Cursor, DriverConnection};
use crate::core::db::sqlite::SqliteConnector;
use crate::core::db::value::RowShape;
use crate::core::{Result, TxsqlError};
use tracing::{debug, error, info, warn};

/// Connection manager for a single physical connection.
///
/// Not a pool: one manager holds one connection. Hosts that need
/// concurrency create one manager per worker.
pub struct ConnectionManager<C: Connector = SqliteConnector> {
    config: ConnectionConfig,
    connector: C,
    handle: Option<C::Connection>,
    /// Set between a successful `begin` and the matching commit or rollback
    in_transaction: bool,
}

/// Closes the wrapped cursor on every exit path, including panics.
struct CursorGuard<'c> {
    cursor: Box<dyn Cursor + 'c>,
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        self.cursor.close();
        debug!("Cursor closed");
    }
}

impl ConnectionManager<SqliteConnector> {
    /// Creates a manager for a SQLite database. No connection is opened yet.
    pub fn sqlite(config: ConnectionConfig) -> Self {
        ConnectionManager::new(config, SqliteConnector)
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a new connection manager. Connecting is deferred to first use.
    pub fn new(config: ConnectionConfig, connector: C) -> Self {
        ConnectionManager {
            config,
            connector,
            handle: None,
            in_transaction: false,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Checks whether a connection handle is currently held.
    ///
    /// This does not probe the server; see [`ensure_live`](Self::ensure_live).
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether a transaction started by [`begin`](Self::begin) is still open.
    ///
    /// A transaction the engine already ended on its own (the handle is back
    /// in autocommit mode) no longer counts.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction && !self.autocommit()
    }

    /// Establishes a connection, replacing any handle currently held.
    ///
    /// # Errors
    ///
    /// Returns `TxsqlError::Connection` on transport or authentication failure.
    pub fn open(&mut self) -> Result<&mut C::Connection> {
        self.discard_handle();
        let conn = self.connector.connect(&self.config)?;
        info!(host = %self.config.host, "Connection established");
        Ok(self.handle.insert(conn))
    }

    /// Returns the current handle if its liveness probe succeeds.
    ///
    /// A handle that fails the probe is replaced by exactly one reconnect
    /// attempt; if the new handle also fails the probe the call fails with
    /// `TxsqlError::Connection` instead of retrying again. With no handle
    /// held yet, this performs the initial (lazy) connect.
    ///
    /// While a transaction is open the handle is never replaced: a failed
    /// probe drops the dead handle (and the transaction with it) and fails
    /// with `TxsqlError::Connection`.
    pub fn ensure_live(&mut self) -> Result<&mut C::Connection> {
        if self.handle.is_none() {
            return self.open();
        }
        let live = self.handle.as_mut().map(|c| c.is_live()).unwrap_or(false);
        if !live && self.in_transaction() {
            error!(host = %self.config.host, "Connection lost inside a transaction");
            self.discard_handle();
            return Err(TxsqlError::Connection(
                "Connection lost during transaction; not reconnecting".to_string(),
            ));
        }
        if !live {
            warn!(host = %self.config.host, "Connection failed liveness check, reconnecting");
            let reconnected = self.open()?.is_live();
            if !reconnected {
                self.discard_handle();
                return Err(TxsqlError::Connection(
                    "Connection is not live after reconnect".to_string(),
                ));
            }
        }
        self.current()
    }

    /// Runs `f` with a cursor of the requested shape and closes the cursor
    /// afterwards, whether `f` succeeds, fails or panics.
    pub fn with_cursor<T, F>(&mut self, shape: RowShape, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Cursor) -> Result<T>,
    {
        let conn = self.ensure_live()?;
        let mut guard = CursorGuard {
            cursor: conn.cursor(shape)?,
        };
        debug!(shape = ?shape, "Cursor acquired");
        let result = f(guard.cursor.as_mut());
        drop(guard);
        result
    }

    /// Starts an explicit transaction on a live connection.
    pub fn begin(&mut self) -> Result<()> {
        self.ensure_live()?.begin()?;
        self.in_transaction = true;
        debug!("Transaction started");
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.current()?.commit()?;
        self.in_transaction = false;
        debug!("Committed");
        Ok(())
    }

    /// Rolls back the open transaction. With no handle held there is nothing
    /// left to roll back: a dropped connection takes its transaction with it.
    pub fn rollback(&mut self) -> Result<()> {
        let Some(conn) = self.handle.as_mut() else {
            debug!("No connection held, nothing to roll back");
            return Ok(());
        };
        conn.rollback()?;
        self.in_transaction = false;
        debug!("Rolled back");
        Ok(())
    }

    /// Autocommit mode of the current handle; `true` with no handle held.
    pub fn autocommit(&self) -> bool {
        self.handle.as_ref().map(|c| c.autocommit()).unwrap_or(true)
    }

    /// Closes the connection if one is held. Safe to call repeatedly and
    /// before any connection was opened.
    pub fn close(&mut self) {
        self.in_transaction = false;
        if let Some(mut conn) = self.handle.take() {
            match conn.close() {
                Ok(()) => info!(host = %self.config.host, "Connection closed"),
                Err(e) => warn!(error = %e, "Error while closing connection"),
            }
        }
    }

    fn current(&mut self) -> Result<&mut C::Connection> {
        self.handle
            .as_mut()
            .ok_or_else(|| TxsqlError::Connection("No open connection".to_string()))
    }

    fn discard_handle(&mut self) {
        self.in_transaction = false;
        if let Some(mut old) = self.handle.take() {
            if let Err(e) = old.close() {
                debug!(error = %e, "Ignoring close failure on discarded connection");
            }
        }
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.close();
    }
}
