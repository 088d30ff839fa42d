/// Transactional Execution Module
///
/// CRUD primitives, chunked batch insert/update, and an explicit,
/// non-reentrant transaction scope, all running against the single
/// connection owned by a [`ConnectionManager`].

use crate::config::{BatchSettings, ConnectionConfig, DEFAULT_CHUNK_SIZE};
use crate::core::db::builder::{self, Condition, Upsert};
use crate::core::db::connection::ConnectionManager;
use crate::core::db::driver::{Connector, Cursor};
use crate::core::db::sqlite::SqliteConnector;
use crate::core::db::value::{BatchRow, Row, RowShape, Value};
use crate::core::{ErrorKind, Result, TxsqlError};
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, warn};

/// Lifecycle of the executor's transaction scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// No scope has run yet, or the last one ended without commit or rollback
    #[default]
    Idle,
    /// A scope is running
    Open,
    Committed,
    RolledBack,
    /// The closing rollback itself failed; the connection state is unknown
    Failed,
}

/// Failure kinds that make a transaction scope roll back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RollbackOn {
    #[default]
    All,
    Kinds(BTreeSet<ErrorKind>),
}

impl RollbackOn {
    pub fn kinds(kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        RollbackOn::Kinds(kinds.into_iter().collect())
    }

    pub fn triggers(&self, kind: ErrorKind) -> bool {
        match self {
            RollbackOn::All => true,
            RollbackOn::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

/// Options for [`TransactionalExecutor::batch_insert`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    pub chunk_size: usize,
    pub upsert: bool,
    /// Columns refreshed on conflict when `upsert` is set; `None` means all inserted columns
    pub upsert_columns: Option<Vec<String>>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            chunk_size: DEFAULT_CHUNK_SIZE,
            upsert: false,
            upsert_columns: None,
        }
    }
}

impl BatchOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn upsert(mut self, columns: Option<Vec<String>>) -> Self {
        self.upsert = true;
        self.upsert_columns = columns;
        self
    }
}

impl From<&BatchSettings> for BatchOptions {
    fn from(settings: &BatchSettings) -> Self {
        BatchOptions::default().with_chunk_size(settings.chunk_size())
    }
}

/// Executes statements over one managed connection.
///
/// Write operations commit on their own unless a transaction scope is open,
/// in which case the scope owns the commit.
#[derive(Debug)]
pub struct TransactionalExecutor<C: Connector = SqliteConnector> {
    manager: ConnectionManager<C>,
    state: TransactionState,
}

impl TransactionalExecutor<SqliteConnector> {
    /// Creates an executor over a SQLite database. Connecting is deferred to first use.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::from_manager(ConnectionManager::sqlite(config))
    }
}

fn driver_message(e: &TxsqlError) -> String {
    match e {
        TxsqlError::Query(msg) => msg.clone(),
        other => other.to_string(),
    }
}

fn check_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(TxsqlError::Validation("chunk size must be at least 1".to_string()));
    }
    Ok(())
}

fn check_arity(rows: &[BatchRow], expected: usize) -> Result<()> {
    match rows.iter().position(|row| row.len() != expected) {
        Some(i) => Err(TxsqlError::Validation(format!(
            "row {} has {} values, expected {}",
            i,
            rows[i].len(),
            expected
        ))),
        None => Ok(()),
    }
}

impl<C: Connector> TransactionalExecutor<C> {
    pub fn with_connector(config: ConnectionConfig, connector: C) -> Self {
        Self::from_manager(ConnectionManager::new(config, connector))
    }

    pub fn from_manager(manager: ConnectionManager<C>) -> Self {
        TransactionalExecutor {
            manager,
            state: TransactionState::default(),
        }
    }

    pub fn manager(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ConnectionManager<C> {
        &mut self.manager
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.state
    }

    pub fn in_transaction(&self) -> bool {
        self.state == TransactionState::Open
    }

    /// Scoped cursor access; see [`ConnectionManager::with_cursor`].
    pub fn with_cursor<T, F>(&mut self, shape: RowShape, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Cursor) -> Result<T>,
    {
        self.manager.with_cursor(shape, f)
    }

    pub fn close(&mut self) {
        self.manager.close();
    }

    /// Executes `statement`; commits only when `values` are supplied.
    ///
    /// Parameterless statements are left uncommitted: DDL auto-commits at the
    /// engine level, while parameterless DML is the caller's to commit.
    pub fn create(&mut self, statement: &str, values: &[Value]) -> Result<u64> {
        let count = self.execute_counted(statement, values)?;
        if !values.is_empty() {
            self.commit_unless_scoped()?;
        }
        Ok(count)
    }

    /// Executes `statement` and fetches every row as a column mapping.
    ///
    /// # Errors
    ///
    /// Driver failures are wrapped in `TxsqlError::Query`; nothing is retried.
    pub fn read(&mut self, statement: &str, values: &[Value]) -> Result<Vec<Row>> {
        debug!(sql = %statement, params = values.len(), "Reading");
        self.manager.with_cursor(RowShape::Mapping, |cursor| {
            cursor
                .execute(statement, values)
                .and_then(|_| cursor.fetch_all())
                .map_err(|e| TxsqlError::Query(format!("Failed to read from database: {}", driver_message(&e))))
        })
    }

    /// Executes `statement`, commits, and returns the affected row count.
    pub fn update(&mut self, statement: &str, values: &[Value]) -> Result<u64> {
        let count = self.execute_counted(statement, values)?;
        self.commit_unless_scoped()?;
        Ok(count)
    }

    pub fn delete(&mut self, statement: &str, values: &[Value]) -> Result<u64> {
        let count = self.execute_counted(statement, values)?;
        self.commit_unless_scoped()?;
        Ok(count)
    }

    /// Inserts `rows` in chunks of `options.chunk_size` with one statement
    /// executed per chunk, committing once at the end.
    ///
    /// Identifiers are sanitized and validated before the connection is
    /// touched. Empty `rows` returns 0 without executing anything. A failing
    /// chunk rolls back the whole batch and surfaces as `TxsqlError::Batch`.
    pub fn batch_insert<S: AsRef<str>>(
        &mut self,
        table: &str,
        columns: &[S],
        rows: &[BatchRow],
        options: &BatchOptions,
    ) -> Result<u64> {
        let upsert = if options.upsert {
            Upsert::Update(options.upsert_columns.as_deref())
        } else {
            Upsert::Off
        };
        let sql = builder::build_batch_insert(table, columns, upsert)?;
        check_chunk_size(options.chunk_size)?;
        if rows.is_empty() {
            return Ok(0);
        }
        check_arity(rows, columns.len())?;

        self.run_batch(&sql, rows, options.chunk_size)
    }

    /// Updates in chunks with one `UPDATE ... SET ... WHERE ...` statement;
    /// each row carries the update values followed by the where values.
    pub fn batch_update<S: AsRef<str>, W: AsRef<str>>(
        &mut self,
        table: &str,
        update_columns: &[S],
        where_columns: &[W],
        rows: &[BatchRow],
        chunk_size: usize,
    ) -> Result<u64> {
        let sql = builder::build_batch_update(table, update_columns, where_columns)?;
        check_chunk_size(chunk_size)?;
        if rows.is_empty() {
            return Ok(0);
        }
        check_arity(rows, update_columns.len() + where_columns.len())?;

        self.run_batch(&sql, rows, chunk_size)
    }

    /// Runs `f` inside a transaction that rolls back on any failure.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.transaction_with(&RollbackOn::All, f)
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits when `f` succeeds. A failure whose kind is in `rollback_on`
    /// rolls back and is returned as-is. Any other failure still rolls back
    /// when the connection is not in autocommit mode. If a rollback fails,
    /// that failure is returned as `TxsqlError::Transaction` instead of the
    /// original one. Scopes do not nest: entering one while another is open
    /// fails with `TxsqlError::Transaction` without touching the connection.
    ///
    /// If `f` panics the transaction is rolled back and the panic resumes;
    /// the scope never stays open past this call.
    pub fn transaction_with<T, F>(&mut self, rollback_on: &RollbackOn, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        if self.in_transaction() {
            return Err(TxsqlError::transaction("Transaction already in progress", None));
        }

        self.manager.begin()?;
        self.state = TransactionState::Open;

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!("Transaction block panicked, rolling back");
                if let Err(e) = self.end_scope_with_rollback() {
                    error!(error = %e, "Rollback after panic failed");
                }
                panic::resume_unwind(payload);
            }
        };

        match outcome {
            Ok(value) => {
                if let Err(e) = self.manager.commit() {
                    error!(error = %e, "Commit failed, rolling back");
                    self.end_scope_with_rollback()?;
                    return Err(TxsqlError::transaction("Failed to commit transaction", Some(e)));
                }
                self.state = TransactionState::Committed;
                Ok(value)
            }
            Err(e) if rollback_on.triggers(e.kind()) => {
                debug!(error = %e, "Rolling back transaction");
                self.end_scope_with_rollback()?;
                Err(e)
            }
            Err(e) => {
                if self.manager.autocommit() {
                    self.state = TransactionState::Idle;
                } else {
                    warn!(error = %e, kind = ?e.kind(), "Non-triggering failure, rolling back open transaction");
                    self.end_scope_with_rollback()?;
                }
                Err(e)
            }
        }
    }

    /// Runs a SELECT built from `table`, `conditions` and `columns` (`None` selects all).
    pub fn select<S: AsRef<str>>(
        &mut self,
        table: &str,
        conditions: &[Condition],
        columns: Option<&[S]>,
    ) -> Result<Vec<Row>> {
        let stmt = builder::build_select(table, conditions, columns)?;
        self.read(&stmt.sql, &stmt.params)
    }

    /// Inserts one row from column/value pairs and commits.
    pub fn insert<K, V, I>(&mut self, table: &str, data: I) -> Result<u64>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let stmt = builder::build_insert(table, data)?;
        self.create(&stmt.sql, &stmt.params)
    }

    pub fn update_where<K, V, I>(&mut self, table: &str, set_values: I, conditions: &[Condition]) -> Result<u64>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let stmt = builder::build_update(table, set_values, conditions)?;
        self.update(&stmt.sql, &stmt.params)
    }

    pub fn delete_where(&mut self, table: &str, conditions: &[Condition]) -> Result<u64> {
        let stmt = builder::build_delete(table, conditions)?;
        self.delete(&stmt.sql, &stmt.params)
    }

    fn execute_counted(&mut self, statement: &str, values: &[Value]) -> Result<u64> {
        debug!(sql = %statement, params = values.len(), "Executing");
        self.manager.with_cursor(RowShape::Tuple, |cursor| {
            cursor.execute(statement, values)?;
            Ok(cursor.row_count())
        })
    }

    fn commit_unless_scoped(&mut self) -> Result<()> {
        if self.in_transaction() {
            debug!("Commit deferred to enclosing transaction");
            return Ok(());
        }
        self.manager.commit()
    }

    fn rollback_or_escalate(&mut self) -> Result<()> {
        self.manager.rollback().map_err(|e| {
            error!(error = %e, "Rollback failed");
            TxsqlError::transaction("Failed to rollback transaction", Some(e))
        })
    }

    /// Rolls back the scope's transaction, leaving the state `RolledBack` or,
    /// when the rollback fails, `Failed`.
    fn end_scope_with_rollback(&mut self) -> Result<()> {
        match self.rollback_or_escalate() {
            Ok(()) => {
                self.state = TransactionState::RolledBack;
                Ok(())
            }
            Err(e) => {
                self.state = TransactionState::Failed;
                Err(e)
            }
        }
    }

    fn run_batch(&mut self, sql: &str, rows: &[BatchRow], chunk_size: usize) -> Result<u64> {
        let scoped = self.in_transaction();
        let chunks = (rows.len() + chunk_size - 1) / chunk_size;
        debug!(sql = %sql, rows = rows.len(), chunks, "Running batch");

        if !scoped {
            self.manager.begin()?;
        }

        let outcome = self.manager.with_cursor(RowShape::Tuple, |cursor| {
            let mut total = 0u64;
            for (i, chunk) in rows.chunks(chunk_size).enumerate() {
                cursor
                    .execute_many(sql, chunk)
                    .map_err(|e| TxsqlError::batch(format!("chunk {} of {} failed", i + 1, chunks), e))?;
                total += cursor.row_count();
            }
            Ok(total)
        });

        match outcome {
            Ok(total) => {
                if !scoped {
                    if let Err(e) = self.manager.commit() {
                        error!(error = %e, "Batch commit failed");
                        self.rollback_or_escalate()?;
                        return Err(TxsqlError::batch("commit failed", e));
                    }
                }
                Ok(total)
            }
            Err(e) => {
                error!(error = %e, "Batch failed");
                if !scoped {
                    self.rollback_or_escalate()?;
                }
                Err(e)
            }
        }
    }
}
