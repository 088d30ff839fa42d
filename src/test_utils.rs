/// # Test Utilities Module
///
/// Testing infrastructure for txsql:
/// - A recording mock driver for asserting exact driver call sequences
/// - SQLite fixtures with a small sample schema
/// - Error assertion macros
/// - Test logging setup
use crate::config::ConnectionConfig;
use crate::core::db::driver::{Connector, Cursor, DriverConnection};
use crate::core::db::value::{Row, RowShape, Value};
use crate::core::db::TransactionalExecutor;
use crate::core::{Result, TxsqlError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Once};

/// Everything the mock driver observed, plus knobs for injecting failures.
#[derive(Debug, Default)]
pub struct MockState {
    pub connects: usize,
    pub last_config: Option<ConnectionConfig>,
    pub fail_connect: bool,

    /// Liveness answers consumed one per probe; `true` once exhausted
    pub live_script: VecDeque<bool>,
    pub live_checks: usize,
    pub connection_closes: usize,

    pub cursors_opened: usize,
    pub cursor_closes: usize,
    pub cursor_shapes: Vec<RowShape>,

    pub executes: Vec<(String, Vec<Value>)>,
    pub execute_many_calls: Vec<(String, Vec<Vec<Value>>)>,
    pub fetches: usize,
    /// Forced row count; defaults to 0 for execute and the row total for execute-many
    pub row_count: Option<u64>,
    pub fetch_rows: Vec<Row>,
    pub fail_execute: Option<String>,
    /// Zero-based index of the execute-many call that fails
    pub fail_execute_many_at: Option<usize>,

    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub in_transaction: bool,
    /// Pins the reported autocommit mode regardless of transaction state
    pub autocommit_override: Option<bool>,
}

/// Handle shared between a test and the mock connections it hands out.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector {
            state: Arc::clone(&self.state),
        }
    }

    pub fn executor(&self) -> TransactionalExecutor<MockConnector> {
        let config = ConnectionConfig::new("test_host", "test_user", "test_pass").with_option("database", "test_db");
        TransactionalExecutor::with_connector(config, self.connector())
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn update(&self, f: impl FnOnce(&mut MockState)) {
        let mut s = self.state();
        f(&mut *s);
    }

    pub fn script_liveness(&self, answers: impl IntoIterator<Item = bool>) {
        self.state().live_script = answers.into_iter().collect();
    }

    /// Clears recorded calls, keeping configured knobs.
    pub fn reset_calls(&self) {
        let mut s = self.state();
        s.executes.clear();
        s.execute_many_calls.clear();
        s.fetches = 0;
        s.begins = 0;
        s.commits = 0;
        s.rollbacks = 0;
        s.cursors_opened = 0;
        s.cursor_closes = 0;
        s.cursor_shapes.clear();
    }
}

#[derive(Debug, Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    fn connect(&self, config: &ConnectionConfig) -> Result<MockConnection> {
        let mut s = self.state.lock().unwrap();
        if s.fail_connect {
            return Err(TxsqlError::Connection("Access denied for user".to_string()));
        }
        s.connects += 1;
        s.last_config = Some(config.clone());
        s.in_transaction = false;
        Ok(MockConnection {
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl DriverConnection for MockConnection {
    fn cursor(&mut self, shape: RowShape) -> Result<Box<dyn Cursor + '_>> {
        let mut s = self.state.lock().unwrap();
        s.cursors_opened += 1;
        s.cursor_shapes.push(shape);
        Ok(Box::new(MockCursor {
            state: Arc::clone(&self.state),
            row_count: 0,
        }))
    }

    fn begin(&mut self) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.begins += 1;
        s.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.commits += 1;
        if s.fail_commit {
            return Err(TxsqlError::Query("Lock wait timeout exceeded".to_string()));
        }
        s.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.rollbacks += 1;
        if s.fail_rollback {
            return Err(TxsqlError::Query("Lost connection to server during query".to_string()));
        }
        s.in_transaction = false;
        Ok(())
    }

    fn is_live(&mut self) -> bool {
        let mut s = self.state.lock().unwrap();
        s.live_checks += 1;
        s.live_script.pop_front().unwrap_or(true)
    }

    fn autocommit(&self) -> bool {
        let s = self.state.lock().unwrap();
        s.autocommit_override.unwrap_or(!s.in_transaction)
    }

    fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().connection_closes += 1;
        Ok(())
    }
}

pub struct MockCursor {
    state: Arc<Mutex<MockState>>,
    row_count: u64,
}

impl Cursor for MockCursor {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.executes.push((sql.to_string(), params.to_vec()));
        if let Some(msg) = &s.fail_execute {
            return Err(TxsqlError::Query(msg.clone()));
        }
        self.row_count = s.row_count.unwrap_or(0);
        Ok(())
    }

    fn execute_many(&mut self, sql: &str, param_rows: &[Vec<Value>]) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        let index = s.execute_many_calls.len();
        s.execute_many_calls.push((sql.to_string(), param_rows.to_vec()));
        if s.fail_execute_many_at == Some(index) {
            return Err(TxsqlError::Query("Duplicate entry '1' for key 'PRIMARY'".to_string()));
        }
        self.row_count = s.row_count.unwrap_or(param_rows.len() as u64);
        Ok(())
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let mut s = self.state.lock().unwrap();
        s.fetches += 1;
        Ok(s.fetch_rows.clone())
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn close(&mut self) {
        self.state.lock().unwrap().cursor_closes += 1;
    }
}

/// Installs a test subscriber once so `tracing` output shows up with `--nocapture`.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Isolated SQLite test fixture with a standard schema.
pub struct DatabaseFixture {
    pub executor: TransactionalExecutor,
}

impl DatabaseFixture {
    /// Creates an in-memory database with the `users` table.
    pub fn new() -> Result<Self> {
        init_test_logging();
        let mut executor = TransactionalExecutor::new(ConnectionConfig::in_memory());
        executor.create(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                city TEXT,
                age INTEGER
            )",
            &[],
        )?;
        Ok(DatabaseFixture { executor })
    }

    /// Creates the fixture and loads three sample users.
    pub fn with_sample_data() -> Result<Self> {
        let mut fixture = Self::new()?;
        let users = vec![
            crate::values![1, "alice", "New York", 28],
            crate::values![2, "bob", "San Francisco", 32],
            crate::values![3, "charlie", None::<String>, 17],
        ];
        fixture.executor.batch_insert(
            "users",
            &["id", "name", "city", "age"],
            &users,
            &crate::core::db::BatchOptions::default(),
        )?;
        Ok(fixture)
    }

    pub fn count(&mut self, table: &str) -> Result<i64> {
        let rows = self.executor.read(&format!("SELECT COUNT(*) AS n FROM {}", table), &[])?;
        Ok(rows
            .first()
            .and_then(|r| r.get("n"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }
}

#[macro_export]
macro_rules! assert_txsql_error {
    ($result:expr, $expected_type:ident, $context:expr) => {
        match $result {
            Err($crate::core::TxsqlError::$expected_type { .. }) => {}
            Ok(_) => panic!("Expected {} error but got Ok in {}", stringify!($expected_type), $context),
            Err(other) => panic!("Expected {} but got {:?} in {}", stringify!($expected_type), other, $context),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_fixture_creation() {
        let mut fixture = DatabaseFixture::with_sample_data().unwrap();
        assert_eq!(fixture.count("users").unwrap(), 3);
    }

    #[test]
    fn test_mock_records_calls() {
        let driver = MockDriver::new();
        let mut conn = driver.connector().connect(&ConnectionConfig::default()).unwrap();
        {
            let mut cursor = conn.cursor(RowShape::Tuple).unwrap();
            cursor.execute("SELECT 1", &[]).unwrap();
            cursor.close();
        }
        conn.commit().unwrap();

        let s = driver.state();
        assert_eq!(s.executes, vec![("SELECT 1".to_string(), vec![])]);
        assert_eq!(s.commits, 1);
        assert_eq!(s.cursor_closes, 1);
    }

    #[test]
    fn test_error_assertion_macro() {
        let result: Result<i32> = Err(TxsqlError::app("Test error"));
        assert_txsql_error!(result, App, "macro test");

        let result: Result<i32> = Err(TxsqlError::transaction("nested", None));
        assert_txsql_error!(result, Transaction, "struct variant");
    }
}
