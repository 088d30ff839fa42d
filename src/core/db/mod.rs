/// Database Module
///
/// The access layer, split into focused submodules:
/// - **Driver contract** (`driver.rs`): the blocking calls the core depends on
/// - **SQLite adapter** (`sqlite.rs`): the contract implemented over `rusqlite`
/// - **Connection Management** (`connection.rs`): lazy connect, liveness checks, scoped cursors
/// - **Execution** (`executor.rs`): CRUD, batch operations and transaction scopes
/// - **Query Building** (`builder.rs`, `identifier.rs`): parameterized SQL from typed inputs
/// - **Values** (`value.rs`): bound parameters and fetched rows
///
/// ## Error Handling
///
/// All operations return the crate's `TxsqlError`; driver-native errors never cross
/// the adapter boundary.
pub mod builder;
pub mod connection;
pub mod driver;
pub mod executor;
pub mod identifier;
pub mod sqlite;
pub mod value;

pub use builder::{
    build_batch_insert, build_batch_update, build_delete, build_insert, build_select, build_update,
    build_where_clause, Comparator, Condition, LogicalOp, Operand, Statement, Upsert,
};
pub use connection::ConnectionManager;
pub use driver::{Connector, Cursor, DriverConnection};
pub use executor::{BatchOptions, RollbackOn, TransactionState, TransactionalExecutor};
pub use identifier::{require_identifier, sanitize_identifier};
pub use sqlite::{SqliteConnection, SqliteConnector};
pub use value::{BatchRow, Row, RowShape, Value};
