/// Value and Row Types
///
/// Bound parameters and fetched rows share one value model so that the
/// executor, the query builder and every driver adapter agree on what a
/// "value" is.
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

/// A single SQL value, either bound as a parameter or read back from a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// Ordered values positionally aligned to a batch operation's column list.
pub type BatchRow = Vec<Value>;

/// Selects how a cursor shapes the rows it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowShape {
    /// Row as an ordered tuple of values
    #[default]
    Tuple,
    /// Row as a column-name to value mapping
    Mapping,
}

/// A fetched row in the shape requested from the cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Tuple(Vec<Value>),
    /// Column/value pairs in result-set column order
    Mapping(Vec<(String, Value)>),
}

impl Row {
    /// Builds a row of the requested shape from column names and values.
    pub fn shaped(shape: RowShape, columns: &[String], values: Vec<Value>) -> Self {
        match shape {
            RowShape::Tuple => Row::Tuple(values),
            RowShape::Mapping => Row::Mapping(columns.iter().cloned().zip(values).collect()),
        }
    }

    /// Looks up a value by column name. Tuple rows have no names and return `None`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        match self {
            Row::Tuple(_) => None,
            Row::Mapping(pairs) => pairs.iter().find(|(name, _)| name == column).map(|(_, v)| v),
        }
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            Row::Tuple(values) => values.get(index),
            Row::Mapping(pairs) => pairs.get(index).map(|(_, v)| v),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Row::Tuple(values) => values.len(),
            Row::Mapping(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(&self) -> Vec<&Value> {
        match self {
            Row::Tuple(values) => values.iter().collect(),
            Row::Mapping(pairs) => pairs.iter().map(|(_, v)| v).collect(),
        }
    }

    /// Renders the row as JSON: an array for tuples, an object for mappings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Row::Tuple(values) => serde_json::json!(values),
            Row::Mapping(pairs) => {
                let map = pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::json!(v)))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(map)
            }
        }
    }
}

/// Builds a `Vec<Value>` from heterogeneous literals.
///
/// ```
/// use txsql::values;
/// let params = values!["x", 1, None::<i64>];
/// assert_eq!(params.len(), 3);
/// ```
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::Value::from($value)),+]
    };
}
