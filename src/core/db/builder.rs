/// Query Builder Module
///
/// Builds parameterized SQL from typed inputs: WHERE clauses from condition
/// lists, ad hoc SELECT/INSERT/UPDATE/DELETE statements, and the statements
/// used by batch insert/update. Every identifier passes through
/// [`require_identifier`]; every value becomes a `?` placeholder.
use crate::core::db::identifier::{require_identifier, require_identifiers};
use crate::core::db::value::Value;
use crate::core::{Result, TxsqlError};
use std::fmt;
use std::str::FromStr;

/// How a condition joins the clause to its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Like,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Comparator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::NotEq => "!=",
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::GtEq => ">=",
            Comparator::LtEq => "<=",
            Comparator::Like => "LIKE",
            Comparator::In => "IN",
            Comparator::NotIn => "NOT IN",
            Comparator::IsNull => "IS NULL",
            Comparator::IsNotNull => "IS NOT NULL",
        }
    }

    /// NULL checks take no operand and bind no parameter.
    pub fn is_null_check(&self) -> bool {
        matches!(self, Comparator::IsNull | Comparator::IsNotNull)
    }

    pub fn is_membership(&self) -> bool {
        matches!(self, Comparator::In | Comparator::NotIn)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Comparator {
    type Err = TxsqlError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        let cmp = match normalized.as_str() {
            "=" => Comparator::Eq,
            "!=" | "<>" => Comparator::NotEq,
            ">" => Comparator::Gt,
            "<" => Comparator::Lt,
            ">=" => Comparator::GtEq,
            "<=" => Comparator::LtEq,
            "LIKE" => Comparator::Like,
            "IN" => Comparator::In,
            "NOT IN" => Comparator::NotIn,
            "IS NULL" => Comparator::IsNull,
            "IS NOT NULL" => Comparator::IsNotNull,
            _ => return Err(TxsqlError::Validation(format!("unknown comparator '{}'", s))),
        };
        Ok(cmp)
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Scalar(Value),
    List(Vec<Value>),
}

/// One predicate of a WHERE clause. The first condition's `op` is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub op: LogicalOp,
    pub field: String,
    pub cmp: Comparator,
    /// `None` for the NULL comparators
    pub value: Option<Operand>,
}

impl Condition {
    pub fn new(op: LogicalOp, field: impl Into<String>, cmp: Comparator, value: impl Into<Value>) -> Self {
        Condition {
            op,
            field: field.into(),
            cmp,
            value: Some(Operand::Scalar(value.into())),
        }
    }

    /// `field IN (...)` / `field NOT IN (...)` against a list of values.
    pub fn list<V: Into<Value>>(
        op: LogicalOp,
        field: impl Into<String>,
        cmp: Comparator,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Condition {
            op,
            field: field.into(),
            cmp,
            value: Some(Operand::List(values.into_iter().map(Into::into).collect())),
        }
    }

    pub fn is_null(op: LogicalOp, field: impl Into<String>) -> Self {
        Condition {
            op,
            field: field.into(),
            cmp: Comparator::IsNull,
            value: None,
        }
    }

    pub fn is_not_null(op: LogicalOp, field: impl Into<String>) -> Self {
        Condition {
            op,
            field: field.into(),
            cmp: Comparator::IsNotNull,
            value: None,
        }
    }

    pub fn and(field: impl Into<String>, cmp: Comparator, value: impl Into<Value>) -> Self {
        Self::new(LogicalOp::And, field, cmp, value)
    }

    pub fn or(field: impl Into<String>, cmp: Comparator, value: impl Into<Value>) -> Self {
        Self::new(LogicalOp::Or, field, cmp, value)
    }

    /// Renders this condition's fragment (without its logical operator),
    /// appending bound values to `params`.
    fn render(&self, params: &mut Vec<Value>) -> Result<String> {
        let field = require_identifier(&self.field)?;

        if self.cmp.is_null_check() {
            return Ok(format!("{} {}", field, self.cmp));
        }

        match (&self.value, self.cmp.is_membership()) {
            (None, _) => Err(TxsqlError::Validation(format!(
                "comparator {} on '{}' requires a value",
                self.cmp, field
            ))),
            (Some(Operand::List(values)), true) => {
                if values.is_empty() {
                    return Err(TxsqlError::Validation(format!(
                        "{} on '{}' requires at least one value",
                        self.cmp, field
                    )));
                }
                params.extend(values.iter().cloned());
                Ok(format!("{} {} ({})", field, self.cmp, placeholders(values.len())))
            }
            (Some(Operand::Scalar(value)), true) => {
                params.push(value.clone());
                Ok(format!("{} {} (?)", field, self.cmp))
            }
            (Some(Operand::List(_)), false) => Err(TxsqlError::Validation(format!(
                "comparator {} on '{}' does not accept a list",
                self.cmp, field
            ))),
            (Some(Operand::Scalar(value)), false) => {
                params.push(value.clone());
                Ok(format!("{} {} ?", field, self.cmp))
            }
        }
    }
}

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Statement {
            sql: sql.into(),
            params,
        }
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Builds ` WHERE a > ? OR b = ?` from `conditions`. Empty input yields an empty statement.
pub fn build_where_clause(conditions: &[Condition]) -> Result<Statement> {
    if conditions.is_empty() {
        return Ok(Statement::default());
    }

    let mut params = Vec::new();
    let mut sql = String::from(" WHERE ");
    for (i, cond) in conditions.iter().enumerate() {
        let fragment = cond.render(&mut params)?;
        if i > 0 {
            sql.push(' ');
            sql.push_str(cond.op.as_sql());
            sql.push(' ');
        }
        sql.push_str(&fragment);
    }

    Ok(Statement { sql, params })
}

/// `SELECT <columns> FROM <table><where>`; `columns: None` selects `*`.
pub fn build_select<S: AsRef<str>>(
    table: &str,
    conditions: &[Condition],
    columns: Option<&[S]>,
) -> Result<Statement> {
    let table = require_identifier(table)?;
    let fields = match columns {
        Some(cols) if !cols.is_empty() => require_identifiers(cols)?.join(", "),
        _ => "*".to_string(),
    };
    let clause = build_where_clause(conditions)?;

    Ok(Statement {
        sql: format!("SELECT {} FROM {}{}", fields, table, clause.sql),
        params: clause.params,
    })
}

/// `UPDATE <table> SET a = ?, b = ?<where>`; params are set values then condition values.
pub fn build_update<K, V, I>(table: &str, set_values: I, conditions: &[Condition]) -> Result<Statement>
where
    K: AsRef<str>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    let table = require_identifier(table)?;
    let mut assignments = Vec::new();
    let mut params = Vec::new();
    for (column, value) in set_values {
        assignments.push(format!("{} = ?", require_identifier(column.as_ref())?));
        params.push(value.into());
    }
    if assignments.is_empty() {
        return Err(TxsqlError::Validation("update requires at least one column to set".to_string()));
    }

    let clause = build_where_clause(conditions)?;
    params.extend(clause.params);

    Ok(Statement {
        sql: format!("UPDATE {} SET {}{}", table, assignments.join(", "), clause.sql),
        params,
    })
}

/// Single-row `INSERT INTO <table> (a, b) VALUES (?, ?)`.
pub fn build_insert<K, V, I>(table: &str, data: I) -> Result<Statement>
where
    K: AsRef<str>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    let table = require_identifier(table)?;
    let mut columns = Vec::new();
    let mut params = Vec::new();
    for (column, value) in data {
        columns.push(require_identifier(column.as_ref())?);
        params.push(value.into());
    }
    if columns.is_empty() {
        return Err(TxsqlError::Validation("insert requires at least one column".to_string()));
    }

    Ok(Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders(columns.len())
        ),
        params,
    })
}

/// `DELETE FROM <table><where>`.
pub fn build_delete(table: &str, conditions: &[Condition]) -> Result<Statement> {
    let table = require_identifier(table)?;
    let clause = build_where_clause(conditions)?;
    Ok(Statement {
        sql: format!("DELETE FROM {}{}", table, clause.sql),
        params: clause.params,
    })
}

/// What to do with conflicting rows in a batch insert.
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert<'a> {
    /// Plain insert, conflicts fail
    Off,
    /// Update these columns from the incoming row; `None` means every inserted column
    Update(Option<&'a [String]>),
}

/// Row statement for a batch insert, executed once per row via execute-many.
pub fn build_batch_insert<S: AsRef<str>>(table: &str, columns: &[S], upsert: Upsert<'_>) -> Result<String> {
    if columns.is_empty() {
        return Err(TxsqlError::Validation("batch insert requires at least one column".to_string()));
    }
    let table = require_identifier(table)?;
    let columns = require_identifiers(columns)?;

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders(columns.len())
    );

    if let Upsert::Update(targets) = upsert {
        let targets = match targets {
            Some(cols) => require_identifiers(cols)?,
            None => columns,
        };
        if targets.is_empty() {
            sql.push_str(" ON CONFLICT DO NOTHING");
        } else {
            let set = targets
                .iter()
                .map(|c| format!("{0} = excluded.{0}", c))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" ON CONFLICT DO UPDATE SET ");
            sql.push_str(&set);
        }
    }

    Ok(sql)
}

/// Row statement for a batch update; each row binds update values then where values.
pub fn build_batch_update<S: AsRef<str>, W: AsRef<str>>(
    table: &str,
    update_columns: &[S],
    where_columns: &[W],
) -> Result<String> {
    if update_columns.is_empty() {
        return Err(TxsqlError::Validation("batch update requires at least one update column".to_string()));
    }
    if where_columns.is_empty() {
        return Err(TxsqlError::Validation("batch update requires at least one where column".to_string()));
    }
    let table = require_identifier(table)?;
    let set = require_identifiers(update_columns)?
        .iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(", ");
    let filter = require_identifiers(where_columns)?
        .iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(" AND ");

    Ok(format!("UPDATE {} SET {} WHERE {}", table, set, filter))
}
