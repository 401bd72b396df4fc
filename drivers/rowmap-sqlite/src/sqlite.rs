///
/// SQLite implementation of rowmap's execution boundary.
///
/// Values cross the boundary by storage class: rowmap's `Value` variants
/// map one to one onto `rusqlite::types::Value`.
///

use std::path::Path;

use rowmap::{Error, ExecResult, Executor, Result, RowSink, Rows, Value};
use rusqlite::{params_from_iter, types::Value as SqlValue, Connection};

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(i),
        SqlValue::Real(f) => Value::Real(f),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(b) => Value::Blob(b),
    }
}

fn db_error(sql: &str, e: rusqlite::Error) -> Error {
    Error::execution(format!("executing `{}`", sql), e)
}

pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| Error::execution(format!("opening {}", path.display()), e))?;
        Ok(SqliteExecutor { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::execution("opening in-memory database", e))?;
        Ok(SqliteExecutor { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteExecutor { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Runs several `;`-separated statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(|e| db_error(sql, e))
    }

    pub fn into_inner(self) -> Connection {
        self.conn
    }
}

impl Executor for SqliteExecutor {
    type Rows = SqliteRows;

    fn execute(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        tracing::debug!(sql, args = args.len(), "sqlite execute");
        let changed = self
            .conn
            .execute(sql, params_from_iter(args.iter().map(to_sql)))
            .map_err(|e| db_error(sql, e))?;
        Ok(ExecResult {
            rows_affected: changed as u64,
            last_insert_id: self.conn.last_insert_rowid(),
        })
    }

    fn query(&self, sql: &str, args: &[Value]) -> Result<SqliteRows> {
        tracing::debug!(sql, args = args.len(), "sqlite query");
        let mut stmt = self.conn.prepare(sql).map_err(|e| db_error(sql, e))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut cursor = stmt
            .query(params_from_iter(args.iter().map(to_sql)))
            .map_err(|e| db_error(sql, e))?;

        let mut rows = Vec::new();
        while let Some(row) = cursor.next().map_err(|e| db_error(sql, e))? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                let value: SqlValue = row.get(i).map_err(|e| db_error(sql, e))?;
                values.push(from_sql(value));
            }
            rows.push(values);
        }

        Ok(SqliteRows::new(columns, rows))
    }
}

/// A fully materialized result set.
#[derive(Debug, Clone)]
pub struct SqliteRows {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    current: Option<usize>,
    closed: bool,
}

impl SqliteRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        SqliteRows {
            columns,
            rows,
            current: None,
            closed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::usage("cursor is closed"));
        }
        Ok(())
    }
}

impl Rows for SqliteRows {
    fn columns(&self) -> Result<Vec<String>> {
        self.check_open()?;
        Ok(self.columns.clone())
    }

    fn next(&mut self) -> Result<bool> {
        self.check_open()?;
        let next = self.current.map_or(0, |i| i + 1);
        if next >= self.rows.len() {
            self.current = Some(self.rows.len());
            return Ok(false);
        }
        self.current = Some(next);
        Ok(true)
    }

    fn scan(&mut self, sink: &mut dyn RowSink) -> Result<()> {
        self.check_open()?;
        if sink.width() != self.columns.len() {
            return Err(Error::usage(format!(
                "scan expected {} targets, got {}",
                self.columns.len(),
                sink.width()
            )));
        }
        let row = self
            .current
            .and_then(|i| self.rows.get(i))
            .ok_or_else(|| Error::usage("scan called without a current row"))?;
        for (position, value) in row.iter().enumerate() {
            sink.put(position, value.clone())?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.rows.clear();
        Ok(())
    }
}
