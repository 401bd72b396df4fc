///
/// Execution service boundary.
///
/// The mapping engine never opens connections or runs SQL itself. It hands
/// a final statement and a flat positional argument list to an `Executor`
/// and consumes the returned `Rows` cursor.
///
/// ## Cursor contract
///
/// - `columns()` reports the column names of the result set in positional
///   order.
/// - `next()` advances to the next row and returns `false` once exhausted.
/// - `scan()` feeds every column of the current row to the sink exactly
///   once, by position. A sink whose `width()` differs from the number of
///   reported columns is rejected.
/// - `close()` releases the cursor. The engine always calls it, also after
///   an earlier failure.
///

use crate::error::Result;
use crate::scan::RowSink;
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: i64,
}

pub trait Rows {
    fn columns(&self) -> Result<Vec<String>>;

    fn next(&mut self) -> Result<bool>;

    fn scan(&mut self, sink: &mut dyn RowSink) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

pub trait Executor {
    type Rows: Rows;

    fn execute(&self, sql: &str, args: &[Value]) -> Result<ExecResult>;

    fn query(&self, sql: &str, args: &[Value]) -> Result<Self::Rows>;
}

impl<E: Executor + ?Sized> Executor for &E {
    type Rows = E::Rows;

    fn execute(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        (**self).execute(sql, args)
    }

    fn query(&self, sql: &str, args: &[Value]) -> Result<Self::Rows> {
        (**self).query(sql, args)
    }
}
