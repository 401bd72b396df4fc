///
/// rowmap SQLite driver
///
/// Runs rowmap's rewritten statements on SQLite through rusqlite, with
/// bundled SQLite so there is no system dependency.
///
/// - `SqliteExecutor` owns one `rusqlite::Connection` and implements
///   `rowmap::Executor`.
/// - Query results are materialized into `SqliteRows` before the statement
///   is dropped, which keeps the cursor free of rusqlite's borrowed rows.
/// - Driver failures surface as `rowmap::Error::Execution` carrying the
///   failing SQL.
///

pub mod sqlite;

pub use sqlite::{SqliteExecutor, SqliteRows};
