///
/// # rowmap - Typed records over positional SQL
///
/// Declares record schemas once, then derives everything a query needs from
/// them: the projected column list for a `SELECT *` template, the sized
/// placeholder list for an `IN (*)` template, and the scan of result rows
/// back into records. Running SQL is left to an `Executor` implementation
/// (see the `rowmap-sqlite` driver).
///
/// ## Library Usage
///
/// ```rust,ignore
/// use rowmap::{args, record, Mapper};
///
/// #[derive(Debug, Default)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// record!(User {
///     id: i64 => value [primary_key],
///     name: String => value,
/// });
///
/// let mapper = Mapper::new();
/// let users: Vec<User> =
///     mapper.query(&db, "SELECT * FROM users WHERE id IN (*)", args![vec![1, 2, 3]])?;
/// ```
///

pub mod config;
pub mod error;
pub mod exec;
pub mod expand;
pub mod mapper;
pub mod metadata;
pub mod naming;
pub mod projection;
pub mod scan;
pub mod schema;
pub mod value;

pub use config::MapperConfig;
pub use error::{join_close, BoxError, Error, Result};
pub use exec::{ExecResult, Executor, Rows};
pub use expand::{expand, flatten_at, placeholders, Expanded};
pub use mapper::{Mapper, Table};
pub use metadata::{FieldDescriptor, FieldMap, FieldRole, Registry, ResolveMode};
pub use naming::{to_lower, to_snake_case, NameMapper, Naming};
pub use projection::substitute_columns;
pub use scan::{scan_aliased, scan_into, RecordSink, RowSink, ScalarSink, ScanTarget, ValueSink};
pub use schema::{value_at, value_at_mut, FieldKind, FieldMut, FieldPath, FieldRef, FieldSpec, Fields, Record, Schema};
pub use value::{Arg, SqlField, Value};
