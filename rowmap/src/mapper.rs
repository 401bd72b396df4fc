///
/// # Record Engine
///
/// `Mapper` ties the pieces together. A template is rewritten in two steps,
/// column projection first and IN expansion second, then handed to an
/// `Executor`. Result cursors are scanned record by record and always
/// closed; a close failure is joined with any earlier error.
///
/// ## Example
///
/// ```rust,ignore
/// let mapper = Mapper::new();
/// let users: Vec<User> = mapper.query(&db, "SELECT * FROM users WHERE id IN (*)", args![vec![1, 2]])?;
/// let id = mapper.insert(&db, &user, "users")?;
/// ```
///
/// INSERT writes every non-key, non-ignored column in declaration order.
/// UPDATE and DELETE locate the row by the record's single primary key.
///

use crate::config::MapperConfig;
use crate::error::{join_close, Error, Result};
use crate::exec::{ExecResult, Executor, Rows};
use crate::expand::{count_markers, expand, placeholders, Expanded};
use crate::metadata::{FieldDescriptor, Registry, ResolveMode};
use crate::naming::NameMapper;
use crate::projection::substitute_columns;
use crate::scan::{scan_into, ScalarSink};
use crate::schema::{value_at, Record};
use crate::value::{Arg, SqlField, Value};

#[derive(Debug)]
pub struct Mapper {
    registry: Registry,
    config: MapperConfig,
}

impl Mapper {
    pub fn new() -> Self {
        let config = MapperConfig::default();
        Mapper {
            registry: Registry::with_names(config.naming.mapper()),
            config,
        }
    }

    pub fn from_config(config: MapperConfig) -> Result<Self> {
        config.validate()?;
        Ok(Mapper {
            registry: Registry::with_names(config.naming.mapper()),
            config,
        })
    }

    /// Replaces the name mapper. Previously cached metadata is dropped.
    pub fn with_name_mapper(mut self, names: NameMapper) -> Self {
        self.registry = Registry::with_names(names);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Substitutes the column marker with `R`'s columns, then expands the
    /// IN-marker against `args`.
    pub fn prepare<R: Record>(&self, template: &str, args: Vec<Arg>) -> Result<Expanded> {
        let marker = &self.config.column_marker;
        if template.contains(marker.as_str()) {
            let columns = self.registry.column_list::<R>();
            let sql = substitute_columns(template, marker, &columns);
            return expand(&sql, &self.config.in_marker, args);
        }
        self.expand(template, args)
    }

    /// IN expansion only, for statements that do not project a record.
    pub fn expand(&self, template: &str, args: Vec<Arg>) -> Result<Expanded> {
        expand(template, &self.config.in_marker, args)
    }

    pub fn query<R, E>(&self, executor: &E, template: &str, args: Vec<Arg>) -> Result<Vec<R>>
    where
        R: Record,
        E: Executor + ?Sized,
    {
        let prepared = self.prepare::<R>(template, args)?;
        let mut rows = executor.query(&prepared.sql, &prepared.args)?;
        let result = self.collect_records(&mut rows);
        join_close(result, rows.close())
    }

    /// First row only; `Error::NoRows` when the result is empty.
    pub fn query_row<R, E>(&self, executor: &E, template: &str, args: Vec<Arg>) -> Result<R>
    where
        R: Record,
        E: Executor + ?Sized,
    {
        let prepared = self.prepare::<R>(template, args)?;
        let mut rows = executor.query(&prepared.sql, &prepared.args)?;
        let result = self.first_record(&mut rows);
        join_close(result, rows.close())
    }

    /// Single-column query into plain values.
    pub fn query_scalar<T, E>(&self, executor: &E, template: &str, args: Vec<Arg>) -> Result<Vec<T>>
    where
        T: SqlField + Default,
        E: Executor + ?Sized,
    {
        let prepared = self.expand(template, args)?;
        let mut rows = executor.query(&prepared.sql, &prepared.args)?;
        let result = collect_scalars(&mut rows);
        join_close(result, rows.close())
    }

    pub fn query_scalar_row<T, E>(&self, executor: &E, template: &str, args: Vec<Arg>) -> Result<T>
    where
        T: SqlField + Default,
        E: Executor + ?Sized,
    {
        let prepared = self.expand(template, args)?;
        let mut rows = executor.query(&prepared.sql, &prepared.args)?;
        let result = first_scalar(&mut rows);
        join_close(result, rows.close())
    }

    /// Executes a statement after IN expansion.
    pub fn exec<E>(&self, executor: &E, template: &str, args: Vec<Arg>) -> Result<ExecResult>
    where
        E: Executor + ?Sized,
    {
        let prepared = self.expand(template, args)?;
        executor.execute(&prepared.sql, &prepared.args)
    }

    /// Like `exec`, but the template must contain the IN-marker.
    pub fn exec_in<E>(&self, executor: &E, template: &str, args: Vec<Arg>) -> Result<ExecResult>
    where
        E: Executor + ?Sized,
    {
        if count_markers(template, &self.config.in_marker) == 0 {
            return Err(Error::usage(format!(
                "exec_in requires the '{}' marker in the statement",
                self.config.in_marker
            )));
        }
        self.exec(executor, template, args)
    }

    /// Inserts `record` into `table` and returns the generated row id.
    pub fn insert<R, E>(&self, executor: &E, record: &R, table: &str) -> Result<i64>
    where
        R: Record,
        E: Executor + ?Sized,
    {
        let (columns, values) = self.writable_values(record)?;
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders(columns.len())
        );

        tracing::debug!(operation = "insert", table, columns = columns.len(), "executing record statement");
        let result = executor
            .execute(&sql, &values)
            .map_err(|e| e.context(format!("inserting into {}", table)))?;
        Ok(result.last_insert_id)
    }

    /// Updates the row matching the record's primary key. Returns the number
    /// of rows affected.
    pub fn update<R, E>(&self, executor: &E, record: &R, table: &str) -> Result<u64>
    where
        R: Record,
        E: Executor + ?Sized,
    {
        let key = self.registry.primary_key::<R>()?;
        let (columns, mut values) = self.writable_values(record)?;
        values.push(field_value(record, &key)?);

        let assignments = columns
            .iter()
            .map(|column| format!("{}=?", column))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {} SET {} WHERE {}=?", table, assignments, key.column);

        tracing::debug!(operation = "update", table, columns = columns.len(), "executing record statement");
        let result = executor
            .execute(&sql, &values)
            .map_err(|e| e.context(format!("updating {}", table)))?;
        Ok(result.rows_affected)
    }

    /// Deletes the row of type `R` whose primary key equals `key`.
    pub fn delete<R, E>(&self, executor: &E, key: impl Into<Value>, table: &str) -> Result<u64>
    where
        R: Record,
        E: Executor + ?Sized,
    {
        let descriptor = self.registry.primary_key::<R>()?;
        let sql = format!("DELETE FROM {} WHERE {}=?", table, descriptor.column);

        tracing::debug!(operation = "delete", table, "executing record statement");
        let result = executor
            .execute(&sql, &[key.into()])
            .map_err(|e| e.context(format!("deleting from {}", table)))?;
        Ok(result.rows_affected)
    }

    fn collect_records<R: Record, S: Rows>(&self, rows: &mut S) -> Result<Vec<R>> {
        let mut records = Vec::new();
        while rows.next()? {
            let mut record = R::default();
            scan_into(&self.registry, &mut record, rows)?;
            records.push(record);
        }
        Ok(records)
    }

    fn first_record<R: Record, S: Rows>(&self, rows: &mut S) -> Result<R> {
        if !rows.next()? {
            return Err(Error::NoRows);
        }
        let mut record = R::default();
        scan_into(&self.registry, &mut record, rows)?;
        Ok(record)
    }

    fn writable_values<R: Record>(&self, record: &R) -> Result<(Vec<String>, Vec<Value>)> {
        let fields = self.registry.resolve::<R>(ResolveMode::WRITABLE);
        if fields.is_empty() {
            return Err(Error::Schema {
                type_name: std::any::type_name::<R>(),
                reason: "no writable columns".to_string(),
            });
        }

        let mut columns = Vec::with_capacity(fields.len());
        let mut values = Vec::with_capacity(fields.len());
        for descriptor in fields.values() {
            columns.push(descriptor.column.clone());
            values.push(field_value(record, descriptor)?);
        }
        Ok((columns, values))
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Mapper::new()
    }
}

/// A record stored in a fixed table.
pub trait Table: Record {
    const TABLE_NAME: &'static str;

    fn insert_record<E: Executor + ?Sized>(&self, mapper: &Mapper, executor: &E) -> Result<i64> {
        mapper.insert(executor, self, Self::TABLE_NAME)
    }

    fn update_record<E: Executor + ?Sized>(&self, mapper: &Mapper, executor: &E) -> Result<u64> {
        mapper.update(executor, self, Self::TABLE_NAME)
    }

    fn delete_record<E: Executor + ?Sized>(&self, mapper: &Mapper, executor: &E) -> Result<u64> {
        let key = mapper.registry().primary_key::<Self>()?;
        let value = field_value(self, &key)?;
        mapper.delete::<Self, E>(executor, value, Self::TABLE_NAME)
    }
}

fn field_value<R: Record>(record: &R, descriptor: &FieldDescriptor) -> Result<Value> {
    let field = value_at(record, &descriptor.path).ok_or_else(|| Error::Schema {
        type_name: std::any::type_name::<R>(),
        reason: format!("column '{}' does not resolve to a value", descriptor.column),
    })?;
    field
        .to_value()
        .map_err(|e| e.context(format!("encoding column '{}'", descriptor.column)))
}

fn check_single_column<S: Rows>(rows: &S) -> Result<()> {
    let columns = rows.columns()?;
    if columns.len() != 1 {
        return Err(Error::usage(format!(
            "scalar query must return exactly one column; got {}",
            columns.len()
        )));
    }
    Ok(())
}

fn collect_scalars<T: SqlField + Default, S: Rows>(rows: &mut S) -> Result<Vec<T>> {
    check_single_column(rows)?;
    let mut out = Vec::new();
    while rows.next()? {
        let mut value = T::default();
        rows.scan(&mut ScalarSink::new(&mut value))?;
        out.push(value);
    }
    Ok(out)
}

fn first_scalar<T: SqlField + Default, S: Rows>(rows: &mut S) -> Result<T> {
    check_single_column(rows)?;
    if !rows.next()? {
        return Err(Error::NoRows);
    }
    let mut value = T::default();
    rows.scan(&mut ScalarSink::new(&mut value))?;
    Ok(value)
}
