///
/// Row scanning.
///
/// A cursor's scan is strictly positional: every reported column needs a
/// target. `scan_into` builds one `ScanTarget` per reported column, a field
/// path when the name-mapped column is known to the record and `Discard`
/// otherwise, then performs a single `Rows::scan` call. Record fields whose
/// column is not reported keep their current value.
///

use crate::error::{Error, Result};
use crate::exec::Rows;
use crate::metadata::{Registry, ResolveMode};
use crate::schema::{value_at_mut, FieldPath, Fields, Record};
use crate::value::{SqlField, Value};

/// Ordered scan targets for one row.
pub trait RowSink {
    /// Number of positions; must equal the reported column count.
    fn width(&self) -> usize;

    fn put(&mut self, position: usize, value: Value) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub enum ScanTarget<'m> {
    Field(&'m FieldPath),
    Discard,
}

/// Writes each position into a record field, following its path.
pub struct RecordSink<'a, 'm> {
    record: &'a mut dyn Fields,
    type_name: &'static str,
    columns: Vec<String>,
    targets: Vec<ScanTarget<'m>>,
}

impl<'a, 'm> RecordSink<'a, 'm> {
    pub fn new(
        record: &'a mut dyn Fields,
        type_name: &'static str,
        columns: Vec<String>,
        targets: Vec<ScanTarget<'m>>,
    ) -> Self {
        RecordSink {
            record,
            type_name,
            columns,
            targets,
        }
    }
}

impl RowSink for RecordSink<'_, '_> {
    fn width(&self) -> usize {
        self.targets.len()
    }

    fn put(&mut self, position: usize, value: Value) -> Result<()> {
        let path = match self.targets.get(position) {
            Some(ScanTarget::Field(path)) => *path,
            Some(ScanTarget::Discard) => return Ok(()),
            None => return Err(out_of_range(position, self.targets.len())),
        };

        let field = value_at_mut(self.record, path).ok_or_else(|| Error::Schema {
            type_name: self.type_name,
            reason: format!("field path {:?} does not resolve", path.as_slice()),
        })?;

        field.set_value(value).map_err(|e| {
            let column = self.columns.get(position).map(String::as_str).unwrap_or("?");
            e.context(format!("scanning column '{}' into {}", column, self.type_name))
        })
    }
}

/// Collects a raw row.
#[derive(Debug, Clone, Default)]
pub struct ValueSink {
    values: Vec<Value>,
}

impl ValueSink {
    pub fn new(width: usize) -> Self {
        ValueSink {
            values: vec![Value::Null; width],
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl RowSink for ValueSink {
    fn width(&self) -> usize {
        self.values.len()
    }

    fn put(&mut self, position: usize, value: Value) -> Result<()> {
        let width = self.values.len();
        let slot = self
            .values
            .get_mut(position)
            .ok_or_else(|| out_of_range(position, width))?;
        *slot = value;
        Ok(())
    }
}

/// A one-column sink for scalar queries.
pub struct ScalarSink<'a> {
    field: &'a mut dyn SqlField,
}

impl<'a> ScalarSink<'a> {
    pub fn new(field: &'a mut dyn SqlField) -> Self {
        ScalarSink { field }
    }
}

impl RowSink for ScalarSink<'_> {
    fn width(&self) -> usize {
        1
    }

    fn put(&mut self, position: usize, value: Value) -> Result<()> {
        if position != 0 {
            return Err(out_of_range(position, 1));
        }
        self.field.set_value(value)
    }
}

/// Scans the current row of `rows` into `dest`.
pub fn scan_into<R, S>(registry: &Registry, dest: &mut R, rows: &mut S) -> Result<()>
where
    R: Record,
    S: Rows + ?Sized,
{
    let fields = registry.resolve::<R>(ResolveMode::ALL);
    let columns = rows.columns()?;
    let targets = columns
        .iter()
        .map(|column| match fields.get(&registry.map_name(column)) {
            Some(descriptor) => ScanTarget::Field(&descriptor.path),
            None => ScanTarget::Discard,
        })
        .collect();

    let mut sink = RecordSink::new(dest, std::any::type_name::<R>(), columns, targets);
    rows.scan(&mut sink)
}

/// Like `scan_into`, but only columns named `<alias>_<column>` are mapped.
///
/// Pairs with `Registry::column_list_aliased`, so the same cursor row of a
/// join can be scanned into one record per table alias.
pub fn scan_aliased<R, S>(registry: &Registry, dest: &mut R, rows: &mut S, alias: &str) -> Result<()>
where
    R: Record,
    S: Rows + ?Sized,
{
    let fields = registry.resolve::<R>(ResolveMode::ALL);
    let columns = rows.columns()?;
    let prefix = format!("{}_", alias);
    let targets = columns
        .iter()
        .map(|column| {
            column
                .strip_prefix(&prefix)
                .and_then(|rest| fields.get(&registry.map_name(rest)))
                .map_or(ScanTarget::Discard, |descriptor| {
                    ScanTarget::Field(&descriptor.path)
                })
        })
        .collect();

    let mut sink = RecordSink::new(dest, std::any::type_name::<R>(), columns, targets);
    rows.scan(&mut sink)
}

fn out_of_range(position: usize, width: usize) -> Error {
    Error::usage(format!(
        "scan position {} is out of range for {} targets",
        position, width
    ))
}
