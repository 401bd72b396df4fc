///
/// Values, arguments and single-value field codecs.
///
/// `Value` is the cell and parameter type exchanged with the execution
/// service. `Arg` is what callers pass alongside a query template: either a
/// scalar bound to one placeholder or a list that an IN-marker expands into
/// several. `SqlField` moves a single `Value` in and out of a record field.
///

use serde::Serialize;

use crate::error::{Error, Result};

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
    /// Storage class name, used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

macro_rules! impl_value_from_integer {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Integer(i64::from(v))
            }
        }
    )*};
}

impl_value_from_integer!(i64, i32, i16, i8, u32, u16, u8);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(if v { 1 } else { 0 })
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

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// A positional query argument.
///
/// `List` is only meaningful at the position consumed by an IN-marker; the
/// expander splices its elements into the final argument list.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Scalar(Value),
    List(Vec<Value>),
}

impl Arg {
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Arg::List(items.into_iter().map(Into::into).collect())
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Arg::List(_))
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Scalar(v)
    }
}

macro_rules! impl_arg_from_scalar {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Arg {
            fn from(v: $ty) -> Self {
                Arg::Scalar(Value::from(v))
            }
        }
    )*};
}

impl_arg_from_scalar!(i64, i32, i16, i8, u32, u16, u8, f64, f32, bool, String);

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Scalar(Value::from(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        Arg::Scalar(Value::from(v))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Arg {
    fn from(v: Vec<T>) -> Self {
        Arg::list(v)
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Arg {
    fn from(v: &[T]) -> Self {
        Arg::list(v.iter().cloned())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Arg {
    fn from(v: [T; N]) -> Self {
        Arg::list(v)
    }
}

/// Builds a `Vec<Arg>` from heterogeneous expressions.
///
/// ```rust
/// use rowmap::{args, Arg, Value};
///
/// let a = args![7, vec![1, 2, 3], "x"];
/// assert_eq!(a[0], Arg::Scalar(Value::Integer(7)));
/// assert!(a[1].is_list());
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Arg>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Arg::from($arg)),+]
    };
}

/// Single-value encode/decode for a record field.
///
/// Implement this for a custom type to have it stored in one column, even
/// when it is itself a struct. Encoding fails when the field holds a value
/// the column type cannot represent.
pub trait SqlField {
    fn to_value(&self) -> Result<Value>;

    fn set_value(&mut self, value: Value) -> Result<()>;
}

fn mismatch(expected: &'static str, found: &Value) -> Error {
    Error::Conversion {
        expected,
        found: found.type_name(),
    }
}

// i64::MIN is exactly representable; 2^63 is the first value past i64::MAX.
const I64_MIN_F64: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX_F64: f64 = 9_223_372_036_854_775_808.0;

fn integer_from(expected: &'static str, value: &Value) -> Result<i64> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::Real(f) if f.fract() == 0.0 && (I64_MIN_F64..I64_MAX_F64).contains(f) => Ok(*f as i64),
        Value::Text(s) => s.trim().parse::<i64>().map_err(|_| mismatch(expected, value)),
        other => Err(mismatch(expected, other)),
    }
}

macro_rules! impl_integer_field {
    ($($ty:ty),*) => {$(
        impl SqlField for $ty {
            fn to_value(&self) -> Result<Value> {
                Ok(Value::Integer(i64::from(*self)))
            }

            fn set_value(&mut self, value: Value) -> Result<()> {
                let wide = integer_from(stringify!($ty), &value)?;
                *self = <$ty>::try_from(wide).map_err(|_| Error::Conversion {
                    expected: stringify!($ty),
                    found: "out-of-range INTEGER",
                })?;
                Ok(())
            }
        }
    )*};
}

impl_integer_field!(i64, i32, i16, i8, u32, u16, u8);

macro_rules! impl_wide_unsigned_field {
    ($($ty:ty),*) => {$(
        impl SqlField for $ty {
            fn to_value(&self) -> Result<Value> {
                i64::try_from(*self).map(Value::Integer).map_err(|_| Error::Conversion {
                    expected: "INTEGER",
                    found: concat!(stringify!($ty), " above i64::MAX"),
                })
            }

            fn set_value(&mut self, value: Value) -> Result<()> {
                let wide = integer_from(stringify!($ty), &value)?;
                *self = <$ty>::try_from(wide).map_err(|_| Error::Conversion {
                    expected: stringify!($ty),
                    found: "negative INTEGER",
                })?;
                Ok(())
            }
        }
    )*};
}

impl_wide_unsigned_field!(u64, usize);

impl SqlField for f64 {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Real(*self))
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        *self = match value {
            Value::Real(f) => f,
            Value::Integer(i) => i as f64,
            Value::Text(ref s) => s.trim().parse::<f64>().map_err(|_| mismatch("f64", &value))?,
            other => return Err(mismatch("f64", &other)),
        };
        Ok(())
    }
}

impl SqlField for f32 {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Real(f64::from(*self)))
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        let mut wide = 0.0f64;
        wide.set_value(value).map_err(|_| Error::Conversion {
            expected: "f32",
            found: "non-numeric value",
        })?;
        *self = wide as f32;
        Ok(())
    }
}

impl SqlField for bool {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::from(*self))
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        *self = match value {
            Value::Integer(i) => i != 0,
            Value::Real(f) => f != 0.0,
            Value::Text(ref s) => match s.as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(mismatch("bool", &value)),
            },
            other => return Err(mismatch("bool", &other)),
        };
        Ok(())
    }
}

impl SqlField for String {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Text(self.clone()))
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        *self = match value {
            Value::Text(s) => s,
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Blob(b) => String::from_utf8(b).map_err(|_| Error::Conversion {
                expected: "String",
                found: "non-UTF-8 BLOB",
            })?,
            Value::Null => return Err(mismatch("String", &Value::Null)),
        };
        Ok(())
    }
}

impl SqlField for Vec<u8> {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Blob(self.clone()))
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        *self = match value {
            Value::Blob(b) => b,
            Value::Text(s) => s.into_bytes(),
            other => return Err(mismatch("Vec<u8>", &other)),
        };
        Ok(())
    }
}

impl<T: SqlField + Default> SqlField for Option<T> {
    fn to_value(&self) -> Result<Value> {
        match self {
            Some(inner) => inner.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        let mut inner = T::default();
        inner.set_value(value)?;
        *self = Some(inner);
        Ok(())
    }
}

impl SqlField for Value {
    fn to_value(&self) -> Result<Value> {
        Ok(self.clone())
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        *self = value;
        Ok(())
    }
}
