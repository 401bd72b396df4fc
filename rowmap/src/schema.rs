///
/// Record schema declaration.
///
/// A record type describes its mappable fields once, statically, through
/// `Record::schema()`, and exposes them by structural index through
/// `Fields`. Declaration order is the structural index order. Embedded
/// sub-records are reached by a `FieldPath`: the outer field's index
/// followed by the path inside the sub-record.
///
/// The `record!` macro writes both impls for a plain struct:
///
/// ```rust
/// use rowmap::record;
///
/// #[derive(Debug, Default)]
/// struct Audit {
///     created_by: String,
/// }
///
/// #[derive(Debug, Default)]
/// struct User {
///     id: i64,
///     name: String,
///     password: String,
///     audit: Audit,
/// }
///
/// record!(Audit {
///     created_by: String => value,
/// });
///
/// record!(User {
///     id: i64 => value [primary_key],
///     name: String => value [column = "user_name"],
///     password: String => value [ignore],
///     audit: Audit => embedded,
/// });
/// ```
///
/// Markers: `column = "..."` overrides the column name, `skip` removes the
/// field from every mapping, `primary_key` marks the single key field, and
/// `ignore` keeps the field out of INSERT and UPDATE column lists.
///

use std::any::TypeId;

use smallvec::SmallVec;

use crate::value::SqlField;

/// Structural indices leading from a record to one of its fields.
pub type FieldPath = SmallVec<[usize; 4]>;

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Value,
    Embedded(fn() -> Schema),
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub ident: &'static str,
    pub column: Option<&'static str>,
    pub skip: bool,
    pub primary_key: bool,
    pub ignore: bool,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn value(ident: &'static str) -> Self {
        FieldSpec {
            ident,
            column: None,
            skip: false,
            primary_key: false,
            ignore: false,
            kind: FieldKind::Value,
        }
    }

    pub fn embedded<R: Record>(ident: &'static str) -> Self {
        FieldSpec {
            kind: FieldKind::Embedded(R::schema),
            ..FieldSpec::value(ident)
        }
    }

    pub fn column(mut self, name: &'static str) -> Self {
        self.column = Some(name);
        self
    }

    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// The name fed to the name mapper: the override, else the identifier.
    pub fn raw_name(&self) -> &'static str {
        self.column.unwrap_or(self.ident)
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn of<R: 'static>(fields: Vec<FieldSpec>) -> Self {
        Schema {
            type_id: TypeId::of::<R>(),
            type_name: std::any::type_name::<R>(),
            fields,
        }
    }
}

pub enum FieldRef<'a> {
    Value(&'a dyn SqlField),
    Record(&'a dyn Fields),
}

pub enum FieldMut<'a> {
    Value(&'a mut dyn SqlField),
    Record(&'a mut dyn Fields),
}

/// Index-based field access.
pub trait Fields {
    fn field(&self, index: usize) -> Option<FieldRef<'_>>;

    fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>>;
}

/// A type that maps to a table row.
pub trait Record: Fields + Default + 'static {
    fn schema() -> Schema;
}

/// Follows `path` through embedded records to a single-value field.
pub fn value_at<'a>(record: &'a dyn Fields, path: &[usize]) -> Option<&'a dyn SqlField> {
    let (&first, rest) = path.split_first()?;
    match record.field(first)? {
        FieldRef::Value(value) if rest.is_empty() => Some(value),
        FieldRef::Record(inner) if !rest.is_empty() => value_at(inner, rest),
        _ => None,
    }
}

pub fn value_at_mut<'a>(record: &'a mut dyn Fields, path: &[usize]) -> Option<&'a mut dyn SqlField> {
    let (&first, rest) = path.split_first()?;
    match record.field_mut(first)? {
        FieldMut::Value(value) if rest.is_empty() => Some(value),
        FieldMut::Record(inner) if !rest.is_empty() => value_at_mut(inner, rest),
        _ => None,
    }
}

#[doc(hidden)]
pub mod spec {
    use super::{FieldSpec, Record};
    use crate::value::SqlField;

    pub fn value<T: SqlField>(ident: &'static str) -> FieldSpec {
        FieldSpec::value(ident)
    }

    pub fn embedded<R: Record>(ident: &'static str) -> FieldSpec {
        FieldSpec::embedded::<R>(ident)
    }
}

#[doc(hidden)]
pub mod field_ref {
    use super::{FieldRef, Fields};
    use crate::value::SqlField;

    pub fn value<T: SqlField>(v: &T) -> FieldRef<'_> {
        FieldRef::Value(v)
    }

    pub fn embedded<R: Fields>(v: &R) -> FieldRef<'_> {
        FieldRef::Record(v)
    }
}

#[doc(hidden)]
pub mod field_mut {
    use super::{FieldMut, Fields};
    use crate::value::SqlField;

    pub fn value<T: SqlField>(v: &mut T) -> FieldMut<'_> {
        FieldMut::Value(v)
    }

    pub fn embedded<R: Fields>(v: &mut R) -> FieldMut<'_> {
        FieldMut::Record(v)
    }
}

/// Implements `Fields` and `Record` for a struct.
///
/// Each entry is `field: Type => value` or `field: Type => embedded`,
/// optionally followed by markers in brackets. Entry order defines the
/// structural indices.
#[macro_export]
macro_rules! record {
    (
        $ty:ident {
            $(
                $field:ident : $fty:ty => $kind:ident
                $( [ $( $marker:ident $( = $arg:literal )? ),* $(,)? ] )?
            ),* $(,)?
        }
    ) => {
        impl $crate::Fields for $ty {
            fn field(&self, index: usize) -> ::std::option::Option<$crate::FieldRef<'_>> {
                let mut _position = 0usize;
                $(
                    if index == _position {
                        return ::std::option::Option::Some(
                            $crate::schema::field_ref::$kind::<$fty>(&self.$field),
                        );
                    }
                    _position += 1;
                )*
                ::std::option::Option::None
            }

            fn field_mut(&mut self, index: usize) -> ::std::option::Option<$crate::FieldMut<'_>> {
                let mut _position = 0usize;
                $(
                    if index == _position {
                        return ::std::option::Option::Some(
                            $crate::schema::field_mut::$kind::<$fty>(&mut self.$field),
                        );
                    }
                    _position += 1;
                )*
                ::std::option::Option::None
            }
        }

        impl $crate::Record for $ty {
            fn schema() -> $crate::Schema {
                $crate::Schema::of::<Self>(::std::vec![
                    $(
                        $crate::schema::spec::$kind::<$fty>(::std::stringify!($field))
                            $( $( .$marker( $( $arg )? ) )* )?
                    ),*
                ])
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[derive(Debug, Default, PartialEq)]
    struct Inner {
        code: String,
        level: i32,
    }

    #[derive(Debug, Default, PartialEq)]
    struct Outer {
        id: i64,
        inner: Inner,
        note: Option<String>,
    }

    crate::record!(Inner {
        code: String => value [column = "inner_code"],
        level: i32 => value,
    });

    crate::record!(Outer {
        id: i64 => value [primary_key],
        inner: Inner => embedded,
        note: Option<String> => value [ignore, skip],
    });

    #[test]
    fn test_macro_schema_keeps_declaration_order_and_markers() {
        let schema = Outer::schema();
        assert_eq!(schema.type_id, TypeId::of::<Outer>());
        assert!(schema.type_name.ends_with("Outer"));

        let idents: Vec<_> = schema.fields.iter().map(|f| f.ident).collect();
        assert_eq!(idents, vec!["id", "inner", "note"]);

        assert!(schema.fields[0].primary_key);
        assert!(matches!(schema.fields[1].kind, FieldKind::Embedded(_)));
        assert!(schema.fields[2].ignore);
        assert!(schema.fields[2].skip);

        let inner = Inner::schema();
        assert_eq!(inner.fields[0].raw_name(), "inner_code");
        assert_eq!(inner.fields[1].raw_name(), "level");
    }

    #[test]
    fn test_value_at_walks_embedded_paths() {
        let outer = Outer {
            id: 7,
            inner: Inner {
                code: "x1".to_string(),
                level: 3,
            },
            note: None,
        };

        let id = value_at(&outer, &[0]).expect("id should resolve");
        assert_eq!(id.to_value().unwrap(), Value::Integer(7));

        let level = value_at(&outer, &[1, 1]).expect("inner.level should resolve");
        assert_eq!(level.to_value().unwrap(), Value::Integer(3));

        assert!(value_at(&outer, &[1]).is_none(), "embedded record is not a value");
        assert!(value_at(&outer, &[0, 1]).is_none(), "value has no children");
        assert!(value_at(&outer, &[9]).is_none());
        assert!(value_at(&outer, &[]).is_none());
    }

    #[test]
    fn test_value_at_mut_writes_through_embedded_paths() {
        let mut outer = Outer::default();

        value_at_mut(&mut outer, &[1, 0])
            .expect("inner.code should resolve")
            .set_value(Value::Text("abc".to_string()))
            .unwrap();
        value_at_mut(&mut outer, &[2])
            .expect("note should resolve")
            .set_value(Value::Text("hello".to_string()))
            .unwrap();

        assert_eq!(outer.inner.code, "abc");
        assert_eq!(outer.note.as_deref(), Some("hello"));
    }
}
