///
/// Field-name to column-name mapping.
///
/// A name mapper turns a field identifier (or an explicit column override)
/// into the column name used in queries and when matching reported cursor
/// columns. The default lower-cases ASCII; `to_snake_case` is the common
/// alternative. Any `Fn(&str) -> String` can be installed on a `Mapper`.
///

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct NameMapper(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl NameMapper {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        NameMapper(Arc::new(f))
    }

    pub fn lower() -> Self {
        NameMapper::new(to_lower)
    }

    pub fn snake() -> Self {
        NameMapper::new(to_snake_case)
    }

    pub fn map(&self, name: &str) -> String {
        (self.0)(name)
    }
}

impl Default for NameMapper {
    fn default() -> Self {
        NameMapper::lower()
    }
}

impl fmt::Debug for NameMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NameMapper(..)")
    }
}

/// Built-in naming strategies selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Naming {
    #[default]
    Lower,
    Snake,
}

impl Naming {
    pub fn mapper(self) -> NameMapper {
        match self {
            Naming::Lower => NameMapper::lower(),
            Naming::Snake => NameMapper::snake(),
        }
    }
}

pub fn to_lower(src: &str) -> String {
    src.to_ascii_lowercase()
}

/// Converts `FirstName` and `firstName` to `first_name`.
///
/// An underscore is inserted before an uppercase letter that is not the
/// first character and does not follow another uppercase letter, so runs of
/// capitals stay together (`HTTPServer` becomes `httpserver`).
pub fn to_snake_case(src: &str) -> String {
    let mut out = String::with_capacity(src.len() + 4);
    let mut prev_upper = false;

    for (i, c) in src.chars().enumerate() {
        let this_upper = c.is_uppercase();
        if i > 0 && this_upper && !prev_upper {
            out.push('_');
        }
        prev_upper = this_upper;
        out.push(c);
    }

    out.to_lowercase()
}
