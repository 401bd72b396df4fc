///
/// # Mapper Configuration
///
/// Settings for a `Mapper`, loadable from TOML. Every key is optional and
/// falls back to the built-in default.
///
/// ```toml
/// naming = "snake"          # "lower" (default) or "snake"
/// column_marker = "SELECT *"
/// in_marker = "IN (*)"
/// ```
///
/// The markers are literal substrings. They must be non-empty, must differ,
/// and neither may contain the other, or one rewrite would corrupt the
/// other's marker. The IN-marker may not contain `?` since placeholders are
/// counted around it.
///

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::naming::Naming;

pub const DEFAULT_COLUMN_MARKER: &str = "SELECT *";
pub const DEFAULT_IN_MARKER: &str = "IN (*)";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    pub naming: Naming,
    pub column_marker: String,
    pub in_marker: String,
}

impl Default for MapperConfig {
    fn default() -> Self {
        MapperConfig {
            naming: Naming::default(),
            column_marker: DEFAULT_COLUMN_MARKER.to_string(),
            in_marker: DEFAULT_IN_MARKER.to_string(),
        }
    }
}

impl MapperConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MapperConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        MapperConfig::from_toml_str(&content)
            .map_err(|e| e.context(format!("loading {}", path.display())))
    }

    pub fn validate(&self) -> Result<()> {
        if self.column_marker.is_empty() {
            return Err(Error::Config("column_marker must not be empty".to_string()));
        }
        if self.in_marker.is_empty() {
            return Err(Error::Config("in_marker must not be empty".to_string()));
        }
        if self.column_marker.contains(&self.in_marker) || self.in_marker.contains(&self.column_marker) {
            return Err(Error::Config(format!(
                "column_marker '{}' and in_marker '{}' overlap",
                self.column_marker, self.in_marker
            )));
        }
        if self.in_marker.contains('?') {
            return Err(Error::Config(format!(
                "in_marker '{}' must not contain a '?' placeholder",
                self.in_marker
            )));
        }
        Ok(())
    }
}
