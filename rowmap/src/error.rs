///
/// Mapping error types.
///
/// All errors that can occur while rewriting templates, resolving record
/// metadata, scanning rows and talking to the execution service. Nothing in
/// this crate retries; every error is returned to the caller with context.
///

use thiserror::Error;

/// Error type produced by execution services.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Not enough arguments for IN list: argument {index} requested, {supplied} supplied")]
    Arity { index: usize, supplied: usize },

    #[error("Expected exactly one primary key on '{type_name}'; got {found}")]
    PrimaryKey { type_name: &'static str, found: usize },

    #[error("Record '{type_name}' is not mappable: {reason}")]
    Schema {
        type_name: &'static str,
        reason: String,
    },

    #[error("Cannot convert {found} into {expected}")]
    Conversion {
        expected: &'static str,
        found: &'static str,
    },

    #[error("No rows in result set")]
    NoRows,

    #[error("{context}: {source}")]
    Execution {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{primary} (closing the cursor also failed: {cleanup})")]
    Joined {
        primary: Box<Error>,
        cleanup: Box<Error>,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub fn usage(message: impl Into<String>) -> Self {
        Error::Usage(message.into())
    }

    pub fn execution(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Execution {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Combines a primary error with a resource-release error.
    pub fn joined(primary: Error, cleanup: Error) -> Self {
        Error::Joined {
            primary: Box::new(primary),
            cleanup: Box::new(cleanup),
        }
    }

    /// True when the error is, or wraps, an empty single-row result.
    pub fn is_no_rows(&self) -> bool {
        match self {
            Error::NoRows => true,
            Error::Context { source, .. } => source.is_no_rows(),
            Error::Joined { primary, .. } => primary.is_no_rows(),
            _ => false,
        }
    }
}

/// Merges the outcome of an operation with the outcome of closing its cursor.
pub fn join_close<T>(result: Result<T>, close: Result<()>) -> Result<T> {
    match (result, close) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(cleanup)) => Err(cleanup),
        (Err(primary), Ok(())) => Err(primary),
        (Err(primary), Err(cleanup)) => {
            tracing::warn!(error = %cleanup, "cursor close failed after an earlier error");
            Err(Error::joined(primary, cleanup))
        }
    }
}
