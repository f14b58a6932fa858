use crate::{Error, truncate_long};
use thiserror::Error;

/// The kinds of failure a query can report.
///
/// They travel inside [`crate::Error`] and can be recovered with
/// `error.downcast_ref::<QueryError>()`, even after more context was attached.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Malformed placeholder in the SQL text.
    #[error("Syntax error in `{sql}`: {message}")]
    Syntax { sql: String, message: String },

    /// The parameters supplied do not fit the statement, detected before any I/O.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Prepare, execute, fetch, commit or close failed in the driver.
    #[error("Execution error: {0}")]
    Execution(String),

    /// The row decoder failed.
    #[error("Mapping error: {0}")]
    Mapping(String),
}

impl QueryError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, QueryError::Configuration(..))
    }
    pub fn is_syntax(&self) -> bool {
        matches!(self, QueryError::Syntax { .. })
    }
    pub fn is_execution(&self) -> bool {
        matches!(self, QueryError::Execution(..))
    }
    pub fn is_mapping(&self) -> bool {
        matches!(self, QueryError::Mapping(..))
    }
}

/// Returns the [`QueryError`] kind carried by `error`, if any.
pub fn query_error(error: &Error) -> Option<&QueryError> {
    error.downcast_ref::<QueryError>()
}

pub(crate) fn syntax(sql: &str, message: impl Into<String>) -> Error {
    let error = Error::new(QueryError::Syntax {
        sql: truncate_long!(sql),
        message: message.into(),
    });
    log::error!("{:#}", error);
    error
}

pub(crate) fn configuration(message: impl Into<String>) -> Error {
    let error = Error::new(QueryError::Configuration(message.into()));
    log::error!("{:#}", error);
    error
}

pub(crate) fn execution(error: Error, message: impl Into<String>) -> Error {
    if query_error(&error).is_some() {
        return error;
    }
    let error = error.context(QueryError::Execution(message.into()));
    log::error!("{:#}", error);
    error
}

pub(crate) fn mapping(error: Error, message: impl Into<String>) -> Error {
    let error = error.context(QueryError::Mapping(message.into()));
    log::error!("{:#}", error);
    error
}
