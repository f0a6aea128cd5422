//! Store-level error types.

use thiserror::Error;

/// Errors raised by a [`crate::store::TreeStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened or reached.
    #[error("cannot reach store at {target}: {source}")]
    Connectivity {
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The database location could not be prepared on disk.
    #[error("cannot prepare {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An expected table or column is absent.
    #[error("schema mismatch: {table}.{column} is missing")]
    Schema { table: String, column: String },

    /// A batched write addressed a row that does not exist.
    #[error("no tree_data row with id {id}; batch rolled back")]
    MissingRow { id: i64 },

    /// Any other statement failure.
    #[error("failed to {action}: {source}")]
    Query {
        action: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl StoreError {
    pub(crate) fn query(action: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> Self {
        let action = action.into();
        move |source| Self::Query { action, source }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
