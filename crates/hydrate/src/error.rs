//! Error types for the hydration layer
//!
//! Structural errors (empty alias map, unknown table alias, unknown query
//! part) abort the current `execute` call. Driver errors are carried through
//! unchanged after the cursor has been released.

use thiserror::Error;

/// Result type alias for hydration operations
pub type HydrateResult<T> = Result<T, HydrateError>;

/// Error types for hydration operations
#[derive(Debug, Error)]
pub enum HydrateError {
    /// The component alias map has no entries
    #[error("Couldn't execute query. Component alias map was empty.")]
    EmptyAliasMap,

    /// A row referenced a table alias that is not in the table alias map
    #[error("Unknown table alias '{0}'")]
    UnknownTableAlias(String),

    /// A clause name not known to the query part accessor
    #[error("Unknown query part '{0}'")]
    UnknownQueryPart(String),

    /// The alias map does not describe a tree rooted at its first entry
    #[error("Invalid alias map: {0}")]
    InvalidAliasMap(String),

    /// Cursor or connection failure reported by an executor
    #[error("Database error: {0}")]
    Database(String),

    /// Driver error raised by sqlx
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HydrateError {
    /// Whether this error describes a metadata/query mismatch rather than a
    /// driver failure
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            HydrateError::EmptyAliasMap
                | HydrateError::UnknownTableAlias(_)
                | HydrateError::UnknownQueryPart(_)
                | HydrateError::InvalidAliasMap(_)
        )
    }
}

impl From<serde_json::Error> for HydrateError {
    fn from(err: serde_json::Error) -> Self {
        HydrateError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for HydrateError {
    fn from(err: serde_yaml::Error) -> Self {
        HydrateError::Serialization(err.to_string())
    }
}
