/// Errors that can occur within the storage layer.
///
/// Empty result sets are never errors here: a query that matches nothing
/// returns an empty `Vec`. Only genuine storage failures surface as
/// `StorageError`, and callers propagate them upward without retrying.
///
/// # Examples
///
/// ```rust
/// use watchdesk_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "host_group",
///     id: "group-99".to_string(),
/// };
/// assert!(err.to_string().contains("host_group"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failure (e.g. the tags column).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
