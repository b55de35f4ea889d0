//! Error type for the local store

use keyway_common::Error;

/// Error type for local store operations
#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("table already exists: {0}")]
    TableExists(String),
    #[error("{0}")]
    Validation(String),
}

impl From<redb::TransactionError> for LocalStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl LocalStoreError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<LocalStoreError> for Error {
    fn from(e: LocalStoreError) -> Self {
        match e {
            LocalStoreError::Validation(msg) => Self::Validation(msg),
            LocalStoreError::TableExists(name) => {
                Self::Validation(format!("table already exists: {name}"))
            }
            LocalStoreError::TableNotFound(name) => Self::ResourceNotFound(name),
            other => Self::Storage(other.to_string()),
        }
    }
}

pub type LocalStoreResult<T> = Result<T, LocalStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err: Error = LocalStoreError::validation("duplicate key").into();
        assert!(err.is_validation());

        let err: Error = LocalStoreError::TableNotFound("users".into()).into();
        assert!(matches!(err, Error::ResourceNotFound(name) if name == "users"));

        let err: Error = LocalStoreError::Io(std::io::Error::other("disk")).into();
        assert!(matches!(err, Error::Storage(_)));
        assert!(!err.is_retryable());
    }
}
