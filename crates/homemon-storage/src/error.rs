use std::path::PathBuf;

/// Errors that can occur within the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An I/O failure on a history partition or its containing directory.
    #[error("history: I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
