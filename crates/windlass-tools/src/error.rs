//! Tools packaging error types

use thiserror::Error;
use windlass_storage::StorageError;

#[derive(Error, Debug)]
pub enum ToolsError {
    #[error("archive entry {0:?} is not a regular file")]
    NotRegularFile(String),

    #[error("archive entry {0:?} is not user-executable")]
    NotExecutable(String),

    #[error("refusing to unpack entry with unsafe name {0:?}")]
    UnsafeEntryName(String),

    #[error("invalid tools version {0:?}")]
    InvalidVersion(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ToolsError>;
