use crate::record::{FileKind, FileStatus, ProcessingKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReducerError {
    #[error("Duplicate file name: {0}")]
    DuplicateName(String),

    #[error("Processing {kind:?} is not supported for {file_kind:?} file {name}")]
    IncompatibleProcessing {
        name: String,
        file_kind: FileKind,
        kind: ProcessingKind,
    },

    #[error("Metadata is locked for {name} (status {status:?})")]
    TransferLocked { name: String, status: FileStatus },

    #[error("Cannot remove {name} while {status:?}")]
    RemovalDenied { name: String, status: FileStatus },

    #[error("Retry not available for {name} (status {status:?})")]
    RetryDenied { name: String, status: FileStatus },
}

pub type ReducerResult<T> = Result<T, ReducerError>;
