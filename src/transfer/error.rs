use thiserror::Error;

/// Failures reported by the far end of the resumable-upload protocol.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EndpointError {
    #[error("Offset mismatch: far end expects offset {expected}")]
    OffsetMismatch { expected: u64 },

    #[error("Unknown session: {0}")]
    SessionNotFound(String),

    #[error("Session already finalized: {0}")]
    AlreadyFinalized(String),

    #[error("Size mismatch: {confirmed} of {total} bytes confirmed")]
    SizeMismatch { confirmed: u64, total: u64 },

    #[error("Chunk exceeds declared size: offset {offset} + {len} > {total}")]
    SizeExceeded { offset: u64, len: u64, total: u64 },

    #[error("Network error: {0}")]
    Network(String),
}

pub type EndpointResult<T> = Result<T, EndpointError>;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid transfer state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Resync limit reached after {0} offset mismatches")]
    ResyncLimit(u32),

    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),
}

pub type TransferResult<T> = Result<T, TransferError>;
