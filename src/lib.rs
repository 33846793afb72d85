//! Upload queue and resumable-transfer protocol manager: admits a bounded
//! number of selected files into concurrent chunked uploads, recovers from
//! partial failure via resumable sessions, and exposes per-file lifecycle
//! state through an action-based store.

pub mod manager;
pub mod record;
pub mod reducer;
pub mod scheduler;
pub mod transfer;

pub use manager::{ManagerConfig, ManagerError, UploadManager};
pub use record::{
    FileKind, FileRecord, FileRole, FileStatus, FileStore, ProcessingConfig, ProcessingKind,
    ProcessingRequest, StageStatus,
};
pub use reducer::{Action, MetaPatch, ReducerError};
pub use scheduler::{AdmissionScheduler, DEFAULT_CEILING};
pub use transfer::{
    EndpointError, MemoryEndpoint, ResumeToken, TransferClient, TransferEndpoint, TransferEvent,
};
