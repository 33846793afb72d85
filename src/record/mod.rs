mod store;
mod types;

pub use store::FileStore;
pub use types::{
    FileKind, FileRecord, FileRole, FileStatus, ProcessingConfig, ProcessingKind,
    ProcessingRequest, StageStatus,
};
