mod error;
mod manager;

pub use error::{ManagerError, ManagerResult};
pub use manager::{ManagerConfig, UploadManager};
