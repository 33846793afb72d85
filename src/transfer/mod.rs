mod client;
mod endpoint;
mod error;
mod memory;
mod types;

pub use client::TransferClient;
pub use endpoint::TransferEndpoint;
pub use error::{EndpointError, EndpointResult, TransferError, TransferResult};
pub use memory::MemoryEndpoint;
pub use types::{ClientState, ResumeToken, TransferEvent};
