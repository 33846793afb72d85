use crate::transfer::error::EndpointResult;
use crate::transfer::types::ResumeToken;
use async_trait::async_trait;
use bytes::Bytes;

/// Minimal surface of the resumable chunked-upload protocol. A session is
/// created once per fresh transfer; after an interruption the preserved token
/// lets a client continue from the far end's confirmed offset instead of
/// resending bytes.
#[async_trait]
pub trait TransferEndpoint: Send + Sync {
    /// Open a new session for a file of `total_size` bytes.
    async fn create(&self, total_size: u64) -> EndpointResult<ResumeToken>;

    /// Query the offset the far end has durably received for this session.
    async fn resume(&self, token: &ResumeToken) -> EndpointResult<u64>;

    /// Append one chunk at `offset`. Returns the new confirmed offset, or
    /// `OffsetMismatch` when `offset` disagrees with the far end, in which
    /// case the client must re-query via `resume`.
    async fn send_chunk(&self, token: &ResumeToken, offset: u64, bytes: Bytes)
        -> EndpointResult<u64>;

    /// Close the session once the confirmed offset equals the declared total.
    async fn finalize(&self, token: &ResumeToken) -> EndpointResult<()>;
}
