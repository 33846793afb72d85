use crate::transfer::endpoint::TransferEndpoint;
use crate::transfer::error::{EndpointError, EndpointResult};
use crate::transfer::types::ResumeToken;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Default)]
struct Session {
    total: u64,
    received: Vec<u8>,
    finalized: bool,
    /// Offsets of accepted chunks, in arrival order. Lets tests verify that
    /// a resumed transfer never resends confirmed bytes.
    accepted_offsets: Vec<u64>,
}

/// In-memory far end of the resumable upload protocol. Used by the demo and
/// the test suite; supports one-shot failure injection at a byte offset,
/// random chunk loss, and a finalize gate for admission tests.
pub struct MemoryEndpoint {
    sessions: DashMap<ResumeToken, Session>,
    fail_at_offset: Mutex<Option<u64>>,
    finalize_gate: Option<Arc<Semaphore>>,
    loss_rate: f32,
}

impl MemoryEndpoint {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            fail_at_offset: Mutex::new(None),
            finalize_gate: None,
            loss_rate: 0.0,
        }
    }

    /// Hold every `finalize` call until a permit is added to the gate.
    pub fn with_finalize_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.finalize_gate = Some(gate);
        self
    }

    /// Drop chunks at random with the given probability.
    pub fn with_loss_rate(mut self, loss_rate: f32) -> Self {
        self.loss_rate = loss_rate.clamp(0.0, 1.0);
        self
    }

    /// Fail the next chunk attempted at exactly this offset, once.
    pub fn inject_failure_at(&self, offset: u64) {
        *self.fail_at_offset.lock() = Some(offset);
    }

    pub fn confirmed(&self, token: &ResumeToken) -> Option<u64> {
        self.sessions.get(token).map(|s| s.received.len() as u64)
    }

    pub fn received_bytes(&self, token: &ResumeToken) -> Option<Bytes> {
        self.sessions
            .get(token)
            .map(|s| Bytes::from(s.received.clone()))
    }

    pub fn accepted_offsets(&self, token: &ResumeToken) -> Option<Vec<u64>> {
        self.sessions.get(token).map(|s| s.accepted_offsets.clone())
    }

    pub fn is_finalized(&self, token: &ResumeToken) -> Option<bool> {
        self.sessions.get(token).map(|s| s.finalized)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for MemoryEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransferEndpoint for MemoryEndpoint {
    async fn create(&self, total_size: u64) -> EndpointResult<ResumeToken> {
        let token = ResumeToken::generate();
        self.sessions.insert(
            token.clone(),
            Session {
                total: total_size,
                ..Session::default()
            },
        );
        tracing::debug!(token = %token, total = total_size, "session created");
        Ok(token)
    }

    async fn resume(&self, token: &ResumeToken) -> EndpointResult<u64> {
        self.sessions
            .get(token)
            .map(|s| s.received.len() as u64)
            .ok_or_else(|| EndpointError::SessionNotFound(token.to_string()))
    }

    async fn send_chunk(
        &self,
        token: &ResumeToken,
        offset: u64,
        bytes: Bytes,
    ) -> EndpointResult<u64> {
        if self.loss_rate > 0.0 && rand::thread_rng().gen::<f32>() < self.loss_rate {
            return Err(EndpointError::Network("simulated chunk loss".into()));
        }

        {
            let mut fail_at = self.fail_at_offset.lock();
            if *fail_at == Some(offset) {
                fail_at.take();
                return Err(EndpointError::Network(format!(
                    "injected failure at offset {offset}"
                )));
            }
        }

        let mut session = self
            .sessions
            .get_mut(token)
            .ok_or_else(|| EndpointError::SessionNotFound(token.to_string()))?;

        if session.finalized {
            return Err(EndpointError::AlreadyFinalized(token.to_string()));
        }

        let confirmed = session.received.len() as u64;
        if offset != confirmed {
            return Err(EndpointError::OffsetMismatch {
                expected: confirmed,
            });
        }

        let len = bytes.len() as u64;
        if confirmed + len > session.total {
            return Err(EndpointError::SizeExceeded {
                offset,
                len,
                total: session.total,
            });
        }

        session.received.extend_from_slice(&bytes);
        session.accepted_offsets.push(offset);
        Ok(session.received.len() as u64)
    }

    async fn finalize(&self, token: &ResumeToken) -> EndpointResult<()> {
        if let Some(gate) = &self.finalize_gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| EndpointError::Network("finalize gate closed".into()))?;
            permit.forget();
        }

        let mut session = self
            .sessions
            .get_mut(token)
            .ok_or_else(|| EndpointError::SessionNotFound(token.to_string()))?;

        let confirmed = session.received.len() as u64;
        if confirmed != session.total {
            return Err(EndpointError::SizeMismatch {
                confirmed,
                total: session.total,
            });
        }

        session.finalized = true;
        Ok(())
    }
}
