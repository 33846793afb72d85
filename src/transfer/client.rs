use crate::transfer::endpoint::TransferEndpoint;
use crate::transfer::error::{EndpointError, TransferError, TransferResult};
use crate::transfer::types::{ClientState, ResumeToken, TransferEvent};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Consecutive offset mismatches tolerated before giving up.
const MAX_RESYNCS: u32 = 3;

/// Drives one file through the resumable upload protocol: negotiate a
/// session, stream the remaining bytes in bounded chunks, then verify.
/// Failure is surfaced once and never retried here; resumption is a fresh
/// invocation reusing the preserved token.
pub struct TransferClient {
    endpoint: Arc<dyn TransferEndpoint>,
    chunk_size: usize,
    events: mpsc::UnboundedSender<TransferEvent>,
}

impl TransferClient {
    pub fn new(
        endpoint: Arc<dyn TransferEndpoint>,
        chunk_size: usize,
        events: mpsc::UnboundedSender<TransferEvent>,
    ) -> Self {
        Self {
            endpoint,
            chunk_size: chunk_size.max(1),
            events,
        }
    }

    /// Run the transfer to a terminal state. The outcome is reported through
    /// the event channel; the returned result mirrors it for callers that
    /// await the client directly.
    pub async fn run(
        &self,
        name: &str,
        payload: Bytes,
        resume: Option<ResumeToken>,
    ) -> TransferResult<()> {
        let total = payload.len() as u64;
        let mut state = ClientState::Idle;
        advance(&mut state, ClientState::Negotiating)?;

        let (token, mut confirmed) = match self.negotiate(total, resume).await {
            Ok(session) => session,
            Err(e) => return self.fail(name, &mut state, e),
        };
        tracing::debug!(file = name, token = %token, offset = confirmed, "session negotiated");
        self.emit(TransferEvent::Negotiated {
            name: name.to_string(),
            token: token.clone(),
            confirmed_offset: confirmed,
        });

        if confirmed < total {
            advance(&mut state, ClientState::Streaming { confirmed })?;
        }

        let mut resyncs = 0u32;
        while confirmed < total {
            let end = (confirmed + self.chunk_size as u64).min(total);
            let chunk = payload.slice(confirmed as usize..end as usize);

            match self.endpoint.send_chunk(&token, confirmed, chunk).await {
                Ok(new_confirmed) => {
                    resyncs = 0;
                    confirmed = new_confirmed;
                    advance(&mut state, ClientState::Streaming { confirmed })?;
                    self.emit(TransferEvent::Progress {
                        name: name.to_string(),
                        percent: stream_percent(confirmed, total),
                    });
                }
                Err(EndpointError::OffsetMismatch { expected }) => {
                    resyncs += 1;
                    if resyncs > MAX_RESYNCS {
                        return self.fail(name, &mut state, TransferError::ResyncLimit(resyncs));
                    }
                    tracing::warn!(
                        file = name,
                        expected,
                        had = confirmed,
                        "offset out of sync, re-querying confirmed offset"
                    );
                    match self.endpoint.resume(&token).await {
                        Ok(offset) => confirmed = offset,
                        Err(e) => return self.fail(name, &mut state, e.into()),
                    }
                }
                Err(e) => return self.fail(name, &mut state, e.into()),
            }
        }

        advance(&mut state, ClientState::Verifying)?;
        self.emit(TransferEvent::Finalising {
            name: name.to_string(),
        });

        if let Err(e) = self.endpoint.finalize(&token).await {
            return self.fail(name, &mut state, e.into());
        }

        advance(&mut state, ClientState::Done)?;
        self.emit(TransferEvent::Progress {
            name: name.to_string(),
            percent: 100,
        });
        self.emit(TransferEvent::Succeeded {
            name: name.to_string(),
        });
        tracing::info!(file = name, bytes = total, "transfer complete");
        Ok(())
    }

    async fn negotiate(
        &self,
        total: u64,
        resume: Option<ResumeToken>,
    ) -> TransferResult<(ResumeToken, u64)> {
        match resume {
            Some(token) => {
                let confirmed = self.endpoint.resume(&token).await?;
                Ok((token, confirmed))
            }
            None => Ok((self.endpoint.create(total).await?, 0)),
        }
    }

    fn fail(
        &self,
        name: &str,
        state: &mut ClientState,
        err: TransferError,
    ) -> TransferResult<()> {
        let message = err.to_string();
        *state = ClientState::Failed {
            error: message.clone(),
        };
        tracing::warn!(file = name, error = %message, "transfer failed");
        self.emit(TransferEvent::Failed {
            name: name.to_string(),
            error: message,
        });
        Err(err)
    }

    fn emit(&self, event: TransferEvent) {
        // Receiver gone means the manager shut down; nothing left to notify.
        let _ = self.events.send(event);
    }
}

/// Progress while streaming, clamped below 100 until the final chunk is
/// acknowledged and the session verified.
fn stream_percent(confirmed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((confirmed as u128 * 100 / total as u128).min(99)) as u8
}

fn advance(state: &mut ClientState, next: ClientState) -> TransferResult<()> {
    let legal = matches!(
        (&*state, &next),
        (ClientState::Idle, ClientState::Negotiating)
            | (ClientState::Negotiating, ClientState::Streaming { .. })
            | (ClientState::Negotiating, ClientState::Verifying)
            | (ClientState::Streaming { .. }, ClientState::Streaming { .. })
            | (ClientState::Streaming { .. }, ClientState::Verifying)
            | (ClientState::Verifying, ClientState::Done)
    );

    if !legal {
        return Err(TransferError::InvalidTransition {
            from: format!("{state:?}"),
            to: format!("{next:?}"),
        });
    }

    *state = next;
    Ok(())
}
