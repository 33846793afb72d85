use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque handle for a resumable upload session. The far end tracks how many
/// bytes it has durably received under this token; the client never
/// interprets the contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResumeToken(String);

impl ResumeToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-file transfer state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClientState {
    Idle,
    Negotiating,
    Streaming { confirmed: u64 },
    Verifying,
    Done,
    Failed { error: String },
}

impl ClientState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientState::Done | ClientState::Failed { .. })
    }
}

/// Events a transfer client emits while driving one upload. All shared-state
/// mutation happens on the receiving side; the client only reports.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// Session created or resumed; carries the token and the offset the far
    /// end has already confirmed.
    Negotiated {
        name: String,
        token: ResumeToken,
        confirmed_offset: u64,
    },
    Progress {
        name: String,
        percent: u8,
    },
    /// All bytes sent, waiting for the far end to verify the total.
    Finalising {
        name: String,
    },
    Succeeded {
        name: String,
    },
    Failed {
        name: String,
        error: String,
    },
}

impl TransferEvent {
    pub fn name(&self) -> &str {
        match self {
            TransferEvent::Negotiated { name, .. }
            | TransferEvent::Progress { name, .. }
            | TransferEvent::Finalising { name }
            | TransferEvent::Succeeded { name }
            | TransferEvent::Failed { name, .. } => name,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferEvent::Succeeded { .. } | TransferEvent::Failed { .. }
        )
    }
}
