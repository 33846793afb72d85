use crate::record::{FileRecord, FileRole, ProcessingKind, ProcessingRequest, StageStatus};
use crate::transfer::ResumeToken;

/// Patch of a user-editable metadata field. System-owned fields (status,
/// progress, token) have their own dedicated actions.
#[derive(Debug, Clone)]
pub enum MetaPatch {
    Private(bool),
    Role(Option<FileRole>),
    Processing(Vec<ProcessingRequest>),
}

/// Every mutation of the file store is expressed as one of these. The
/// reducer is the sole writer; transfer clients and the surrounding UI only
/// request transitions.
#[derive(Debug, Clone)]
pub enum Action {
    /// Append new records as `unsubmitted`. Rejected atomically on any
    /// duplicate name or kind-incompatible processing request.
    AddFiles(Vec<FileRecord>),
    /// Delete a record. Permitted while `unsubmitted`, `queued` or `error`;
    /// a missing name is a benign no-op.
    RemoveFile(String),
    /// Mark every record that is not a terminal `success` as `queued` with a
    /// fresh session. Records mid-transfer are left untouched.
    QueueAll,
    /// Re-queue a failed record, preserving its resume token so the next
    /// transfer continues from the confirmed offset.
    RetryFile(String),
    SetMeta {
        name: String,
        patch: MetaPatch,
    },
    /// `queued -> submitting`, carrying the preserved token if any.
    BeginTransfer {
        name: String,
        resume_token: Option<ResumeToken>,
    },
    /// The client obtained a session token during negotiation.
    SessionNegotiated {
        name: String,
        token: ResumeToken,
    },
    Progress {
        name: String,
        percent: u8,
    },
    /// All bytes sent, far end verifying the total.
    Finalising(String),
    TransferSucceeded(String),
    TransferFailed {
        name: String,
        error: String,
    },
    /// Ingress for the external processing service's stage reports.
    ProcessingUpdate {
        name: String,
        kind: ProcessingKind,
        stage: StageStatus,
    },
    /// Process-wide reset: drop every record.
    Reset,
}
