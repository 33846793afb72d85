use crate::manager::error::{ManagerError, ManagerResult};
use crate::record::{FileRecord, FileStatus, FileStore, ProcessingKind, StageStatus};
use crate::reducer::{self, Action, MetaPatch, ReducerResult};
use crate::scheduler::AdmissionScheduler;
use crate::transfer::{TransferClient, TransferEndpoint, TransferEvent};
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub concurrency_ceiling: usize,
    pub chunk_size: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            concurrency_ceiling: crate::scheduler::DEFAULT_CEILING,
            chunk_size: 256 * 1024,
        }
    }
}

/// Ties the pieces together: the store behind a lock, the reducer as the
/// sole writer, the scheduler invoked synchronously after every transition,
/// and one transfer client task per admitted file. Client tasks report back
/// over an mpsc channel; a spawned event loop feeds their events through the
/// reducer and re-schedules when capacity frees up.
#[derive(Clone)]
pub struct UploadManager {
    store: Arc<RwLock<FileStore>>,
    endpoint: Arc<dyn TransferEndpoint>,
    scheduler: AdmissionScheduler,
    chunk_size: usize,
    /// Local byte handles from the selection boundary, keyed by file name.
    /// Retained until removal or reset so a re-queued record can upload again.
    payloads: Arc<DashMap<String, Bytes>>,
    /// Names with a transfer client currently bound.
    active: Arc<DashMap<String, JoinHandle<()>>>,
    event_tx: mpsc::UnboundedSender<TransferEvent>,
}

impl UploadManager {
    pub fn new(endpoint: Arc<dyn TransferEndpoint>, config: ManagerConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let manager = Self {
            store: Arc::new(RwLock::new(FileStore::new())),
            endpoint,
            scheduler: AdmissionScheduler::new(config.concurrency_ceiling),
            chunk_size: config.chunk_size,
            payloads: Arc::new(DashMap::new()),
            active: Arc::new(DashMap::new()),
            event_tx,
        };

        manager.spawn_event_loop(event_rx);
        manager
    }

    /// Apply an action, then fill any freed transfer capacity. Scheduling is
    /// an explicit synchronous step after every transition, which keeps
    /// admission order deterministic.
    pub fn dispatch(&self, action: Action) -> ReducerResult<()> {
        let result = {
            let mut store = self.store.write();
            reducer::apply(&mut store, action)
        };
        self.schedule();
        result
    }

    /// Register freshly selected files together with their local payloads.
    /// Atomic like the underlying action: a duplicate name, an incompatible
    /// processing request or a size mismatch rejects the whole batch.
    pub fn add_files(&self, files: Vec<(FileRecord, Bytes)>) -> ManagerResult<()> {
        let mut records = Vec::with_capacity(files.len());
        let mut payloads = Vec::with_capacity(files.len());
        for (record, payload) in files {
            if record.size_bytes != payload.len() as u64 {
                return Err(ManagerError::PayloadSizeMismatch {
                    name: record.name,
                    declared: record.size_bytes,
                    actual: payload.len() as u64,
                });
            }
            payloads.push((record.name.clone(), payload));
            records.push(record);
        }

        self.dispatch(Action::AddFiles(records))?;
        for (name, payload) in payloads {
            self.payloads.insert(name, payload);
        }
        Ok(())
    }

    pub fn queue_all(&self) -> ReducerResult<()> {
        self.dispatch(Action::QueueAll)
    }

    pub fn retry(&self, name: &str) -> ReducerResult<()> {
        self.dispatch(Action::RetryFile(name.to_string()))
    }

    pub fn remove(&self, name: &str) -> ReducerResult<()> {
        self.dispatch(Action::RemoveFile(name.to_string()))?;
        self.payloads.remove(name);
        Ok(())
    }

    pub fn set_meta(&self, name: &str, patch: MetaPatch) -> ReducerResult<()> {
        self.dispatch(Action::SetMeta {
            name: name.to_string(),
            patch,
        })
    }

    /// Sole ingress for the external processing service's stage reports.
    pub fn processing_update(
        &self,
        name: &str,
        kind: ProcessingKind,
        stage: StageStatus,
    ) -> ReducerResult<()> {
        self.dispatch(Action::ProcessingUpdate {
            name: name.to_string(),
            kind,
            stage,
        })
    }

    /// Abort all in-flight transfers and drop every record and payload.
    pub fn reset(&self) {
        for entry in self.active.iter() {
            entry.value().abort();
        }
        self.active.clear();
        let _ = self.dispatch(Action::Reset);
        self.payloads.clear();
    }

    /// Ordered snapshot of all records.
    pub fn list(&self) -> Vec<FileRecord> {
        self.store.read().list()
    }

    pub fn get(&self, name: &str) -> Option<FileRecord> {
        self.store.read().get(name).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.store.read().active_count()
    }

    pub fn ceiling(&self) -> usize {
        self.scheduler.ceiling()
    }

    /// No client bound and nothing queued or mid-transfer.
    pub fn is_quiescent(&self) -> bool {
        if !self.active.is_empty() {
            return false;
        }
        let store = self.store.read();
        let busy = store.iter().any(|r| {
            matches!(
                r.status,
                FileStatus::Queued | FileStatus::Submitting | FileStatus::Finalising
            )
        });
        !busy
    }

    /// Poll until quiescent or the timeout elapses. Returns whether the
    /// queue went quiescent.
    pub async fn wait_quiescent(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.is_quiescent() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.is_quiescent()
    }

    fn spawn_event_loop(&self, mut event_rx: mpsc::UnboundedReceiver<TransferEvent>) {
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                manager.handle_event(event);
            }
        });
    }

    fn handle_event(&self, event: TransferEvent) {
        let name = event.name().to_string();
        let terminal = event.is_terminal();

        let action = match event {
            TransferEvent::Negotiated { name, token, .. } => {
                Action::SessionNegotiated { name, token }
            }
            TransferEvent::Progress { name, percent } => Action::Progress { name, percent },
            TransferEvent::Finalising { name } => Action::Finalising(name),
            TransferEvent::Succeeded { name } => Action::TransferSucceeded(name),
            TransferEvent::Failed { name, error } => Action::TransferFailed { name, error },
        };

        {
            let mut store = self.store.write();
            if let Err(e) = reducer::apply(&mut store, action) {
                tracing::warn!(file = %name, error = %e, "client event rejected by reducer");
            }
        }

        if terminal {
            self.active.remove(&name);
            self.schedule();
        }
    }

    /// Admit queued records into free capacity and bind a client to each.
    fn schedule(&self) {
        let bound: HashSet<String> = self.active.iter().map(|e| e.key().clone()).collect();
        let picks = {
            let store = self.store.read();
            self.scheduler.admissions(&store, &bound)
        };

        for name in picks {
            let (token, started) = {
                let mut store = self.store.write();
                let token = store.get(&name).and_then(|r| r.resume_token.clone());
                let _ = reducer::apply(
                    &mut store,
                    Action::BeginTransfer {
                        name: name.clone(),
                        resume_token: token.clone(),
                    },
                );
                let started = store
                    .get(&name)
                    .map(|r| r.status == FileStatus::Submitting)
                    .unwrap_or(false);
                (token, started)
            };

            // Record was removed or re-admitted concurrently; skip.
            if !started {
                continue;
            }

            let Some(payload) = self.payloads.get(&name).map(|p| p.clone()) else {
                tracing::error!(file = %name, "no payload registered for admitted file");
                let mut store = self.store.write();
                let _ = reducer::apply(
                    &mut store,
                    Action::TransferFailed {
                        name: name.clone(),
                        error: "no payload registered".into(),
                    },
                );
                continue;
            };

            let client =
                TransferClient::new(self.endpoint.clone(), self.chunk_size, self.event_tx.clone());
            let task_name = name.clone();
            let handle = tokio::spawn(async move {
                // Outcome reaches the store through the event channel.
                let _ = client.run(&task_name, payload, token).await;
            });
            self.active.insert(name, handle);
        }
    }
}
