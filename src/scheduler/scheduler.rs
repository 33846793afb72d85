use crate::record::{FileStatus, FileStore};
use std::collections::HashSet;

/// Default number of files allowed in active transfer simultaneously.
pub const DEFAULT_CEILING: usize = 3;

/// Decides which queued records may start transferring. Admission is
/// first-queued, first-served over store order; no priority reordering, so
/// upload order stays visible to the user. The active count is recomputed
/// from the store's own status column on every pass, never tracked
/// imperatively.
#[derive(Debug, Clone)]
pub struct AdmissionScheduler {
    ceiling: usize,
}

impl AdmissionScheduler {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling: ceiling.max(1),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Names of the records to admit now, in store order. `bound` is the set
    /// of names that already have a transfer client attached; a record in it
    /// is never admitted twice.
    pub fn admissions(&self, store: &FileStore, bound: &HashSet<String>) -> Vec<String> {
        let active = store.active_count();

        // More actives than the ceiling is a programming defect, not an
        // expected runtime condition.
        debug_assert!(
            active <= self.ceiling,
            "concurrency ceiling violated: {active} active > {}",
            self.ceiling
        );
        if active > self.ceiling {
            tracing::error!(active, ceiling = self.ceiling, "concurrency ceiling violated");
            return Vec::new();
        }

        let mut free = self.ceiling - active;
        let mut admitted = Vec::new();

        for record in store.iter() {
            if free == 0 {
                break;
            }
            if record.status == FileStatus::Queued && !bound.contains(&record.name) {
                tracing::debug!(file = %record.name, "admitting to transfer");
                admitted.push(record.name.clone());
                free -= 1;
            }
        }

        admitted
    }
}

impl Default for AdmissionScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CEILING)
    }
}
