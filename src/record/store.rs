use crate::record::types::FileRecord;

/// Ordered mapping from file name to record. Insertion order is preserved
/// for display and for scheduler fairness; the active set is small (a user
/// selection), so a Vec scan is the whole index.
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    records: Vec<FileRecord>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only snapshot in insertion order.
    pub fn list(&self) -> Vec<FileRecord> {
        self.records.clone()
    }

    pub fn get(&self, name: &str) -> Option<&FileRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert a new record or replace the one with the same name, keeping
    /// its position in the order.
    pub fn upsert(&mut self, record: FileRecord) {
        match self.records.iter_mut().find(|r| r.name == record.name) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// Returns false when the name was not present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.name != name);
        self.records.len() != before
    }

    /// Apply a mutation to the named record. Silently a no-op when the name
    /// is absent: the record was removed by a concurrent action, a benign
    /// race rather than an error.
    pub fn patch<F>(&mut self, name: &str, f: F)
    where
        F: FnOnce(&mut FileRecord),
    {
        if let Some(record) = self.records.iter_mut().find(|r| r.name == name) {
            f(record);
            record.touch();
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter()
    }

    /// Count of records currently holding transfer capacity.
    pub fn active_count(&self) -> usize {
        self.records.iter().filter(|r| r.status.is_active()).count()
    }
}
