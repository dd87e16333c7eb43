use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

use crate::app::ports::ContactStorePort;
use crate::error::{CallSheetsError, Result};
use crate::pipeline::reconcile::ContactRecord;

/// In-memory contact store for tests; `--dry-run` still reads the real
/// spreadsheet and simply skips the append
#[derive(Default)]
pub struct InMemoryContactStore {
    rows: Mutex<Vec<Vec<String>>>,
    append_calls: AtomicUsize,
    fail_appends: AtomicBool,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the phone column, one row per value
    pub fn with_phones<I, S>(phones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut rows = store.lock_rows();
            rows.extend(phones.into_iter().map(|p| vec![p.into()]));
        }
        store
    }

    /// Make every following append fail, as an unreachable store would
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.lock_rows().clone()
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    fn lock_rows(&self) -> std::sync::MutexGuard<'_, Vec<Vec<String>>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ContactStorePort for InMemoryContactStore {
    async fn existing_phones(&self) -> Result<Vec<String>> {
        Ok(self
            .lock_rows()
            .iter()
            .filter_map(|row| row.first().cloned())
            .collect())
    }

    async fn append_rows(&self, records: &[ContactRecord]) -> Result<usize> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(CallSheetsError::StoreWrite("in-memory store rejected the append".to_string()));
        }

        let mut rows = self.lock_rows();
        rows.extend(records.iter().map(ContactRecord::to_row));
        debug!("Appended {} rows to in-memory store", records.len());
        Ok(records.len())
    }
}
