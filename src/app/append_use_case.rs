use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app::ports::ContactStorePort;
use crate::error::Result;
use crate::pipeline::reconcile::{reconcile, ContactColumns, ContactRecord, KnownPhoneSet, SkippedSheet};
use crate::pipeline::timestamp::TimestampFallback;
use crate::table::Sheet;

/// Result of one dedup-and-append run
#[derive(Debug, Clone, Serialize)]
pub struct AppendOutcome {
    pub run_id: Uuid,
    /// Distinct phones in the store before the run
    pub existing_count: usize,
    pub sheets_total: usize,
    pub skipped_sheets: Vec<SkippedSheet>,
    pub rows_seen: usize,
    pub appended: Vec<ContactRecord>,
    pub dry_run: bool,
}

impl AppendOutcome {
    /// Nothing new was found, so nothing was (or would be) written
    pub fn is_empty(&self) -> bool {
        self.appended.is_empty()
    }
}

/// Appends the phones of an uploaded workbook that the contact store does not know yet
pub struct AppendUseCase {
    store: Arc<dyn ContactStorePort>,
    columns: ContactColumns,
    fallback: TimestampFallback,
    dry_run: bool,
}

impl AppendUseCase {
    pub fn new(store: Arc<dyn ContactStorePort>, columns: ContactColumns, fallback: TimestampFallback) -> Self {
        Self {
            store,
            columns,
            fallback,
            dry_run: false,
        }
    }

    /// Compute the new records without writing them
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// One read of the store, one batched append (skipped when nothing is new).
    #[instrument(skip(self, sheets), fields(run_id))]
    pub async fn run(&self, sheets: &[Sheet]) -> Result<AppendOutcome> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let existing = self.store.existing_phones().await?;
        let mut known = KnownPhoneSet::from_existing(&existing);
        let existing_count = known.len();
        info!("Found {} phones in the contact store", existing_count);

        let reconciliation = reconcile(&mut known, sheets, &self.columns, self.fallback);

        if reconciliation.records.is_empty() {
            info!("No new phones to append");
        } else if self.dry_run {
            info!("Dry run: {} new phones would be appended", reconciliation.records.len());
        } else {
            info!("Appending {} new phones", reconciliation.records.len());
            self.store.append_rows(&reconciliation.records).await?;
        }

        Ok(AppendOutcome {
            run_id,
            existing_count,
            sheets_total: sheets.len(),
            skipped_sheets: reconciliation.skipped_sheets,
            rows_seen: reconciliation.rows_seen,
            appended: reconciliation.records,
            dry_run: self.dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallSheetsError;
    use crate::infra::in_memory_store::InMemoryContactStore;
    use crate::table::{Cell, Table};

    fn columns() -> ContactColumns {
        ContactColumns {
            phone: "From".to_string(),
            date: "PraFecha".to_string(),
        }
    }

    fn sheet(name: &str, phones: &[&str]) -> Sheet {
        Sheet::new(
            name,
            Table::with_rows(
                &["From", "PraFecha"],
                phones.iter().map(|p| vec![Cell::text(*p), Cell::text("01/02/2024 10:00")]).collect(),
            ),
        )
    }

    #[tokio::test]
    async fn appends_new_phones_in_one_batch() {
        let store = Arc::new(InMemoryContactStore::with_phones(["Phone", "5551111"]));
        let use_case = AppendUseCase::new(store.clone(), columns(), TimestampFallback::Verbatim);

        let outcome = use_case
            .run(&[sheet("A", &["5551111", "5552222"]), sheet("B", &["5553333", "5552222"])])
            .await
            .unwrap();

        assert_eq!(outcome.existing_count, 2);
        assert_eq!(outcome.appended.len(), 2);
        assert_eq!(store.append_calls(), 1);
        assert_eq!(
            store.rows()[2..],
            [
                vec!["5552222".to_string(), "2024-01-02 10:00:00".to_string()],
                vec!["5553333".to_string(), "2024-01-02 10:00:00".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let store = Arc::new(InMemoryContactStore::new());
        let use_case = AppendUseCase::new(store.clone(), columns(), TimestampFallback::Verbatim);
        let sheets = [sheet("A", &["5551111", "5552222"])];

        let first = use_case.run(&sheets).await.unwrap();
        let second = use_case.run(&sheets).await.unwrap();

        assert_eq!(first.appended.len(), 2);
        assert!(second.is_empty());
        assert_eq!(store.append_calls(), 1);
        assert_eq!(store.rows().len(), 2);
    }

    #[tokio::test]
    async fn dry_run_never_writes() {
        let store = Arc::new(InMemoryContactStore::new());
        let use_case = AppendUseCase::new(store.clone(), columns(), TimestampFallback::Verbatim).dry_run(true);

        let outcome = use_case.run(&[sheet("A", &["5551111"])]).await.unwrap();

        assert!(outcome.dry_run);
        assert_eq!(outcome.appended.len(), 1);
        assert_eq!(store.append_calls(), 0);
    }

    #[tokio::test]
    async fn failed_append_surfaces_as_store_write_error() {
        let store = Arc::new(InMemoryContactStore::new());
        store.fail_appends(true);
        let use_case = AppendUseCase::new(store.clone(), columns(), TimestampFallback::Verbatim);

        let result = use_case.run(&[sheet("A", &["5551111"])]).await;

        assert!(matches!(result, Err(CallSheetsError::StoreWrite(_))));
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn skipped_sheets_are_reported() {
        let store = Arc::new(InMemoryContactStore::new());
        let use_case = AppendUseCase::new(store.clone(), columns(), TimestampFallback::Verbatim);
        let notes = Sheet::new("Notas", Table::with_rows(&["Comentario"], vec![]));

        let outcome = use_case.run(&[notes, sheet("A", &["5551111"])]).await.unwrap();

        assert_eq!(outcome.sheets_total, 2);
        assert_eq!(outcome.skipped_sheets.len(), 1);
        assert_eq!(outcome.skipped_sheets[0].missing, vec!["From", "PraFecha"]);
        assert_eq!(outcome.appended.len(), 1);
    }
}
