use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::pipeline::call_log::{normalize_log, CategoryTables};
use crate::pipeline::timestamp::TimestampFallback;
use crate::table::Sheet;
use crate::workbook::write_category_workbook;

#[derive(Debug, Clone, Serialize)]
pub struct LogOutcome {
    pub run_id: Uuid,
    pub rows_in: usize,
    pub rows_out: usize,
    pub tables: CategoryTables,
}

impl LogOutcome {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Turns a call-log export into one deduplicated table per category
pub struct NormalizeLogUseCase {
    categories: Vec<String>,
    fallback: TimestampFallback,
}

impl NormalizeLogUseCase {
    pub fn new(categories: Vec<String>, fallback: TimestampFallback) -> Self {
        Self { categories, fallback }
    }

    #[instrument(skip(self, input), fields(source = %input.name, run_id))]
    pub fn run(&self, input: &Sheet) -> Result<LogOutcome> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let tables = normalize_log(&input.table, &input.name, &self.categories, self.fallback)?;
        let rows_out: usize = tables.values().map(Vec::len).sum();

        for (category, rows) in &tables {
            info!("{}: {} rows", category, rows.len());
        }
        info!(
            "Normalized {} call-log rows into {} rows across {} categories",
            input.table.len(),
            rows_out,
            tables.len()
        );

        Ok(LogOutcome {
            run_id,
            rows_in: input.table.len(),
            rows_out,
            tables,
        })
    }

    /// Run and encode the result as a workbook, one sheet per category
    pub fn run_to_workbook(&self, input: &Sheet) -> Result<(LogOutcome, Vec<u8>)> {
        let outcome = self.run(input)?;
        let bytes = write_category_workbook(&outcome.tables)?;
        Ok((outcome, bytes))
    }
}
