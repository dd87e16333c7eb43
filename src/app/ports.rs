use async_trait::async_trait;

use crate::error::Result;
use crate::pipeline::reconcile::ContactRecord;

/// The shared contact database: one column of phones, appended to in batches.
#[async_trait]
pub trait ContactStorePort: Send + Sync {
    /// Raw values of the phone column, header included if the sheet has one
    async fn existing_phones(&self) -> Result<Vec<String>>;

    /// Append all records in one call, letting the store parse values
    /// (numbers and dates become native cells). Returns the number of rows
    /// the store reports as written.
    async fn append_rows(&self, records: &[ContactRecord]) -> Result<usize>;
}
