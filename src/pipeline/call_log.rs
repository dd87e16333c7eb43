use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::constants::{
    ACTION_RESULT_COLUMN, CALL_LOG_COLUMNS, DATE_COLUMN, EXTENSION_COLUMN, FROM_COLUMN, MIN_PHONE_LEN_EXCLUSIVE,
    TIME_COLUMN,
};
use crate::error::{CallSheetsError, Result};
use crate::pipeline::classify::classify;
use crate::pipeline::timestamp::{combine_date_time, TimestampFallback};
use crate::table::{Cell, Table};

/// One call-log row projected to the columns the pipeline reads
#[derive(Debug, Clone, PartialEq)]
pub struct CallLogRecord {
    pub from: String,
    pub date: Cell,
    pub time: Cell,
    pub action_result: String,
    pub extension: Cell,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorizedCall {
    pub category: String,
    pub from: String,
    pub normalized_timestamp: String,
    pub action_result: String,
}

/// A row of a per-category output sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRow {
    pub from: String,
    pub normalized_timestamp: String,
    pub action_result: String,
}

impl From<CategorizedCall> for CategoryRow {
    fn from(call: CategorizedCall) -> Self {
        Self {
            from: call.from,
            normalized_timestamp: call.normalized_timestamp,
            action_result: call.action_result,
        }
    }
}

/// Category name to its deduplicated rows, iterated in category-name order
pub type CategoryTables = BTreeMap<String, Vec<CategoryRow>>;

struct CallLogColumns {
    from: usize,
    date: usize,
    time: usize,
    action_result: usize,
    extension: usize,
}

impl CallLogColumns {
    fn locate(table: &Table, table_name: &str) -> Result<Self> {
        let missing = table.missing_columns(&CALL_LOG_COLUMNS);
        if !missing.is_empty() {
            return Err(CallSheetsError::schema(table_name, missing));
        }
        let idx = |name: &str| table.column_index(name).unwrap_or_default();
        Ok(Self {
            from: idx(FROM_COLUMN),
            date: idx(DATE_COLUMN),
            time: idx(TIME_COLUMN),
            action_result: idx(ACTION_RESULT_COLUMN),
            extension: idx(EXTENSION_COLUMN),
        })
    }
}

/// Read the call-log columns, dropping rows whose phone is too short to be one.
///
/// Fails with a schema error naming every missing column.
pub fn project_call_log(table: &Table, table_name: &str) -> Result<Vec<CallLogRecord>> {
    let cols = CallLogColumns::locate(table, table_name)?;

    let records = table
        .rows
        .iter()
        .filter_map(|row| {
            let from = Table::cell(row, cols.from).to_text().trim().to_string();
            if from.chars().count() <= MIN_PHONE_LEN_EXCLUSIVE {
                return None;
            }
            Some(CallLogRecord {
                from,
                date: Table::cell(row, cols.date).clone(),
                time: Table::cell(row, cols.time).clone(),
                action_result: Table::cell(row, cols.action_result).to_text(),
                extension: Table::cell(row, cols.extension).clone(),
            })
        })
        .collect();

    Ok(records)
}

/// Derive timestamp (from the cleaned date plus time) and category; rows
/// matching no category are dropped.
pub fn categorize(
    records: Vec<CallLogRecord>,
    categories: &[String],
    fallback: TimestampFallback,
) -> Vec<CategorizedCall> {
    records
        .into_iter()
        .filter_map(|record| {
            let category = classify(&record.extension, categories);
            if category.is_empty() {
                return None;
            }
            Some(CategorizedCall {
                category,
                from: record.from,
                normalized_timestamp: combine_date_time(&record.date, &record.time, fallback),
                action_result: record.action_result,
            })
        })
        .collect()
}

/// Keep only the last row for each phone, in the order those last rows appear.
pub fn keep_last_by_phone(calls: Vec<CategorizedCall>) -> Vec<CategorizedCall> {
    let mut last_index: HashMap<&str, usize> = HashMap::new();
    for (i, call) in calls.iter().enumerate() {
        last_index.insert(call.from.as_str(), i);
    }
    let keep: Vec<bool> = calls
        .iter()
        .enumerate()
        .map(|(i, call)| last_index.get(call.from.as_str()) == Some(&i))
        .collect();

    calls
        .into_iter()
        .zip(keep)
        .filter_map(|(call, keep)| keep.then_some(call))
        .collect()
}

pub fn group_by_category(calls: Vec<CategorizedCall>) -> CategoryTables {
    let mut tables = CategoryTables::new();
    for call in calls {
        tables.entry(call.category.clone()).or_default().push(call.into());
    }
    tables
}

/// Clean a call-log export into one deduplicated table per category.
///
/// Only categories that occur in the data get a table.
pub fn normalize_log(
    table: &Table,
    table_name: &str,
    categories: &[String],
    fallback: TimestampFallback,
) -> Result<CategoryTables> {
    let records = project_call_log(table, table_name)?;
    let projected = records.len();

    let categorized = categorize(records, categories, fallback);
    let matched = categorized.len();

    let deduped = keep_last_by_phone(categorized);
    debug!(
        rows = table.len(),
        projected,
        matched,
        unique = deduped.len(),
        "Call log normalized"
    );

    Ok(group_by_category(deduped))
}
