use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::pipeline::timestamp::{normalize_cell, TimestampFallback};
use crate::table::{Sheet, Table};

/// A phone number that is new to the contact store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactRecord {
    pub phone: String,
    pub first_seen_at: String,
}

impl ContactRecord {
    /// The row as sent to the store: `[phone, timestamp]`
    pub fn to_row(&self) -> Vec<String> {
        vec![self.phone.clone(), self.first_seen_at.clone()]
    }
}

/// Phones already known during one run: the store's column plus everything
/// emitted so far.
#[derive(Debug, Clone, Default)]
pub struct KnownPhoneSet {
    phones: HashSet<String>,
}

impl KnownPhoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_existing<I, S>(existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phones = existing
            .into_iter()
            .map(|p| normalize_phone(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        Self { phones }
    }

    pub fn contains(&self, phone: &str) -> bool {
        self.phones.contains(phone)
    }

    /// Returns `true` when the phone was not known before
    pub fn insert(&mut self, phone: String) -> bool {
        self.phones.insert(phone)
    }

    pub fn len(&self) -> usize {
        self.phones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phones.is_empty()
    }
}

pub fn normalize_phone(raw: &str) -> String {
    raw.trim().to_string()
}

/// Column names the append flow reads from each sheet
#[derive(Debug, Clone)]
pub struct ContactColumns {
    pub phone: String,
    pub date: String,
}

/// A sheet that could not be used because it lacks required columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSheet {
    pub name: String,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    pub records: Vec<ContactRecord>,
    pub skipped_sheets: Vec<SkippedSheet>,
    pub rows_seen: usize,
}

/// Collect the phones across `sheets` that `known` does not contain yet.
///
/// Sheets are visited in order, rows in order; the first occurrence of a phone
/// wins and every emitted phone is added to `known` straight away.
pub fn reconcile(
    known: &mut KnownPhoneSet,
    sheets: &[Sheet],
    columns: &ContactColumns,
    fallback: TimestampFallback,
) -> Reconciliation {
    let mut result = Reconciliation::default();

    for sheet in sheets {
        let missing = sheet
            .table
            .missing_columns(&[columns.phone.as_str(), columns.date.as_str()]);
        if !missing.is_empty() {
            warn!(sheet = %sheet.name, missing = ?missing, "Sheet lacks required columns, skipping");
            result.skipped_sheets.push(SkippedSheet {
                name: sheet.name.clone(),
                missing,
            });
            continue;
        }

        let before = result.records.len();
        result.rows_seen += reconcile_table(known, &sheet.table, columns, fallback, &mut result.records);
        debug!(sheet = %sheet.name, new = result.records.len() - before, "Sheet reconciled");
    }

    result
}

fn reconcile_table(
    known: &mut KnownPhoneSet,
    table: &Table,
    columns: &ContactColumns,
    fallback: TimestampFallback,
    out: &mut Vec<ContactRecord>,
) -> usize {
    let (Some(phone_idx), Some(date_idx)) = (table.column_index(&columns.phone), table.column_index(&columns.date))
    else {
        return 0;
    };

    for row in &table.rows {
        let phone = normalize_phone(&Table::cell(row, phone_idx).to_text());
        if phone.is_empty() || known.contains(&phone) {
            continue;
        }
        let first_seen_at = normalize_cell(Table::cell(row, date_idx), fallback);
        known.insert(phone.clone());
        out.push(ContactRecord { phone, first_seen_at });
    }

    table.rows.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;
    use chrono::NaiveDate;

    fn columns() -> ContactColumns {
        ContactColumns {
            phone: "From".to_string(),
            date: "PraFecha".to_string(),
        }
    }

    fn sheet(name: &str, rows: &[(&str, &str)]) -> Sheet {
        Sheet::new(
            name,
            Table::with_rows(
                &["From", "PraFecha"],
                rows.iter().map(|(p, d)| vec![Cell::from(*p), Cell::from(*d)]).collect(),
            ),
        )
    }

    fn phones(records: &[ContactRecord]) -> Vec<&str> {
        records.iter().map(|r| r.phone.as_str()).collect()
    }

    #[test]
    fn known_phones_are_suppressed() {
        let mut known = KnownPhoneSet::from_existing([" 5551111 ", "5552222"]);
        let sheets = vec![sheet("Hoja1", &[("5551111", ""), ("5553333", "01/02/2024 10:00")])];

        let result = reconcile(&mut known, &sheets, &columns(), TimestampFallback::Verbatim);

        assert_eq!(
            result.records,
            vec![ContactRecord {
                phone: "5553333".to_string(),
                first_seen_at: "2024-01-02 10:00:00".to_string(),
            }]
        );
        assert!(known.contains("5553333"));
        assert_eq!(result.rows_seen, 2);
    }

    #[test]
    fn first_occurrence_wins_across_sheets_in_order() {
        let mut known = KnownPhoneSet::new();
        let sheets = vec![
            sheet("A", &[("111", "first"), ("222", ""), ("111", "second")]),
            sheet("B", &[("333", ""), ("222", "again"), ("444", "")]),
        ];

        let result = reconcile(&mut known, &sheets, &columns(), TimestampFallback::Verbatim);

        assert_eq!(phones(&result.records), vec!["111", "222", "333", "444"]);
        assert_eq!(result.records[0].first_seen_at, "first");
    }

    #[test]
    fn sheets_missing_columns_are_skipped_not_fatal() {
        let mut known = KnownPhoneSet::new();
        let broken = Sheet::new("Notas", Table::with_rows(&["From", "Comment"], vec![vec![Cell::text("999")]]));
        let sheets = vec![broken, sheet("Ok", &[("777", "")])];

        let result = reconcile(&mut known, &sheets, &columns(), TimestampFallback::Verbatim);

        assert_eq!(phones(&result.records), vec!["777"]);
        assert_eq!(
            result.skipped_sheets,
            vec![SkippedSheet {
                name: "Notas".to_string(),
                missing: vec!["PraFecha".to_string()],
            }]
        );
        assert!(!known.contains("999"));
    }

    #[test]
    fn numeric_phones_and_blank_rows() {
        let mut known = KnownPhoneSet::from_existing(["5551234567"]);
        let dt = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let table = Table::with_rows(
            &["PraFecha", "From"],
            vec![
                vec![Cell::DateTime(dt), Cell::Float(5551234567.0)],
                vec![Cell::DateTime(dt), Cell::Float(5559876543.0)],
                vec![Cell::DateTime(dt), Cell::Empty],
            ],
        );

        let result = reconcile(&mut known, &[Sheet::new("S", table)], &columns(), TimestampFallback::Verbatim);

        assert_eq!(
            result.records,
            vec![ContactRecord {
                phone: "5559876543".to_string(),
                first_seen_at: "2024-05-01 08:00:00".to_string(),
            }]
        );
    }

    #[test]
    fn second_run_over_same_input_is_empty() {
        let sheets = vec![sheet("A", &[("111", ""), ("222", "")])];
        let mut known = KnownPhoneSet::from_existing(["000"]);

        let first = reconcile(&mut known, &sheets, &columns(), TimestampFallback::Verbatim);
        assert_eq!(first.records.len(), 2);

        let second = reconcile(&mut known, &sheets, &columns(), TimestampFallback::Verbatim);
        assert!(second.records.is_empty());
    }
}
