/// Column names shared by the input readers and both pipelines

// Append flow: phone column and default date-source column of the uploaded workbook
pub const FROM_COLUMN: &str = "From";
pub const PRA_FECHA_COLUMN: &str = "PraFecha";

// Log flow: columns the call-log export must carry
pub const DATE_COLUMN: &str = "Date";
pub const TIME_COLUMN: &str = "Time";
pub const ACTION_RESULT_COLUMN: &str = "Action Result";
pub const EXTENSION_COLUMN: &str = "Extension";

pub const CALL_LOG_COLUMNS: [&str; 5] = [
    FROM_COLUMN,
    DATE_COLUMN,
    TIME_COLUMN,
    ACTION_RESULT_COLUMN,
    EXTENSION_COLUMN,
];

/// Header row of every per-category output sheet
pub const CATEGORY_SHEET_HEADER: [&str; 3] = [FROM_COLUMN, PRA_FECHA_COLUMN, ACTION_RESULT_COLUMN];

/// Rows whose phone has this many characters or fewer are not real numbers
pub const MIN_PHONE_LEN_EXCLUSIVE: usize = 3;

pub const DEFAULT_CATEGORIES: [&str; 4] = ["Latino", "Agape", "Bayview", "Anaheim"];

pub fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
}

// Worksheet names a workbook accepts
pub const SHEET_NAME_FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
pub const SHEET_NAME_MAX_CHARS: usize = 31;

// Google Sheets values API
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const ACCESS_TOKEN_ENV: &str = "CALL_SHEETS_ACCESS_TOKEN";
pub const SPREADSHEET_ID_ENV: &str = "CALL_SHEETS_SPREADSHEET_ID";
pub const WORKSHEET_ENV: &str = "CALL_SHEETS_WORKSHEET";
