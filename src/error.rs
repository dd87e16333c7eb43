use thiserror::Error;

#[derive(Error, Debug)]
pub enum CallSheetsError {
    #[error("Contact store connection failed: {0}")]
    Connection(String),

    #[error("Table '{table}' is missing required column(s): {}", .missing.join(", "))]
    Schema { table: String, missing: Vec<String> },

    #[error("Contact store write failed: {0}")]
    StoreWrite(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workbook could not be read: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("CSV could not be read: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook could not be written: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported input file: {0}")]
    UnsupportedInput(String),
}

impl CallSheetsError {
    pub fn schema(table: impl Into<String>, missing: Vec<String>) -> Self {
        CallSheetsError::Schema { table: table.into(), missing }
    }
}

pub type Result<T> = std::result::Result<T, CallSheetsError>;
