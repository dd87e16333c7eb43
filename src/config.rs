use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::constants;
use crate::error::{CallSheetsError, Result};
use crate::pipeline::timestamp::TimestampFallback;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub append: AppendConfig,
    pub log: LogConfig,
    pub timestamps: TimestampConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub spreadsheet_id: Option<String>,
    /// Worksheet title holding the contact column; first worksheet when unset
    pub worksheet: Option<String>,
    /// Name of the environment variable carrying the OAuth2 bearer token
    pub access_token_env: String,
    pub api_base: String,
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            worksheet: None,
            access_token_env: constants::ACCESS_TOKEN_ENV.to_string(),
            api_base: constants::SHEETS_API_BASE.to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppendConfig {
    pub phone_column: String,
    pub date_column: String,
}

impl Default for AppendConfig {
    fn default() -> Self {
        Self {
            phone_column: constants::FROM_COLUMN.to_string(),
            date_column: constants::PRA_FECHA_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Ordered keyword list; the first keyword found in the extension wins
    pub categories: Vec<String>,
    pub delimiter: char,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            categories: constants::default_categories(),
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    pub fallback: TimestampFallback,
}

impl Config {
    /// Load configuration from `path`. A missing file yields defaults unless
    /// `required` is set. Environment overrides are applied afterwards.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                CallSheetsError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
            })?;
            Self::from_toml(&content)?
        } else if required {
            return Err(CallSheetsError::Config(format!(
                "Config file '{}' does not exist",
                path.display()
            )));
        } else {
            Config::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(id) = non_empty_env(constants::SPREADSHEET_ID_ENV) {
            self.store.spreadsheet_id = Some(id);
        }
        if let Some(ws) = non_empty_env(constants::WORKSHEET_ENV) {
            self.store.worksheet = Some(ws);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.append.phone_column.trim().is_empty() || self.append.date_column.trim().is_empty() {
            return Err(CallSheetsError::Config(
                "append.phone_column and append.date_column must not be empty".to_string(),
            ));
        }
        if self.store.timeout_seconds == 0 {
            return Err(CallSheetsError::Config("store.timeout_seconds must be positive".to_string()));
        }
        check_category_names(&self.log.categories)?;
        if !self.log.delimiter.is_ascii() {
            return Err(CallSheetsError::Config(format!(
                "log.delimiter must be a single ASCII character, got '{}'",
                self.log.delimiter
            )));
        }
        Ok(())
    }

    /// Bearer token for the Sheets API, read from the configured variable.
    pub fn access_token(&self) -> Result<String> {
        non_empty_env(&self.store.access_token_env).ok_or_else(|| {
            CallSheetsError::Connection(format!(
                "environment variable {} is not set",
                self.store.access_token_env
            ))
        })
    }
}

/// Each category becomes a worksheet name, so reject keywords a workbook
/// cannot hold before any input is read.
pub fn check_category_names(categories: &[String]) -> Result<()> {
    for name in categories.iter().filter(|c| !c.is_empty()) {
        if let Some(bad) = name.chars().find(|c| constants::SHEET_NAME_FORBIDDEN.contains(c)) {
            return Err(CallSheetsError::Config(format!(
                "category '{}' cannot be a sheet name: '{}' is not allowed",
                name, bad
            )));
        }
        if name.chars().count() > constants::SHEET_NAME_MAX_CHARS {
            return Err(CallSheetsError::Config(format!(
                "category '{}' cannot be a sheet name: longer than {} characters",
                name,
                constants::SHEET_NAME_MAX_CHARS
            )));
        }
        if name.starts_with('\'') || name.ends_with('\'') {
            return Err(CallSheetsError::Config(format!(
                "category '{}' cannot be a sheet name: it starts or ends with an apostrophe",
                name
            )));
        }
    }
    Ok(())
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
