use async_trait::async_trait;
use reqwest::{Client, Request, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::app::ports::ContactStorePort;
use crate::config::StoreConfig;
use crate::error::{CallSheetsError, Result};
use crate::pipeline::reconcile::ContactRecord;

const PHONE_COLUMN_RANGE: &str = "A:A";
const CONTACT_ROW_RANGE: &str = "A:B";

/// Contact store backed by one worksheet of a Google spreadsheet, through the
/// Sheets values API v4. Phones live in column A, first-seen timestamps in B.
pub struct GoogleSheetsStore {
    client: Client,
    api_base: Url,
    spreadsheet_id: String,
    worksheet: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    #[serde(default)]
    updates: Option<UpdateSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSummary {
    #[serde(default)]
    updated_rows: usize,
}

impl GoogleSheetsStore {
    /// Build the client and resolve the worksheet. Fails with a connection
    /// error when the spreadsheet is unreachable or the token is rejected.
    #[instrument(skip(config, access_token))]
    pub async fn connect(config: &StoreConfig, access_token: String) -> Result<Self> {
        let spreadsheet_id = config
            .spreadsheet_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| CallSheetsError::Connection("store.spreadsheet_id is not configured".to_string()))?;

        let api_base = Url::parse(&config.api_base)
            .map_err(|e| CallSheetsError::Config(format!("invalid store.api_base '{}': {}", config.api_base, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CallSheetsError::Connection(e.to_string()))?;

        let mut store = Self {
            client,
            api_base,
            spreadsheet_id,
            worksheet: String::new(),
            access_token,
        };

        let titles = store.worksheet_titles().await?;
        store.worksheet = choose_worksheet(&titles, config.worksheet.as_deref())?;
        info!(worksheet = %store.worksheet, "Connected to contact spreadsheet");
        Ok(store)
    }

    pub fn worksheet(&self) -> &str {
        &self.worksheet
    }

    async fn worksheet_titles(&self) -> Result<Vec<String>> {
        let url = self.url(&[])?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .await
            .map_err(|e| CallSheetsError::Connection(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CallSheetsError::Connection(describe_failure(status, &body)));
        }

        let metadata: SpreadsheetMetadata = resp
            .json()
            .await
            .map_err(|e| CallSheetsError::Connection(format!("unexpected metadata response: {}", e)))?;
        Ok(metadata.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    /// Column A of the contact worksheet, one column of values.
    fn phone_column_request(&self) -> Result<Request> {
        let range = a1_range(&self.worksheet, PHONE_COLUMN_RANGE);
        let url = self.url(&["values", range.as_str()])?;
        let request = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("majorDimension", "COLUMNS")])
            .build()?;
        Ok(request)
    }

    /// One batched append below the last row of A:B. `USER_ENTERED` lets the
    /// sheet parse the timestamps as dates.
    fn append_request(&self, records: &[ContactRecord]) -> Result<Request> {
        let range = a1_range(&self.worksheet, CONTACT_ROW_RANGE);
        let target = format!("{}:append", range);
        let url = self.url(&["values", target.as_str()])?;
        let body = AppendBody {
            range: &range,
            major_dimension: "ROWS",
            values: records.iter().map(ContactRecord::to_row).collect(),
        };

        let request = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .query(&[("valueInputOption", "USER_ENTERED"), ("insertDataOption", "INSERT_ROWS")])
            .json(&body)
            .build()?;
        Ok(request)
    }

    fn url(&self, extra: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| CallSheetsError::Config(format!("store.api_base '{}' cannot be a base URL", self.api_base)))?;
            segments.pop_if_empty();
            segments.extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()]);
            segments.extend(extra);
        }
        Ok(url)
    }
}

#[async_trait]
impl ContactStorePort for GoogleSheetsStore {
    async fn existing_phones(&self) -> Result<Vec<String>> {
        let request = self.phone_column_request()?;
        let resp = self
            .client
            .execute(request)
            .await
            .map_err(|e| CallSheetsError::Connection(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CallSheetsError::Connection(describe_failure(status, &body)));
        }

        let values: ValueRange = resp.json().await?;
        let phones = first_column(values);
        debug!(count = phones.len(), "Read existing phone column");
        Ok(phones)
    }

    async fn append_rows(&self, records: &[ContactRecord]) -> Result<usize> {
        let request = self.append_request(records)?;
        let resp = self
            .client
            .execute(request)
            .await
            .map_err(|e| CallSheetsError::StoreWrite(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CallSheetsError::StoreWrite(describe_failure(status, &body)));
        }

        let response: AppendResponse = resp
            .json()
            .await
            .map_err(|e| CallSheetsError::StoreWrite(format!("unexpected append response: {}", e)))?;
        check_appended(records.len(), &response)
    }
}

/// A1 notation for `cells` on `worksheet`, quoting the title
fn a1_range(worksheet: &str, cells: &str) -> String {
    format!("'{}'!{}", worksheet.replace('\'', "''"), cells)
}

fn choose_worksheet(titles: &[String], wanted: Option<&str>) -> Result<String> {
    match wanted {
        Some(name) => titles
            .iter()
            .find(|t| t.as_str() == name)
            .cloned()
            .ok_or_else(|| CallSheetsError::Connection(format!("worksheet '{}' not found in spreadsheet", name))),
        None => titles
            .first()
            .cloned()
            .ok_or_else(|| CallSheetsError::Connection("spreadsheet has no worksheets".to_string())),
    }
}

fn first_column(range: ValueRange) -> Vec<String> {
    range
        .values
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|v| match v {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect()
}

fn check_appended(sent: usize, response: &AppendResponse) -> Result<usize> {
    let written = response.updates.as_ref().map(|u| u.updated_rows).unwrap_or(0);
    if written != sent {
        return Err(CallSheetsError::StoreWrite(format!(
            "store reported {} of {} rows written",
            written, sent
        )));
    }
    Ok(written)
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| body.trim().chars().take(200).collect());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => format!("credentials rejected ({}): {}", status, detail),
        StatusCode::NOT_FOUND => format!("spreadsheet not found ({}): {}", status, detail),
        _ => format!("status {}: {}", status, detail),
    }
}
