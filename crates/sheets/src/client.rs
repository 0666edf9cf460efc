use std::time::Duration;

use async_trait::async_trait;
use coursebot_core::config::SheetsConfig;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("spreadsheet integration is not configured")]
    NotConfigured,
    #[error("invalid spreadsheet url: {0}")]
    InvalidUrl(String),
    #[error("spreadsheet request timed out after {0:?}")]
    Timeout(Duration),
    #[error("spreadsheet transport failure: {0}")]
    Transport(String),
    #[error("spreadsheet service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("spreadsheet response could not be decoded: {0}")]
    Decode(String),
}

/// Destination for registration rows.
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Appends `row` after the last filled row, writing `header` first when the
    /// sheet is empty.
    async fn append_row(&self, header: &[&str], row: &[String]) -> Result<(), SheetsError>;
}

#[derive(Debug, Serialize)]
struct ValueRange<'a, T: Serialize> {
    values: [&'a [T]; 1],
}

#[derive(Debug, Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Google Sheets v4 `values` API client authenticated with a bearer token.
#[derive(Debug)]
pub struct GoogleSheetsClient {
    http: reqwest::Client,
    base_url: Url,
    spreadsheet_id: String,
    sheet_name: String,
    access_token: SecretString,
    timeout: Duration,
    /// Set once the sheet is known to start with a header row.
    header_verified: OnceCell<()>,
}

impl GoogleSheetsClient {
    pub fn new(config: &SheetsConfig) -> Result<Self, SheetsError> {
        let (Some(spreadsheet_id), Some(access_token)) =
            (config.spreadsheet_id.clone(), config.access_token.clone())
        else {
            return Err(SheetsError::NotConfigured);
        };

        let base_url = Url::parse(&config.base_url)
            .map_err(|error| SheetsError::InvalidUrl(format!("{}: {error}", config.base_url)))?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| SheetsError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url,
            spreadsheet_id,
            sheet_name: config.sheet_name.clone(),
            access_token,
            timeout,
            header_verified: OnceCell::new(),
        })
    }

    /// `None` when the spreadsheet id or token is missing or a placeholder.
    pub fn from_config(config: &SheetsConfig) -> Result<Option<Self>, SheetsError> {
        if !config.is_configured() {
            return Ok(None);
        }
        Self::new(config).map(Some)
    }

    fn values_url(&self, range_segment: &str) -> Result<Url, SheetsError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SheetsError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", range_segment]);
        Ok(url)
    }

    fn map_transport(&self, error: reqwest::Error) -> SheetsError {
        if error.is_timeout() {
            SheetsError::Timeout(self.timeout)
        } else {
            SheetsError::Transport(error.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SheetsError::Status { status: status.as_u16(), body })
    }

    async fn sheet_has_header(&self, width: usize) -> Result<bool, SheetsError> {
        let last_column = column_letter(width);
        let url = self.values_url(&format!("{}!A1:{last_column}1", self.sheet_name))?;
        let response = self
            .http
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|error| self.map_transport(error))?;
        let response = Self::check_status(response).await?;
        let payload = response
            .json::<ValueRangeResponse>()
            .await
            .map_err(|error| SheetsError::Decode(error.to_string()))?;

        Ok(payload.values.iter().any(|row| !row.is_empty()))
    }

    async fn append_values<T: Serialize + Sync>(&self, row: &[T]) -> Result<(), SheetsError> {
        let mut url = self.values_url(&format!("{}!A1:append", self.sheet_name))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let response = self
            .http
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&ValueRange { values: [row] })
            .send()
            .await
            .map_err(|error| self.map_transport(error))?;
        Self::check_status(response).await.map(|_| ())
    }
}

#[async_trait]
impl RowSink for GoogleSheetsClient {
    async fn append_row(&self, header: &[&str], row: &[String]) -> Result<(), SheetsError> {
        // Concurrent first appends wait on one check; a failed check is retried.
        self.header_verified
            .get_or_try_init(|| async {
                if !self.sheet_has_header(header.len()).await? {
                    self.append_values(header).await?;
                    tracing::info!(
                        event_name = "registration.sheet.header_written",
                        sheet = %self.sheet_name,
                        "header row written to empty sheet"
                    );
                }
                Ok::<(), SheetsError>(())
            })
            .await?;

        self.append_values(row).await
    }
}

/// Spreadsheet column name for a 1-based index (1 = A, 27 = AA).
fn column_letter(index: usize) -> String {
    let mut remaining = index.max(1);
    let mut letters = Vec::new();
    while remaining > 0 {
        let offset = (remaining - 1) % 26;
        letters.push(char::from(b'A' + offset as u8));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}
