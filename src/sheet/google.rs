//! Google Sheets realization of [TabularStore] over the v4 REST API. The
//! adapter authenticates with a short-lived bearer token minted outside the
//! process; token refresh is deliberately not this bot's business.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{RowMap, StoreError, StoreHandle, TabularStore, HEADER_COLUMNS};

const BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Column span of the canonical layout, `A:F`.
fn data_range(first_row: usize, last_row: Option<usize>) -> String {
    let last_column = (b'A' + (HEADER_COLUMNS.len() - 1) as u8) as char;
    match last_row {
        Some(last) => format!("A{first_row}:{last_column}{last}"),
        None => format!("A{first_row}:{last_column}"),
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    #[serde(rename = "sheetId")]
    sheet_id: i64,
}

pub struct GoogleSheetsStore {
    http: Client,
    base_url: String,
    access_token: String,
}

impl GoogleSheetsStore {
    pub fn new(access_token: String) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            access_token,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        store_id: &str,
        path: &str,
    ) -> Result<T, StoreError> {
        let response = self
            .http
            .get(format!("{}/{store_id}{path}", self.base_url))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status, store_id));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn post_json(
        &self,
        store_id: &str,
        path: &str,
        payload: &impl Serialize,
    ) -> Result<(), StoreError> {
        let response = self
            .http
            .post(format!("{}/{store_id}{path}", self.base_url))
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status, store_id));
        }
        Ok(())
    }

    async fn first_sheet_id(&self, store_id: &str) -> Result<i64, StoreError> {
        let meta: SpreadsheetMeta = self
            .get_json(store_id, "?fields=sheets.properties.sheetId")
            .await?;
        meta.sheets
            .first()
            .map(|sheet| sheet.properties.sheet_id)
            .ok_or_else(|| StoreError::NotFound(store_id.to_string()))
    }

    /// Makes room at the 1-based `position` by shifting rows down, then writes
    /// the cells. This is what keeps the sheet newest-first.
    async fn insert_row_at(
        &self,
        store_id: &str,
        row: Vec<String>,
        position: usize,
    ) -> Result<(), StoreError> {
        let sheet_id = self.first_sheet_id(store_id).await?;
        self.post_json(
            store_id,
            ":batchUpdate",
            &json!({
                "requests": [{
                    "insertDimension": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "ROWS",
                            "startIndex": position - 1,
                            "endIndex": position,
                        },
                        "inheritFromBefore": false,
                    }
                }]
            }),
        )
        .await?;

        let range = data_range(position, Some(position));
        let response = self
            .http
            .put(format!(
                "{}/{store_id}/values/{range}?valueInputOption=RAW",
                self.base_url
            ))
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status, store_id));
        }
        Ok(())
    }
}

fn map_status(status: StatusCode, store_id: &str) -> StoreError {
    if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
        StoreError::PermissionDenied
    } else if status == StatusCode::NOT_FOUND {
        StoreError::NotFound(store_id.to_string())
    } else {
        StoreError::Unavailable(format!("sheets api answered {status}"))
    }
}

#[async_trait]
impl TabularStore for GoogleSheetsStore {
    async fn open(&self, store_id: &str) -> Result<StoreHandle, StoreError> {
        // Reading metadata both proves the id exists and that we can read it.
        self.get_json::<serde_json::Value>(store_id, "?fields=spreadsheetId")
            .await?;
        debug!("Opened sheet {store_id}");
        Ok(StoreHandle {
            store_id: store_id.to_string(),
        })
    }

    async fn read_header(&self, handle: &StoreHandle) -> Result<Vec<String>, StoreError> {
        let range = data_range(1, Some(1));
        let values: ValueRange = self
            .get_json(&handle.store_id, &format!("/values/{range}"))
            .await?;
        Ok(values.values.into_iter().next().unwrap_or_default())
    }

    async fn insert_header(
        &self,
        handle: &StoreHandle,
        columns: Vec<String>,
    ) -> Result<(), StoreError> {
        self.insert_row_at(&handle.store_id, columns, 1).await
    }

    async fn append_row(
        &self,
        handle: &StoreHandle,
        row: Vec<String>,
        position: usize,
    ) -> Result<(), StoreError> {
        self.insert_row_at(&handle.store_id, row, position).await
    }

    async fn read_all_rows(&self, handle: &StoreHandle) -> Result<Vec<RowMap>, StoreError> {
        let header = self.read_header(handle).await?;
        if header.is_empty() {
            return Ok(vec![]);
        }
        let range = data_range(2, None);
        let values: ValueRange = self
            .get_json(&handle.store_id, &format!("/values/{range}"))
            .await?;
        Ok(values
            .values
            .into_iter()
            .map(|row| {
                header
                    .iter()
                    .cloned()
                    .zip(row.into_iter())
                    .collect::<RowMap>()
            })
            .collect())
    }
}
