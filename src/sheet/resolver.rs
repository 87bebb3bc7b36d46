use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::engine::error::EngineError;

use super::{header_columns, TabularStore, HEADER_COLUMNS};

/// A sheet the user has connected. Kept in the session for the lifetime of the
/// process once verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedStore {
    pub raw_url: String,
    pub store_id: String,
}

static FULL_PATH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/spreadsheets/d/([a-zA-Z0-9-_]+)").unwrap());
static SHORT_PATH_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/d/([a-zA-Z0-9-_]+)").unwrap());
static BARE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9-_]+$").unwrap());

/// Pulls a sheet id out of a pasted link or a raw id. Patterns are tried from
/// most to least specific, first match wins.
pub fn extract_store_id(input: &str) -> Option<&str> {
    let input = input.trim();
    for pattern in [&FULL_PATH_ID, &SHORT_PATH_ID] {
        if let Some(captures) = pattern.captures(input) {
            return Some(captures.get(1).unwrap().as_str());
        }
    }
    BARE_ID.find(input).map(|m| m.as_str())
}

fn has_canonical_header(header: &[String]) -> bool {
    HEADER_COLUMNS
        .iter()
        .all(|column| header.iter().any(|h| h == column))
}

/// Resolves user input into a verified [LinkedStore]: extracts the id, opens
/// the sheet, and makes sure row 1 carries the canonical header, inserting it
/// when missing. Relinking an already initialized sheet never duplicates the
/// header.
pub async fn link_store(
    store: &impl TabularStore,
    input: &str,
    service_account: &str,
) -> Result<LinkedStore, EngineError> {
    let store_id = extract_store_id(input).ok_or(EngineError::InvalidReference)?;

    let handle = store
        .open(store_id)
        .await
        .map_err(|e| EngineError::from_store(e, service_account))?;

    let header = store
        .read_header(&handle)
        .await
        .map_err(|e| EngineError::from_store(e, service_account))?;
    if !has_canonical_header(&header) {
        debug!("Initializing header for sheet {store_id}");
        store
            .insert_header(&handle, header_columns())
            .await
            .map_err(|e| EngineError::from_store(e, service_account))?;
    }

    Ok(LinkedStore {
        raw_url: format!("https://docs.google.com/spreadsheets/d/{store_id}"),
        store_id: store_id.to_string(),
    })
}
