//! Narrow interface over the remote spreadsheet service. The engine only ever
//! opens a sheet by id, reads or initializes the header row, inserts completed
//! task rows, and reads everything back for reports. [memory::MemoryStore] is
//! the in-process realization used by console mode and tests; a real remote
//! backend plugs in at [TabularStore] without touching the engine.

pub mod google;
pub mod memory;
pub mod resolver;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// Fixed header row every linked sheet must carry, in column order.
pub const HEADER_COLUMNS: [&str; 6] = ["Date", "Start", "End", "Hours", "Task", "Tags"];

/// Row index directly below the header. Completed tasks are inserted here so
/// the sheet stays newest-first.
pub const FIRST_DATA_ROW: usize = 2;

/// An opened sheet. Cheap to clone, carries no connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHandle {
    pub store_id: String,
}

/// One data row keyed by header label.
pub type RowMap = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sheet {0} does not exist")]
    NotFound(String),
    #[error("access to the sheet was denied")]
    PermissionDenied,
    #[error("sheet service unavailable: {0}")]
    Unavailable(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TabularStore: Send + Sync + 'static {
    /// Opens a sheet by id, verifying it exists and is readable.
    async fn open(&self, store_id: &str) -> Result<StoreHandle, StoreError>;

    /// Reads row 1. An uninitialized sheet yields an empty list.
    async fn read_header(&self, handle: &StoreHandle) -> Result<Vec<String>, StoreError>;

    /// Inserts `columns` as row 1, shifting existing rows down.
    async fn insert_header(
        &self,
        handle: &StoreHandle,
        columns: Vec<String>,
    ) -> Result<(), StoreError>;

    /// Inserts `row` at the 1-based `position`, shifting existing rows down.
    async fn append_row(
        &self,
        handle: &StoreHandle,
        row: Vec<String>,
        position: usize,
    ) -> Result<(), StoreError>;

    /// Reads every data row as a header-keyed mapping.
    async fn read_all_rows(&self, handle: &StoreHandle) -> Result<Vec<RowMap>, StoreError>;
}

/// The canonical header as owned strings, ready for [TabularStore::insert_header].
pub fn header_columns() -> Vec<String> {
    HEADER_COLUMNS.iter().map(|v| v.to_string()).collect()
}
