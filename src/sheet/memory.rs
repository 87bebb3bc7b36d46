use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;

use super::{RowMap, StoreError, StoreHandle, TabularStore};

/// In-process sheet service. Backs console mode, where the bot runs without any
/// remote spreadsheet, and the engine tests. Sheets are plain row/column string
/// grids; access failures can be scripted per sheet id.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<State>,
    auto_create: bool,
}

#[derive(Default)]
struct State {
    sheets: HashMap<String, Vec<Vec<String>>>,
    denied: HashSet<String>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store where any well-formed id opens an empty sheet. Used by console
    /// mode, where there is no sheet service to refuse an id.
    pub fn auto_creating() -> Self {
        Self {
            auto_create: true,
            ..Self::default()
        }
    }

    pub fn create_sheet(&self, store_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .sheets
            .entry(store_id.to_string())
            .or_default();
    }

    /// Scripts a permission failure for `store_id`.
    pub fn deny(&self, store_id: &str) {
        let mut state = self.inner.lock().unwrap();
        state.denied.insert(store_id.to_string());
        state.sheets.entry(store_id.to_string()).or_default();
    }

    /// Makes every call fail with [StoreError::Unavailable] until called with
    /// `false` again.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unwrap().unavailable = unavailable;
    }

    /// Raw grid snapshot for assertions.
    pub fn rows(&self, store_id: &str) -> Vec<Vec<String>> {
        self.inner
            .lock()
            .unwrap()
            .sheets
            .get(store_id)
            .cloned()
            .unwrap_or_default()
    }

    fn check_access(&self, state: &State, store_id: &str) -> Result<(), StoreError> {
        if state.unavailable {
            return Err(StoreError::Unavailable("store offline".into()));
        }
        if state.denied.contains(store_id) {
            return Err(StoreError::PermissionDenied);
        }
        Ok(())
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn open(&self, store_id: &str) -> Result<StoreHandle, StoreError> {
        let mut state = self.inner.lock().unwrap();
        if state.unavailable {
            return Err(StoreError::Unavailable("store offline".into()));
        }
        if state.denied.contains(store_id) {
            return Err(StoreError::PermissionDenied);
        }
        if !state.sheets.contains_key(store_id) {
            if self.auto_create {
                state.sheets.insert(store_id.to_string(), vec![]);
            } else {
                return Err(StoreError::NotFound(store_id.to_string()));
            }
        }
        Ok(StoreHandle {
            store_id: store_id.to_string(),
        })
    }

    async fn read_header(&self, handle: &StoreHandle) -> Result<Vec<String>, StoreError> {
        let state = self.inner.lock().unwrap();
        self.check_access(&state, &handle.store_id)?;
        Ok(state
            .sheets
            .get(&handle.store_id)
            .and_then(|rows| rows.first())
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_header(
        &self,
        handle: &StoreHandle,
        columns: Vec<String>,
    ) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        self.check_access(&state, &handle.store_id)?;
        let rows = state
            .sheets
            .get_mut(&handle.store_id)
            .ok_or_else(|| StoreError::NotFound(handle.store_id.clone()))?;
        rows.insert(0, columns);
        Ok(())
    }

    async fn append_row(
        &self,
        handle: &StoreHandle,
        row: Vec<String>,
        position: usize,
    ) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        self.check_access(&state, &handle.store_id)?;
        let rows = state
            .sheets
            .get_mut(&handle.store_id)
            .ok_or_else(|| StoreError::NotFound(handle.store_id.clone()))?;
        let index = (position.saturating_sub(1)).min(rows.len());
        rows.insert(index, row);
        Ok(())
    }

    async fn read_all_rows(&self, handle: &StoreHandle) -> Result<Vec<RowMap>, StoreError> {
        let state = self.inner.lock().unwrap();
        self.check_access(&state, &handle.store_id)?;
        let rows = state
            .sheets
            .get(&handle.store_id)
            .ok_or_else(|| StoreError::NotFound(handle.store_id.clone()))?;
        let Some((header, data)) = rows.split_first() else {
            return Ok(vec![]);
        };
        Ok(data
            .iter()
            .map(|row| {
                header
                    .iter()
                    .zip(row.iter())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .collect())
    }
}
