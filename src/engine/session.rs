use std::{collections::HashMap, sync::Mutex};

use chrono::{DateTime, Utc};

use crate::sheet::resolver::LinkedStore;

/// Identity of a chat user, as assigned by the transport.
pub type UserId = i64;

/// Where the conversation stands for the task currently being timed. The
/// absence of an [ActiveTask] is the idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Describing,
    Tagging,
    Confirming,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTask {
    pub start_time: DateTime<Utc>,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub phase: TaskPhase,
}

impl ActiveTask {
    pub fn started_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            description: None,
            tags: None,
            phase: TaskPhase::Describing,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub linked_store: Option<LinkedStore>,
    pub active_task: Option<ActiveTask>,
}

/// Per-user conversation state. Lives for the lifetime of the process only; a
/// restart drops every session, the linked sheet itself is the durable record.
/// Updates are atomic per key, last write wins. A single user drives one chat
/// thread at a time, so no finer coordination is needed.
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<UserId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the user's session, created lazily on first access.
    pub fn get(&self, user: UserId) -> Session {
        self.inner
            .lock()
            .unwrap()
            .get(&user)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_linked_store(&self, user: UserId, store: LinkedStore) {
        self.inner
            .lock()
            .unwrap()
            .entry(user)
            .or_default()
            .linked_store = Some(store);
    }

    pub fn set_active_task(&self, user: UserId, task: ActiveTask) {
        self.inner
            .lock()
            .unwrap()
            .entry(user)
            .or_default()
            .active_task = Some(task);
    }

    /// Removes and returns the in-progress task, if any.
    pub fn take_active_task(&self, user: UserId) -> Option<ActiveTask> {
        self.inner
            .lock()
            .unwrap()
            .get_mut(&user)
            .and_then(|session| session.active_task.take())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::sheet::resolver::LinkedStore;

    use super::{ActiveTask, SessionStore, TaskPhase};

    #[test]
    fn sessions_are_created_lazily() {
        let store = SessionStore::new();
        let session = store.get(7);
        assert!(session.linked_store.is_none());
        assert!(session.active_task.is_none());
    }

    #[test]
    fn linked_store_survives_task_lifecycle() {
        let store = SessionStore::new();
        store.set_linked_store(
            7,
            LinkedStore {
                raw_url: "https://docs.google.com/spreadsheets/d/s1".into(),
                store_id: "s1".into(),
            },
        );
        store.set_active_task(7, ActiveTask::started_at(Utc::now()));
        assert!(store.take_active_task(7).is_some());
        assert!(store.take_active_task(7).is_none());
        assert_eq!(store.get(7).linked_store.unwrap().store_id, "s1");
    }

    #[test]
    fn new_task_starts_in_describing_phase() {
        let task = ActiveTask::started_at(Utc::now());
        assert_eq!(task.phase, TaskPhase::Describing);
        assert!(task.description.is_none());
        assert!(task.tags.is_none());
    }
}
