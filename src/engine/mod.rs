//! The conversation engine. Inbound events are routed through one entry point
//! per event kind; the per-user session decides how free text is interpreted.
//! Task lifecycle: idle, then describing, tagging and confirming, then back to
//! idle once the row is written to the linked sheet.

pub mod error;
pub mod session;

use tracing::{debug, error, warn};

use crate::{
    report,
    sheet::{resolver, TabularStore, FIRST_DATA_ROW},
    utils::{
        clock::Clock,
        time::{elapsed_hours, DATE_FORMAT, TIME_FORMAT},
    },
};

use error::EngineError;
use session::{ActiveTask, SessionStore, TaskPhase, UserId};

/// Callback tags carried by inline buttons.
pub mod buttons {
    pub const TASK_START: &str = "task_start";
    pub const SKIP_TAGS: &str = "skip_tags";
    pub const CONFIRM_END: &str = "confirm_end";
    pub const CANCEL_END: &str = "cancel_end";
    pub const REPORT_WEEK: &str = "report_week";
    pub const REPORT_MONTH: &str = "report_month";

    pub const ALL: [&str; 6] = [
        TASK_START,
        SKIP_TAGS,
        CONFIRM_END,
        CANCEL_END,
        REPORT_WEEK,
        REPORT_MONTH,
    ];
}

/// Rendering instruction handed back to the transport: message text plus an
/// optional row of inline buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub buttons: Vec<Button>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub tag: String,
}

impl Button {
    pub fn new(label: &str, tag: &str) -> Self {
        Self {
            label: label.to_string(),
            tag: tag.to_string(),
        }
    }
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: vec![],
        }
    }

    pub fn with_buttons(text: impl Into<String>, buttons: Vec<Button>) -> Self {
        Self {
            text: text.into(),
            buttons,
        }
    }
}

fn main_keyboard() -> Vec<Button> {
    vec![
        Button::new("Start task", buttons::TASK_START),
        Button::new("Weekly report", buttons::REPORT_WEEK),
        Button::new("Monthly report", buttons::REPORT_MONTH),
    ]
}

fn confirm_keyboard() -> Vec<Button> {
    vec![
        Button::new("Save task", buttons::CONFIRM_END),
        Button::new("Discard", buttons::CANCEL_END),
    ]
}

pub struct Engine<S> {
    store: S,
    sessions: SessionStore,
    clock: Box<dyn Clock>,
    service_account: String,
}

impl<S: TabularStore> Engine<S> {
    pub fn new(store: S, clock: Box<dyn Clock>, service_account: String) -> Self {
        Self {
            store,
            sessions: SessionStore::new(),
            clock,
            service_account,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn handle_command(&self, user: UserId, name: &str, args: &[String]) -> Reply {
        debug!("Command /{name} from {user}");
        match name {
            "start" => Reply::with_buttons(
                format!(
                    "Time tracking bot\n\n\
                     1. Create a spreadsheet\n\
                     2. Grant edit access to the service account: {}\n\
                     3. Send me the sheet link or its id\n\n\
                     Example: https://docs.google.com/spreadsheets/d/ABC123/edit",
                    self.service_account
                ),
                main_keyboard(),
            ),
            "cancel" => self.cancel(user),
            "report" => {
                let window_days = match parse_report_window(args) {
                    Some(v) => v,
                    None => {
                        return Reply::text(
                            "Usage: /report [week|month|<days>]",
                        )
                    }
                };
                self.report(user, window_days).await
            }
            _ => Reply::with_buttons(
                "Unknown command. Available: /start, /cancel, /report",
                main_keyboard(),
            ),
        }
    }

    /// Free text is interpreted by the current session: with no task in flight
    /// it is a link attempt, otherwise it feeds the current phase.
    pub async fn handle_text(&self, user: UserId, body: &str) -> Reply {
        let session = self.sessions.get(user);
        let Some(task) = session.active_task else {
            return self.link(user, body).await;
        };

        match task.phase {
            TaskPhase::Describing => {
                let description = body.trim();
                if description.is_empty() {
                    return self.error_reply(EngineError::EmptyDescription);
                }
                self.sessions.set_active_task(
                    user,
                    ActiveTask {
                        description: Some(description.to_string()),
                        phase: TaskPhase::Tagging,
                        ..task
                    },
                );
                Reply::with_buttons(
                    "Description saved. Send comma-separated tags:\nExample: backend, review, urgent",
                    vec![Button::new("Skip tags", buttons::SKIP_TAGS)],
                )
            }
            TaskPhase::Tagging => {
                self.sessions.set_active_task(
                    user,
                    ActiveTask {
                        tags: Some(body.trim().to_string()),
                        phase: TaskPhase::Confirming,
                        ..task
                    },
                );
                Reply::with_buttons("Tags saved. Finish and save the task?", confirm_keyboard())
            }
            TaskPhase::Confirming => {
                Reply::with_buttons("Finish and save the task?", confirm_keyboard())
            }
        }
    }

    pub async fn handle_button(&self, user: UserId, tag: &str) -> Reply {
        debug!("Button {tag} from {user}");
        match tag {
            buttons::TASK_START => self.start_task(user),
            buttons::SKIP_TAGS => self.skip_tags(user),
            buttons::CONFIRM_END => self.persist_task(user).await,
            buttons::CANCEL_END => self.cancel(user),
            buttons::REPORT_WEEK => self.report(user, 7).await,
            buttons::REPORT_MONTH => self.report(user, 30).await,
            _ => {
                warn!("Unknown button tag {tag:?} from {user}");
                Reply::with_buttons("Unknown action.", main_keyboard())
            }
        }
    }

    async fn link(&self, user: UserId, body: &str) -> Reply {
        match resolver::link_store(&self.store, body, &self.service_account).await {
            Ok(linked) => {
                let url = linked.raw_url.clone();
                self.sessions.set_linked_store(user, linked);
                Reply::with_buttons(
                    format!("Connected to the sheet.\n{url}\n\nYou can now start a task."),
                    main_keyboard(),
                )
            }
            Err(e) => self.error_reply(e),
        }
    }

    fn start_task(&self, user: UserId) -> Reply {
        let session = self.sessions.get(user);
        if session.linked_store.is_none() {
            return self.error_reply(EngineError::NoLinkedStore);
        }
        if session.active_task.is_some() {
            return Reply::with_buttons(
                "A task is already being timed. Finish or discard it first.",
                confirm_keyboard(),
            );
        }

        let start_time = self.clock.time();
        self.sessions
            .set_active_task(user, ActiveTask::started_at(start_time));
        Reply::text(format!(
            "Task started at {}.\nSend a description:",
            start_time.format(TIME_FORMAT)
        ))
    }

    fn skip_tags(&self, user: UserId) -> Reply {
        let session = self.sessions.get(user);
        let Some(task) = session.active_task else {
            return self.error_reply(EngineError::NoActiveTask);
        };
        match task.phase {
            TaskPhase::Tagging => {
                self.sessions.set_active_task(
                    user,
                    ActiveTask {
                        tags: Some(String::new()),
                        phase: TaskPhase::Confirming,
                        ..task
                    },
                );
                Reply::with_buttons("Tags skipped. Finish and save the task?", confirm_keyboard())
            }
            TaskPhase::Describing => Reply::text("Send a description first:"),
            TaskPhase::Confirming => {
                Reply::with_buttons("Finish and save the task?", confirm_keyboard())
            }
        }
    }

    fn cancel(&self, user: UserId) -> Reply {
        match self.sessions.take_active_task(user) {
            Some(_) => Reply::with_buttons("Task discarded, nothing was written.", main_keyboard()),
            None => self.error_reply(EngineError::NoActiveTask),
        }
    }

    /// Terminal transition: writes the 6-column row directly below the header.
    /// A failed write is reported but not retried; the task is cleared either
    /// way so a transient fault cannot replay the side effect.
    async fn persist_task(&self, user: UserId) -> Reply {
        let session = self.sessions.get(user);
        let Some(task) = session.active_task else {
            return self.error_reply(EngineError::NoActiveTask);
        };
        // Rejecting here leaves the task untouched so the user can still fill
        // the description in.
        let description = match task.description.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => return self.error_reply(EngineError::EmptyDescription),
        };
        let Some(linked) = session.linked_store else {
            return self.error_reply(EngineError::NoLinkedStore);
        };

        let task = self
            .sessions
            .take_active_task(user)
            .unwrap_or(task);

        let end_time = self.clock.time();
        let hours = elapsed_hours(task.start_time, end_time);
        let row = vec![
            task.start_time.format(DATE_FORMAT).to_string(),
            task.start_time.format(TIME_FORMAT).to_string(),
            end_time.format(TIME_FORMAT).to_string(),
            format!("{hours:.2}"),
            description.clone(),
            task.tags.unwrap_or_default(),
        ];

        let written = async {
            let handle = self.store.open(&linked.store_id).await?;
            self.store.append_row(&handle, row.clone(), FIRST_DATA_ROW).await
        }
        .await;

        match written {
            Ok(()) => {
                let mut text = format!(
                    "Task saved.\nDate: {}\nTime: {} - {} ({hours:.2} h)\nTask: {}",
                    row[0], row[1], row[2], description
                );
                if !row[5].is_empty() {
                    text.push_str(&format!("\nTags: {}", row[5]));
                }
                Reply::with_buttons(text, main_keyboard())
            }
            Err(e) => {
                error!("Failed to write task row for {user}: {e}");
                self.error_reply(EngineError::from_store(e, &self.service_account))
            }
        }
    }

    async fn report(&self, user: UserId, window_days: i64) -> Reply {
        let session = self.sessions.get(user);
        let Some(linked) = session.linked_store else {
            return self.error_reply(EngineError::NoLinkedStore);
        };

        let rows = async {
            let handle = self.store.open(&linked.store_id).await?;
            self.store.read_all_rows(&handle).await
        }
        .await;
        let rows = match rows {
            Ok(v) => v,
            Err(e) => return self.error_reply(EngineError::from_store(e, &self.service_account)),
        };

        let summary = report::aggregate(&rows, window_days, self.clock.time());
        if summary.is_empty() {
            return Reply::with_buttons(
                format!("No entries in the last {window_days} days."),
                main_keyboard(),
            );
        }
        Reply::with_buttons(report::render(&summary), main_keyboard())
    }

    fn error_reply(&self, error: EngineError) -> Reply {
        match &error {
            EngineError::InvalidReference => Reply::text(
                "Could not extract a sheet id from that.\n\
                 Send a link like https://docs.google.com/spreadsheets/d/ABC123/edit or a bare id.",
            ),
            EngineError::PermissionDenied { service_account } => Reply::text(format!(
                "No access to the sheet.\n\
                 Share it with the service account and try again.\n\
                 Account: {service_account}\nRequired access: editor"
            )),
            EngineError::StoreUnavailable(_) => Reply::text(format!("{error}. Try again in a moment.")),
            EngineError::NoLinkedStore => {
                Reply::text("No sheet is linked yet. Send a sheet link or its id to connect.")
            }
            EngineError::NoActiveTask => {
                Reply::with_buttons("No task is being timed right now.", main_keyboard())
            }
            EngineError::EmptyDescription => {
                Reply::text("The description can't be empty. Send a few words about the task:")
            }
        }
    }
}

fn parse_report_window(args: &[String]) -> Option<i64> {
    match args.first().map(String::as_str) {
        None => Some(7),
        Some("week") => Some(7),
        Some("month") => Some(30),
        Some(raw) => raw.parse::<i64>().ok().filter(|days| *days > 0),
    }
}
