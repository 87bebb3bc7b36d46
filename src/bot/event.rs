use crate::engine::session::UserId;

/// Identity of the chat a reply should go to, as assigned by the transport.
pub type ChatId = i64;

/// One structured update delivered by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user: UserId,
    pub chat: ChatId,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Command { name: String, args: Vec<String> },
    Text { body: String },
    Button { tag: String },
}

/// Splits a leading-slash message into a command name and its arguments.
/// Returns [EventKind::Text] when the body doesn't look like a command.
pub fn parse_message(body: &str) -> EventKind {
    let trimmed = body.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return EventKind::Text {
            body: trimmed.to_string(),
        };
    };

    let mut parts = rest.split_whitespace();
    match parts.next() {
        // A lone "/" carries no command; let the engine treat it as text.
        None => EventKind::Text {
            body: trimmed.to_string(),
        },
        Some(name) => EventKind::Command {
            name: name.to_string(),
            args: parts.map(str::to_string).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_message, EventKind};

    #[test]
    fn commands_are_split_into_name_and_args() {
        assert_eq!(
            parse_message("/report week"),
            EventKind::Command {
                name: "report".into(),
                args: vec!["week".into()],
            }
        );
        assert_eq!(
            parse_message("/start"),
            EventKind::Command {
                name: "start".into(),
                args: vec![],
            }
        );
    }

    #[test]
    fn plain_text_stays_text() {
        assert_eq!(
            parse_message("  Fix bug  "),
            EventKind::Text {
                body: "Fix bug".into()
            }
        );
        assert_eq!(parse_message("/"), EventKind::Text { body: "/".into() });
    }
}
