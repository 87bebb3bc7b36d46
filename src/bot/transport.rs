use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::engine::{buttons, Reply};

use super::event::{parse_message, ChatId, InboundEvent};

/// Contract every chat frontend must implement. The event loop pulls events
/// one at a time and pushes rendering instructions back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send {
    /// Waits for the next inbound event. `None` means the transport closed and
    /// the loop should stop.
    async fn next_event(&mut self) -> Result<Option<InboundEvent>>;

    async fn send(&mut self, chat: ChatId, reply: Reply) -> Result<()>;
}

/// Chat over stdin/stdout, for running the bot without any chat service.
/// Button presses are simulated by typing the tag shown in brackets.
pub struct ConsoleTransport {
    lines: Lines<BufReader<Stdin>>,
}

const CONSOLE_CHAT: ChatId = 0;

impl ConsoleTransport {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(io::stdin()).lines(),
        }
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// A typed line that exactly matches a known button tag counts as a press.
fn parse_console_line(line: &str) -> InboundEvent {
    let trimmed = line.trim();
    let kind = if buttons::ALL.contains(&trimmed) {
        super::event::EventKind::Button {
            tag: trimmed.to_string(),
        }
    } else {
        parse_message(trimmed)
    };
    InboundEvent {
        user: CONSOLE_CHAT,
        chat: CONSOLE_CHAT,
        kind,
    }
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>> {
        loop {
            match self.lines.next_line().await? {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(parse_console_line(&line))),
            }
        }
    }

    async fn send(&mut self, _chat: ChatId, reply: Reply) -> Result<()> {
        println!("{}", reply.text);
        for button in &reply.buttons {
            println!("  [{}] {}", button.tag, button.label);
        }
        println!();
        Ok(())
    }
}
