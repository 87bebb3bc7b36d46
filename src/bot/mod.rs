//! Wires the conversation engine to a chat transport and runs events to
//! completion, one at a time. A fault while handling one user's event is
//! rendered back to that user and never takes the process down.

pub mod config;
pub mod event;
pub mod shutdown;
pub mod telegram;
pub mod transport;

use std::time::Duration;

use anyhow::Result;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    engine::{Engine, Reply},
    sheet::TabularStore,
    utils::clock::Clock,
};

use event::{EventKind, InboundEvent};
use transport::ChatTransport;

/// Pause after a transport fault before polling again.
const TRANSPORT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Represents the starting point for the bot: runs the event loop until the
/// transport closes or a shutdown signal arrives.
pub async fn run_bot(
    engine: Engine<impl TabularStore>,
    transport: impl ChatTransport,
    clock: impl Clock,
) -> Result<()> {
    let shutdown_token = CancellationToken::new();
    tokio::spawn(shutdown::detect_shutdown(shutdown_token.clone()));

    let loop_result = run_event_loop(&engine, transport, &clock, shutdown_token).await;
    if let Err(e) = &loop_result {
        error!("Event loop stopped with an error {e:?}");
    }
    loop_result
}

pub async fn run_event_loop(
    engine: &Engine<impl TabularStore>,
    mut transport: impl ChatTransport,
    clock: &impl Clock,
    token: CancellationToken,
) -> Result<()> {
    info!("Bot started");
    loop {
        let event = select! {
            biased;
            _ = token.cancelled() => break,
            event = transport.next_event() => event,
        };

        match event {
            Ok(Some(event)) => {
                let chat = event.chat;
                let reply = dispatch(engine, event).await;
                if let Err(e) = transport.send(chat, reply).await {
                    error!("Failed to deliver reply to chat {chat}: {e:?}");
                }
            }
            Ok(None) => {
                info!("Transport closed, stopping");
                break;
            }
            Err(e) => {
                warn!("Transport error, retrying shortly: {e:?}");
                clock.sleep(TRANSPORT_RETRY_DELAY).await;
            }
        }
    }
    Ok(())
}

/// Single dispatch point: one engine entry per event kind.
async fn dispatch(engine: &Engine<impl TabularStore>, event: InboundEvent) -> Reply {
    match event.kind {
        EventKind::Command { name, args } => engine.handle_command(event.user, &name, &args).await,
        EventKind::Text { body } => engine.handle_text(event.user, &body).await,
        EventKind::Button { tag } => engine.handle_button(event.user, &tag).await,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use anyhow::Result;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use crate::{
        engine::{buttons, Engine, Reply},
        sheet::{header_columns, memory::MemoryStore},
        utils::{
            clock::{Clock, DefaultClock},
            logging::TEST_LOGGING,
        },
    };

    use super::{
        event::{EventKind, InboundEvent},
        run_event_loop,
        transport::{ChatTransport, MockChatTransport},
    };

    /// Feeds a fixed sequence of events and records every reply.
    struct ScriptTransport {
        incoming: VecDeque<InboundEvent>,
        replies: Vec<Reply>,
    }

    impl ScriptTransport {
        fn new(kinds: Vec<EventKind>) -> Self {
            Self {
                incoming: kinds
                    .into_iter()
                    .map(|kind| InboundEvent {
                        user: 42,
                        chat: 42,
                        kind,
                    })
                    .collect(),
                replies: vec![],
            }
        }
    }

    #[async_trait]
    impl ChatTransport for &mut ScriptTransport {
        async fn next_event(&mut self) -> Result<Option<InboundEvent>> {
            Ok(self.incoming.pop_front())
        }

        async fn send(&mut self, _chat: i64, reply: Reply) -> Result<()> {
            self.replies.push(reply);
            Ok(())
        }
    }

    fn text(body: &str) -> EventKind {
        EventKind::Text {
            body: body.to_string(),
        }
    }

    fn button(tag: &str) -> EventKind {
        EventKind::Button {
            tag: tag.to_string(),
        }
    }

    #[tokio::test]
    async fn link_start_describe_tag_confirm_end_to_end() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryStore::new();
        store.create_sheet("s1");
        let engine = Engine::new(store, Box::new(DefaultClock), "bot@example.com".into());

        let mut transport = ScriptTransport::new(vec![
            text("https://docs.google.com/spreadsheets/d/s1/edit"),
            button(buttons::TASK_START),
            text("Fix bug"),
            text("backend, urgent"),
            button(buttons::CONFIRM_END),
        ]);

        run_event_loop(
            &engine,
            &mut transport,
            &DefaultClock,
            CancellationToken::new(),
        )
        .await?;

        assert_eq!(transport.replies.len(), 5);
        assert!(transport.replies[0].text.contains("Connected"));
        assert!(transport.replies[4].text.contains("Task saved"));

        let grid = engine.store().rows("s1");
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0], header_columns());
        assert_eq!(grid[1][4], "Fix bug");
        assert_eq!(grid[1][5], "backend, urgent");
        Ok(())
    }

    #[tokio::test]
    async fn one_users_failure_does_not_stop_the_loop() -> Result<()> {
        let store = MemoryStore::new();
        store.create_sheet("s1");
        let engine = Engine::new(store, Box::new(DefaultClock), "bot@example.com".into());

        let mut transport = ScriptTransport::new(vec![
            text("complete garbage input !!!"),
            text("s1"),
        ]);

        run_event_loop(
            &engine,
            &mut transport,
            &DefaultClock,
            CancellationToken::new(),
        )
        .await?;

        assert_eq!(transport.replies.len(), 2);
        assert!(transport.replies[0].text.contains("Could not extract"));
        assert!(transport.replies[1].text.contains("Connected"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_retried_until_the_stream_ends() -> Result<()> {
        let engine = Engine::new(
            MemoryStore::new(),
            Box::new(DefaultClock),
            "bot@example.com".into(),
        );

        let mut transport = MockChatTransport::new();
        let mut seq = mockall::Sequence::new();
        transport
            .expect_next_event()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(anyhow::anyhow!("poll failed")));
        transport
            .expect_next_event()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(None));

        run_event_loop(&engine, transport, &DefaultClock, CancellationToken::new()).await?;
        Ok(())
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop_before_events_are_taken() -> Result<()> {
        let store = MemoryStore::new();
        let engine = Engine::new(store, Box::new(DefaultClock), "bot@example.com".into());
        let mut transport = ScriptTransport::new(vec![text("s1")]);

        let token = CancellationToken::new();
        token.cancel();
        run_event_loop(&engine, &mut transport, &DefaultClock, token).await?;

        assert!(transport.replies.is_empty());
        Ok(())
    }
}
