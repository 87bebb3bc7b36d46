//! Telegram frontend: long-polls `getUpdates` and renders replies through
//! `sendMessage` with an inline keyboard. Only the few payload fields the bot
//! actually reads are modeled.

use std::{collections::VecDeque, time::Duration};

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::Reply;

use super::{
    event::{parse_message, ChatId, EventKind, InboundEvent},
    transport::ChatTransport,
};

const LONG_POLL_SECONDS: u64 = 50;

// Long poll plus headroom so the client doesn't cut the request short.
const HTTP_TIMEOUT: Duration = Duration::from_secs(LONG_POLL_SECONDS + 15);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Update {
    update_id: i64,
    message: Option<Message>,
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    from: Option<User>,
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    message: Option<Message>,
    data: Option<String>,
}

impl Update {
    /// The id Telegram expects as the next polling offset.
    fn next_offset(&self) -> i64 {
        self.update_id + 1
    }

    fn into_event(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            let chat = query.message.as_ref().map(|m| m.chat.id)?;
            let tag = query.data?;
            return Some(InboundEvent {
                user: query.from.id,
                chat,
                kind: EventKind::Button { tag },
            });
        }

        let message = self.message?;
        let user = message.from.as_ref().map(|u| u.id)?;
        let body = message.text?;
        Some(InboundEvent {
            user,
            chat: message.chat.id,
            kind: parse_message(&body),
        })
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup>,
}

#[derive(Serialize)]
struct ReplyMarkup {
    inline_keyboard: Vec<Vec<InlineButton>>,
}

#[derive(Serialize)]
struct InlineButton {
    text: String,
    callback_data: String,
}

fn reply_markup(reply: &Reply) -> Option<ReplyMarkup> {
    if reply.buttons.is_empty() {
        return None;
    }
    Some(ReplyMarkup {
        inline_keyboard: reply
            .buttons
            .iter()
            .map(|b| {
                vec![InlineButton {
                    text: b.label.clone(),
                    callback_data: b.tag.clone(),
                }]
            })
            .collect(),
    })
}

pub struct TelegramTransport {
    http: Client,
    base_url: String,
    offset: i64,
    pending: VecDeque<InboundEvent>,
}

impl TelegramTransport {
    pub fn new(bot_token: &str) -> Result<Self> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: format!("https://api.telegram.org/bot{bot_token}"),
            offset: 0,
            pending: VecDeque::new(),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        payload: &impl Serialize,
    ) -> Result<T> {
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .json(payload)
            .send()
            .await?
            .json::<ApiResponse<T>>()
            .await?;
        if !response.ok {
            bail!(
                "telegram {method} failed: {}",
                response.description.unwrap_or_else(|| "no description".into())
            );
        }
        response
            .result
            .ok_or_else(|| anyhow::anyhow!("telegram {method} returned no result"))
    }

    async fn poll_updates(&mut self) -> Result<Vec<Update>> {
        #[derive(Serialize)]
        struct GetUpdates {
            timeout: u64,
            offset: i64,
        }

        self.call(
            "getUpdates",
            &GetUpdates {
                timeout: LONG_POLL_SECONDS,
                offset: self.offset,
            },
        )
        .await
    }

    /// Clears the client-side spinner on a pressed button. Failures here don't
    /// matter for the conversation, so they are only logged.
    async fn answer_callback(&self, callback_id: &str) {
        #[derive(Serialize)]
        struct AnswerCallback<'a> {
            callback_query_id: &'a str,
        }

        let answered: Result<bool> = self
            .call(
                "answerCallbackQuery",
                &AnswerCallback {
                    callback_query_id: callback_id,
                },
            )
            .await;
        if let Err(e) = answered {
            warn!("Failed to answer callback query: {e}");
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            let updates = self.poll_updates().await?;
            debug!("Received {} updates", updates.len());
            for update in updates {
                self.offset = self.offset.max(update.next_offset());
                if let Some(query) = &update.callback_query {
                    self.answer_callback(&query.id).await;
                }
                if let Some(event) = update.into_event() {
                    self.pending.push_back(event);
                }
            }
        }
    }

    async fn send(&mut self, chat: ChatId, reply: Reply) -> Result<()> {
        let _sent: serde_json::Value = self
            .call(
                "sendMessage",
                &SendMessage {
                    chat_id: chat,
                    text: &reply.text,
                    reply_markup: reply_markup(&reply),
                },
            )
            .await?;
        Ok(())
    }
}
