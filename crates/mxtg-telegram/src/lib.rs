//! Telegram adapter (teloxide).
//!
//! Maps Bot API messages and entities onto `mxtg-core` types and implements
//! the live profile port over the Bot API.

use async_trait::async_trait;

use teloxide::{prelude::*, types::Chat};

pub mod entities;
pub mod event;

use mxtg_core::{domain::TgUserId, errors::Error, ports::ProfileFetcher, Result};

/// Display names fetched with `getChat`. No retries; a failure degrades to
/// "Unknown user" upstream.
#[derive(Clone)]
pub struct TelegramProfiles {
    bot: Bot,
}

impl TelegramProfiles {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ProfileFetcher for TelegramProfiles {
    async fn fetch_display_name(&self, id: TgUserId) -> Result<Option<String>> {
        let chat = self
            .bot
            .get_chat(ChatId(id.0))
            .await
            .map_err(|e| Error::External(format!("telegram error: {e}")))?;
        Ok(display_name(&chat))
    }
}

/// "First Last" for users, the title for everything else.
pub fn display_name(chat: &Chat) -> Option<String> {
    if !chat.is_private() {
        return chat.title().map(str::to_string);
    }
    let name = [chat.first_name(), chat.last_name()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    (!name.is_empty()).then_some(name)
}
