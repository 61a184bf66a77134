use std::{io::Read, sync::Arc};

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use teloxide::{types::MessageEntity, Bot};

use mxtg_core::{
    config::Config,
    directory::Directory,
    domain::{MessageLocation, RemoteEvent, ReplyKind, TgUserId},
    errors::Error,
    formatting::{markup_to_native, native_to_markup},
    ports::{ProfileFetcher, RemoteEventFetcher},
    transform::MessageTransformer,
};
use mxtg_telegram::{
    entities::{entities_from_spans, spans_from_entities},
    TelegramProfiles,
};

const USAGE: &str = "usage: mxtg <to-telegram | to-matrix | from-bot-api [RECEIVER_ID]> < input";

/// Telegram text with Bot API entities, as read and written on stdio.
#[derive(Debug, Serialize, Deserialize)]
struct NativeText {
    text: String,
    #[serde(default)]
    entities: Vec<MessageEntity>,
}

/// No homeserver access from the command line; Bot API only with a token.
struct Offline;

#[async_trait]
impl RemoteEventFetcher for Offline {
    async fn fetch_event(&self, location: &MessageLocation) -> mxtg_core::Result<RemoteEvent> {
        Err(Error::External(format!(
            "cannot fetch {} offline",
            location.event_id
        )))
    }
}

#[async_trait]
impl ProfileFetcher for Offline {
    async fn fetch_display_name(&self, _id: TgUserId) -> mxtg_core::Result<Option<String>> {
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mxtg_core::logging::init("mxtg")?;

    let cfg = Arc::new(Config::load()?);
    let directory = Arc::new(match &cfg.directory_file {
        Some(path) => Directory::load(path)?,
        None => Directory::default(),
    });

    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        bail!(USAGE);
    };

    tracing::debug!(%command, "running");

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;

    match command.as_str() {
        "to-telegram" => {
            let Some((text, entities)) = markup_to_native(&input, directory.as_ref()) else {
                bail!("could not convert markup");
            };
            let entities = entities_from_spans(&entities);
            println!("{}", serde_json::to_string(&NativeText { text, entities })?);
        }
        "to-matrix" => {
            let native: NativeText =
                serde_json::from_str(&input).context("expected {\"text\", \"entities\"} JSON")?;
            let spans = spans_from_entities(&native.entities);
            let Some(html) = native_to_markup(&native.text, &spans, directory.as_ref()) else {
                bail!("could not convert entities");
            };
            println!("{html}");
        }
        "from-bot-api" => {
            let receiver = match args.next() {
                Some(raw) => TgUserId(raw.parse().context("receiver id must be an integer")?),
                None => TgUserId(0),
            };
            let msg: teloxide::types::Message =
                serde_json::from_str(&input).context("expected a Bot API message")?;
            let Some(msg) = mxtg_telegram::event::telegram_message(&msg, receiver) else {
                bail!("message has no text or caption");
            };

            let profiles: Arc<dyn ProfileFetcher> = match &cfg.telegram_bot_token {
                Some(token) => Arc::new(TelegramProfiles::new(Bot::new(token))),
                None => Arc::new(Offline),
            };
            let transformer = MessageTransformer::new(
                cfg.clone(),
                directory.clone(),
                directory,
                Arc::new(Offline),
                profiles,
            );
            let out = transformer.telegram_to_matrix(&msg, ReplyKind::Reply).await;
            println!("{}", serde_json::to_string_pretty(&out.into_content())?);
        }
        other => bail!("unknown command {other:?}\n{USAGE}"),
    }

    Ok(())
}
