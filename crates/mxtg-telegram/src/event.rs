//! Incoming Bot API messages -> core `TelegramMessage`.

use teloxide::types::{Chat, Message, User};

use mxtg_core::{
    domain::{ForwardOrigin, SpaceId, TelegramMessage, TgMessageId, TgUserId},
    formatting::SpanTable,
};

use crate::entities::spans_from_entities;

/// Reduce a Bot API message to text, entities and reply/forward metadata.
///
/// `receiver` is the account the bridge received the message with; it names
/// the message-id space for chats that do not have their own. Returns `None`
/// for messages without text or caption.
pub fn telegram_message(msg: &Message, receiver: TgUserId) -> Option<TelegramMessage> {
    let (text, entities) = match (msg.text(), msg.caption()) {
        (Some(text), _) => (text, msg.entities()),
        (None, Some(caption)) => (caption, msg.caption_entities()),
        (None, None) => return None,
    };

    let post_author = if msg.chat.is_channel() {
        msg.author_signature().map(str::to_string)
    } else {
        None
    };

    Some(TelegramMessage {
        id: TgMessageId(msg.id.0),
        space: message_space(&msg.chat, receiver),
        text: text.to_string(),
        entities: entities.map(spans_from_entities).unwrap_or_else(SpanTable::new),
        forward_from: forward_origin(msg),
        reply_to: msg.reply_to_message().map(|m| TgMessageId(m.id.0)),
        post_author,
    })
}

/// Channels and supergroups number messages per chat.
pub fn message_space(chat: &Chat, receiver: TgUserId) -> SpaceId {
    if chat.is_channel() || chat.is_supergroup() {
        SpaceId(chat.id.0)
    } else {
        SpaceId(receiver.0)
    }
}

fn forward_origin(msg: &Message) -> Option<ForwardOrigin> {
    if let Some(user) = msg.forward_from_user() {
        return Some(ForwardOrigin::User(user_id(user)));
    }
    if let Some(name) = msg.forward_from_sender_name() {
        return Some(ForwardOrigin::HiddenUser(name.to_string()));
    }
    msg.forward_from_chat().map(|chat| {
        ForwardOrigin::Channel(chat.title().unwrap_or_default().to_string())
    })
}

pub fn user_id(user: &User) -> TgUserId {
    TgUserId(user.id.0 as i64)
}
