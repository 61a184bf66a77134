//! Bot API `MessageEntity` <-> core `Span`.

use reqwest::Url;
use teloxide::types::{MessageEntity, MessageEntityKind};

use mxtg_core::{
    domain::TgUserId,
    formatting::{Span, SpanKind, SpanTable},
};

pub fn spans_from_entities(entities: &[MessageEntity]) -> SpanTable {
    entities.iter().map(span_from_entity).collect()
}

pub fn span_from_entity(entity: &MessageEntity) -> Span {
    let kind = match &entity.kind {
        MessageEntityKind::Bold => SpanKind::Bold,
        MessageEntityKind::Italic => SpanKind::Italic,
        MessageEntityKind::Code => SpanKind::Code,
        MessageEntityKind::Pre { language } => SpanKind::Pre {
            language: language.clone().unwrap_or_default(),
        },
        MessageEntityKind::Mention => SpanKind::Mention,
        MessageEntityKind::TextMention { user } => SpanKind::MentionName {
            user_id: TgUserId(user.id.0 as i64),
        },
        MessageEntityKind::Email => SpanKind::Email,
        MessageEntityKind::Url => SpanKind::Url,
        MessageEntityKind::TextLink { url } => SpanKind::TextUrl {
            url: url.to_string(),
        },
        MessageEntityKind::BotCommand => SpanKind::BotCommand,
        MessageEntityKind::Hashtag => SpanKind::Hashtag,
        other => SpanKind::Unsupported {
            name: unsupported_name(other).to_string(),
        },
    };
    Span::new(kind, entity.offset, entity.length)
}

fn unsupported_name(kind: &MessageEntityKind) -> &'static str {
    match kind {
        MessageEntityKind::Cashtag => "cashtag",
        MessageEntityKind::PhoneNumber => "phone_number",
        MessageEntityKind::Underline => "underline",
        MessageEntityKind::Strikethrough => "strikethrough",
        MessageEntityKind::Spoiler => "spoiler",
        MessageEntityKind::CustomEmoji { .. } => "custom_emoji",
        _ => "unknown",
    }
}

/// Entities for sending. Unsupported spans and links that do not parse are
/// dropped.
pub fn entities_from_spans(spans: &SpanTable) -> Vec<MessageEntity> {
    spans.iter().filter_map(entity_from_span).collect()
}

pub fn entity_from_span(span: &Span) -> Option<MessageEntity> {
    let kind = match &span.kind {
        SpanKind::Bold => MessageEntityKind::Bold,
        SpanKind::Italic => MessageEntityKind::Italic,
        SpanKind::Code => MessageEntityKind::Code,
        SpanKind::Pre { language } => MessageEntityKind::Pre {
            language: (!language.is_empty()).then(|| language.clone()),
        },
        SpanKind::Mention => MessageEntityKind::Mention,
        // Sending a text mention needs a full `User`; a user link is equivalent.
        SpanKind::MentionName { user_id } => MessageEntityKind::TextLink {
            url: parse_url(&format!("tg://user?id={}", user_id.0))?,
        },
        SpanKind::Email => MessageEntityKind::Email,
        SpanKind::Url => MessageEntityKind::Url,
        SpanKind::TextUrl { url } => MessageEntityKind::TextLink {
            url: parse_url(url)?,
        },
        SpanKind::BotCommand => MessageEntityKind::BotCommand,
        SpanKind::Hashtag => MessageEntityKind::Hashtag,
        SpanKind::Unsupported { .. } => return None,
    };
    Some(MessageEntity::new(kind, span.offset, span.length))
}

fn parse_url(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::debug!(error = %e, url = raw, "dropping link entity");
            None
        }
    }
}
