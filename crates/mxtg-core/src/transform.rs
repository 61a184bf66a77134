//! Message-level conversion: forwards, replies and channel-post signatures on
//! top of the entity/HTML converters.

use std::sync::Arc;

use crate::{
    config::Config,
    domain::{
        ConversionResult, ForwardOrigin, InReplyTo, MatrixContent, MessageLocation,
        OutgoingTelegram, RelatesTo, ReplyKind, RoomId, SpaceId, TelegramMessage, TgMessageId,
    },
    errors::Error,
    formatting::{
        escape_html, markup_to_native, native_to_markup, render::mention_link, SpanTable,
        MATRIX_TO_PREFIX,
    },
    ports::{CrossNetworkMessageIndex, IdentityResolver, ProfileFetcher, RemoteEventFetcher},
    Result,
};

const UNKNOWN_USER: &str = "Unknown user";

#[derive(Clone)]
pub struct MessageTransformer {
    cfg: Arc<Config>,
    identities: Arc<dyn IdentityResolver>,
    messages: Arc<dyn CrossNetworkMessageIndex>,
    events: Arc<dyn RemoteEventFetcher>,
    profiles: Arc<dyn ProfileFetcher>,
}

impl MessageTransformer {
    pub fn new(
        cfg: Arc<Config>,
        identities: Arc<dyn IdentityResolver>,
        messages: Arc<dyn CrossNetworkMessageIndex>,
        events: Arc<dyn RemoteEventFetcher>,
        profiles: Arc<dyn ProfileFetcher>,
    ) -> Self {
        Self {
            cfg,
            identities,
            messages,
            events,
            profiles,
        }
    }

    /// Convert a Telegram message into Matrix body, HTML and reply relation.
    ///
    /// Never fails: unresolvable parts degrade to plain text or fallback
    /// strings.
    pub async fn telegram_to_matrix(
        &self,
        msg: &TelegramMessage,
        kind: ReplyKind,
    ) -> ConversionResult {
        let mut text = msg.text.clone();
        let mut html = if msg.entities.is_empty() {
            None
        } else {
            native_to_markup(&msg.text, &msg.entities, self.identities.as_ref())
        };
        let mut relates_to = RelatesTo::default();

        if let Some(origin) = &msg.forward_from {
            let body = html.take().unwrap_or_else(|| escape_html(&text));
            let author = self.forward_author(origin).await;
            html = Some(format!(
                "Forwarded message from <b>{author}</b><br/><blockquote>{body}</blockquote>"
            ));
        }

        if let Some(reply_to) = msg.reply_to {
            match self.messages.lookup(reply_to, msg.space) {
                Some(location) if self.cfg.native_replies => {
                    relates_to.in_reply_to = Some(InReplyTo {
                        event_id: location.event_id.clone(),
                        room_id: Some(location.room_id.clone()),
                    });
                    if kind == ReplyKind::Edit {
                        let body = html.take().unwrap_or_else(|| escape_html(&text));
                        html = Some(format!(
                            "<u>{}:</u> {body}",
                            escape_html(self.cfg.reply_label(kind))
                        ));
                    }
                }
                Some(location) => {
                    let quote = self.reply_quote(&location, kind).await;
                    let body = html.take().unwrap_or_else(|| escape_html(&text));
                    html = Some(quote + &body);
                }
                None => {
                    tracing::debug!(
                        reply_to = reply_to.0,
                        space = msg.space.0,
                        "reply target was never bridged"
                    );
                }
            }
        }

        if let Some(author) = &msg.post_author {
            let body = html.take().unwrap_or_else(|| escape_html(&text));
            text.push_str("\n- ");
            text.push_str(author);
            html = Some(format!(
                "{body}<br/><i>- <u>{}</u></i>",
                escape_html(author)
            ));
        }

        ConversionResult {
            body: text,
            formatted_body: html.map(|h| h.replace('\n', "<br/>")),
            relates_to,
        }
    }

    /// Reply relation for a Telegram message, regardless of reply mode.
    pub fn telegram_reply_relation(&self, msg: &TelegramMessage) -> RelatesTo {
        let in_reply_to = msg
            .reply_to
            .and_then(|id| self.messages.lookup(id, msg.space))
            .map(|location| InReplyTo {
                event_id: location.event_id,
                room_id: Some(location.room_id),
            });
        RelatesTo { in_reply_to }
    }

    /// Telegram message a Matrix reply points at, if it was bridged into
    /// `space`. `room_id` defaults to the room named in the relation.
    pub fn matrix_reply_to_telegram(
        &self,
        content: &MatrixContent,
        space: SpaceId,
        room_id: Option<&RoomId>,
    ) -> Option<TgMessageId> {
        let reply = content.relates_to.as_ref()?.in_reply_to.as_ref()?;
        let room_id = room_id.or(reply.room_id.as_ref())?;
        self.messages
            .lookup_matrix(&reply.event_id, space, room_id)
            .map(|location| location.telegram_id)
    }

    /// Convert a Matrix message for Telegram, falling back to the plain body
    /// when the HTML cannot be converted.
    pub fn matrix_to_telegram(
        &self,
        content: &MatrixContent,
        space: SpaceId,
        room_id: &RoomId,
    ) -> OutgoingTelegram {
        let reply_to = self.matrix_reply_to_telegram(content, space, Some(room_id));
        let (text, entities) = content
            .html()
            .and_then(|html| markup_to_native(html, self.identities.as_ref()))
            .unwrap_or_else(|| (content.body.clone(), SpanTable::new()));
        OutgoingTelegram {
            text,
            entities,
            reply_to,
        }
    }

    async fn forward_author(&self, origin: &ForwardOrigin) -> String {
        let id = match origin {
            ForwardOrigin::User(id) => *id,
            ForwardOrigin::HiddenUser(name) | ForwardOrigin::Channel(name) => {
                return escape_html(name)
            }
        };

        if let Some(identity) = self.identities.by_native_user_id(id) {
            match (&identity.matrix_id, &identity.display_name) {
                (Some(mxid), name) => {
                    let name = name.as_deref().unwrap_or(&mxid.0);
                    return mention_link(mxid, &escape_html(name));
                }
                (None, Some(name)) => return escape_html(name),
                (None, None) => {}
            }
        }

        match self.profiles.fetch_display_name(id).await {
            Ok(Some(name)) => escape_html(&name),
            Ok(None) => UNKNOWN_USER.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, user_id = id.0, "failed to fetch forward author");
                UNKNOWN_USER.to_string()
            }
        }
    }

    async fn reply_quote(&self, location: &MessageLocation, kind: ReplyKind) -> String {
        let label = escape_html(self.cfg.reply_label(kind));
        match self.fetch_quote(location).await {
            Ok((sender_html, body)) => {
                let head = if self.cfg.message_link_in_reply {
                    format!(
                        "<a href=\"{MATRIX_TO_PREFIX}{}/{}\">{label}</a>",
                        escape_html(&location.room_id.0),
                        escape_html(&location.event_id.0)
                    )
                } else {
                    label
                };
                format!("{head} to {sender_html}<blockquote>{body}</blockquote>")
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    event_id = %location.event_id,
                    room_id = %location.room_id,
                    "failed to fetch quoted message"
                );
                format!("{label} to unknown user <em>(Failed to fetch message)</em>:<br/>")
            }
        }
    }

    /// Sender pill and body HTML of the quoted event.
    async fn fetch_quote(&self, location: &MessageLocation) -> Result<(String, String)> {
        let event = self.events.fetch_event(location).await?;
        let body = match event.content.html() {
            Some(html) => html.to_string(),
            None if !event.content.body.is_empty() => escape_html(&event.content.body),
            None => {
                return Err(Error::External(format!(
                    "quoted event {} has no body",
                    location.event_id
                )))
            }
        };

        let name = self
            .identities
            .by_profile_link(&event.sender)
            .and_then(|identity| identity.display_name)
            .unwrap_or_else(|| event.sender.0.clone());
        Ok((mention_link(&event.sender, &escape_html(&name)), body))
    }
}
