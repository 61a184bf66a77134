//! Matrix HTML → Telegram text + entities.
//!
//! `html5ever`'s tokenizer feeds a single pass with an explicit stack of open
//! tags. At most one span per kind is under construction at a time; the frame
//! that started it finalizes it when it is popped.

use std::{collections::BTreeMap, sync::OnceLock};

use html5ever::{
    tendril::StrTendril,
    tokenizer::{
        BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
    },
};
use regex::Regex;

use crate::{
    domain::UserMxid,
    errors::FormatError,
    formatting::{
        offsets::utf16_len,
        spans::{Span, SpanKind, SpanTable},
    },
    ports::IdentityResolver,
};

/// Largest `<ol start>` honoured; bigger values restart at 1.
const MAX_LIST_START: usize = u32::MAX as usize;

/// Convert Matrix HTML into Telegram text and entities.
///
/// Returns `None` when the conversion fails; the caller should then send the
/// plain `body` without formatting.
pub fn markup_to_native(
    html: &str,
    resolver: &dyn IdentityResolver,
) -> Option<(String, SpanTable)> {
    match MatrixParser::new(resolver).parse(html) {
        Ok(out) => Some(out),
        Err(e) => {
            tracing::error!(error = %e, html, "failed to convert matrix format");
            None
        }
    }
}

fn mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https://matrix\.to/#/(@[^/?#]+)").expect("valid regex"))
}

/// Span kinds that can be in flight; tags mapping to the same kind share a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SpanKey {
    Bold,
    Italic,
    Code,
    Pre,
    Link,
}

impl SpanKey {
    fn of(kind: &SpanKind) -> Self {
        match kind {
            SpanKind::Bold => Self::Bold,
            SpanKind::Italic => Self::Italic,
            SpanKind::Code => Self::Code,
            SpanKind::Pre { .. } => Self::Pre,
            _ => Self::Link,
        }
    }
}

#[derive(Debug)]
enum AnchorMeta {
    /// No usable target; the text passes through unchanged.
    Inert,
    /// Visible text is replaced (once) by this string: `@handle` or an email
    /// address.
    Replace(Option<String>),
    /// Mention of a user without a public handle; text kept as is.
    MentionById,
    /// Ordinary link. The visible text decides between Url and TextUrl.
    Link { href: String, visible: String },
}

#[derive(Debug)]
enum FrameMeta {
    None,
    List { ordered: bool, counter: usize },
    ListItem { prefixed: bool },
    Anchor(AnchorMeta),
}

#[derive(Debug)]
struct Frame {
    tag: String,
    starts: Option<SpanKey>,
    meta: FrameMeta,
}

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "source" | "track" | "wbr"
    )
}

/// Value of attribute `key`; the tokenizer lowercases names.
fn attr<'t>(attrs: &'t [(String, String)], key: &str) -> Option<&'t str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// `language-X` from a `class` attribute, if any.
fn code_language(attrs: &[(String, String)]) -> Option<String> {
    attr(attrs, "class")?
        .split_whitespace()
        .find_map(|class| class.strip_prefix("language-"))
        .filter(|lang| !lang.is_empty())
        .map(str::to_string)
}

pub struct MatrixParser<'r> {
    resolver: &'r dyn IdentityResolver,
    text: String,
    text_units: usize,
    spans: SpanTable,
    building: BTreeMap<SpanKey, Span>,
    frames: Vec<Frame>,
    previous_ended_line: bool,
}

impl<'r> MatrixParser<'r> {
    pub fn new(resolver: &'r dyn IdentityResolver) -> Self {
        Self {
            resolver,
            text: String::new(),
            text_units: 0,
            spans: SpanTable::new(),
            building: BTreeMap::new(),
            frames: Vec::new(),
            previous_ended_line: true,
        }
    }

    pub fn parse(self, html: &str) -> Result<(String, SpanTable), FormatError> {
        let mut input = BufferQueue::new();
        input.push_back(StrTendril::from_slice(html));

        let mut tokenizer = Tokenizer::new(self, TokenizerOpts::default());
        let _ = tokenizer.feed(&mut input);
        tokenizer.end();
        tokenizer.sink.finish()
    }

    fn finish(mut self) -> Result<(String, SpanTable), FormatError> {
        // Implicitly close whatever is still open.
        while let Some(frame) = self.frames.pop() {
            self.close_frame(frame);
        }

        self.spans.sort_by_offset();
        self.spans.validate(self.text_units)?;
        Ok((self.text, self.spans))
    }

    fn handle_tag(&mut self, tag: Tag) {
        let name = tag.name.to_string();
        match tag.kind {
            TagKind::StartTag => {
                let attrs: Vec<(String, String)> = tag
                    .attrs
                    .into_iter()
                    .map(|a| (a.name.local.to_string(), a.value.to_string()))
                    .collect();
                self.start_tag(name, &attrs, tag.self_closing);
            }
            TagKind::EndTag => self.end_tag(&name),
        }
    }

    fn start_tag(&mut self, name: String, attrs: &[(String, String)], self_closing: bool) {
        if name == "br" {
            self.emit("", "\n");
            return;
        }
        if is_void(&name) {
            return;
        }

        let mut kind = None;
        let mut meta = FrameMeta::None;
        match name.as_str() {
            "strong" | "b" => kind = Some(SpanKind::Bold),
            "em" | "i" => kind = Some(SpanKind::Italic),
            "code" => match self.building.get_mut(&SpanKey::Pre) {
                Some(pre) => {
                    if let (SpanKind::Pre { language }, Some(lang)) =
                        (&mut pre.kind, code_language(attrs))
                    {
                        *language = lang;
                    }
                }
                None => kind = Some(SpanKind::Code),
            },
            "pre" => {
                kind = Some(SpanKind::Pre {
                    language: String::new(),
                })
            }
            "a" => {
                let (anchor_kind, anchor) = self.resolve_anchor(attr(attrs, "href"));
                kind = anchor_kind;
                meta = FrameMeta::Anchor(anchor);
            }
            "ul" => {
                meta = FrameMeta::List {
                    ordered: false,
                    counter: 0,
                }
            }
            "ol" => {
                let start = attr(attrs, "start")
                    .and_then(|s| s.trim().parse::<usize>().ok())
                    .filter(|n| *n <= MAX_LIST_START)
                    .unwrap_or(1);
                meta = FrameMeta::List {
                    ordered: true,
                    counter: start.saturating_sub(1),
                }
            }
            "li" => {
                if !self.text.is_empty() && !self.text.ends_with('\n') {
                    self.emit("", "\n");
                }
                meta = FrameMeta::ListItem { prefixed: false };
            }
            _ => {}
        }

        let mut starts = None;
        if let Some(kind) = kind {
            let key = SpanKey::of(&kind);
            if !self.building.contains_key(&key) {
                self.building
                    .insert(key, Span::new(kind, self.text_units, 0));
                starts = Some(key);
            }
        }

        self.frames.push(Frame {
            tag: name.clone(),
            starts,
            meta,
        });

        if self_closing {
            self.end_tag(&name);
        }
    }

    fn resolve_anchor(&self, href: Option<&str>) -> (Option<SpanKind>, AnchorMeta) {
        let Some(href) = href else {
            return (None, AnchorMeta::Inert);
        };

        if let Some(caps) = mention_regex().captures(href) {
            let mxid = UserMxid(caps[1].to_string());
            let Some(identity) = self.resolver.by_profile_link(&mxid) else {
                tracing::debug!(%mxid, "mention target has no telegram identity");
                return (None, AnchorMeta::Inert);
            };
            if let Some(username) = identity.username.filter(|u| !u.is_empty()) {
                return (
                    Some(SpanKind::Mention),
                    AnchorMeta::Replace(Some(format!("@{username}"))),
                );
            }
            return match identity.telegram_id {
                Some(user_id) => (
                    Some(SpanKind::MentionName { user_id }),
                    AnchorMeta::MentionById,
                ),
                None => (None, AnchorMeta::Inert),
            };
        }

        if let Some(address) = href.strip_prefix("mailto:") {
            return (
                Some(SpanKind::Email),
                AnchorMeta::Replace(Some(address.to_string())),
            );
        }

        (
            Some(SpanKind::TextUrl {
                url: href.to_string(),
            }),
            AnchorMeta::Link {
                href: href.to_string(),
                visible: String::new(),
            },
        )
    }

    fn end_tag(&mut self, name: &str) {
        let Some(idx) = self.frames.iter().rposition(|f| f.tag == name) else {
            tracing::debug!(tag = name, "ignoring unmatched end tag");
            return;
        };
        while self.frames.len() > idx {
            if let Some(frame) = self.frames.pop() {
                self.close_frame(frame);
            }
        }
    }

    fn close_frame(&mut self, frame: Frame) {
        if let FrameMeta::Anchor(AnchorMeta::Replace(Some(pending))) = &frame.meta {
            // Anchor had no text of its own; still emit the replacement.
            self.emit("", pending);
        }

        if matches!(frame.tag.as_str(), "ul" | "ol") && self.text.ends_with('\n') {
            self.trim_trailing_newline();
        }

        let Some(key) = frame.starts else {
            return;
        };
        let Some(mut span) = self.building.remove(&key) else {
            return;
        };

        let shows_target = matches!(
            (&span.kind, &frame.meta),
            (SpanKind::TextUrl { url }, FrameMeta::Anchor(AnchorMeta::Link { visible, .. }))
                if url == visible
        );
        if shows_target {
            span.kind = SpanKind::Url;
        }

        if span.length > 0 {
            self.spans.push(span);
        }
    }

    fn nearest_anchor_mut(&mut self) -> Option<&mut AnchorMeta> {
        self.frames.iter_mut().rev().find_map(|f| match &mut f.meta {
            FrameMeta::Anchor(anchor) => Some(anchor),
            _ => None,
        })
    }

    fn handle_text(&mut self, mut text: String) {
        match self.nearest_anchor_mut() {
            Some(AnchorMeta::Replace(slot)) => text = slot.take().unwrap_or_default(),
            Some(AnchorMeta::Link { visible, .. }) => visible.push_str(&text),
            Some(AnchorMeta::Inert | AnchorMeta::MentionById) | None => {}
        }
        if text.is_empty() {
            return;
        }

        let Some(li) = self.pending_list_item() else {
            self.emit("", &text);
            return;
        };

        let body = text.trim_matches('\n');
        if body.is_empty() {
            return;
        }
        let prefix = self.take_list_prefix(li);
        self.emit(&prefix, body);
    }

    fn list_depth(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| matches!(f.meta, FrameMeta::List { .. }))
            .count()
    }

    /// Index of the list item whose first content is about to be emitted.
    fn pending_list_item(&self) -> Option<usize> {
        if !self.previous_ended_line {
            return None;
        }
        let li = self.frames.iter().rposition(|f| f.tag == "li")?;
        let parent = self.frames.get(li.checked_sub(1)?)?;
        match (&self.frames[li].meta, &parent.meta) {
            (FrameMeta::ListItem { prefixed: false }, FrameMeta::List { .. }) => Some(li),
            _ => None,
        }
    }

    /// Mark list item `li` as started and build its `* ` / `n. ` prefix.
    fn take_list_prefix(&mut self, li: usize) -> String {
        let indent = " ".repeat(4 * self.list_depth().saturating_sub(1));
        let (lists, items) = self.frames.split_at_mut(li);
        if let FrameMeta::ListItem { prefixed } = &mut items[0].meta {
            *prefixed = true;
        }
        match lists.last_mut().map(|f| &mut f.meta) {
            Some(FrameMeta::List {
                ordered: true,
                counter,
            }) => {
                *counter = counter.saturating_add(1);
                format!("{indent}{counter}. ")
            }
            _ => format!("{indent}* "),
        }
    }

    /// Append `prefix + body` to the output and account for it in every open span.
    fn emit(&mut self, prefix: &str, body: &str) {
        let insertion = self.text_units;
        let prefix_units = utf16_len(prefix);
        let body_units = utf16_len(body);

        if prefix_units > 0 {
            self.shift_open_spans(insertion, prefix_units);
        }
        for span in self.building.values_mut() {
            span.length += body_units;
        }

        self.text.push_str(prefix);
        self.text.push_str(body);
        self.text_units += prefix_units + body_units;
        self.previous_ended_line = body.ends_with('\n');
    }

    /// `units` of generated text were inserted at `at`.
    ///
    /// Spans starting exactly there move past the insertion; spans that
    /// started earlier now also cover it.
    fn shift_open_spans(&mut self, at: usize, units: usize) {
        for span in self.building.values_mut() {
            if span.offset == at {
                span.offset += units;
            } else {
                span.length += units;
            }
        }
    }

    fn trim_trailing_newline(&mut self) {
        if self.text.pop().is_none() {
            return;
        }
        self.text_units -= 1;
        let len = self.text_units;
        for span in self.building.values_mut() {
            span.offset = span.offset.min(len);
            if span.end() > len {
                span.length = len - span.offset;
            }
        }
        self.spans.clamp_to(len);
    }
}

impl TokenSink for MatrixParser<'_> {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => self.handle_tag(tag),
            Token::CharacterTokens(text) => self.handle_text(text.to_string()),
            Token::ParseError(e) => tracing::trace!(error = %e, "lenient html parse"),
            _ => {}
        }
        TokenSinkResult::Continue
    }
}
