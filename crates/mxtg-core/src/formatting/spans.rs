//! Formatting spans (Telegram "message entities").

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::{domain::TgUserId, errors::FormatError};

/// What a span does to the text it covers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpanKind {
    Bold,
    Italic,
    Code,
    Pre {
        #[serde(default)]
        language: String,
    },
    /// `@username` mention; the covered text is the handle itself.
    Mention,
    /// Mention of a user without a public username.
    MentionName { user_id: TgUserId },
    Email,
    /// Bare URL; the covered text is the target.
    Url,
    /// Link whose visible text differs from its target.
    TextUrl { url: String },
    BotCommand,
    Hashtag,
    /// Entity type the bridge does not translate (underline, spoiler, ...).
    Unsupported { name: String },
}

/// One span over the text, in UTF-16 code units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    #[serde(flatten)]
    pub kind: SpanKind,
    pub offset: usize,
    pub length: usize,
}

impl Span {
    pub fn new(kind: SpanKind, offset: usize, length: usize) -> Self {
        Self {
            kind,
            offset,
            length,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Ordered collection of spans belonging to one text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanTable {
    spans: Vec<Span>,
}

impl SpanTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, span: Span) {
        self.spans.push(span);
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Span> {
        self.spans.iter()
    }

    pub fn as_slice(&self) -> &[Span] {
        &self.spans
    }

    pub fn into_vec(self) -> Vec<Span> {
        self.spans
    }

    /// Stable sort by offset; for equal offsets the enclosing (longer) span
    /// comes first.
    pub fn sort_by_offset(&mut self) {
        self.spans
            .sort_by_key(|span| (span.offset, Reverse(span.length)));
    }

    /// Shrink spans so none reaches past `text_len`; spans left empty and
    /// starting at or after the end are dropped.
    pub fn clamp_to(&mut self, text_len: usize) {
        for span in &mut self.spans {
            if span.end() > text_len {
                span.length = text_len.saturating_sub(span.offset);
            }
        }
        self.spans
            .retain(|span| span.length > 0 || span.offset < text_len);
    }

    /// Check every span lies inside a text of `text_len` units.
    pub fn validate(&self, text_len: usize) -> Result<(), FormatError> {
        for span in &self.spans {
            if span.end() > text_len {
                return Err(FormatError::SpanOutOfBounds {
                    offset: span.offset,
                    length: span.length,
                    text_len,
                });
            }
        }
        Ok(())
    }
}

impl From<Vec<Span>> for SpanTable {
    fn from(spans: Vec<Span>) -> Self {
        Self { spans }
    }
}

impl FromIterator<Span> for SpanTable {
    fn from_iter<I: IntoIterator<Item = Span>>(iter: I) -> Self {
        Self {
            spans: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for SpanTable {
    type Item = Span;
    type IntoIter = std::vec::IntoIter<Span>;

    fn into_iter(self) -> Self::IntoIter {
        self.spans.into_iter()
    }
}

impl<'a> IntoIterator for &'a SpanTable {
    type Item = &'a Span;
    type IntoIter = std::slice::Iter<'a, Span>;

    fn into_iter(self) -> Self::IntoIter {
        self.spans.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_enclosing_span_first() {
        let mut table = SpanTable::from(vec![
            Span::new(SpanKind::Italic, 2, 3),
            Span::new(SpanKind::Bold, 0, 2),
            Span::new(SpanKind::Code, 2, 8),
        ]);
        table.sort_by_offset();
        let kinds: Vec<_> = table.iter().map(|s| s.kind.clone()).collect();
        assert_eq!(kinds, vec![SpanKind::Bold, SpanKind::Code, SpanKind::Italic]);
    }

    #[test]
    fn clamp_shortens_trailing_span() {
        let mut table = SpanTable::from(vec![
            Span::new(SpanKind::Bold, 0, 6),
            Span::new(SpanKind::Italic, 5, 1),
        ]);
        table.clamp_to(5);
        assert_eq!(table.as_slice(), &[Span::new(SpanKind::Bold, 0, 5)]);
        assert!(table.validate(5).is_ok());
    }

    #[test]
    fn validate_reports_overflow() {
        let table = SpanTable::from(vec![Span::new(SpanKind::Bold, 3, 4)]);
        assert_eq!(
            table.validate(5),
            Err(FormatError::SpanOutOfBounds {
                offset: 3,
                length: 4,
                text_len: 5
            })
        );
    }

    #[test]
    fn serializes_kind_attributes_flat() {
        let table = SpanTable::from(vec![
            Span::new(SpanKind::Bold, 0, 5),
            Span::new(
                SpanKind::TextUrl {
                    url: "https://example.com".to_string(),
                },
                6,
                4,
            ),
            Span::new(
                SpanKind::MentionName {
                    user_id: TgUserId(42),
                },
                11,
                3,
            ),
        ]);
        let v = serde_json::to_value(&table).unwrap();
        assert_eq!(
            v,
            json!([
                {"type": "bold", "offset": 0, "length": 5},
                {"type": "text_url", "url": "https://example.com", "offset": 6, "length": 4},
                {"type": "mention_name", "user_id": 42, "offset": 11, "length": 3},
            ])
        );
        let back: SpanTable = serde_json::from_value(v).unwrap();
        assert_eq!(back, table);
    }
}
