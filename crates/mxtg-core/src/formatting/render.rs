//! Telegram text + entities → Matrix HTML.

use crate::{
    domain::UserMxid,
    errors::FormatError,
    formatting::{
        escape_html,
        offsets::Utf16Text,
        spans::{Span, SpanKind, SpanTable},
        MATRIX_TO_PREFIX,
    },
    ports::IdentityResolver,
};

const KNOWN_SCHEMES: [&str; 4] = ["https://", "http://", "ftp://", "magnet:"];

/// Render Telegram text and entities as Matrix HTML.
///
/// Entities are walked in the order given. One that starts before the end of
/// an already rendered entity is dropped; one that cannot be resolved, starts
/// past the text or cuts a surrogate pair leaves its text to be emitted as
/// plain text. Entities running past the end are clamped to the text.
pub fn native_to_markup(
    text: &str,
    spans: &SpanTable,
    resolver: &dyn IdentityResolver,
) -> Option<String> {
    match render(text, spans, resolver) {
        Ok(html) => Some(html),
        Err(e) => {
            tracing::error!(error = %e, text, ?spans, "failed to convert telegram format");
            None
        }
    }
}

fn render(
    text: &str,
    spans: &SpanTable,
    resolver: &dyn IdentityResolver,
) -> Result<String, FormatError> {
    let encoded = Utf16Text::new(text);
    let mut html = String::with_capacity(text.len());
    let mut cursor = 0usize;

    for span in spans {
        if span.offset < cursor {
            tracing::debug!(?span, cursor, "dropping overlapping entity");
            continue;
        }
        if span.offset >= encoded.len() {
            tracing::debug!(?span, text_len = encoded.len(), "entity starts past the text");
            continue;
        }

        // Entities running past the end cover the rest of the text.
        let length = span.length.min(encoded.len() - span.offset);
        let raw = match encoded.slice(span.offset, length) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(?span, error = %e, "skipping invalid entity");
                continue;
            }
        };

        if span.offset > cursor {
            html.push_str(&escape_html(
                &encoded.slice(cursor, span.offset - cursor)?,
            ));
            cursor = span.offset;
        }

        match render_span(span, &raw, resolver) {
            Some(fragment) => {
                html.push_str(&fragment);
                cursor = span.offset + length;
            }
            None => {
                tracing::debug!(?span, "entity left unformatted");
            }
        }
    }

    html.push_str(&escape_html(&encoded.slice_from(cursor)?));
    Ok(html)
}

/// Markup for one entity, or `None` if it cannot be represented.
fn render_span(span: &Span, raw: &str, resolver: &dyn IdentityResolver) -> Option<String> {
    let content = escape_html(raw);
    let html = match &span.kind {
        SpanKind::Bold => format!("<strong>{content}</strong>"),
        SpanKind::Italic => format!("<em>{content}</em>"),
        SpanKind::Code => format!("<code>{content}</code>"),
        SpanKind::Pre { language } if language.is_empty() => {
            format!("<pre><code>{content}</code></pre>")
        }
        SpanKind::Pre { language } => format!(
            "<pre><code class=\"language-{}\">{content}</code></pre>",
            escape_html(language)
        ),
        SpanKind::Mention => {
            let handle = raw.strip_prefix('@').unwrap_or(raw);
            let mxid = resolver.by_handle(handle)?.matrix_id?;
            mention_link(&mxid, &content)
        }
        SpanKind::MentionName { user_id } => {
            let mxid = resolver.by_native_user_id(*user_id)?.matrix_id?;
            mention_link(&mxid, &content)
        }
        SpanKind::Email => format!("<a href=\"mailto:{content}\">{content}</a>"),
        SpanKind::Url => link(raw, &content),
        SpanKind::TextUrl { url } => link(url, &content),
        SpanKind::BotCommand => {
            let command = raw.strip_prefix('/').unwrap_or(raw);
            format!("<font color=\"blue\">!{}</font>", escape_html(command))
        }
        SpanKind::Hashtag => format!("<font color=\"blue\">{content}</font>"),
        SpanKind::Unsupported { .. } => return None,
    };
    Some(html)
}

/// `matrix.to` pill for a Matrix user.
pub fn mention_link(mxid: &UserMxid, content_html: &str) -> String {
    format!(
        "<a href=\"{MATRIX_TO_PREFIX}{}\">{content_html}</a>",
        escape_html(&mxid.0)
    )
}

fn link(target: &str, content_html: &str) -> String {
    let href = if KNOWN_SCHEMES.iter().any(|s| target.starts_with(s)) {
        target.to_string()
    } else {
        format!("http://{target}")
    };
    format!("<a href=\"{}\">{content_html}</a>", escape_html(&href))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Identity, TgUserId};

    struct Resolver;

    impl IdentityResolver for Resolver {
        fn by_profile_link(&self, _mxid: &UserMxid) -> Option<Identity> {
            None
        }

        fn by_handle(&self, handle: &str) -> Option<Identity> {
            (handle == "alice_tg").then(|| Identity {
                matrix_id: Some(UserMxid("@alice:example.org".to_string())),
                username: Some(handle.to_string()),
                ..Default::default()
            })
        }

        fn by_native_user_id(&self, id: TgUserId) -> Option<Identity> {
            (id == TgUserId(7)).then(|| Identity {
                matrix_id: Some(UserMxid("@seven:example.org".to_string())),
                telegram_id: Some(id),
                ..Default::default()
            })
        }
    }

    fn render(text: &str, spans: Vec<Span>) -> String {
        native_to_markup(text, &SpanTable::from(spans), &Resolver).expect("render")
    }

    #[test]
    fn plain_text_is_escaped_once() {
        assert_eq!(render("a < b & c &amp;", vec![]), "a &lt; b &amp; c &amp;amp;");
    }

    #[test]
    fn renders_basic_styles() {
        let html = render(
            "bold italic code",
            vec![
                Span::new(SpanKind::Bold, 0, 4),
                Span::new(SpanKind::Italic, 5, 6),
                Span::new(SpanKind::Code, 12, 4),
            ],
        );
        assert_eq!(
            html,
            "<strong>bold</strong> <em>italic</em> <code>code</code>"
        );
    }

    #[test]
    fn renders_pre_with_and_without_language() {
        let html = render(
            "x<y",
            vec![Span::new(
                SpanKind::Pre {
                    language: "rust".to_string(),
                },
                0,
                3,
            )],
        );
        assert_eq!(
            html,
            "<pre><code class=\"language-rust\">x&lt;y</code></pre>"
        );

        let html = render(
            "abc",
            vec![Span::new(
                SpanKind::Pre {
                    language: String::new(),
                },
                0,
                3,
            )],
        );
        assert_eq!(html, "<pre><code>abc</code></pre>");
    }

    #[test]
    fn overlapping_span_is_dropped() {
        let html = render(
            "HELLO WORLD",
            vec![
                Span::new(SpanKind::Bold, 0, 5),
                Span::new(SpanKind::Italic, 3, 4),
            ],
        );
        assert_eq!(html, "<strong>HELLO</strong> WORLD");
    }

    #[test]
    fn offsets_are_utf16_units() {
        let html = render("😀 hi there", vec![Span::new(SpanKind::Bold, 3, 2)]);
        assert_eq!(html, "😀 <strong>hi</strong> there");
    }

    #[test]
    fn resolves_mentions() {
        let html = render(
            "@alice_tg and Seven",
            vec![
                Span::new(SpanKind::Mention, 0, 9),
                Span::new(
                    SpanKind::MentionName {
                        user_id: TgUserId(7),
                    },
                    14,
                    5,
                ),
            ],
        );
        assert_eq!(
            html,
            "<a href=\"https://matrix.to/#/@alice:example.org\">@alice_tg</a> and \
             <a href=\"https://matrix.to/#/@seven:example.org\">Seven</a>"
        );
    }

    #[test]
    fn unresolved_mention_degrades_and_keeps_later_offsets() {
        let html = render(
            "Who <b> 😀 yes",
            vec![
                Span::new(
                    SpanKind::MentionName {
                        user_id: TgUserId(99),
                    },
                    0,
                    3,
                ),
                Span::new(SpanKind::Bold, 11, 3),
            ],
        );
        assert_eq!(html, "Who &lt;b&gt; 😀 <strong>yes</strong>");
    }

    #[test]
    fn unknown_handle_degrades() {
        let html = render("@nobody", vec![Span::new(SpanKind::Mention, 0, 7)]);
        assert_eq!(html, "@nobody");
    }

    #[test]
    fn links_get_scheme_when_missing() {
        let html = render(
            "example.com and site",
            vec![
                Span::new(SpanKind::Url, 0, 11),
                Span::new(
                    SpanKind::TextUrl {
                        url: "https://x.y/?a=1&b=2".to_string(),
                    },
                    16,
                    4,
                ),
            ],
        );
        assert_eq!(
            html,
            "<a href=\"http://example.com\">example.com</a> and \
             <a href=\"https://x.y/?a=1&amp;b=2\">site</a>"
        );
    }

    #[test]
    fn email_command_and_hashtag() {
        let html = render(
            "me@x.org /start #rust",
            vec![
                Span::new(SpanKind::Email, 0, 8),
                Span::new(SpanKind::BotCommand, 9, 6),
                Span::new(SpanKind::Hashtag, 16, 5),
            ],
        );
        assert_eq!(
            html,
            "<a href=\"mailto:me@x.org\">me@x.org</a> \
             <font color=\"blue\">!start</font> <font color=\"blue\">#rust</font>"
        );
    }

    #[test]
    fn unsupported_kind_renders_as_text() {
        let html = render(
            "under",
            vec![Span::new(
                SpanKind::Unsupported {
                    name: "underline".to_string(),
                },
                0,
                5,
            )],
        );
        assert_eq!(html, "under");
    }

    #[test]
    fn overlong_span_is_clamped_without_losing_others() {
        let html = render(
            "HELLO world",
            vec![
                Span::new(SpanKind::Bold, 0, 5),
                Span::new(SpanKind::Italic, 6, 50),
            ],
        );
        assert_eq!(html, "<strong>HELLO</strong> <em>world</em>");
    }

    #[test]
    fn invalid_spans_are_skipped() {
        let html = render(
            "😀 a<b",
            vec![
                Span::new(SpanKind::Bold, 1, 2),
                Span::new(SpanKind::Code, 3, 1),
                Span::new(SpanKind::Italic, 40, 2),
                Span::new(SpanKind::Bold, 0, usize::MAX),
            ],
        );
        assert_eq!(html, "😀 <code>a</code>&lt;b");
    }
}
