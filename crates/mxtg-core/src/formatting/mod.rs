//! Rich-text conversion between Matrix HTML and Telegram entities.
//!
//! Telegram formatting is plain text plus entities measured in UTF-16 code
//! units; Matrix formatting is a small HTML subset. Both directions share the
//! unit accounting in [`offsets`].

pub mod html;
pub mod offsets;
pub mod render;
pub mod spans;

pub use html::markup_to_native;
pub use render::native_to_markup;
pub use spans::{Span, SpanKind, SpanTable};

/// Prefix of Matrix permalinks (users, rooms and events).
pub const MATRIX_TO_PREFIX: &str = "https://matrix.to/#/";

/// Escape HTML special characters for Matrix `formatted_body`.
///
/// Quotes are escaped too, so the result is safe inside `href="…"`.
pub fn escape_html(text: &str) -> String {
    html_escape::encode_double_quoted_attribute(text).into_owned()
}
