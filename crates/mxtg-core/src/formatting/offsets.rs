//! UTF-16 code-unit accounting.
//!
//! Telegram measures entity offsets and lengths in UTF-16 code units: anything
//! outside the Basic Multilingual Plane (most emoji) takes two units. Byte
//! length and `chars().count()` are both wrong for this.

use crate::errors::FormatError;

/// Length of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// A string encoded once into UTF-16 so it can be sliced by unit offsets.
#[derive(Clone, Debug)]
pub struct Utf16Text {
    units: Vec<u16>,
}

impl Utf16Text {
    pub fn new(text: &str) -> Self {
        Self {
            units: text.encode_utf16().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Decode `length` units starting at `offset`.
    ///
    /// Fails if the range leaves the buffer or cuts a surrogate pair in half.
    pub fn slice(&self, offset: usize, length: usize) -> Result<String, FormatError> {
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= self.units.len())
            .ok_or(FormatError::SpanOutOfBounds {
                offset,
                length,
                text_len: self.units.len(),
            })?;

        for index in [offset, end] {
            if self.splits_pair_at(index) {
                return Err(FormatError::SplitSurrogate { index });
            }
        }

        String::from_utf16(&self.units[offset..end])
            .map_err(|_| FormatError::SplitSurrogate { index: offset })
    }

    /// Decode everything from `offset` to the end.
    pub fn slice_from(&self, offset: usize) -> Result<String, FormatError> {
        self.slice(offset, self.units.len().saturating_sub(offset))
    }

    fn splits_pair_at(&self, index: usize) -> bool {
        if index == 0 || index >= self.units.len() {
            return false;
        }
        is_high_surrogate(self.units[index - 1]) && is_low_surrogate(self.units[index])
    }
}

fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn astral_chars_count_twice() {
        assert_eq!(utf16_len("abc"), 3);
        assert_eq!(utf16_len("😀"), 2);
        assert_eq!(utf16_len("é"), 1);
        assert_eq!(utf16_len("a😀b"), 4);
        // CJK extension B lives outside the BMP too.
        assert_eq!(utf16_len("𠀀"), 2);
    }

    #[test]
    fn slices_by_units_around_emoji() {
        let text = Utf16Text::new("😀 hello");
        assert_eq!(text.len(), 8);
        assert_eq!(text.slice(3, 5).unwrap(), "hello");
        assert_eq!(text.slice(0, 2).unwrap(), "😀");
        assert_eq!(text.slice_from(2).unwrap(), " hello");
    }

    #[test]
    fn rejects_out_of_bounds() {
        let text = Utf16Text::new("abc");
        assert_eq!(
            text.slice(2, 5),
            Err(FormatError::SpanOutOfBounds {
                offset: 2,
                length: 5,
                text_len: 3
            })
        );
        assert!(matches!(
            text.slice_from(7),
            Err(FormatError::SpanOutOfBounds { offset: 7, .. })
        ));
    }

    #[test]
    fn rejects_split_surrogate_pair() {
        let text = Utf16Text::new("a😀b");
        assert_eq!(text.slice(0, 2), Err(FormatError::SplitSurrogate { index: 2 }));
        assert_eq!(text.slice(2, 2), Err(FormatError::SplitSurrogate { index: 2 }));
        assert_eq!(text.slice(1, 2).unwrap(), "😀");
    }

    #[test]
    fn encode_then_slice_whole_round_trips() {
        let s = "mixed 𠀀 text 😀 with é";
        let text = Utf16Text::new(s);
        assert_eq!(text.len(), utf16_len(s));
        assert_eq!(text.slice(0, text.len()).unwrap(), s);
    }
}
