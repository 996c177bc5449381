//! Splits accumulated text into a bounded preview and an overflow remainder.

/// Lines shown before text folds behind the expand toggle.
pub const PREVIEW_LINES: usize = 8;

/// Preview/remainder pair produced by [`paginate`].
///
/// When overflowing, `preview` joined with `remainder` by a single newline
/// reconstructs the input exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextPage {
    pub preview: String,
    pub remainder: String,
}

impl TextPage {
    /// True when there is hidden content worth expanding.
    pub fn has_overflow(&self) -> bool {
        !self.remainder.trim().is_empty()
    }

    pub fn remainder_line_count(&self) -> usize {
        if self.remainder.is_empty() {
            0
        } else {
            self.remainder.split('\n').count()
        }
    }
}

/// Split text at the [`PREVIEW_LINES`] boundary.
pub fn paginate(text: &str) -> TextPage {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() <= PREVIEW_LINES {
        return TextPage {
            preview: text.to_string(),
            remainder: String::new(),
        };
    }
    TextPage {
        preview: lines[..PREVIEW_LINES].join("\n"),
        remainder: lines[PREVIEW_LINES..].join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: usize) -> String {
        (1..=count)
            .map(|n| format!("line {n}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn short_text_has_no_overflow() {
        let page = paginate(&numbered(8));
        assert_eq!(page.preview, numbered(8));
        assert!(page.remainder.is_empty());
        assert!(!page.has_overflow());
    }

    #[test]
    fn nine_lines_split_eight_one() {
        let page = paginate(&numbered(9));
        assert_eq!(page.preview, numbered(8));
        assert_eq!(page.remainder, "line 9");
        assert!(page.has_overflow());
        assert_eq!(page.remainder_line_count(), 1);
    }

    #[test]
    fn preview_plus_remainder_reconstructs_input() {
        let text = numbered(23);
        let page = paginate(&text);
        assert_eq!(format!("{}\n{}", page.preview, page.remainder), text);
        assert_eq!(page.remainder_line_count(), 15);
    }

    #[test]
    fn blank_remainder_is_not_overflow() {
        let text = format!("{}\n   \n", numbered(8));
        let page = paginate(&text);
        assert!(!page.remainder.is_empty());
        assert!(!page.has_overflow());
    }
}
