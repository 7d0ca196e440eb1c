//! Text measurement in terminal cells.
//!
//! Widths are display columns, not bytes or chars: CJK and other wide
//! graphemes count as 2, zero-width joiners as 0, and SGR escape sequences
//! as 0 (they style but never occupy cells).

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width of a string containing no escape sequences.
pub fn string_width(s: &str) -> u16 {
    UnicodeWidthStr::width(s).min(u16::MAX as usize) as u16
}

/// Display width of a string that may contain CSI escape sequences.
/// Escapes contribute zero columns.
pub fn visible_width(s: &str) -> u16 {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                // Consume parameter/intermediate bytes up to the final byte.
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            continue;
        }
        width += unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
    }
    width.min(u16::MAX as usize) as u16
}

/// Wrap `text` to `width` columns at word boundaries, hard-breaking words
/// wider than a full line. Embedded newlines are respected. Zero width
/// yields one empty line per input line.
pub fn wrap_text(text: &str, width: u16) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.split('\n') {
        if width == 0 {
            out.push(String::new());
            continue;
        }
        wrap_line(line, width, &mut out);
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

fn wrap_line(line: &str, width: u16, out: &mut Vec<String>) {
    let mut current = String::new();
    let mut current_width: u16 = 0;

    for word in line.split_word_bounds() {
        let word_width = string_width(word);

        if current_width + word_width <= width {
            current.push_str(word);
            current_width += word_width;
            continue;
        }

        // Whitespace at a break point is swallowed, not carried over.
        if word.trim().is_empty() {
            out.push(std::mem::take(&mut current));
            current_width = 0;
            continue;
        }

        if word_width <= width {
            out.push(std::mem::take(&mut current));
            current = word.to_string();
            current_width = word_width;
            continue;
        }

        // Word wider than a full line: hard-break by grapheme.
        for grapheme in word.graphemes(true) {
            let gw = string_width(grapheme);
            if current_width + gw > width && current_width > 0 {
                out.push(std::mem::take(&mut current));
                current_width = 0;
            }
            current.push_str(grapheme);
            current_width += gw;
        }
    }

    out.push(current);
}

/// Number of rows `text` occupies at `width` columns.
pub fn measure_text_height(text: &str, width: u16, wrap: bool) -> u16 {
    if wrap {
        wrap_text(text, width).len().min(u16::MAX as usize) as u16
    } else {
        text.split('\n').count().min(u16::MAX as usize) as u16
    }
}

/// Widest line of `text` in columns (ignores wrapping).
pub fn max_line_width(text: &str) -> u16 {
    text.split('\n').map(string_width).max().unwrap_or(0)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_width_ascii_and_wide() {
        assert_eq!(string_width("hello"), 5);
        assert_eq!(string_width("日本語"), 6);
        assert_eq!(string_width(""), 0);
    }

    #[test]
    fn test_visible_width_skips_sgr() {
        assert_eq!(visible_width("\x1b[31mred\x1b[0m"), 3);
        assert_eq!(visible_width("\x1b[38;2;10;20;30mx\x1b[39m"), 1);
        assert_eq!(visible_width("plain"), 5);
    }

    #[test]
    fn test_wrap_at_word_boundary() {
        let lines = wrap_text("hello brave world", 11);
        assert_eq!(lines, vec!["hello brave", "world"]);
    }

    #[test]
    fn test_wrap_hard_breaks_long_word() {
        let lines = wrap_text("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_respects_newlines() {
        let lines = wrap_text("one\ntwo", 10);
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn test_wrap_zero_width() {
        assert_eq!(wrap_text("anything", 0), vec![""]);
    }

    #[test]
    fn test_measure_height() {
        assert_eq!(measure_text_height("hello world", 5, true), 2);
        assert_eq!(measure_text_height("hello world", 5, false), 1);
        assert_eq!(measure_text_height("a\nb\nc", 80, true), 3);
    }

    #[test]
    fn test_wide_chars_wrap_without_splitting() {
        // Width 3 fits one 2-column glyph per line, never half of one.
        let lines = wrap_text("日本", 3);
        assert_eq!(lines, vec!["日", "本"]);
    }
}
