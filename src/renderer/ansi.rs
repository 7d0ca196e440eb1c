//! ANSI escape emission.
//!
//! Writer functions take any `W: Write` so they serve both the real terminal
//! and in-memory buffers in tests. The `*_seq` builders return the same
//! escapes as `String`s for embedding inside composed frame lines.
//!
//! Color emission understands the three `Rgba` encodings: terminal-default
//! (SGR 39/49), ANSI-256 palette (38;5 / 48;5), and truecolor (38;2 / 48;2).

use std::io::{self, Write};

use crate::types::{Attr, Rgba};

/// Reset all SGR state.
pub const RESET: &str = "\x1b[0m";

// =============================================================================
// Cursor & screen
// =============================================================================

/// Move the cursor to a 0-based cell position.
pub fn cursor_to<W: Write>(w: &mut W, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", y + 1, x + 1)
}

pub fn cursor_hide<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?25l")
}

pub fn cursor_show<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?25h")
}

pub fn clear_screen<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[2J")
}

/// Clear from the cursor to the end of the line.
pub fn clear_line_tail<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[K")
}

pub fn alt_screen_enter<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?1049h")
}

pub fn alt_screen_exit<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?1049l")
}

// =============================================================================
// Synchronized output
// =============================================================================

/// Begin a synchronized update: the terminal holds repaints until the
/// matching end, removing tearing on partial writes.
pub fn sync_begin<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?2026h")
}

pub fn sync_end<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?2026l")
}

// =============================================================================
// Input protocols
// =============================================================================

/// Enable button + drag mouse reporting in SGR encoding.
pub fn mouse_enable<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?1000h\x1b[?1002h\x1b[?1006h")
}

pub fn mouse_disable<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?1006l\x1b[?1002l\x1b[?1000l")
}

pub fn bracketed_paste_enable<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?2004h")
}

pub fn bracketed_paste_disable<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?2004l")
}

pub fn focus_reporting_enable<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?1004h")
}

pub fn focus_reporting_disable<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?1004l")
}

// =============================================================================
// SGR sequence builders
// =============================================================================

/// Foreground color sequence for any `Rgba` encoding.
pub fn fg_seq(color: Rgba) -> String {
    if color.is_terminal_default() {
        "\x1b[39m".to_string()
    } else if color.is_ansi() {
        format!("\x1b[38;5;{}m", color.ansi_index())
    } else {
        format!("\x1b[38;2;{};{};{}m", color.r, color.g, color.b)
    }
}

/// Background color sequence for any `Rgba` encoding.
pub fn bg_seq(color: Rgba) -> String {
    if color.is_terminal_default() {
        "\x1b[49m".to_string()
    } else if color.is_ansi() {
        format!("\x1b[48;5;{}m", color.ansi_index())
    } else {
        format!("\x1b[48;2;{};{};{}m", color.r, color.g, color.b)
    }
}

/// Attribute-set sequence; empty string when no attributes are set.
pub fn attr_seq(attrs: Attr) -> String {
    if attrs.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for (flag, code) in [
        (Attr::BOLD, 1),
        (Attr::DIM, 2),
        (Attr::ITALIC, 3),
        (Attr::UNDERLINE, 4),
        (Attr::BLINK, 5),
        (Attr::INVERSE, 7),
        (Attr::HIDDEN, 8),
        (Attr::STRIKETHROUGH, 9),
    ] {
        if attrs.contains(flag) {
            out.push_str(&format!("\x1b[{code}m"));
        }
    }
    out
}

/// Combined style prefix: background, foreground, attributes.
pub fn style_seq(fg: Rgba, bg: Rgba, attrs: Attr) -> String {
    let mut out = bg_seq(bg);
    out.push_str(&fg_seq(fg));
    out.push_str(&attr_seq(attrs));
    out
}

pub fn fg<W: Write>(w: &mut W, color: Rgba) -> io::Result<()> {
    w.write_all(fg_seq(color).as_bytes())
}

pub fn bg<W: Write>(w: &mut W, color: Rgba) -> io::Result<()> {
    w.write_all(bg_seq(color).as_bytes())
}

pub fn reset<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(RESET.as_bytes())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(f: impl Fn(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_cursor_to_is_one_based() {
        assert_eq!(emit(|w| cursor_to(w, 0, 0)), "\x1b[1;1H");
        assert_eq!(emit(|w| cursor_to(w, 4, 2)), "\x1b[3;5H");
    }

    #[test]
    fn test_truecolor_sequences() {
        assert_eq!(fg_seq(Rgba::rgb(10, 20, 30)), "\x1b[38;2;10;20;30m");
        assert_eq!(bg_seq(Rgba::rgb(1, 2, 3)), "\x1b[48;2;1;2;3m");
    }

    #[test]
    fn test_palette_sequences() {
        assert_eq!(fg_seq(Rgba::ansi(196)), "\x1b[38;5;196m");
        assert_eq!(bg_seq(Rgba::ansi(17)), "\x1b[48;5;17m");
    }

    #[test]
    fn test_default_sequences() {
        assert_eq!(fg_seq(Rgba::TERMINAL_DEFAULT), "\x1b[39m");
        assert_eq!(bg_seq(Rgba::TERMINAL_DEFAULT), "\x1b[49m");
    }

    #[test]
    fn test_attr_sequences() {
        assert_eq!(attr_seq(Attr::NONE), "");
        assert_eq!(attr_seq(Attr::BOLD), "\x1b[1m");
        assert_eq!(attr_seq(Attr::BOLD | Attr::UNDERLINE), "\x1b[1m\x1b[4m");
    }

    #[test]
    fn test_sync_bracketing() {
        assert_eq!(emit(|w| sync_begin(w)), "\x1b[?2026h");
        assert_eq!(emit(|w| sync_end(w)), "\x1b[?2026l");
    }

    #[test]
    fn test_mouse_protocol() {
        assert_eq!(emit(|w| mouse_enable(w)), "\x1b[?1000h\x1b[?1002h\x1b[?1006h");
        assert_eq!(emit(|w| mouse_disable(w)), "\x1b[?1006l\x1b[?1002l\x1b[?1000l");
    }
}
