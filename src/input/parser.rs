//! Terminal byte-stream parser.
//!
//! Feed raw stdin bytes in, get decoded [`Event`]s out. The parser keeps a
//! buffer so sequences split across reads resume cleanly; a prefix that can
//! still grow into a valid sequence reports nothing until more bytes arrive.
//! Malformed sequences are dropped silently - one junk escape must never take
//! the application down or desync the stream.
//!
//! Recognized wire formats: plain and multibyte UTF-8 keys, control bytes,
//! CSI and SS3 function/navigation keys with modifier params, alt-prefixed
//! keys, kitty `u` sequences, SGR (`ESC[<b;x;yM|m`) and legacy X10
//! (`ESC[M` + 3 bytes) mouse reports, bracketed paste, and focus reports.

use super::{Event, Key, KeyEvent, Modifiers, MouseButton, MouseEvent, MouseEventKind};

enum Step {
    Event(Event, usize),
    Skip(usize),
    Incomplete,
}

/// Stateful decoder over a raw input byte stream.
#[derive(Debug, Default)]
pub struct InputParser {
    buf: Vec<u8>,
}

impl InputParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and decode every complete event now available.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Event> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        while !self.buf.is_empty() {
            match parse_one(&self.buf) {
                Step::Event(event, n) => {
                    events.push(event);
                    self.buf.drain(..n);
                }
                Step::Skip(n) => {
                    self.buf.drain(..n.max(1));
                }
                Step::Incomplete => break,
            }
        }
        events
    }

    /// Resolve a pending prefix after an input lull: a lone ESC byte is the
    /// Escape key, anything else unfinished is dropped.
    pub fn flush_pending(&mut self) -> Vec<Event> {
        if self.buf == [0x1b] {
            self.buf.clear();
            return vec![Event::Key(KeyEvent::new(Key::Escape))];
        }
        self.buf.clear();
        Vec::new()
    }

    /// Bytes buffered awaiting completion.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn parse_one(buf: &[u8]) -> Step {
    match buf[0] {
        0x1b => parse_escape(buf),
        b if b < 0x20 || b == 0x7f => match control_key(b) {
            Some(event) => Step::Event(Event::Key(event), 1),
            None => Step::Skip(1),
        },
        _ => parse_utf8(buf),
    }
}

fn control_key(b: u8) -> Option<KeyEvent> {
    match b {
        0x0d | 0x0a => Some(KeyEvent::new(Key::Enter)),
        0x09 => Some(KeyEvent::new(Key::Tab)),
        0x7f | 0x08 => Some(KeyEvent::new(Key::Backspace)),
        0x00 => Some(KeyEvent::with_modifiers(Key::Char(' '), Modifiers::CTRL)),
        0x01..=0x1a => Some(KeyEvent::with_modifiers(
            Key::Char((b + 0x60) as char),
            Modifiers::CTRL,
        )),
        _ => None,
    }
}

// =============================================================================
// Escape sequences
// =============================================================================

fn parse_escape(buf: &[u8]) -> Step {
    if buf.len() < 2 {
        return Step::Incomplete;
    }
    match buf[1] {
        b'[' => parse_csi(buf),
        b'O' => parse_ss3(buf),
        0x1b => Step::Event(Event::Key(KeyEvent::new(Key::Escape)), 1),
        b if (0x20..0x7f).contains(&b) => Step::Event(
            Event::Key(KeyEvent::with_modifiers(
                Key::Char(b as char),
                Modifiers::ALT,
            )),
            2,
        ),
        _ => Step::Skip(2),
    }
}

fn parse_ss3(buf: &[u8]) -> Step {
    if buf.len() < 3 {
        return Step::Incomplete;
    }
    let key = match buf[2] {
        b'A' => Key::Up,
        b'B' => Key::Down,
        b'C' => Key::Right,
        b'D' => Key::Left,
        b'H' => Key::Home,
        b'F' => Key::End,
        b'P' => Key::F(1),
        b'Q' => Key::F(2),
        b'R' => Key::F(3),
        b'S' => Key::F(4),
        _ => return Step::Skip(3),
    };
    Step::Event(Event::Key(KeyEvent::new(key)), 3)
}

fn parse_csi(buf: &[u8]) -> Step {
    if buf.len() < 3 {
        return Step::Incomplete;
    }

    // Legacy X10 mouse: ESC [ M cb cx cy, coordinates offset by 32.
    if buf[2] == b'M' {
        if buf.len() < 6 {
            return Step::Incomplete;
        }
        return match x10_mouse(buf[3], buf[4], buf[5]) {
            Some(event) => Step::Event(Event::Mouse(event), 6),
            None => Step::Skip(6),
        };
    }

    let mut i = 2;
    while i < buf.len() && !(0x40..=0x7e).contains(&buf[i]) {
        i += 1;
    }
    if i == buf.len() {
        return Step::Incomplete;
    }
    let final_byte = buf[i];
    let consumed = i + 1;
    let Ok(params) = std::str::from_utf8(&buf[2..i]) else {
        return Step::Skip(consumed);
    };

    // Bracketed paste: everything up to the end marker is literal text.
    if final_byte == b'~' && params == "200" {
        const END: &[u8] = b"\x1b[201~";
        let rest = &buf[consumed..];
        let Some(pos) = rest.windows(END.len()).position(|w| w == END) else {
            return Step::Incomplete;
        };
        let text = String::from_utf8_lossy(&rest[..pos]).into_owned();
        return Step::Event(Event::Paste(text), consumed + pos + END.len());
    }

    if (final_byte == b'M' || final_byte == b'm') && params.starts_with('<') {
        return match sgr_mouse(&params[1..], final_byte == b'M') {
            Some(event) => Step::Event(Event::Mouse(event), consumed),
            None => Step::Skip(consumed),
        };
    }

    match csi_key(final_byte, params) {
        Some(event) => Step::Event(event, consumed),
        None => Step::Skip(consumed),
    }
}

/// Modifier encoding shared by CSI key params: value - 1 is a bitfield of
/// shift(1), alt(2), ctrl(4).
fn csi_modifiers(param: u32) -> Modifiers {
    let bits = param.saturating_sub(1);
    let mut mods = Modifiers::empty();
    if bits & 1 != 0 {
        mods |= Modifiers::SHIFT;
    }
    if bits & 2 != 0 {
        mods |= Modifiers::ALT;
    }
    if bits & 4 != 0 {
        mods |= Modifiers::CTRL;
    }
    mods
}

fn csi_key(final_byte: u8, params: &str) -> Option<Event> {
    let nums: Vec<u32> = params.split(';').filter_map(|p| p.parse().ok()).collect();

    let simple = |key: Key| {
        let mods = nums.get(1).map(|&m| csi_modifiers(m)).unwrap_or_default();
        Some(Event::Key(KeyEvent::with_modifiers(key, mods)))
    };

    match final_byte {
        b'A' => simple(Key::Up),
        b'B' => simple(Key::Down),
        b'C' => simple(Key::Right),
        b'D' => simple(Key::Left),
        b'H' => simple(Key::Home),
        b'F' => simple(Key::End),
        b'Z' => Some(Event::Key(KeyEvent::with_modifiers(
            Key::Tab,
            Modifiers::SHIFT,
        ))),
        b'I' => Some(Event::FocusGained),
        b'O' => Some(Event::FocusLost),
        b'~' => {
            let code = *nums.first()?;
            let mods = nums.get(1).map(|&m| csi_modifiers(m)).unwrap_or_default();
            let key = match code {
                1 | 7 => Key::Home,
                2 => Key::Insert,
                3 => Key::Delete,
                4 | 8 => Key::End,
                5 => Key::PageUp,
                6 => Key::PageDown,
                11..=15 => Key::F((code - 10) as u8),
                17..=21 => Key::F((code - 11) as u8),
                23 | 24 => Key::F((code - 12) as u8),
                _ => return None,
            };
            Some(Event::Key(KeyEvent::with_modifiers(key, mods)))
        }
        // Kitty keyboard protocol: codepoint;modifiers u.
        b'u' => {
            let code = *nums.first()?;
            let mods = nums.get(1).map(|&m| csi_modifiers(m)).unwrap_or_default();
            let key = match code {
                13 => Key::Enter,
                9 => Key::Tab,
                27 => Key::Escape,
                127 => Key::Backspace,
                _ => Key::Char(char::from_u32(code)?),
            };
            Some(Event::Key(KeyEvent::with_modifiers(key, mods)))
        }
        _ => None,
    }
}

// =============================================================================
// Mouse
// =============================================================================

fn mouse_modifiers(btn: u32) -> Modifiers {
    let mut mods = Modifiers::empty();
    if btn & 4 != 0 {
        mods |= Modifiers::SHIFT;
    }
    if btn & 8 != 0 {
        mods |= Modifiers::ALT;
    }
    if btn & 16 != 0 {
        mods |= Modifiers::CTRL;
    }
    mods
}

fn decode_button(btn: u32, press: bool) -> (MouseEventKind, MouseButton) {
    if btn & 64 != 0 {
        let kind = if btn & 1 == 0 {
            MouseEventKind::ScrollUp
        } else {
            MouseEventKind::ScrollDown
        };
        return (kind, MouseButton::None);
    }
    let button = match btn & 3 {
        0 => MouseButton::Left,
        1 => MouseButton::Middle,
        2 => MouseButton::Right,
        _ => MouseButton::None,
    };
    let kind = if btn & 32 != 0 {
        if button == MouseButton::None {
            MouseEventKind::Move
        } else {
            MouseEventKind::Drag
        }
    } else if press {
        MouseEventKind::Down
    } else {
        MouseEventKind::Up
    };
    (kind, button)
}

fn sgr_mouse(params: &str, press: bool) -> Option<MouseEvent> {
    let mut parts = params.split(';');
    let btn: u32 = parts.next()?.parse().ok()?;
    let x: u16 = parts.next()?.parse().ok()?;
    let y: u16 = parts.next()?.parse().ok()?;
    if x == 0 || y == 0 {
        return None;
    }
    let (kind, button) = decode_button(btn, press);
    Some(MouseEvent {
        kind,
        button,
        x: x - 1,
        y: y - 1,
        modifiers: mouse_modifiers(btn),
    })
}

fn x10_mouse(cb: u8, cx: u8, cy: u8) -> Option<MouseEvent> {
    let btn = (cb as u32).checked_sub(32)?;
    let x = (cx as u16).checked_sub(33)?;
    let y = (cy as u16).checked_sub(33)?;
    // X10 reports release as button 3; press vs release is otherwise
    // indistinguishable, so button 3 maps to Up.
    let release = btn & 3 == 3 && btn & 64 == 0;
    let (kind, button) = decode_button(btn, !release);
    Some(MouseEvent {
        kind: if release && kind == MouseEventKind::Down {
            MouseEventKind::Up
        } else {
            kind
        },
        button,
        x,
        y,
        modifiers: mouse_modifiers(btn),
    })
}

// =============================================================================
// UTF-8
// =============================================================================

fn parse_utf8(buf: &[u8]) -> Step {
    let len = match buf[0] {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => return Step::Skip(1),
    };
    if buf.len() < len {
        return Step::Incomplete;
    }
    match std::str::from_utf8(&buf[..len]) {
        Ok(s) => match s.chars().next() {
            Some(c) => Step::Event(Event::Key(KeyEvent::new(Key::Char(c))), len),
            None => Step::Skip(len),
        },
        Err(_) => Step::Skip(1),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(bytes: &[u8]) -> Vec<Event> {
        InputParser::new().feed(bytes)
    }

    fn key(k: Key) -> Event {
        Event::Key(KeyEvent::new(k))
    }

    fn key_mod(k: Key, m: Modifiers) -> Event {
        Event::Key(KeyEvent::with_modifiers(k, m))
    }

    #[test]
    fn test_plain_chars() {
        assert_eq!(
            feed(b"abc"),
            vec![key(Key::Char('a')), key(Key::Char('b')), key(Key::Char('c'))]
        );
    }

    #[test]
    fn test_control_bytes() {
        assert_eq!(feed(b"\x0d"), vec![key(Key::Enter)]);
        assert_eq!(feed(b"\x09"), vec![key(Key::Tab)]);
        assert_eq!(feed(b"\x7f"), vec![key(Key::Backspace)]);
        assert_eq!(
            feed(b"\x03"),
            vec![key_mod(Key::Char('c'), Modifiers::CTRL)]
        );
    }

    #[test]
    fn test_csi_arrows() {
        assert_eq!(feed(b"\x1b[A"), vec![key(Key::Up)]);
        assert_eq!(feed(b"\x1b[D"), vec![key(Key::Left)]);
    }

    #[test]
    fn test_csi_arrow_with_modifiers() {
        assert_eq!(
            feed(b"\x1b[1;5A"),
            vec![key_mod(Key::Up, Modifiers::CTRL)]
        );
        assert_eq!(
            feed(b"\x1b[1;2C"),
            vec![key_mod(Key::Right, Modifiers::SHIFT)]
        );
    }

    #[test]
    fn test_tilde_keys() {
        assert_eq!(feed(b"\x1b[3~"), vec![key(Key::Delete)]);
        assert_eq!(feed(b"\x1b[5~"), vec![key(Key::PageUp)]);
        assert_eq!(feed(b"\x1b[15~"), vec![key(Key::F(5))]);
    }

    #[test]
    fn test_ss3_function_keys() {
        assert_eq!(feed(b"\x1bOP"), vec![key(Key::F(1))]);
        assert_eq!(feed(b"\x1bOA"), vec![key(Key::Up)]);
    }

    #[test]
    fn test_back_tab() {
        assert_eq!(
            feed(b"\x1b[Z"),
            vec![key_mod(Key::Tab, Modifiers::SHIFT)]
        );
    }

    #[test]
    fn test_alt_char() {
        assert_eq!(
            feed(b"\x1bx"),
            vec![key_mod(Key::Char('x'), Modifiers::ALT)]
        );
    }

    #[test]
    fn test_kitty_sequence() {
        assert_eq!(
            feed(b"\x1b[99;5u"),
            vec![key_mod(Key::Char('c'), Modifiers::CTRL)]
        );
    }

    #[test]
    fn test_utf8_multibyte() {
        assert_eq!(feed("é".as_bytes()), vec![key(Key::Char('é'))]);
        assert_eq!(feed("日".as_bytes()), vec![key(Key::Char('日'))]);
    }

    #[test]
    fn test_utf8_split_across_feeds() {
        let bytes = "é".as_bytes();
        let mut parser = InputParser::new();
        assert!(parser.feed(&bytes[..1]).is_empty());
        assert_eq!(parser.feed(&bytes[1..]), vec![key(Key::Char('é'))]);
    }

    #[test]
    fn test_sgr_mouse_press_release() {
        assert_eq!(
            feed(b"\x1b[<0;10;5M"),
            vec![Event::Mouse(MouseEvent {
                kind: MouseEventKind::Down,
                button: MouseButton::Left,
                x: 9,
                y: 4,
                modifiers: Modifiers::empty(),
            })]
        );
        assert_eq!(
            feed(b"\x1b[<2;1;1m"),
            vec![Event::Mouse(MouseEvent {
                kind: MouseEventKind::Up,
                button: MouseButton::Right,
                x: 0,
                y: 0,
                modifiers: Modifiers::empty(),
            })]
        );
    }

    #[test]
    fn test_sgr_mouse_drag_and_move() {
        let drag = feed(b"\x1b[<32;3;4M");
        assert_eq!(
            drag,
            vec![Event::Mouse(MouseEvent {
                kind: MouseEventKind::Drag,
                button: MouseButton::Left,
                x: 2,
                y: 3,
                modifiers: Modifiers::empty(),
            })]
        );
        let hover = feed(b"\x1b[<35;3;4M");
        assert_eq!(
            hover,
            vec![Event::Mouse(MouseEvent {
                kind: MouseEventKind::Move,
                button: MouseButton::None,
                x: 2,
                y: 3,
                modifiers: Modifiers::empty(),
            })]
        );
    }

    #[test]
    fn test_sgr_mouse_scroll() {
        let up = feed(b"\x1b[<64;1;1M");
        let down = feed(b"\x1b[<65;1;1M");
        assert!(matches!(
            up[0],
            Event::Mouse(MouseEvent { kind: MouseEventKind::ScrollUp, .. })
        ));
        assert!(matches!(
            down[0],
            Event::Mouse(MouseEvent { kind: MouseEventKind::ScrollDown, .. })
        ));
    }

    #[test]
    fn test_sgr_mouse_modifiers() {
        let events = feed(b"\x1b[<16;1;1M");
        assert_eq!(
            events,
            vec![Event::Mouse(MouseEvent {
                kind: MouseEventKind::Down,
                button: MouseButton::Left,
                x: 0,
                y: 0,
                modifiers: Modifiers::CTRL,
            })]
        );
    }

    #[test]
    fn test_x10_mouse() {
        // cb=32 (left press), cx=34, cy=35 -> cell (1, 2).
        assert_eq!(
            feed(&[0x1b, b'[', b'M', 32, 34, 35]),
            vec![Event::Mouse(MouseEvent {
                kind: MouseEventKind::Down,
                button: MouseButton::Left,
                x: 1,
                y: 2,
                modifiers: Modifiers::empty(),
            })]
        );
        // cb=35 (button 3) is a release.
        assert_eq!(
            feed(&[0x1b, b'[', b'M', 35, 33, 33]),
            vec![Event::Mouse(MouseEvent {
                kind: MouseEventKind::Up,
                button: MouseButton::None,
                x: 0,
                y: 0,
                modifiers: Modifiers::empty(),
            })]
        );
    }

    #[test]
    fn test_bracketed_paste() {
        assert_eq!(
            feed(b"\x1b[200~hello\nworld\x1b[201~"),
            vec![Event::Paste("hello\nworld".to_string())]
        );
    }

    #[test]
    fn test_focus_reports() {
        assert_eq!(feed(b"\x1b[I"), vec![Event::FocusGained]);
        assert_eq!(feed(b"\x1b[O"), vec![Event::FocusLost]);
    }

    #[test]
    fn test_incomplete_csi_resumes() {
        let mut parser = InputParser::new();
        assert!(parser.feed(b"\x1b[").is_empty());
        assert_eq!(parser.feed(b"B"), vec![key(Key::Down)]);
    }

    #[test]
    fn test_malformed_sequence_dropped_silently() {
        let mut parser = InputParser::new();
        // Unknown CSI final byte, then a good key right behind it.
        let events = parser.feed(b"\x1b[?999X\x1b[A");
        assert_eq!(events, vec![key(Key::Up)]);
    }

    #[test]
    fn test_flush_pending_lone_escape() {
        let mut parser = InputParser::new();
        assert!(parser.feed(b"\x1b").is_empty());
        assert_eq!(parser.flush_pending(), vec![key(Key::Escape)]);
        assert_eq!(parser.pending(), 0);
    }
}
