//! Terminal session control.
//!
//! Raw mode is a no-op off-TTY so the runtime stays usable under pipes and
//! in CI; every probe degrades to a sane default instead of failing.

use std::io::{self, IsTerminal};

pub const DEFAULT_SIZE: (u16, u16) = (80, 24);

pub fn is_tty() -> bool {
    io::stdout().is_terminal()
}

/// Enable raw mode when attached to a terminal. Returns whether raw mode
/// actually engaged.
pub fn enter_raw_mode() -> io::Result<bool> {
    if !is_tty() {
        return Ok(false);
    }
    crossterm::terminal::enable_raw_mode()?;
    Ok(true)
}

pub fn exit_raw_mode() -> io::Result<()> {
    if crossterm::terminal::is_raw_mode_enabled()? {
        crossterm::terminal::disable_raw_mode()?;
    }
    Ok(())
}

/// Current terminal size in cells, defaulting off-TTY.
pub fn detect_size() -> (u16, u16) {
    crossterm::terminal::size().unwrap_or(DEFAULT_SIZE)
}

/// Whether the session can display Unicode box-drawing glyphs, judged from
/// the locale environment.
pub fn supports_unicode() -> bool {
    for var in ["LC_ALL", "LC_CTYPE", "LANG"] {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                return value.to_lowercase().contains("utf");
            }
        }
    }
    false
}
