//! Border glyph tables, with an ASCII fallback for terminals that cannot
//! display box-drawing characters.

use crate::types::BorderStyle;

/// The six glyphs needed to draw one box outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Charset {
    pub top_left: char,
    pub top_right: char,
    pub bottom_left: char,
    pub bottom_right: char,
    pub horizontal: char,
    pub vertical: char,
}

const SINGLE: Charset = Charset {
    top_left: '┌',
    top_right: '┐',
    bottom_left: '└',
    bottom_right: '┘',
    horizontal: '─',
    vertical: '│',
};

const DOUBLE: Charset = Charset {
    top_left: '╔',
    top_right: '╗',
    bottom_left: '╚',
    bottom_right: '╝',
    horizontal: '═',
    vertical: '║',
};

const ROUNDED: Charset = Charset {
    top_left: '╭',
    top_right: '╮',
    bottom_left: '╰',
    bottom_right: '╯',
    horizontal: '─',
    vertical: '│',
};

const THICK: Charset = Charset {
    top_left: '┏',
    top_right: '┓',
    bottom_left: '┗',
    bottom_right: '┛',
    horizontal: '━',
    vertical: '┃',
};

const ASCII: Charset = Charset {
    top_left: '+',
    top_right: '+',
    bottom_left: '+',
    bottom_right: '+',
    horizontal: '-',
    vertical: '|',
};

/// Charset for a border style. Without Unicode support every style maps to
/// the ASCII set.
pub fn border_charset(style: BorderStyle, unicode: bool) -> Charset {
    if !unicode {
        return ASCII;
    }
    match style {
        BorderStyle::Single => SINGLE,
        BorderStyle::Double => DOUBLE,
        BorderStyle::Rounded => ROUNDED,
        BorderStyle::Thick => THICK,
        BorderStyle::Ascii => ASCII,
    }
}
