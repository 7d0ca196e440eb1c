//! Core types shared by every subsystem.
//!
//! These flow through the reactive pipeline: components describe themselves
//! with them, the layout engine resolves them, the renderer emits them.

// =============================================================================
// Color
// =============================================================================

/// RGBA color with 8-bit channels (0-255).
///
/// Using integers for exact comparison - no floating point epsilon needed.
/// Alpha 255 = fully opaque, 0 = fully transparent.
/// Special value: r=-1 means "terminal default" (let terminal pick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rgba {
    pub r: i16,
    pub g: i16,
    pub b: i16,
    pub a: i16,
}

impl Rgba {
    /// Create a new RGBA color.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as i16,
            g: g as i16,
            b: b as i16,
            a: a as i16,
        }
    }

    /// Create an opaque RGB color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Terminal default color (let terminal decide).
    pub const TERMINAL_DEFAULT: Self = Self {
        r: -1,
        g: -1,
        b: -1,
        a: -1,
    };

    /// Transparent color.
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    pub const YELLOW: Self = Self::rgb(255, 255, 0);
    pub const CYAN: Self = Self::rgb(0, 255, 255);
    pub const MAGENTA: Self = Self::rgb(255, 0, 255);
    pub const GRAY: Self = Self::rgb(128, 128, 128);

    /// Create an ANSI palette color (0-255).
    ///
    /// Uses special marker: r=-2, g=palette_index.
    /// - 0-7: Standard colors
    /// - 8-15: Bright colors
    /// - 16-231: 6x6x6 RGB cube
    /// - 232-255: Grayscale
    pub const fn ansi(index: u8) -> Self {
        Self {
            r: -2,
            g: index as i16,
            b: 0,
            a: 255,
        }
    }

    /// Check if this is the terminal default color.
    #[inline]
    pub const fn is_terminal_default(&self) -> bool {
        self.r == -1
    }

    /// Check if this is an ANSI palette color.
    #[inline]
    pub const fn is_ansi(&self) -> bool {
        self.r == -2
    }

    /// Get ANSI palette index (only valid if is_ansi() returns true).
    #[inline]
    pub const fn ansi_index(&self) -> u8 {
        self.g as u8
    }

    /// Check if color is fully opaque.
    #[inline]
    pub const fn is_opaque(&self) -> bool {
        self.a == 255
    }

    /// Check if color is fully transparent.
    #[inline]
    pub const fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Alpha blend src over dst (Porter-Duff "over" operation).
    ///
    /// Terminal default and ANSI palette colors are treated as opaque.
    #[inline]
    pub fn blend(src: Self, dst: Self) -> Self {
        if src.is_opaque() || src.is_terminal_default() || src.is_ansi() {
            return src;
        }
        if src.is_transparent() {
            return dst;
        }

        // Special colors as dst are treated as opaque black
        let (dr, dg, db, da) = if dst.is_terminal_default() || dst.is_ansi() {
            (0i16, 0i16, 0i16, 255i16)
        } else {
            (dst.r, dst.g, dst.b, dst.a)
        };

        let sa = src.a as i32;
        let inv_sa = 255 - sa;

        let out_a = sa + (da as i32 * inv_sa) / 255;
        if out_a == 0 {
            return Self::TRANSPARENT;
        }

        let out_r = ((src.r as i32 * sa) + (dr as i32 * da as i32 * inv_sa / 255)) / out_a;
        let out_g = ((src.g as i32 * sa) + (dg as i32 * da as i32 * inv_sa / 255)) / out_a;
        let out_b = ((src.b as i32 * sa) + (db as i32 * da as i32 * inv_sa / 255)) / out_a;

        Self {
            r: out_r.clamp(0, 255) as i16,
            g: out_g.clamp(0, 255) as i16,
            b: out_b.clamp(0, 255) as i16,
            a: out_a.clamp(0, 255) as i16,
        }
    }
}

// =============================================================================
// Text attributes
// =============================================================================

bitflags::bitflags! {
    /// Text style attributes mapped to SGR codes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attr: u16 {
        const NONE          = 0;
        const BOLD          = 1 << 0;
        const DIM           = 1 << 1;
        const ITALIC        = 1 << 2;
        const UNDERLINE     = 1 << 3;
        const BLINK         = 1 << 4;
        const INVERSE       = 1 << 5;
        const HIDDEN        = 1 << 6;
        const STRIKETHROUGH = 1 << 7;
    }
}

// =============================================================================
// Dimensions & geometry
// =============================================================================

/// A size specification along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Dimension {
    /// Size from content / flex distribution.
    #[default]
    Auto,
    /// Fixed size in terminal cells.
    Cells(u16),
    /// Percentage of the parent's content box (0-100).
    Percent(f32),
}

impl Dimension {
    /// Resolve against a parent content-box size. `Auto` resolves to 0,
    /// which callers treat as "not specified".
    pub fn resolve(self, parent_size: u16) -> u16 {
        match self {
            Dimension::Auto => 0,
            Dimension::Cells(n) => n,
            Dimension::Percent(p) => (parent_size as f32 * p / 100.0).floor() as u16,
        }
    }

    /// True when an explicit size is present.
    pub fn is_set(self) -> bool {
        !matches!(self, Dimension::Auto)
    }
}

/// A resolved rectangle in terminal cells (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    /// Check whether a point falls inside this rectangle.
    #[inline]
    pub fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x
            && y >= self.y
            && x < self.x.saturating_add(self.width)
            && y < self.y.saturating_add(self.height)
    }

    /// True when the rectangle covers no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Per-side spacing (padding or margin) in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Edges {
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
    pub left: u16,
}

impl Edges {
    pub const ZERO: Self = Self {
        top: 0,
        right: 0,
        bottom: 0,
        left: 0,
    };

    /// Same spacing on all four sides.
    pub const fn all(n: u16) -> Self {
        Self {
            top: n,
            right: n,
            bottom: n,
            left: n,
        }
    }

    /// Symmetric vertical/horizontal spacing.
    pub const fn symmetric(vertical: u16, horizontal: u16) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    #[inline]
    pub fn horizontal(&self) -> u16 {
        self.left + self.right
    }

    #[inline]
    pub fn vertical(&self) -> u16 {
        self.top + self.bottom
    }
}

// =============================================================================
// Flex enums
// =============================================================================

/// Main-axis direction of a flex container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum FlexDirection {
    #[default]
    Column,
    Row,
}

impl FlexDirection {
    #[inline]
    pub fn is_row(self) -> bool {
        matches!(self, FlexDirection::Row)
    }
}

/// Main-axis distribution of free space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum JustifyContent {
    #[default]
    Start,
    Center,
    End,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

/// Cross-axis placement of children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum AlignItems {
    #[default]
    Stretch,
    Start,
    Center,
    End,
}

// =============================================================================
// Borders
// =============================================================================

/// Border drawing style. `Ascii` is also the fallback for terminals
/// without box-drawing glyph support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum BorderStyle {
    #[default]
    Single,
    Double,
    Rounded,
    Thick,
    Ascii,
}

// =============================================================================
// Tests
// =============================================================================
