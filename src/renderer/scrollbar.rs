//! Scrollbar geometry: maps a scroll offset to a thumb position.

/// Row of the scrollbar thumb within a track of `viewport_rows` rows, for a
/// content of `total_rows` scrolled to `offset`.
///
/// Offset 0 maps to the top row, the maximum offset to the bottom row, and
/// intermediate offsets interpolate with rounding.
pub fn thumb_row(viewport_rows: u16, total_rows: u16, offset: u16) -> u16 {
    if viewport_rows == 0 || total_rows <= viewport_rows {
        return 0;
    }
    let max_offset = (total_rows - viewport_rows) as u32;
    let offset = (offset as u32).min(max_offset);
    let track = (viewport_rows - 1) as u32;
    ((offset * track + max_offset / 2) / max_offset) as u16
}

/// Thumb height proportional to the visible fraction, never below one row.
pub fn thumb_height(viewport_rows: u16, total_rows: u16) -> u16 {
    if viewport_rows == 0 {
        return 0;
    }
    if total_rows <= viewport_rows {
        return viewport_rows;
    }
    let h = (viewport_rows as u32 * viewport_rows as u32) / total_rows as u32;
    (h as u16).max(1)
}
