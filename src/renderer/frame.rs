//! Frame output: a byte buffer collecting one frame's escapes, and the
//! presenter that diffs frames line-by-line so only changed rows repaint.

use std::io::{self, Write};

use crate::renderer::ansi;

// =============================================================================
// Output buffer
// =============================================================================

/// Accumulates one frame's bytes so the terminal sees a single write.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    buf: Vec<u8>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write the buffered frame to `w` in one call and clear the buffer.
    pub fn flush_to<W: Write>(&mut self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.buf)?;
        w.flush()?;
        self.buf.clear();
        Ok(())
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// Presenter
// =============================================================================

/// Emits frames with a line diff against the previous frame, bracketed in
/// synchronized-output escapes.
#[derive(Debug, Default)]
pub struct FramePresenter {
    previous: Option<Vec<String>>,
}

impl FramePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Present `lines`, writing only rows that differ from the previous
    /// frame. Returns the number of rows written.
    pub fn present<W: Write>(&mut self, lines: &[String], w: &mut W) -> io::Result<usize> {
        let mut written = 0;
        ansi::sync_begin(w)?;

        for (y, line) in lines.iter().enumerate() {
            let unchanged = self
                .previous
                .as_ref()
                .and_then(|prev| prev.get(y))
                .is_some_and(|old| old == line);
            if unchanged {
                continue;
            }
            ansi::cursor_to(w, 0, y as u16)?;
            w.write_all(line.as_bytes())?;
            ansi::clear_line_tail(w)?;
            written += 1;
        }

        // Rows the previous frame had but this one doesn't.
        if let Some(prev) = &self.previous {
            for y in lines.len()..prev.len() {
                ansi::cursor_to(w, 0, y as u16)?;
                ansi::clear_line_tail(w)?;
                written += 1;
            }
        }

        ansi::sync_end(w)?;
        w.flush()?;
        self.previous = Some(lines.to_vec());
        Ok(written)
    }

    /// Forget the previous frame; the next present repaints everything
    /// (resize, screen corruption, re-entry from a suspended state).
    pub fn invalidate(&mut self) {
        self.previous = None;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_frame_writes_all_rows() {
        let mut presenter = FramePresenter::new();
        let mut out = Vec::new();
        let n = presenter.present(&lines(&["a", "b", "c"]), &mut out).unwrap();
        assert_eq!(n, 3);
        let s = String::from_utf8(out).unwrap();
        assert!(s.starts_with("\x1b[?2026h"));
        assert!(s.ends_with("\x1b[?2026l"));
        assert!(s.contains("a"));
        assert!(s.contains("\x1b[3;1H"));
    }

    #[test]
    fn test_identical_frame_writes_nothing() {
        let mut presenter = FramePresenter::new();
        let frame = lines(&["a", "b"]);
        let mut out = Vec::new();
        presenter.present(&frame, &mut out).unwrap();

        let mut out2 = Vec::new();
        let n = presenter.present(&frame, &mut out2).unwrap();
        assert_eq!(n, 0);
        assert_eq!(
            String::from_utf8(out2).unwrap(),
            "\x1b[?2026h\x1b[?2026l"
        );
    }

    #[test]
    fn test_only_changed_rows_repaint() {
        let mut presenter = FramePresenter::new();
        let mut out = Vec::new();
        presenter.present(&lines(&["a", "b", "c"]), &mut out).unwrap();

        let mut out2 = Vec::new();
        let n = presenter
            .present(&lines(&["a", "X", "c"]), &mut out2)
            .unwrap();
        assert_eq!(n, 1);
        let s = String::from_utf8(out2).unwrap();
        assert!(s.contains("\x1b[2;1H"));
        assert!(s.contains('X'));
        assert!(!s.contains("\x1b[1;1H"));
    }

    #[test]
    fn test_shrinking_frame_clears_extra_rows() {
        let mut presenter = FramePresenter::new();
        let mut out = Vec::new();
        presenter.present(&lines(&["a", "b", "c"]), &mut out).unwrap();

        let mut out2 = Vec::new();
        let n = presenter.present(&lines(&["a"]), &mut out2).unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn test_invalidate_forces_full_repaint() {
        let mut presenter = FramePresenter::new();
        let frame = lines(&["a", "b"]);
        let mut out = Vec::new();
        presenter.present(&frame, &mut out).unwrap();

        presenter.invalidate();
        let mut out2 = Vec::new();
        let n = presenter.present(&frame, &mut out2).unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn test_output_buffer_accumulates_and_flushes() {
        let mut buf = OutputBuffer::new();
        buf.write_str("hello");
        buf.write_str(" world");
        assert_eq!(buf.len(), 11);

        let mut sink = Vec::new();
        buf.flush_to(&mut sink).unwrap();
        assert_eq!(sink, b"hello world");
        assert!(buf.is_empty());
    }
}
