//! Cache-aware frame composition.
//!
//! Walks the VNode tree in the same preorder as the arena, rendering each
//! node to a block of styled lines (exactly `rect.width` visible columns,
//! `rect.height` rows) and splicing child blocks into the parent's block.
//!
//! Per node: if the dirty registry says the subtree is clean, a cached block
//! keyed by `(structural hash, width)` is reused and the whole subtree is
//! skipped. Dirty flags are the correctness mechanism; the hash/width key is
//! only a fast path, so a miss for any reason just renders.
//!
//! Splicing is escape-aware: columns are counted through SGR sequences, wide
//! glyphs cut at a seam become spaces, and the parent's style is re-applied
//! after each spliced run.

use unicode_width::UnicodeWidthChar;

use crate::layout::text_measure::{visible_width, wrap_text};
use crate::layout::LayoutTree;
use crate::node::{shallow_hash, BoxProps, NodeId, TextProps, VNode};
use crate::registry::{DirtyRegistry, RenderCache};
use crate::renderer::ansi::{style_seq, RESET};
use crate::renderer::charset::border_charset;
use crate::types::{Rect, Rgba};

// =============================================================================
// Escape-aware string surgery
// =============================================================================

/// Split a styled line at a column boundary. Escapes before the boundary go
/// left, escapes after go right. A wide glyph straddling the seam becomes
/// spaces on both sides.
pub(crate) fn split_at_col(s: &str, col: u16) -> (String, String) {
    let mut left = String::new();
    let mut right = String::new();
    let mut seen: u16 = 0;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            let mut seq = String::new();
            seq.push(c);
            if chars.peek() == Some(&'[') {
                chars.next();
                seq.push('[');
                while let Some(&n) = chars.peek() {
                    chars.next();
                    seq.push(n);
                    if ('\x40'..='\x7e').contains(&n) {
                        break;
                    }
                }
            }
            if seen < col {
                left.push_str(&seq);
            } else {
                right.push_str(&seq);
            }
            continue;
        }

        let w = UnicodeWidthChar::width(c).unwrap_or(0) as u16;
        if seen >= col {
            right.push(c);
        } else if seen + w <= col {
            left.push(c);
            seen += w;
        } else {
            // Wide glyph across the seam.
            for _ in 0..(col - seen) {
                left.push(' ');
            }
            for _ in 0..(seen + w - col) {
                right.push(' ');
            }
            seen = col;
        }
    }
    (left, right)
}

/// Truncate or pad a line to exactly `width` visible columns.
pub(crate) fn fit_to_width(s: &str, width: u16) -> String {
    let (mut line, _) = split_at_col(s, width);
    let w = visible_width(&line);
    if w < width {
        line.push_str(&" ".repeat((width - w) as usize));
    }
    line
}

/// Splice `overlay` (occupying `overlay_width` columns) into `base` at
/// column `at`. `restore` re-establishes the base style for the tail.
pub(crate) fn overlay_line(
    base: &str,
    overlay: &str,
    at: u16,
    overlay_width: u16,
    restore: &str,
) -> String {
    let (left, _) = split_at_col(base, at);
    let (_, right) = split_at_col(base, at.saturating_add(overlay_width));
    format!("{left}{RESET}{overlay}{restore}{right}")
}

fn node_count(node: &VNode) -> NodeId {
    1 + node.children().iter().map(node_count).sum::<NodeId>()
}

// =============================================================================
// Composer
// =============================================================================

struct Composer<'a> {
    layout: &'a LayoutTree,
    dirty: &'a mut DirtyRegistry,
    cache: &'a mut RenderCache,
    unicode: bool,
}

impl Composer<'_> {
    fn render(&mut self, node: &VNode, counter: &mut NodeId, parent_bg: Rgba) -> Vec<String> {
        let id = *counter;
        *counter += 1;

        let rect = self.layout.rect(id);
        if rect.is_empty() {
            *counter += node_count(node) - 1;
            self.dirty.mark_clean(id);
            return Vec::new();
        }

        let hash = shallow_hash(node);
        if !self.dirty.needs_render(id) {
            if let Some(lines) = self.cache.get(hash, rect.width) {
                if lines.len() == rect.height as usize {
                    let lines = lines.to_vec();
                    *counter += node_count(node) - 1;
                    return lines;
                }
            }
        }

        let lines = match node {
            VNode::Text { props, content } => self.render_text(props, content, rect, parent_bg),
            VNode::Box { props, children } => {
                self.render_box(props, children, counter, rect, parent_bg)
            }
        };
        self.dirty.mark_clean(id);
        self.cache.insert(hash, rect.width, lines.clone());
        lines
    }

    fn render_text(
        &mut self,
        props: &TextProps,
        content: &str,
        rect: Rect,
        parent_bg: Rgba,
    ) -> Vec<String> {
        let bg = Rgba::blend(props.bg, parent_bg);
        let fg = Rgba::blend(props.fg, bg);
        let prefix = style_seq(fg, bg, props.attrs);

        let raw: Vec<String> = if props.wrap {
            wrap_text(content, rect.width)
        } else {
            content.split('\n').map(String::from).collect()
        };

        (0..rect.height)
            .map(|i| {
                let body = raw.get(i as usize).map(String::as_str).unwrap_or("");
                format!("{prefix}{}{RESET}", fit_to_width(body, rect.width))
            })
            .collect()
    }

    fn render_box(
        &mut self,
        props: &BoxProps,
        children: &[VNode],
        counter: &mut NodeId,
        rect: Rect,
        parent_bg: Rgba,
    ) -> Vec<String> {
        let bg = Rgba::blend(props.bg, parent_bg);
        let fg = Rgba::blend(props.fg, bg);
        let interior = style_seq(fg, bg, props.attrs);
        let w = rect.width as usize;

        let mut lines: Vec<String> = Vec::with_capacity(rect.height as usize);
        match props.border {
            Some(border) if rect.width >= 2 && rect.height >= 2 => {
                let cs = border_charset(border.style, self.unicode);
                let edge = style_seq(Rgba::blend(border.color, bg), bg, props.attrs);
                let horiz: String = std::iter::repeat(cs.horizontal).take(w - 2).collect();
                lines.push(format!(
                    "{edge}{}{horiz}{}{RESET}",
                    cs.top_left, cs.top_right
                ));
                let blanks = " ".repeat(w - 2);
                for _ in 1..rect.height - 1 {
                    lines.push(format!(
                        "{edge}{}{interior}{blanks}{edge}{}{RESET}",
                        cs.vertical, cs.vertical
                    ));
                }
                lines.push(format!(
                    "{edge}{}{horiz}{}{RESET}",
                    cs.bottom_left, cs.bottom_right
                ));
            }
            _ => {
                let blanks = " ".repeat(w);
                for _ in 0..rect.height {
                    lines.push(format!("{interior}{blanks}{RESET}"));
                }
            }
        }

        for child in children {
            let child_id = *counter;
            let child_rect = self.layout.rect(child_id);
            let child_lines = self.render(child, counter, bg);
            if child_rect.is_empty() || child_lines.is_empty() {
                continue;
            }

            let rel_x = child_rect.x.saturating_sub(rect.x);
            let rel_y = child_rect.y.saturating_sub(rect.y);
            if rel_x >= rect.width {
                continue;
            }
            let avail = rect.width - rel_x;
            let clip_w = child_rect.width.min(avail);

            for (i, child_line) in child_lines.iter().enumerate() {
                let row = rel_y as usize + i;
                if row >= lines.len() {
                    break;
                }
                let content = if child_rect.width > avail {
                    let (clipped, _) = split_at_col(child_line, avail);
                    format!("{clipped}{RESET}")
                } else {
                    child_line.clone()
                };
                lines[row] = overlay_line(&lines[row], &content, rel_x, clip_w, &interior);
            }
        }

        lines
    }
}

/// Compose the full frame for `root` laid out in `viewport`.
pub fn compose_frame(
    root: &VNode,
    layout: &LayoutTree,
    dirty: &mut DirtyRegistry,
    cache: &mut RenderCache,
    viewport: Rect,
    unicode: bool,
) -> Vec<String> {
    let mut composer = Composer {
        layout,
        dirty,
        cache,
        unicode,
    };
    let mut counter: NodeId = 0;
    let root_lines = composer.render(root, &mut counter, Rgba::TERMINAL_DEFAULT);
    let root_rect = layout.rect(0);

    let blank = " ".repeat(viewport.width as usize);
    let mut frame: Vec<String> = (0..viewport.height).map(|_| blank.clone()).collect();

    let rel_x = root_rect.x.saturating_sub(viewport.x);
    let rel_y = root_rect.y.saturating_sub(viewport.y);
    for (i, line) in root_lines.iter().enumerate() {
        let row = rel_y as usize + i;
        if row >= frame.len() {
            break;
        }
        frame[row] = overlay_line(&frame[row], line, rel_x, root_rect.width, "");
    }
    frame
}

// =============================================================================
// Tests
// =============================================================================
