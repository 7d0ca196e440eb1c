//! Flexbox layout: resolves a VNode tree to per-node rects.
//!
//! Two passes. The measure pass walks bottom-up computing intrinsic sizes
//! (text from wrapped line metrics, boxes from children plus padding and
//! border). The place pass walks top-down distributing each container's
//! content box along its main axis: grow children absorb surplus, shrink
//! children give up deficit, and whatever is left feeds justify/align
//! offsets.
//!
//! Integer cells throughout. Proportional shares are floored and the
//! remainder handed out one cell at a time from the first eligible child, so
//! totals always sum exactly to the available space. All arithmetic
//! saturates: an impossibly small viewport degrades to zero-size rects.
//!
//! Node ids follow the same depth-first preorder as `NodeArena::build`, so a
//! `LayoutTree` indexes directly by `NodeId`.

pub mod text_measure;

use crate::node::{NodeId, VNode};
use crate::types::{AlignItems, Dimension, Edges, FlexDirection, JustifyContent, Rect};

use text_measure::{max_line_width, string_width, wrap_text};

// =============================================================================
// Layout tree
// =============================================================================

/// Resolved rects for one frame, indexed by preorder `NodeId`.
#[derive(Debug, Default)]
pub struct LayoutTree {
    rects: Vec<Rect>,
}

impl LayoutTree {
    /// Rect for a node; unknown ids report the zero rect.
    pub fn rect(&self, id: NodeId) -> Rect {
        self.rects.get(id as usize).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}

/// Lay out `root` inside `viewport`.
pub fn compute_layout(root: &VNode, viewport: Rect) -> LayoutTree {
    let mut counter: NodeId = 0;
    let measured = measure(root, &mut counter, viewport.width, viewport.height);

    let root_rect = Rect::new(
        viewport.x,
        viewport.y,
        root_extent(root, |p| p.width, viewport.width),
        root_extent(root, |p| p.height, viewport.height),
    );

    let mut rects = vec![Rect::default(); counter as usize];
    place(&measured, root_rect, &mut rects);
    LayoutTree { rects }
}

/// The root fills the viewport unless it asks for an explicit size.
fn root_extent(
    root: &VNode,
    dim: impl Fn(&crate::node::BoxProps) -> Dimension,
    viewport: u16,
) -> u16 {
    match root {
        VNode::Box { props, .. } if dim(props).is_set() => dim(props).resolve(viewport).min(viewport),
        _ => viewport,
    }
}

// =============================================================================
// Measure pass
// =============================================================================

struct Measured<'a> {
    node: &'a VNode,
    id: NodeId,
    width: u16,
    height: u16,
    children: Vec<Measured<'a>>,
}

fn node_margin(node: &VNode) -> Edges {
    match node {
        VNode::Box { props, .. } => props.margin,
        VNode::Text { .. } => Edges::ZERO,
    }
}

fn border_cells(node: &VNode) -> u16 {
    match node {
        VNode::Box { props, .. } if props.border.is_some() => 1,
        _ => 0,
    }
}

/// Intrinsic size of `node` given the parent's content box. Explicit and
/// percent dimensions resolve here; auto boxes size from children.
fn measure<'a>(node: &'a VNode, counter: &mut NodeId, avail_w: u16, avail_h: u16) -> Measured<'a> {
    let id = *counter;
    *counter += 1;

    match node {
        VNode::Text { props, content } => {
            let (width, height) = if props.wrap {
                let lines = wrap_text(content, avail_w);
                let w = lines.iter().map(|l| string_width(l)).max().unwrap_or(0);
                (w, lines.len().min(u16::MAX as usize) as u16)
            } else {
                (
                    max_line_width(content).min(avail_w),
                    content.split('\n').count().min(u16::MAX as usize) as u16,
                )
            };
            Measured {
                node,
                id,
                width: width.min(avail_w),
                height: height.min(avail_h.max(1)),
                children: Vec::new(),
            }
        }
        VNode::Box { props, children } => {
            let border = border_cells(node) * 2;
            let pad_w = props.padding.horizontal() + border;
            let pad_h = props.padding.vertical() + border;

            let explicit_w = props.width.is_set().then(|| props.width.resolve(avail_w));
            let explicit_h = props.height.is_set().then(|| props.height.resolve(avail_h));

            let content_w = explicit_w.unwrap_or(avail_w).saturating_sub(pad_w);
            let content_h = explicit_h.unwrap_or(avail_h).saturating_sub(pad_h);

            let measured: Vec<Measured<'a>> = children
                .iter()
                .map(|child| measure(child, counter, content_w, content_h))
                .collect();

            let is_row = props.direction.is_row();
            let mut main: u16 = 0;
            let mut cross: u16 = 0;
            for child in &measured {
                let margin = node_margin(child.node);
                let (outer_main, outer_cross) = if is_row {
                    (
                        child.width.saturating_add(margin.horizontal()),
                        child.height.saturating_add(margin.vertical()),
                    )
                } else {
                    (
                        child.height.saturating_add(margin.vertical()),
                        child.width.saturating_add(margin.horizontal()),
                    )
                };
                main = main.saturating_add(outer_main);
                cross = cross.max(outer_cross);
            }
            if !measured.is_empty() {
                main = main.saturating_add(props.gap.saturating_mul(measured.len() as u16 - 1));
            }

            let (intrinsic_w, intrinsic_h) = if is_row {
                (main.saturating_add(pad_w), cross.saturating_add(pad_h))
            } else {
                (cross.saturating_add(pad_w), main.saturating_add(pad_h))
            };

            Measured {
                node,
                id,
                width: explicit_w.unwrap_or(intrinsic_w).min(avail_w),
                height: explicit_h.unwrap_or(intrinsic_h).min(avail_h),
                children: measured,
            }
        }
    }
}

// =============================================================================
// Place pass
// =============================================================================

fn place(m: &Measured<'_>, rect: Rect, rects: &mut [Rect]) {
    if let Some(slot) = rects.get_mut(m.id as usize) {
        *slot = rect;
    }

    let VNode::Box { props, .. } = m.node else {
        return;
    };
    if m.children.is_empty() {
        return;
    }

    let border = border_cells(m.node);
    let content = Rect::new(
        rect.x.saturating_add(border).saturating_add(props.padding.left),
        rect.y.saturating_add(border).saturating_add(props.padding.top),
        rect.width
            .saturating_sub(props.padding.horizontal() + border * 2),
        rect.height
            .saturating_sub(props.padding.vertical() + border * 2),
    );

    let is_row = props.direction.is_row();
    let (main_avail, cross_avail) = if is_row {
        (content.width, content.height)
    } else {
        (content.height, content.width)
    };

    // Flex bases: the child's measured outer size along the main axis.
    let count = m.children.len();
    let mut outer_main: Vec<u16> = Vec::with_capacity(count);
    let mut margins_main: Vec<u16> = Vec::with_capacity(count);
    for child in &m.children {
        let margin = node_margin(child.node);
        let (size, mm) = if is_row {
            (child.width, margin.horizontal())
        } else {
            (child.height, margin.vertical())
        };
        outer_main.push(size.saturating_add(mm));
        margins_main.push(mm);
    }

    let gaps = props.gap.saturating_mul(count as u16 - 1);
    let total_basis: u16 = outer_main
        .iter()
        .fold(0u16, |acc, &s| acc.saturating_add(s))
        .saturating_add(gaps);

    let mut leftover: u16 = 0;
    if main_avail > total_basis {
        let extra = main_avail - total_basis;
        let grows: Vec<f32> = m.children.iter().map(|c| child_grow(c.node)).collect();
        let total_grow: f32 = grows.iter().sum();
        if total_grow > 0.0 {
            distribute(extra, &grows, &mut outer_main, true);
        } else {
            leftover = extra;
        }
    } else if total_basis > main_avail {
        let deficit = total_basis - main_avail;
        // Shrink weight is factor x basis, so big children give up more.
        let weights: Vec<f32> = m
            .children
            .iter()
            .zip(&outer_main)
            .map(|(c, &basis)| child_shrink(c.node) * basis as f32)
            .collect();
        distribute(deficit, &weights, &mut outer_main, false);
    }

    let (lead, between) = justify_spacing(props.justify, leftover, count as u16);

    let mut cursor: u16 = if is_row { content.x } else { content.y }.saturating_add(lead);

    for (i, child) in m.children.iter().enumerate() {
        let margin = node_margin(child.node);
        let inner_main = outer_main[i].saturating_sub(margins_main[i]);

        let (margins_cross, measured_cross) = if is_row {
            (margin.vertical(), child.height)
        } else {
            (margin.horizontal(), child.width)
        };
        let cross_room = cross_avail.saturating_sub(margins_cross);
        let cross_size = if stretches(child.node, props.align, is_row) {
            cross_room
        } else {
            measured_cross.min(cross_room)
        };
        let cross_offset = match props.align {
            AlignItems::Stretch | AlignItems::Start => 0,
            AlignItems::Center => cross_room.saturating_sub(cross_size) / 2,
            AlignItems::End => cross_room.saturating_sub(cross_size),
        };

        let child_rect = if is_row {
            Rect::new(
                cursor.saturating_add(margin.left),
                content
                    .y
                    .saturating_add(margin.top)
                    .saturating_add(cross_offset),
                inner_main,
                cross_size,
            )
        } else {
            Rect::new(
                content
                    .x
                    .saturating_add(margin.left)
                    .saturating_add(cross_offset),
                cursor.saturating_add(margin.top),
                cross_size,
                inner_main,
            )
        };

        place(child, child_rect, rects);

        cursor = cursor
            .saturating_add(outer_main[i])
            .saturating_add(props.gap)
            .saturating_add(between);
    }
}

fn child_grow(node: &VNode) -> f32 {
    match node {
        VNode::Box { props, .. } => props.flex_grow.max(0.0),
        VNode::Text { .. } => 0.0,
    }
}

fn child_shrink(node: &VNode) -> f32 {
    match node {
        VNode::Box { props, .. } => props.flex_shrink.max(0.0),
        VNode::Text { .. } => 1.0,
    }
}

fn stretches(node: &VNode, align: AlignItems, parent_is_row: bool) -> bool {
    if align != AlignItems::Stretch {
        return false;
    }
    match node {
        VNode::Box { props, .. } => {
            let cross_dim = if parent_is_row {
                props.height
            } else {
                props.width
            };
            !cross_dim.is_set()
        }
        // Text keeps its measured extent; stretching rows of text would
        // pad them with styled blanks for no benefit.
        VNode::Text { .. } => false,
    }
}

/// Split `amount` across `sizes` proportionally to `weights`, flooring each
/// share and handing the remainder out one cell at a time from the first
/// weighted entry. `add` selects growth vs shrinkage.
fn distribute(amount: u16, weights: &[f32], sizes: &mut [u16], add: bool) {
    let total: f32 = weights.iter().sum();
    if total <= 0.0 || amount == 0 {
        return;
    }

    let mut applied: u16 = 0;
    let mut shares: Vec<u16> = Vec::with_capacity(sizes.len());
    for &w in weights {
        let share = ((amount as f32) * w / total).floor() as u16;
        shares.push(share);
        applied = applied.saturating_add(share);
    }
    let mut remainder = amount.saturating_sub(applied);
    for (i, &w) in weights.iter().enumerate() {
        if remainder == 0 {
            break;
        }
        if w > 0.0 {
            shares[i] = shares[i].saturating_add(1);
            remainder -= 1;
        }
    }

    for (size, share) in sizes.iter_mut().zip(shares) {
        if add {
            *size = size.saturating_add(share);
        } else {
            *size = size.saturating_sub(share);
        }
    }
}

/// Leading offset and extra between-child spacing for a justify mode.
fn justify_spacing(justify: JustifyContent, leftover: u16, count: u16) -> (u16, u16) {
    if leftover == 0 || count == 0 {
        return (0, 0);
    }
    match justify {
        JustifyContent::Start => (0, 0),
        JustifyContent::Center => (leftover / 2, 0),
        JustifyContent::End => (leftover, 0),
        JustifyContent::SpaceBetween => {
            if count > 1 {
                (0, leftover / (count - 1))
            } else {
                (0, 0)
            }
        }
        JustifyContent::SpaceAround => {
            let per = leftover / count;
            (per / 2, per)
        }
        JustifyContent::SpaceEvenly => {
            let per = leftover / (count + 1);
            (per, per)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
