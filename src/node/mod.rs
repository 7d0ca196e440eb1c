//! The per-frame UI description: virtual nodes, their props, and the arena
//! that assigns them stable integer ids.
//!
//! A [`VNode`] tree is rebuilt from scratch by the root component on every
//! render; nothing holds on to nodes across frames. Props are closed tagged
//! structs ([`BoxProps`], [`TextProps`]) so the renderer and layout engine
//! match exhaustively instead of probing string maps.
//!
//! [`NodeArena::build`] walks the tree depth-first, handing each node a
//! [`NodeId`] (preorder, root = 0) and computing its shallow structural hash.
//! The same tree shape always yields the same ids, which is what lets the
//! dirty registry and render cache correlate nodes across frames.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::input::MouseEvent;
use crate::types::{
    AlignItems, Attr, BorderStyle, Dimension, Edges, FlexDirection, JustifyContent, Rgba,
};

// =============================================================================
// Props
// =============================================================================

/// Border specification for a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Border {
    pub style: BorderStyle,
    pub color: Rgba,
}

impl Default for Border {
    fn default() -> Self {
        Self {
            style: BorderStyle::Single,
            color: Rgba::TERMINAL_DEFAULT,
        }
    }
}

/// Props for a layout box.
///
/// `on_click` is function-valued and therefore excluded from the structural
/// hash; everything else participates.
#[derive(Clone)]
pub struct BoxProps {
    /// Stable identity among siblings; feeds parent hashes.
    pub key: Option<String>,
    pub width: Dimension,
    pub height: Dimension,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub direction: FlexDirection,
    pub justify: JustifyContent,
    pub align: AlignItems,
    /// Cells between adjacent children on the main axis.
    pub gap: u16,
    pub padding: Edges,
    pub margin: Edges,
    pub border: Option<Border>,
    pub bg: Rgba,
    pub fg: Rgba,
    pub attrs: Attr,
    pub focusable: bool,
    /// Focus zone this box belongs to when focusable.
    pub focus_zone: Option<String>,
    pub on_click: Option<Rc<dyn Fn(&MouseEvent)>>,
}

impl Default for BoxProps {
    fn default() -> Self {
        Self {
            key: None,
            width: Dimension::Auto,
            height: Dimension::Auto,
            flex_grow: 0.0,
            flex_shrink: 1.0,
            direction: FlexDirection::Column,
            justify: JustifyContent::Start,
            align: AlignItems::Stretch,
            gap: 0,
            padding: Edges::ZERO,
            margin: Edges::ZERO,
            border: None,
            bg: Rgba::TRANSPARENT,
            fg: Rgba::TERMINAL_DEFAULT,
            attrs: Attr::NONE,
            focusable: false,
            focus_zone: None,
            on_click: None,
        }
    }
}

/// Props for a text run.
#[derive(Debug, Clone, PartialEq)]
pub struct TextProps {
    pub key: Option<String>,
    pub fg: Rgba,
    pub bg: Rgba,
    pub attrs: Attr,
    /// Wrap to the available width instead of clipping.
    pub wrap: bool,
}

impl Default for TextProps {
    fn default() -> Self {
        Self {
            key: None,
            fg: Rgba::TERMINAL_DEFAULT,
            bg: Rgba::TRANSPARENT,
            attrs: Attr::NONE,
            wrap: true,
        }
    }
}

// =============================================================================
// VNode
// =============================================================================

/// One node of the per-frame UI tree.
#[derive(Clone)]
pub enum VNode {
    Box {
        props: BoxProps,
        children: Vec<VNode>,
    },
    Text {
        props: TextProps,
        content: String,
    },
}

impl VNode {
    /// Convenience constructor for a box with children.
    pub fn boxed(props: BoxProps, children: Vec<VNode>) -> Self {
        VNode::Box { props, children }
    }

    /// Convenience constructor for a text run.
    pub fn text(props: TextProps, content: impl Into<String>) -> Self {
        VNode::Text {
            props,
            content: content.into(),
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            VNode::Box { props, .. } => props.key.as_deref(),
            VNode::Text { props, .. } => props.key.as_deref(),
        }
    }

    pub fn tag(&self) -> NodeTag {
        match self {
            VNode::Box { .. } => NodeTag::Box,
            VNode::Text { .. } => NodeTag::Text,
        }
    }

    pub fn children(&self) -> &[VNode] {
        match self {
            VNode::Box { children, .. } => children,
            VNode::Text { .. } => &[],
        }
    }
}

/// Node type discriminant, part of the structural hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    Box,
    Text,
}

// =============================================================================
// Structural hash
// =============================================================================

fn hash_f32<H: Hasher>(value: f32, state: &mut H) {
    value.to_bits().hash(state);
}

/// Shallow structural hash: the node's own non-function props plus each
/// child's `(tag, key)`. O(children) by construction; a change buried deeper
/// than one level does not alter this hash, which is why dirty flags (not the
/// hash) carry invalidation.
pub fn shallow_hash(node: &VNode) -> u64 {
    let mut state = DefaultHasher::new();
    match node {
        VNode::Box { props, children } => {
            NodeTag::Box.hash(&mut state);
            props.key.hash(&mut state);
            props.width_hash(&mut state);
            props.direction.hash(&mut state);
            props.justify.hash(&mut state);
            props.align.hash(&mut state);
            props.gap.hash(&mut state);
            props.padding.hash(&mut state);
            props.margin.hash(&mut state);
            props.border.hash(&mut state);
            props.bg.hash(&mut state);
            props.fg.hash(&mut state);
            props.attrs.hash(&mut state);
            props.focusable.hash(&mut state);
            props.focus_zone.hash(&mut state);
            children.len().hash(&mut state);
            for child in children {
                child.tag().hash(&mut state);
                child.key().hash(&mut state);
            }
        }
        VNode::Text { props, content } => {
            NodeTag::Text.hash(&mut state);
            props.key.hash(&mut state);
            props.fg.hash(&mut state);
            props.bg.hash(&mut state);
            props.attrs.hash(&mut state);
            props.wrap.hash(&mut state);
            content.hash(&mut state);
        }
    }
    state.finish()
}

impl BoxProps {
    /// Hash the dimension and flex fields (f32s via bit patterns).
    fn width_hash<H: Hasher>(&self, state: &mut H) {
        dimension_hash(self.width, state);
        dimension_hash(self.height, state);
        hash_f32(self.flex_grow, state);
        hash_f32(self.flex_shrink, state);
    }
}

fn dimension_hash<H: Hasher>(dim: Dimension, state: &mut H) {
    match dim {
        Dimension::Auto => 0u8.hash(state),
        Dimension::Cells(n) => {
            1u8.hash(state);
            n.hash(state);
        }
        Dimension::Percent(p) => {
            2u8.hash(state);
            hash_f32(p, state);
        }
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Stable per-frame node identifier (preorder position in the tree).
pub type NodeId = u32;

#[derive(Debug, Clone)]
pub struct NodeEntry {
    pub parent: Option<NodeId>,
    pub tag: NodeTag,
    pub hash: u64,
}

/// Assigns ids and structural hashes to one frame's tree.
///
/// Cleared and rebuilt every frame; ids are only meaningful for the frame
/// that produced them (cross-frame correlation happens through the dirty
/// registry and cache, which tolerate id reuse by failing safe).
#[derive(Debug, Default)]
pub struct NodeArena {
    entries: Vec<NodeEntry>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the previous frame's entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Walk `root` depth-first, assigning preorder ids. Returns the root id
    /// (always 0 for a freshly cleared arena).
    pub fn build(&mut self, root: &VNode) -> NodeId {
        self.assign(root, None)
    }

    fn assign(&mut self, node: &VNode, parent: Option<NodeId>) -> NodeId {
        let id = self.entries.len() as NodeId;
        self.entries.push(NodeEntry {
            parent,
            tag: node.tag(),
            hash: shallow_hash(node),
        });
        for child in node.children() {
            self.assign(child, Some(id));
        }
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeEntry> {
        self.entries.get(id as usize)
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.entries.get(id as usize).and_then(|e| e.parent)
    }

    pub fn hash_of(&self, id: NodeId) -> Option<u64> {
        self.entries.get(id as usize).map(|e| e.hash)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dimension;

    fn text(content: &str) -> VNode {
        VNode::text(TextProps::default(), content)
    }

    #[test]
    fn test_arena_assigns_preorder_ids() {
        // root -> (a -> (a1), b)
        let tree = VNode::boxed(
            BoxProps::default(),
            vec![
                VNode::boxed(BoxProps::default(), vec![text("a1")]),
                text("b"),
            ],
        );

        let mut arena = NodeArena::new();
        let root = arena.build(&tree);

        assert_eq!(root, 0);
        assert_eq!(arena.len(), 4);
        assert_eq!(arena.parent_of(0), None);
        assert_eq!(arena.parent_of(1), Some(0));
        assert_eq!(arena.parent_of(2), Some(1));
        assert_eq!(arena.parent_of(3), Some(0));
    }

    #[test]
    fn test_arena_clear_resets_ids() {
        let mut arena = NodeArena::new();
        arena.build(&text("x"));
        assert_eq!(arena.len(), 1);
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(arena.build(&text("y")), 0);
    }

    #[test]
    fn test_identical_trees_hash_equal() {
        let make = || {
            VNode::boxed(
                BoxProps {
                    width: Dimension::Cells(10),
                    ..Default::default()
                },
                vec![text("hello")],
            )
        };
        assert_eq!(shallow_hash(&make()), shallow_hash(&make()));
    }

    #[test]
    fn test_own_prop_change_alters_hash() {
        let base = VNode::boxed(BoxProps::default(), vec![]);
        let wider = VNode::boxed(
            BoxProps {
                width: Dimension::Cells(5),
                ..Default::default()
            },
            vec![],
        );
        assert_ne!(shallow_hash(&base), shallow_hash(&wider));
    }

    #[test]
    fn test_text_content_alters_hash() {
        assert_ne!(shallow_hash(&text("a")), shallow_hash(&text("b")));
    }

    #[test]
    fn test_hash_is_shallow() {
        // Grandchild content differs; the child's (tag, key) is unchanged,
        // so the root hash must not move.
        let make = |grandchild: &str| {
            VNode::boxed(
                BoxProps::default(),
                vec![VNode::boxed(BoxProps::default(), vec![text(grandchild)])],
            )
        };
        assert_eq!(shallow_hash(&make("one")), shallow_hash(&make("two")));
    }

    #[test]
    fn test_child_key_alters_hash() {
        let make = |key: &str| {
            VNode::boxed(
                BoxProps::default(),
                vec![VNode::boxed(
                    BoxProps {
                        key: Some(key.to_string()),
                        ..Default::default()
                    },
                    vec![],
                )],
            )
        };
        assert_ne!(shallow_hash(&make("a")), shallow_hash(&make("b")));
    }

    #[test]
    fn test_on_click_excluded_from_hash() {
        let plain = VNode::boxed(BoxProps::default(), vec![]);
        let clickable = VNode::boxed(
            BoxProps {
                on_click: Some(Rc::new(|_| {})),
                ..Default::default()
            },
            vec![],
        );
        assert_eq!(shallow_hash(&plain), shallow_hash(&clickable));
    }
}
