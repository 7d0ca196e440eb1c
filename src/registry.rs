//! Render invalidation state: per-node dirty flags and the rendered-line
//! cache.
//!
//! [`DirtyRegistry`] is the correctness mechanism: a node renders when its
//! own flag or its `children_dirty` flag is set, and lookups of ids the
//! registry has never seen report dirty (fail safe - worst case is a wasted
//! render, never a stale one). [`RenderCache`] is only a fast path on top:
//! entries are keyed by `(structural hash, width)` and consulted for clean
//! nodes; anything ambiguous misses.

use std::collections::HashMap;

use crate::node::{NodeArena, NodeId};

// =============================================================================
// Dirty registry
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct NodeState {
    dirty: bool,
    /// Some descendant is dirty; this node recomposes even if its own
    /// output is unchanged.
    children_dirty: bool,
    version: u64,
}

/// Tracks which nodes need re-rendering.
#[derive(Debug, Default)]
pub struct DirtyRegistry {
    states: HashMap<NodeId, NodeState>,
    version: u64,
    has_changes: bool,
}

impl DirtyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node for the current frame. Registered nodes start clean;
    /// first-frame output is forced by the cache starting empty, not by the
    /// dirty flag.
    pub fn register(&mut self, id: NodeId) {
        self.states.entry(id).or_default();
    }

    /// Mark `id` dirty and set `children_dirty` on every ancestor, so the
    /// path from the root down to `id` re-renders on the next frame.
    pub fn mark_dirty(&mut self, id: NodeId, arena: &NodeArena) {
        self.version += 1;
        self.has_changes = true;
        {
            let state = self.states.entry(id).or_default();
            state.dirty = true;
            state.version = self.version;
        }
        let mut current = arena.parent_of(id);
        while let Some(ancestor) = current {
            let state = self.states.entry(ancestor).or_default();
            if state.children_dirty {
                break; // the rest of the chain is already marked
            }
            state.children_dirty = true;
            current = arena.parent_of(ancestor);
        }
    }

    /// Whether `id` must re-render. Unknown ids are treated as dirty.
    pub fn needs_render(&self, id: NodeId) -> bool {
        match self.states.get(&id) {
            Some(state) => state.dirty || state.children_dirty,
            None => true,
        }
    }

    /// Clear both flags after `id` has been rendered.
    pub fn mark_clean(&mut self, id: NodeId) {
        if let Some(state) = self.states.get_mut(&id) {
            state.dirty = false;
            state.children_dirty = false;
        } else {
            self.states.insert(id, NodeState::default());
        }
    }

    /// Monotonic counter bumped on every `mark_dirty`.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether anything was dirtied since the last `clear_changes`.
    pub fn has_changes(&self) -> bool {
        self.has_changes
    }

    pub fn clear_changes(&mut self) {
        self.has_changes = false;
    }

    /// Drop all per-node state (new mount or test isolation).
    pub fn reset(&mut self) {
        self.states.clear();
        self.version = 0;
        self.has_changes = false;
    }
}

// =============================================================================
// Render cache
// =============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    lines: Vec<String>,
    last_access: u64,
}

/// Rendered-line cache keyed by `(structural hash, width)`.
///
/// Width is part of the key because the same node renders differently at
/// different widths (wrapping, truncation). When the cache overflows its
/// capacity, the oldest 20% of entries by last access are evicted in one
/// sweep.
#[derive(Debug)]
pub struct RenderCache {
    entries: HashMap<(u64, u16), CacheEntry>,
    capacity: usize,
    clock: u64,
    hits: u64,
    misses: u64,
}

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

impl Default for RenderCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up rendered lines. Bumps the entry's access time on hit.
    pub fn get(&mut self, hash: u64, width: u16) -> Option<&[String]> {
        self.clock += 1;
        let clock = self.clock;
        match self.entries.get_mut(&(hash, width)) {
            Some(entry) => {
                entry.last_access = clock;
                self.hits += 1;
                Some(entry.lines.as_slice())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store rendered lines, evicting the stalest 20% first if full.
    pub fn insert(&mut self, hash: u64, width: u16, lines: Vec<String>) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&(hash, width)) {
            self.evict_oldest();
        }
        self.clock += 1;
        self.entries.insert(
            (hash, width),
            CacheEntry {
                lines,
                last_access: self.clock,
            },
        );
    }

    fn evict_oldest(&mut self) {
        let evict_count = (self.capacity / 5).max(1);
        let mut by_age: Vec<((u64, u16), u64)> = self
            .entries
            .iter()
            .map(|(key, entry)| (*key, entry.last_access))
            .collect();
        by_age.sort_by_key(|&(_, last_access)| last_access);
        for (key, _) in by_age.into_iter().take(evict_count) {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since creation or the last reset.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.clock = 0;
        self.hits = 0;
        self.misses = 0;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{BoxProps, NodeArena, TextProps, VNode};

    fn three_level_arena() -> NodeArena {
        // 0 -> 1 -> 2
        let tree = VNode::boxed(
            BoxProps::default(),
            vec![VNode::boxed(
                BoxProps::default(),
                vec![VNode::text(TextProps::default(), "leaf")],
            )],
        );
        let mut arena = NodeArena::new();
        arena.build(&tree);
        arena
    }

    #[test]
    fn test_unknown_id_is_dirty() {
        let registry = DirtyRegistry::new();
        assert!(registry.needs_render(42));
    }

    #[test]
    fn test_registered_node_starts_clean() {
        let mut registry = DirtyRegistry::new();
        registry.register(0);
        assert!(!registry.needs_render(0));
    }

    #[test]
    fn test_mark_dirty_propagates_to_ancestors() {
        let arena = three_level_arena();
        let mut registry = DirtyRegistry::new();
        for id in 0..3 {
            registry.register(id);
        }

        registry.mark_dirty(2, &arena);

        // Leaf itself plus the full ancestor chain re-render.
        assert!(registry.needs_render(2));
        assert!(registry.needs_render(1));
        assert!(registry.needs_render(0));
        assert!(registry.has_changes());
    }

    #[test]
    fn test_mark_clean_clears_both_flags() {
        let arena = three_level_arena();
        let mut registry = DirtyRegistry::new();
        for id in 0..3 {
            registry.register(id);
        }
        registry.mark_dirty(2, &arena);

        registry.mark_clean(0);
        registry.mark_clean(1);
        registry.mark_clean(2);
        assert!(!registry.needs_render(0));
        assert!(!registry.needs_render(1));
        assert!(!registry.needs_render(2));
    }

    #[test]
    fn test_version_bumps_on_mark_dirty() {
        let arena = three_level_arena();
        let mut registry = DirtyRegistry::new();
        let v0 = registry.version();
        registry.mark_dirty(1, &arena);
        assert!(registry.version() > v0);
    }

    #[test]
    fn test_cache_hit_and_miss() {
        let mut cache = RenderCache::with_capacity(10);
        assert!(cache.get(1, 80).is_none());
        cache.insert(1, 80, vec!["line".to_string()]);
        assert_eq!(cache.get(1, 80), Some(&["line".to_string()][..]));
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn test_width_is_part_of_key() {
        let mut cache = RenderCache::with_capacity(10);
        cache.insert(1, 80, vec!["wide".to_string()]);
        assert!(cache.get(1, 40).is_none());
        assert!(cache.get(1, 80).is_some());
    }

    #[test]
    fn test_eviction_removes_oldest_fifth() {
        let mut cache = RenderCache::with_capacity(10);
        for hash in 0..10u64 {
            cache.insert(hash, 80, vec![]);
        }
        // Refresh 0 and 1 so hashes 2 and 3 are now the stalest.
        cache.get(0, 80);
        cache.get(1, 80);

        cache.insert(99, 80, vec![]);

        assert_eq!(cache.len(), 9); // 10 - 2 evicted + 1 inserted
        assert!(cache.get(0, 80).is_some());
        assert!(cache.get(1, 80).is_some());
        assert!(cache.get(2, 80).is_none());
        assert!(cache.get(3, 80).is_none());
        assert!(cache.get(99, 80).is_some());
    }

    #[test]
    fn test_reinsert_existing_key_does_not_evict() {
        let mut cache = RenderCache::with_capacity(4);
        for hash in 0..4u64 {
            cache.insert(hash, 80, vec![]);
        }
        cache.insert(0, 80, vec!["updated".to_string()]);
        assert_eq!(cache.len(), 4);
    }
}
