//! The explicit runtime context.
//!
//! Everything a mounted app needs lives here - arena, dirty registry, render
//! cache, focus, hit-testing, key routing, and the size/tick signals. No
//! process-wide globals: two contexts coexist without sharing state, and
//! tests get isolation through [`Context::reset`] or simply a fresh context.
//!
//! `Context` is a cheap `Rc` handle; clone it freely into closures.

use std::cell::{Cell, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use crate::input::focus::FocusManager;
use crate::input::hittest::{HitTestRegistry, Region};
use crate::input::router::{InputRouter, Priority, Propagation};
use crate::input::{KeyEvent, MouseEvent};
use crate::node::{NodeArena, NodeId};
use crate::registry::{DirtyRegistry, RenderCache};
use crate::signals::{signal, Disposable, Signal};

struct ContextInner {
    arena: RefCell<NodeArena>,
    dirty: RefCell<DirtyRegistry>,
    cache: RefCell<RenderCache>,
    focus: RefCell<FocusManager>,
    hits: RefCell<HitTestRegistry>,
    router: RefCell<InputRouter>,
    clicks: RefCell<HashMap<NodeId, Rc<dyn Fn(&MouseEvent)>>>,
    /// Previous frame's structural hash per node id, for change detection.
    prev_hashes: RefCell<HashMap<NodeId, u64>>,
    size: Signal<(u16, u16)>,
    tick: Signal<u64>,
    unicode: Cell<bool>,
}

#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::with_size((80, 24))
    }
}

impl Context {
    /// Context sized and capability-probed from the real terminal.
    pub fn new() -> Self {
        let ctx = Self::with_size(crate::terminal::detect_size());
        ctx.set_unicode(crate::terminal::supports_unicode());
        ctx
    }

    /// Context with a fixed viewport, Unicode on. The form tests use.
    pub fn with_size(size: (u16, u16)) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                arena: RefCell::new(NodeArena::new()),
                dirty: RefCell::new(DirtyRegistry::new()),
                cache: RefCell::new(RenderCache::new()),
                focus: RefCell::new(FocusManager::new()),
                hits: RefCell::new(HitTestRegistry::new()),
                router: RefCell::new(InputRouter::new()),
                clicks: RefCell::new(HashMap::new()),
                prev_hashes: RefCell::new(HashMap::new()),
                size: signal(size),
                tick: signal(0),
                unicode: Cell::new(true),
            }),
        }
    }

    pub fn arena(&self) -> RefMut<'_, NodeArena> {
        self.inner.arena.borrow_mut()
    }

    pub fn dirty(&self) -> RefMut<'_, DirtyRegistry> {
        self.inner.dirty.borrow_mut()
    }

    pub fn cache(&self) -> RefMut<'_, RenderCache> {
        self.inner.cache.borrow_mut()
    }

    pub fn focus(&self) -> RefMut<'_, FocusManager> {
        self.inner.focus.borrow_mut()
    }

    pub fn hits(&self) -> RefMut<'_, HitTestRegistry> {
        self.inner.hits.borrow_mut()
    }

    pub fn clicks(&self) -> RefMut<'_, HashMap<NodeId, Rc<dyn Fn(&MouseEvent)>>> {
        self.inner.clicks.borrow_mut()
    }

    pub fn prev_hashes(&self) -> RefMut<'_, HashMap<NodeId, u64>> {
        self.inner.prev_hashes.borrow_mut()
    }

    /// Terminal size signal; the scheduler keeps it current.
    pub fn size(&self) -> Signal<(u16, u16)> {
        self.inner.size.clone()
    }

    /// Animation tick signal; one batched write per scheduler interval.
    pub fn tick(&self) -> Signal<u64> {
        self.inner.tick.clone()
    }

    pub fn unicode(&self) -> bool {
        self.inner.unicode.get()
    }

    pub fn set_unicode(&self, unicode: bool) {
        self.inner.unicode.set(unicode);
    }

    /// Register a key handler; the returned [`Disposable`] unregisters it.
    pub fn on_key<F>(&self, priority: Priority, callback: F) -> Disposable
    where
        F: FnMut(&KeyEvent, &mut Propagation) -> bool + 'static,
    {
        let id = self.inner.router.borrow_mut().on_key(priority, callback);
        let ctx = self.clone();
        Disposable::new(move || ctx.inner.router.borrow_mut().unregister(id))
    }

    /// Route one key event through the priority tiers.
    pub fn dispatch_key(&self, event: &KeyEvent) -> bool {
        self.inner.router.borrow_mut().dispatch(event)
    }

    /// Topmost interactive region at a cell, if any.
    pub fn hit(&self, x: u16, y: u16) -> Option<Region> {
        self.inner.hits.borrow().hit(x, y)
    }

    /// Pointer callback registered for a node this frame.
    pub fn click_handler(&self, node: NodeId) -> Option<Rc<dyn Fn(&MouseEvent)>> {
        self.inner.clicks.borrow().get(&node).cloned()
    }

    /// Clear all per-mount state. Signals keep their handles but return to
    /// initial values.
    pub fn reset(&self) {
        self.inner.arena.borrow_mut().clear();
        self.inner.dirty.borrow_mut().reset();
        self.inner.cache.borrow_mut().reset();
        self.inner.focus.borrow_mut().reset();
        self.inner.hits.borrow_mut().clear();
        self.inner.router.borrow_mut().reset();
        self.inner.clicks.borrow_mut().clear();
        self.inner.prev_hashes.borrow_mut().clear();
        self.inner.tick.set(0);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Key;

    #[test]
    fn test_contexts_are_isolated() {
        let a = Context::with_size((80, 24));
        let b = Context::with_size((40, 10));

        a.focus().register_element("main");
        assert!(a.focus().current().is_some());
        assert!(b.focus().current().is_none());
        assert_ne!(a.size().get(), b.size().get());
    }

    #[test]
    fn test_on_key_disposable_unregisters() {
        let ctx = Context::with_size((80, 24));
        let d = ctx.on_key(Priority::Normal, |_, prop| {
            prop.stop_propagation();
            true
        });

        let event = KeyEvent::new(Key::Enter);
        assert!(ctx.dispatch_key(&event));

        d.dispose();
        assert!(!ctx.dispatch_key(&event));
    }

    #[test]
    fn test_reset_clears_state() {
        let ctx = Context::with_size((80, 24));
        ctx.focus().register_element("main");
        ctx.hits().register(0, crate::types::Rect::new(0, 0, 5, 5));
        ctx.tick().set(42);

        ctx.reset();

        assert!(ctx.focus().current().is_none());
        assert!(ctx.hit(1, 1).is_none());
        assert_eq!(ctx.tick().peek(), 0);
    }
}
