//! Fine-grained reactive primitives: signals, memos, effects.
//!
//! The runtime is single-threaded and thread-local. Reading a signal inside a
//! running effect records that effect as a subscriber; writing a changed value
//! schedules every subscriber at most once per flush. Outside a [`batch`] each
//! write flushes immediately; inside one, a single flush happens when the
//! outermost batch closure returns.
//!
//! Memos are lazy: a dependency change only marks them stale (and notifies
//! their readers); recomputation happens on the next [`Memo::get`]. This keeps
//! the recompute count bounded by the dependency-change count.
//!
//! Effects may return a [`Cleanup`] closure, invoked before the next re-run
//! and on disposal. Every registration returns a [`Disposable`] that the owner
//! invokes deterministically on teardown.
//!
//! Cycles (an effect writing a signal it depends on) are not detected; the
//! caller must avoid them.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::rc::{Rc, Weak};

// =============================================================================
// Public handle types
// =============================================================================

/// Teardown closure returned by an effect body.
pub type Cleanup = Box<dyn FnOnce()>;

/// Handle for deterministic teardown of a registration.
///
/// Dropping a `Disposable` without calling [`dispose`](Self::dispose) leaves
/// the registration alive; teardown only happens explicitly.
pub struct Disposable(Option<Box<dyn FnOnce()>>);

impl Disposable {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// A disposable that does nothing.
    pub fn empty() -> Self {
        Self(None)
    }

    /// Tear down the registration. Idempotent by construction (consumes self).
    pub fn dispose(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

// =============================================================================
// Runtime
// =============================================================================

type ObserverId = usize;

/// A value source observers can unsubscribe from (signal or memo).
trait Source {
    fn unsubscribe(&self, observer: ObserverId);
}

/// Staleness receiver for memo observers.
trait MemoNode {
    fn invalidate(&self);
}

enum ObserverAction {
    Effect(Box<dyn FnMut() -> Option<Cleanup>>),
    Memo(Weak<dyn MemoNode>),
}

struct Observer {
    /// Taken out while the effect body runs, put back afterwards.
    action: Option<ObserverAction>,
    cleanup: Option<Cleanup>,
    /// Sources subscribed to during the last run; rebuilt every run.
    sources: Vec<Weak<dyn Source>>,
}

#[derive(Default)]
struct Runtime {
    observers: Vec<Option<Observer>>,
    free: Vec<ObserverId>,
    current: Option<ObserverId>,
    pending: VecDeque<ObserverId>,
    queued: HashSet<ObserverId>,
    batch_depth: usize,
    flushing: bool,
}

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::default());
}

fn alloc_observer(action: ObserverAction) -> ObserverId {
    RUNTIME.with(|rt| {
        let mut rt = rt.borrow_mut();
        let observer = Observer {
            action: Some(action),
            cleanup: None,
            sources: Vec::new(),
        };
        if let Some(id) = rt.free.pop() {
            rt.observers[id] = Some(observer);
            id
        } else {
            rt.observers.push(Some(observer));
            rt.observers.len() - 1
        }
    })
}

fn dispose_observer(id: ObserverId) {
    let removed = RUNTIME.with(|rt| {
        let mut rt = rt.borrow_mut();
        rt.queued.remove(&id);
        let slot = rt.observers.get_mut(id).and_then(|slot| slot.take());
        if slot.is_some() {
            rt.free.push(id);
        }
        slot
    });
    if let Some(observer) = removed {
        if let Some(cleanup) = observer.cleanup {
            cleanup();
        }
        for source in &observer.sources {
            if let Some(source) = source.upgrade() {
                source.unsubscribe(id);
            }
        }
    }
}

fn current_observer() -> Option<ObserverId> {
    RUNTIME.with(|rt| rt.borrow().current)
}

/// Record a read: subscribe the current observer (if any) to `subscribers`
/// and remember the source for unsubscription on the observer's next run.
fn track_read(source: &Rc<dyn Source>, subscribers: &RefCell<Vec<ObserverId>>) {
    let Some(current) = current_observer() else {
        return;
    };
    {
        let mut subs = subscribers.borrow_mut();
        if !subs.contains(&current) {
            subs.push(current);
        }
    }
    RUNTIME.with(|rt| {
        let mut rt = rt.borrow_mut();
        if let Some(Some(observer)) = rt.observers.get_mut(current) {
            let weak = Rc::downgrade(source);
            if !observer.sources.iter().any(|s| s.ptr_eq(&weak)) {
                observer.sources.push(weak);
            }
        }
    });
}

/// Schedule subscribers of a changed source.
///
/// Memo observers are invalidated synchronously (staleness is pushed through
/// the graph before any effect runs); effect observers are queued, deduped,
/// for the next flush.
fn schedule(ids: &[ObserverId]) {
    let mut memos: Vec<Weak<dyn MemoNode>> = Vec::new();
    RUNTIME.with(|rt| {
        let mut rt = rt.borrow_mut();
        for &id in ids {
            match rt.observers.get(id) {
                Some(Some(observer)) => {
                    if let Some(ObserverAction::Memo(node)) = &observer.action {
                        memos.push(node.clone());
                    } else if rt.queued.insert(id) {
                        rt.pending.push_back(id);
                    }
                }
                _ => {}
            }
        }
    });
    for node in memos {
        if let Some(node) = node.upgrade() {
            node.invalidate();
        }
    }
    maybe_flush();
}

fn maybe_flush() {
    let ready = RUNTIME.with(|rt| {
        let rt = rt.borrow();
        rt.batch_depth == 0 && !rt.flushing && !rt.pending.is_empty()
    });
    if ready {
        flush();
    }
}

/// Run every queued effect exactly once, in scheduling (= subscription) order.
/// Writes performed by running effects extend the same flush.
fn flush() {
    RUNTIME.with(|rt| rt.borrow_mut().flushing = true);
    loop {
        let next = RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            loop {
                match rt.pending.pop_front() {
                    None => return None,
                    // Entries disposed after queueing are skipped.
                    Some(id) if rt.queued.remove(&id) => return Some(id),
                    Some(_) => continue,
                }
            }
        });
        match next {
            Some(id) => run_observer(id),
            None => break,
        }
    }
    RUNTIME.with(|rt| rt.borrow_mut().flushing = false);
}

fn clear_sources(id: ObserverId) {
    let sources = RUNTIME.with(|rt| {
        let mut rt = rt.borrow_mut();
        match rt.observers.get_mut(id) {
            Some(Some(observer)) => std::mem::take(&mut observer.sources),
            _ => Vec::new(),
        }
    });
    for source in &sources {
        if let Some(source) = source.upgrade() {
            source.unsubscribe(id);
        }
    }
}

fn with_observer<R>(id: ObserverId, f: impl FnOnce() -> R) -> R {
    let prev = RUNTIME.with(|rt| {
        let mut rt = rt.borrow_mut();
        std::mem::replace(&mut rt.current, Some(id))
    });
    let out = f();
    RUNTIME.with(|rt| rt.borrow_mut().current = prev);
    out
}

fn run_observer(id: ObserverId) {
    let (action, cleanup) = match RUNTIME.with(|rt| {
        let mut rt = rt.borrow_mut();
        match rt.observers.get_mut(id) {
            Some(Some(observer)) => Some((observer.action.take(), observer.cleanup.take())),
            _ => None,
        }
    }) {
        Some(parts) => parts,
        None => return,
    };

    if let Some(cleanup) = cleanup {
        cleanup();
    }
    clear_sources(id);

    match action {
        Some(ObserverAction::Effect(mut f)) => {
            let next_cleanup = with_observer(id, || f());
            RUNTIME.with(|rt| {
                let mut rt = rt.borrow_mut();
                if let Some(Some(observer)) = rt.observers.get_mut(id) {
                    observer.action = Some(ObserverAction::Effect(f));
                    observer.cleanup = next_cleanup;
                }
            });
        }
        Some(ObserverAction::Memo(node)) => {
            RUNTIME.with(|rt| {
                let mut rt = rt.borrow_mut();
                if let Some(Some(observer)) = rt.observers.get_mut(id) {
                    observer.action = Some(ObserverAction::Memo(node.clone()));
                }
            });
            if let Some(node) = node.upgrade() {
                node.invalidate();
            }
        }
        None => {}
    }
}

// =============================================================================
// Signal
// =============================================================================

struct SignalInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    subscribers: RefCell<Vec<ObserverId>>,
}

impl<T: 'static> Source for SignalInner<T> {
    fn unsubscribe(&self, observer: ObserverId) {
        self.subscribers.borrow_mut().retain(|&id| id != observer);
    }
}

/// A reactive storage cell. Cloning shares the same cell.
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Create a signal holding `initial`.
pub fn signal<T: Clone + PartialEq + 'static>(initial: T) -> Signal<T> {
    Signal {
        inner: Rc::new(SignalInner {
            value: RefCell::new(initial),
            version: Cell::new(0),
            subscribers: RefCell::new(Vec::new()),
        }),
    }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    /// Read the value. Inside a running effect this subscribes the effect.
    pub fn get(&self) -> T {
        let source: Rc<dyn Source> = self.inner.clone();
        track_read(&source, &self.inner.subscribers);
        self.inner.value.borrow().clone()
    }

    /// Read without tracking.
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Write a new value. No-op (no notification) when equal to the current
    /// value; otherwise bumps the version and schedules subscribers.
    pub fn set(&self, value: T) {
        let changed = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        };
        if changed {
            self.inner.version.set(self.inner.version.get() + 1);
            let subscribers = self.inner.subscribers.borrow().clone();
            schedule(&subscribers);
        }
    }

    /// Write through an updater reading the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = {
            let current = self.inner.value.borrow();
            f(&current)
        };
        self.set(next);
    }

    /// Monotonic change counter.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }
}

// =============================================================================
// Effect
// =============================================================================

/// Adapter so effect bodies can return nothing, a [`Cleanup`], or an
/// `Option<Cleanup>`.
pub trait EffectResult {
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl EffectResult for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl EffectResult for Cleanup {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(self)
    }
}

impl EffectResult for Option<Cleanup> {
    fn into_cleanup(self) -> Option<Cleanup> {
        self
    }
}

/// Create an effect. Runs `f` once synchronously (establishing its initial
/// dependencies), then again on every flush that includes it. A cleanup
/// returned by `f` runs before the next re-run and on disposal.
pub fn effect<F, R>(mut f: F) -> Disposable
where
    F: FnMut() -> R + 'static,
    R: EffectResult + 'static,
{
    let id = alloc_observer(ObserverAction::Effect(Box::new(move || {
        f().into_cleanup()
    })));
    run_observer(id);
    Disposable::new(move || dispose_observer(id))
}

// =============================================================================
// Batch / untrack
// =============================================================================

/// Defer flushing until `f` returns: N writes inside produce at most one run
/// per affected effect.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    RUNTIME.with(|rt| rt.borrow_mut().batch_depth += 1);
    let out = f();
    RUNTIME.with(|rt| rt.borrow_mut().batch_depth -= 1);
    maybe_flush();
    out
}

/// Run `f` with dependency tracking suspended: signal reads inside do not
/// subscribe the current effect.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let prev = RUNTIME.with(|rt| rt.borrow_mut().current.take());
    let out = f();
    RUNTIME.with(|rt| rt.borrow_mut().current = prev);
    out
}

// =============================================================================
// Memo
// =============================================================================

struct MemoInner<T> {
    compute: RefCell<Box<dyn FnMut() -> T>>,
    value: RefCell<Option<T>>,
    stale: Cell<bool>,
    version: Cell<u64>,
    observer: Cell<ObserverId>,
    subscribers: RefCell<Vec<ObserverId>>,
}

impl<T: 'static> Source for MemoInner<T> {
    fn unsubscribe(&self, observer: ObserverId) {
        self.subscribers.borrow_mut().retain(|&id| id != observer);
    }
}

impl<T: 'static> MemoNode for MemoInner<T> {
    fn invalidate(&self) {
        // First invalidation since the last recompute propagates; repeats
        // are no-ops until the memo is read again.
        if !self.stale.replace(true) {
            let subscribers = self.subscribers.borrow().clone();
            schedule(&subscribers);
        }
    }
}

impl<T: Clone + PartialEq + 'static> MemoInner<T> {
    fn recompute(&self) -> T {
        clear_sources(self.observer.get());
        let next = with_observer(self.observer.get(), || (self.compute.borrow_mut())());
        self.stale.set(false);
        let changed = match &*self.value.borrow() {
            Some(old) => *old != next,
            None => true,
        };
        if changed {
            self.version.set(self.version.get() + 1);
            *self.value.borrow_mut() = Some(next.clone());
        }
        next
    }
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        dispose_observer(self.observer.get());
    }
}

/// A lazily recomputed derived value. Cloning shares the same cell.
pub struct Memo<T> {
    inner: Rc<MemoInner<T>>,
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Create a memo over a pure derivation.
pub fn memo<T, F>(f: F) -> Memo<T>
where
    T: Clone + PartialEq + 'static,
    F: FnMut() -> T + 'static,
{
    let inner = Rc::new(MemoInner {
        compute: RefCell::new(Box::new(f)),
        value: RefCell::new(None),
        stale: Cell::new(true),
        version: Cell::new(0),
        observer: Cell::new(usize::MAX),
        subscribers: RefCell::new(Vec::new()),
    });
    let node = Rc::downgrade(&inner) as Weak<dyn MemoNode>;
    let id = alloc_observer(ObserverAction::Memo(node));
    inner.observer.set(id);
    Memo { inner }
}

impl<T: Clone + PartialEq + 'static> Memo<T> {
    /// Read the value, recomputing first if a dependency changed since the
    /// last read. Inside a running effect this subscribes the effect.
    pub fn get(&self) -> T {
        let source: Rc<dyn Source> = self.inner.clone();
        track_read(&source, &self.inner.subscribers);
        if self.inner.stale.get() {
            return self.inner.recompute();
        }
        let cached = self.inner.value.borrow().clone();
        match cached {
            Some(value) => value,
            None => self.inner.recompute(),
        }
    }

    /// Monotonic counter of distinct value changes.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }
}

// =============================================================================
// Tests
// =============================================================================
