//! The render scheduler and event loop.
//!
//! [`mount`] wraps the root component in a single effect: every flush that
//! touches a signal the component read rebuilds the tree, recomputes layout,
//! refreshes hit regions, composes the frame, and presents the diff - one
//! coherent frame per flush, never a partial one.
//!
//! Change detection between frames compares each node's structural hash with
//! the previous frame's at the same id; a mismatch marks the node dirty
//! (propagating `children_dirty` up), so unchanged subtrees resolve straight
//! from the render cache.
//!
//! The event loop polls the stdin reader thread, feeds the parser, routes
//! keys through the priority tiers, hit-tests mouse events (interpolating
//! drags so hover targets see every cell), and owns the animation timer:
//! one batched tick-signal write per interval.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::input::hittest::{interpolate_drag, HitTestRegistry};
use crate::input::parser::InputParser;
use crate::input::reader::{StdinMessage, StdinReader};
use crate::input::router::Priority;
use crate::input::{Event, Key, Modifiers, MouseEvent, MouseEventKind};
use crate::layout::{compute_layout, LayoutTree};
use crate::node::{NodeArena, NodeId, VNode};
use crate::registry::{DirtyRegistry, RenderCache};
use crate::renderer::ansi;
use crate::renderer::compose::compose_frame;
use crate::renderer::frame::FramePresenter;
use crate::runtime::context::Context;
use crate::signals::{batch, effect, Disposable};
use crate::types::Rect;

/// Animation tick and input poll cadence (~60 fps).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Segments interpolated between consecutive drag positions.
pub const DEFAULT_DRAG_STEPS: u16 = 4;

// =============================================================================
// Frame pipeline
// =============================================================================

/// Run the full pipeline once: rebuild, diff against the previous frame's
/// hashes, lay out, refresh hit regions, compose.
pub fn render_frame(ctx: &Context, root: &dyn Fn() -> VNode) -> Vec<String> {
    let (width, height) = ctx.size().get();
    let viewport = Rect::new(0, 0, width, height);
    let tree = root();

    {
        let mut arena = ctx.arena();
        arena.clear();
        arena.build(&tree);
        let mut dirty = ctx.dirty();
        let mut prev = ctx.prev_hashes();
        let len = arena.len() as NodeId;
        prev.retain(|&id, _| id < len);
        for id in 0..len {
            dirty.register(id);
            let hash = arena.hash_of(id).unwrap_or(0);
            if prev.get(&id) != Some(&hash) {
                dirty.mark_dirty(id, &arena);
                prev.insert(id, hash);
            }
        }
    }

    let layout = compute_layout(&tree, viewport);

    {
        let mut hits = ctx.hits();
        let mut clicks = ctx.clicks();
        hits.clear();
        clicks.clear();
        let mut counter: NodeId = 0;
        collect_interactive(&tree, &mut counter, &layout, &mut hits, &mut clicks);
    }

    let mut dirty = ctx.dirty();
    let mut cache = ctx.cache();
    compose_frame(&tree, &layout, &mut dirty, &mut cache, viewport, ctx.unicode())
}

fn collect_interactive(
    node: &VNode,
    counter: &mut NodeId,
    layout: &LayoutTree,
    hits: &mut HitTestRegistry,
    clicks: &mut HashMap<NodeId, Rc<dyn Fn(&MouseEvent)>>,
) {
    let id = *counter;
    *counter += 1;
    if let VNode::Box { props, children } = node {
        if props.focusable || props.on_click.is_some() {
            let rect = layout.rect(id);
            if !rect.is_empty() {
                hits.register(id, rect);
            }
        }
        if let Some(callback) = &props.on_click {
            clicks.insert(id, callback.clone());
        }
        for child in children {
            collect_interactive(child, counter, layout, hits, clicks);
        }
    }
}

/// Render a tree once into a plain string, one row per line. For snapshot
/// tests and offline rendering; no terminal involved.
pub fn render_to_string(root: &VNode, width: u16, height: u16) -> String {
    let viewport = Rect::new(0, 0, width, height);
    let mut arena = NodeArena::new();
    arena.build(root);
    let mut dirty = DirtyRegistry::new();
    let mut cache = RenderCache::new();
    let layout = compute_layout(root, viewport);
    let lines = compose_frame(root, &layout, &mut dirty, &mut cache, viewport, true);
    lines.join("\n")
}

// =============================================================================
// Mount
// =============================================================================

/// A mounted app. Dropping the handle restores the terminal; [`exit`]
/// (idempotent) does so deterministically.
///
/// [`exit`]: MountHandle::exit
pub struct MountHandle {
    running: Rc<Cell<bool>>,
    disposables: Vec<Disposable>,
    on_exit: Vec<Box<dyn FnOnce()>>,
    raw_mode: bool,
    exited: bool,
}

impl MountHandle {
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Ask the event loop to wind down after the current iteration.
    pub fn request_exit(&self) {
        self.running.set(false);
    }

    /// Run `callback` when the mount exits.
    pub fn on_exit(&mut self, callback: impl FnOnce() + 'static) {
        self.on_exit.push(Box::new(callback));
    }

    /// Stop the render effect, restore the terminal, and run exit
    /// callbacks. Safe to call more than once; only the first call acts.
    ///
    /// Teardown is best-effort: a failing stdout write never skips raw-mode
    /// restoration or the exit callbacks. The first error is reported after
    /// every step has been attempted.
    pub fn exit(&mut self) -> io::Result<()> {
        if self.exited {
            return Ok(());
        }
        self.exited = true;
        self.running.set(false);
        for disposable in self.disposables.drain(..) {
            disposable.dispose();
        }
        let mut result = Ok(());
        if self.raw_mode {
            result = restore_terminal(&mut io::stdout());
            let raw = crate::terminal::exit_raw_mode();
            if result.is_ok() {
                result = raw;
            }
        }
        for callback in self.on_exit.drain(..) {
            callback();
        }
        result
    }
}

/// Emit the teardown escapes, attempting every step even after a failure
/// and reporting the first error.
fn restore_terminal<W: Write>(out: &mut W) -> io::Result<()> {
    let steps: [fn(&mut W) -> io::Result<()>; 5] = [
        ansi::mouse_disable,
        ansi::bracketed_paste_disable,
        ansi::focus_reporting_disable,
        ansi::alt_screen_exit,
        ansi::cursor_show,
    ];
    let mut result = Ok(());
    for step in steps {
        let step_result = step(out);
        if result.is_ok() {
            result = step_result;
        }
    }
    let flushed = out.flush();
    if result.is_ok() {
        result = flushed;
    }
    result
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        let _ = self.exit();
    }
}

/// Mount `root` on `ctx`: set up the terminal, install the default key
/// handlers (Ctrl+C exits at critical priority; Tab / Shift+Tab move focus
/// at normal priority), and start the render effect.
pub fn mount<F>(ctx: &Context, root: F) -> io::Result<MountHandle>
where
    F: Fn() -> VNode + 'static,
{
    let raw_mode = crate::terminal::enter_raw_mode()?;
    if raw_mode {
        let mut out = io::stdout();
        ansi::alt_screen_enter(&mut out)?;
        ansi::cursor_hide(&mut out)?;
        ansi::clear_screen(&mut out)?;
        ansi::mouse_enable(&mut out)?;
        ansi::bracketed_paste_enable(&mut out)?;
        ansi::focus_reporting_enable(&mut out)?;
        out.flush()?;
        ctx.size().set(crate::terminal::detect_size());
        ctx.set_unicode(crate::terminal::supports_unicode());
    }

    let running = Rc::new(Cell::new(true));
    let mut disposables = Vec::new();

    let running_key = running.clone();
    disposables.push(ctx.on_key(Priority::Critical, move |event, propagation| {
        if event.key == Key::Char('c') && event.modifiers.contains(Modifiers::CTRL) {
            running_key.set(false);
            propagation.stop_propagation();
            return true;
        }
        false
    }));

    let ctx_focus = ctx.clone();
    disposables.push(ctx.on_key(Priority::Normal, move |event, propagation| {
        if event.key == Key::Tab {
            // Resolve the target first so the focus manager borrow is
            // released before the signal write flushes the render effect.
            let (target, focused) = {
                let focus = ctx_focus.focus();
                let target = if event.modifiers.contains(Modifiers::SHIFT) {
                    focus.previous_target()
                } else {
                    focus.next_target()
                };
                (target, focus.focused())
            };
            if let Some(target) = target {
                focused.set(Some(target));
            }
            propagation.stop_propagation();
            return true;
        }
        false
    }));

    let presenter = Rc::new(RefCell::new(FramePresenter::new()));
    let ctx_render = ctx.clone();
    let running_render = running.clone();
    disposables.push(effect(move || {
        let frame = render_frame(&ctx_render, &root);
        let mut out = io::stdout().lock();
        if presenter.borrow_mut().present(&frame, &mut out).is_err() {
            running_render.set(false);
        }
    }));

    Ok(MountHandle {
        running,
        disposables,
        on_exit: Vec::new(),
        raw_mode,
        exited: false,
    })
}

// =============================================================================
// Event loop
// =============================================================================

/// Deliver one mouse event: hit-test and invoke the target's pointer
/// callback. Drags interpolate from the previous position so every cell
/// along the path is visited.
pub fn dispatch_mouse(
    ctx: &Context,
    event: MouseEvent,
    last: Option<(u16, u16)>,
    drag_steps: u16,
) {
    if event.kind == MouseEventKind::Drag {
        let from = last.unwrap_or((event.x, event.y));
        for (x, y) in interpolate_drag(from, (event.x, event.y), drag_steps) {
            deliver_mouse_at(ctx, MouseEvent { x, y, ..event });
        }
    } else {
        deliver_mouse_at(ctx, event);
    }
}

fn deliver_mouse_at(ctx: &Context, event: MouseEvent) {
    if let Some(region) = ctx.hit(event.x, event.y) {
        if let Some(callback) = ctx.click_handler(region.node) {
            callback(&event);
        }
    }
}

/// Drives input, timers, and resize detection for a mounted app.
pub struct EventLoop {
    reader: StdinReader,
    parser: InputParser,
    last_mouse: Option<(u16, u16)>,
    drag_steps: u16,
    tick_interval: Duration,
    last_tick: Instant,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::with_tick_interval(DEFAULT_TICK_INTERVAL)
    }

    pub fn with_tick_interval(tick_interval: Duration) -> Self {
        Self {
            reader: StdinReader::spawn(),
            parser: InputParser::new(),
            last_mouse: None,
            drag_steps: DEFAULT_DRAG_STEPS,
            tick_interval,
            last_tick: Instant::now(),
        }
    }

    /// One loop iteration: wait up to `poll` for input, deliver whatever
    /// decoded, then service the animation timer and resize check.
    pub fn pump(&mut self, ctx: &Context, handle: &MountHandle, poll: Duration) -> io::Result<()> {
        match self.reader.recv_timeout(poll) {
            Some(StdinMessage::Data(bytes)) => {
                let events = self.parser.feed(&bytes);
                self.deliver(ctx, events);
            }
            Some(StdinMessage::Closed) => handle.request_exit(),
            None => {
                // Input lull: a pending lone ESC is the Escape key.
                let events = self.parser.flush_pending();
                self.deliver(ctx, events);
            }
        }
        while let Some(message) = self.reader.try_recv() {
            match message {
                StdinMessage::Data(bytes) => {
                    let events = self.parser.feed(&bytes);
                    self.deliver(ctx, events);
                }
                StdinMessage::Closed => handle.request_exit(),
            }
        }

        if self.last_tick.elapsed() >= self.tick_interval {
            self.last_tick = Instant::now();
            let tick = ctx.tick();
            batch(|| tick.update(|t| t + 1));
        }

        let size = crate::terminal::detect_size();
        if size != ctx.size().peek() {
            ctx.size().set(size);
        }
        Ok(())
    }

    fn deliver(&mut self, ctx: &Context, events: Vec<Event>) {
        for event in events {
            match event {
                Event::Key(key) => {
                    ctx.dispatch_key(&key);
                }
                Event::Mouse(mouse) => {
                    dispatch_mouse(ctx, mouse, self.last_mouse, self.drag_steps);
                    self.last_mouse = Some((mouse.x, mouse.y));
                }
                // Paste and terminal-focus reports have no default routing.
                Event::Paste(_) | Event::FocusGained | Event::FocusLost => {}
            }
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Mount `root` and block until exit is requested (Ctrl+C, stdin close, or
/// [`MountHandle::request_exit`]). Restores the terminal before returning.
pub fn run<F>(ctx: &Context, root: F) -> io::Result<()>
where
    F: Fn() -> VNode + 'static,
{
    let mut handle = mount(ctx, root)?;
    let mut events = EventLoop::new();
    while handle.is_running() {
        events.pump(ctx, &handle, DEFAULT_TICK_INTERVAL)?;
    }
    handle.exit()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::MouseButton;
    use crate::node::{BoxProps, TextProps};
    use crate::signals::signal;
    use crate::types::Dimension;

    fn plain(s: &str) -> String {
        let mut out = String::new();
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\x1b' {
                if chars.peek() == Some(&'[') {
                    chars.next();
                    for n in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&n) {
                            break;
                        }
                    }
                }
                continue;
            }
            out.push(c);
        }
        out
    }

    #[test]
    fn test_render_to_string() {
        let tree = VNode::boxed(
            BoxProps::default(),
            vec![VNode::text(TextProps::default(), "hello")],
        );
        let out = render_to_string(&tree, 8, 2);
        let rows: Vec<String> = out.split('\n').map(|l| plain(l)).collect();
        assert_eq!(rows, vec!["hello   ", "        "]);
    }

    #[test]
    fn test_second_frame_is_cache_hit() {
        let ctx = Context::with_size((20, 4));
        let root = || {
            VNode::boxed(
                BoxProps::default(),
                vec![VNode::text(TextProps::default(), "static")],
            )
        };

        let first = render_frame(&ctx, &root);
        let (hits_before, _) = ctx.cache().stats();
        let second = render_frame(&ctx, &root);
        let (hits_after, _) = ctx.cache().stats();

        assert_eq!(first, second);
        assert!(hits_after > hits_before);
    }

    #[test]
    fn test_signal_change_updates_frame() {
        let ctx = Context::with_size((12, 1));
        let label = signal("one".to_string());
        let label_read = label.clone();
        let root = move || {
            VNode::boxed(
                BoxProps::default(),
                vec![VNode::text(TextProps::default(), label_read.get())],
            )
        };

        let first = render_frame(&ctx, &root);
        assert_eq!(plain(&first[0]), "one         ");

        label.set("two".to_string());
        let second = render_frame(&ctx, &root);
        assert_eq!(plain(&second[0]), "two         ");
    }

    #[test]
    fn test_click_reaches_handler() {
        use std::cell::Cell;

        let ctx = Context::with_size((20, 5));
        let clicks = Rc::new(Cell::new(0));
        let clicks_cb = clicks.clone();
        let root = move || {
            let clicks_inner = clicks_cb.clone();
            VNode::boxed(
                BoxProps {
                    width: Dimension::Cells(10),
                    height: Dimension::Cells(3),
                    on_click: Some(Rc::new(move |_| {
                        clicks_inner.set(clicks_inner.get() + 1);
                    })),
                    ..Default::default()
                },
                vec![],
            )
        };

        render_frame(&ctx, &root);

        let down = MouseEvent {
            kind: MouseEventKind::Down,
            button: MouseButton::Left,
            x: 5,
            y: 1,
            modifiers: Modifiers::empty(),
        };
        dispatch_mouse(&ctx, down, None, DEFAULT_DRAG_STEPS);
        assert_eq!(clicks.get(), 1);

        // Outside the box: no handler fires.
        let miss = MouseEvent { x: 15, y: 4, ..down };
        dispatch_mouse(&ctx, miss, None, DEFAULT_DRAG_STEPS);
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn test_drag_interpolates_across_cells() {
        use std::cell::RefCell;

        let ctx = Context::with_size((20, 5));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_cb = seen.clone();
        let root = move || {
            let seen_inner = seen_cb.clone();
            VNode::boxed(
                BoxProps {
                    width: Dimension::Cells(20),
                    height: Dimension::Cells(5),
                    on_click: Some(Rc::new(move |e: &MouseEvent| {
                        seen_inner.borrow_mut().push((e.x, e.y));
                    })),
                    ..Default::default()
                },
                vec![],
            )
        };

        render_frame(&ctx, &root);

        let drag = MouseEvent {
            kind: MouseEventKind::Drag,
            button: MouseButton::Left,
            x: 4,
            y: 0,
            modifiers: Modifiers::empty(),
        };
        dispatch_mouse(&ctx, drag, Some((0, 0)), 4);

        assert_eq!(*seen.borrow(), vec![(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]);
    }

    struct FailingWriter {
        attempts: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            self.attempts += 1;
            Err(io::Error::other("stdout gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_restore_attempts_every_step_after_write_failure() {
        let mut out = FailingWriter { attempts: 0 };
        assert!(restore_terminal(&mut out).is_err());
        // Mouse, paste, focus-report, alt-screen, cursor.
        assert_eq!(out.attempts, 5);
    }

    #[test]
    fn test_exit_runs_callbacks_exactly_once() {
        use std::cell::Cell;

        let fired = Rc::new(Cell::new(0));
        let fired_c = fired.clone();
        let mut handle = MountHandle {
            running: Rc::new(Cell::new(true)),
            disposables: Vec::new(),
            on_exit: Vec::new(),
            raw_mode: false,
            exited: false,
        };
        handle.on_exit(move || fired_c.set(fired_c.get() + 1));

        handle.exit().unwrap();
        assert!(!handle.is_running());
        assert_eq!(fired.get(), 1);

        handle.exit().unwrap();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_focusable_box_registers_hit_region() {
        let ctx = Context::with_size((10, 3));
        let root = || {
            VNode::boxed(
                BoxProps {
                    focusable: true,
                    width: Dimension::Cells(4),
                    height: Dimension::Cells(2),
                    ..Default::default()
                },
                vec![],
            )
        };
        render_frame(&ctx, &root);
        assert!(ctx.hit(1, 1).is_some());
        assert!(ctx.hit(8, 2).is_none());
    }
}
