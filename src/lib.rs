//! ember-tui: a reactive terminal UI runtime.
//!
//! Fine-grained signals drive a per-frame virtual node tree through flexbox
//! layout, a cache-aware ANSI compositor, and a line-diffing presenter;
//! keyboard and mouse input route back into the signal graph through
//! priority dispatch, focus zones, and hit-testing.
//!
//! # Example
//!
//! ```no_run
//! use ember_tui::{run, signal, BoxProps, Context, TextProps, VNode};
//!
//! let ctx = Context::new();
//! let count = signal(0);
//! let count_read = count.clone();
//! run(&ctx, move || {
//!     VNode::boxed(
//!         BoxProps::default(),
//!         vec![VNode::text(
//!             TextProps::default(),
//!             format!("count: {}", count_read.get()),
//!         )],
//!     )
//! })
//! .unwrap();
//! ```

pub mod input;
pub mod layout;
pub mod node;
pub mod registry;
pub mod renderer;
pub mod runtime;
pub mod signals;
pub mod terminal;
pub mod types;

pub use input::router::{Priority, Propagation};
pub use input::{Event, Key, KeyEvent, Modifiers, MouseButton, MouseEvent, MouseEventKind};
pub use layout::{compute_layout, LayoutTree};
pub use node::{shallow_hash, Border, BoxProps, NodeArena, NodeId, TextProps, VNode};
pub use registry::{DirtyRegistry, RenderCache};
pub use runtime::context::Context;
pub use runtime::scheduler::{mount, render_frame, render_to_string, run, EventLoop, MountHandle};
pub use signals::{
    batch, effect, memo, signal, untrack, Cleanup, Disposable, Memo, Signal,
};
pub use types::{
    AlignItems, Attr, BorderStyle, Dimension, Edges, FlexDirection, JustifyContent, Rect, Rgba,
};
