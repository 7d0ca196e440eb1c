//! Rendering: ANSI emission, border charsets, cache-aware composition, and
//! the diffing frame presenter.

pub mod ansi;
pub mod charset;
pub mod compose;
pub mod frame;
pub mod scrollbar;
