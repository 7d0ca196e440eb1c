//! Runtime glue: the context object owning all per-mount state, and the
//! scheduler driving the render loop.

pub mod context;
pub mod scheduler;
