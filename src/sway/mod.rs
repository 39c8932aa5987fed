//! Sway backend: IPC transport, tree extraction, the [`Compositor`]
//! implementation and the event-driven task feed.
//!
//! [`Compositor`]: crate::traits::Compositor

pub mod compositor;
pub mod feed;
pub mod ipc;
pub mod tree;

pub use compositor::SwayCompositor;
