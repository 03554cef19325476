//! Hook system: named, priority-ordered chains of value transformers.

pub mod definitions;
pub mod handler;
pub mod pipeline;

pub use definitions::StandardHook;
pub use handler::{FnHook, HookHandler};
pub use pipeline::{HookOptions, HookPipeline};
