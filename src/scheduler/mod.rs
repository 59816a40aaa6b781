//! Cooperative scheduling for the orchestrator
//!
//! All delayed work runs on a single [`Timeline`] that is advanced explicitly.
//! Every task carries a [`ScopeStamp`]; bumping the matching epoch in
//! [`Epochs`] invalidates all tasks registered against the old value.

pub mod timeline;

pub use timeline::{DueTask, Epochs, ScopeStamp, TaskScope, TaskToken, Timeline};
