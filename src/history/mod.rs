//! Message history as a tree.
//!
//! Chats are stored as a flat list of turns, but the client works on a tree:
//! each node knows its parent and its ordered children, so a regenerated reply
//! can sit next to the original instead of replacing it. [`build_history`]
//! turns the flat list into that tree; the methods in [`tree`] grow and walk it.

pub mod builder;
pub mod ids;
pub mod tree;

pub use builder::build_history;
pub use ids::{IdGenerator, SequentialIds, UuidIds};
pub use tree::HistoryError;
