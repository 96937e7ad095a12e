//! Conversation history for the chat context
//!
//! A conversation is an append-only log of role-tagged messages. It starts
//! with exactly one system message and only ever grows at the tail; the
//! ordered log is what gets sent as context on every chat request.

pub mod store;

pub use store::{Conversation, Message, Role};
