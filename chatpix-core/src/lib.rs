//! Core types for chatpix
//!
//! This crate provides the conversation store, configuration loading and
//! logging setup shared by the provider, router and CLI crates.

pub mod config;
pub mod conversation;
pub mod error;
pub mod logging;
pub mod utils;

pub use conversation::{Conversation, Message, Role};
pub use error::{Error, Result};
