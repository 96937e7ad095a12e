//! Request routing for chatpix
//!
//! This crate decides whether a user submission is an image request or a
//! chat message, runs it against the matching provider and reports the
//! result as a typed [`Turn`].

pub mod intent;
pub mod router;
pub mod turn;

pub use intent::{classify, Intent};
pub use router::{ImageSettings, Router, RouterSettings};
pub use turn::{DisplayEvent, DisplayKind, FailureKind, Reply, Turn, TurnFailure};
