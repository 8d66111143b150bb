//! Shared types used across all chatline crates.

pub mod types;

pub use types::{EventKind, InboundEvent, Role, Turn};
