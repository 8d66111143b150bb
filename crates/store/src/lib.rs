//! Durable conversation storage on SQLite.
//!
//! One `User` row per sender address, one active `Chat` per user for inbound
//! routing, append-only `Message` turns, and a processed-event table guarding
//! against duplicate webhook deliveries. Migrations are embedded and run at
//! connect time.

pub mod entities;
pub mod error;
pub mod store;

pub use {
    entities::{Chat, Message, User},
    error::{Error, Result},
    store::Store,
};
