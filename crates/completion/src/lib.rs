//! OpenAI-compatible chat-completion client with a fallback reply.
//!
//! The pipeline must never stall on an unhealthy completion backend, so the
//! public surface returns a reply string unconditionally: on any transport or
//! provider failure the caller receives [`FALLBACK_REPLY`] instead of an
//! error.

pub mod client;

pub use client::{CompletionClient, CompletionConfig, FALLBACK_REPLY, SYSTEM_PROMPT};
