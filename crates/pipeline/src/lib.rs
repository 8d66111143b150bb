//! The message-processing pipeline: identity resolution, history persistence,
//! reply generation, and outbound dispatch for one inbound event.
//!
//! The webhook receiver acknowledges delivery before any of this runs; events
//! reach the pipeline through the mpsc handoff in [`worker`] and every
//! failure is converted into a logged outcome instead of propagating back to
//! the transport.

pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod worker;

pub use {
    error::{Error, Result},
    identity::{Identity, resolve},
    orchestrator::{Pipeline, PipelineOutcome, ReplyGenerator, ReplySender},
    worker::{PipelineHandle, spawn_worker},
};
