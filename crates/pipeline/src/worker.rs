//! Bounded handoff between the webhook receiver and the pipeline.
//!
//! The receiver must acknowledge within the provider's deadline, so it only
//! enqueues; a background worker drains the queue and spawns one task per
//! event. The channel bound is the only backpressure in the system: when the
//! queue is full the event is dropped and logged, never blocked on.

use std::sync::Arc;

use {
    tokio::{sync::mpsc, task::JoinHandle},
    tracing::{error, info, warn},
};

use chatline_common::InboundEvent;

use crate::orchestrator::{Pipeline, PipelineOutcome};

const QUEUE_DEPTH: usize = 256;

/// Cheap cloneable enqueue side of the worker queue.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<InboundEvent>,
}

impl PipelineHandle {
    /// Hand an event to the worker. Never blocks: a full or closed queue
    /// drops the event, which the provider will redeliver.
    pub fn enqueue(&self, event: InboundEvent) {
        if let Err(e) = self.tx.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(event) => {
                    warn!(from = %event.from, "pipeline queue full, dropping event");
                },
                mpsc::error::TrySendError::Closed(event) => {
                    error!(from = %event.from, "pipeline worker gone, dropping event");
                },
            }
        }
    }
}

/// Start the background worker. Events fan out into independent tasks, so a
/// slow completion call on one conversation never stalls another.
pub fn spawn_worker(pipeline: Pipeline) -> (PipelineHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<InboundEvent>(QUEUE_DEPTH);
    let pipeline = Arc::new(pipeline);

    let worker = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                match pipeline.handle_event(event).await {
                    Ok(PipelineOutcome::Completed { chat_id, delivered, .. }) => {
                        info!(chat_id, delivered, "event processed");
                    },
                    Ok(PipelineOutcome::Discarded | PipelineOutcome::Duplicate) => {},
                    Err(e) => {
                        error!(error = %e, "event processing failed");
                    },
                }
            });
        }
        info!("pipeline worker shutting down");
    });

    (PipelineHandle { tx }, worker)
}
