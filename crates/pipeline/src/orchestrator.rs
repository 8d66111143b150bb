//! Per-event control flow: validate → dedup → resolve → persist inbound →
//! generate → persist reply → dispatch.

use std::sync::Arc;

use {async_trait::async_trait, tracing::{debug, info, warn}};

use {
    chatline_common::{InboundEvent, Role, Turn},
    chatline_completion::CompletionClient,
    chatline_dispatch::{Delivery, DispatchClient},
    chatline_store::Store,
};

use crate::{
    error::{Error, Result},
    identity,
};

/// Reply generation seam. Implementations must not fail: a degraded backend
/// yields a fallback string (see `chatline-completion`).
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Produce a reply to `latest`. `history` is the conversation oldest
    /// first including the latest human turn; it is empty when context could
    /// not be read.
    async fn generate(&self, latest: &str, history: &[Turn]) -> String;
}

#[async_trait]
impl ReplyGenerator for CompletionClient {
    async fn generate(&self, latest: &str, history: &[Turn]) -> String {
        if history.len() > 1 {
            self.reply_with_history(history).await
        } else {
            self.reply_to(latest).await
        }
    }
}

/// Outbound delivery seam.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_text(
        &self,
        to: &str,
        body: &str,
    ) -> std::result::Result<Delivery, chatline_dispatch::Error>;
}

#[async_trait]
impl ReplySender for DispatchClient {
    async fn send_text(
        &self,
        to: &str,
        body: &str,
    ) -> std::result::Result<Delivery, chatline_dispatch::Error> {
        DispatchClient::send_text(self, to, body).await
    }
}

/// Terminal state of one processed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Non-text kind or malformed payload; dropped without a trace.
    Discarded,
    /// Provider message id was already handled by an earlier delivery.
    Duplicate,
    /// Both turns are persisted; `delivered` records the dispatch attempt.
    Completed {
        chat_id: i64,
        delivered: bool,
        provider_id: Option<String>,
    },
}

/// The per-event orchestrator. Holds the store and the two stateless client
/// seams; one instance serves any number of concurrent events.
pub struct Pipeline {
    store: Store,
    completion: Arc<dyn ReplyGenerator>,
    dispatch: Arc<dyn ReplySender>,
    history_window: u32,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        store: Store,
        completion: Arc<dyn ReplyGenerator>,
        dispatch: Arc<dyn ReplySender>,
        history_window: u32,
    ) -> Self {
        Self {
            store,
            completion,
            dispatch,
            history_window,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Drive one inbound event to a terminal state.
    ///
    /// Errors are for the caller's log only; by the time this runs the
    /// transport has already acknowledged the event and nobody upstream can
    /// act on a failure.
    pub async fn handle_event(&self, event: InboundEvent) -> Result<PipelineOutcome> {
        // Received: only text events with a sender and a body enter the
        // pipeline. Everything else is dropped silently, not an error.
        if !event.kind.is_text() || event.from.trim().is_empty() || event.body.trim().is_empty() {
            debug!(kind = %event.kind, from = %event.from, "discarding unusable event");
            return Ok(PipelineOutcome::Discarded);
        }

        // At-least-once webhook delivery: skip provider message ids we have
        // already recorded. Events without an id are processed unconditionally.
        if let Some(ref provider_id) = event.provider_message_id {
            let fresh = self
                .store
                .mark_event_processed(provider_id)
                .await
                .map_err(Error::Dedup)?;
            if !fresh {
                info!(provider_id, from = %event.from, "skipping duplicate delivery");
                return Ok(PipelineOutcome::Duplicate);
            }
        }

        // Identity resolved.
        let identity = identity::resolve(&self.store, &event.from).await?;
        let (user, chat) = (identity.user, identity.chat);

        // Inbound persisted. Must land before the completion call so any
        // later turn reads a history that includes this one.
        self.store
            .append_message(chat.id, Some(user.id), &event.body, Role::Human)
            .await
            .map_err(Error::Persistence)?;

        // Reply generated. A failed history read degrades to single-turn
        // context rather than aborting; the generator itself never fails.
        let history = match self.store.history(chat.id, self.history_window).await {
            Ok(messages) => messages
                .into_iter()
                .map(|m| Turn::new(m.role, m.body))
                .collect(),
            Err(e) => {
                warn!(chat_id = chat.id, error = %e, "history read failed, replying without context");
                Vec::new()
            },
        };
        let reply = self.completion.generate(&event.body, &history).await;

        // Reply persisted, before dispatch: an undelivered-but-recorded reply
        // beats an inconsistent history.
        self.store
            .append_message(chat.id, None, &reply, Role::Ai)
            .await
            .map_err(Error::Persistence)?;

        // Dispatched. Terminal either way; steps above are never rolled back
        // and nothing is retried. A human operator can resend later.
        let delivery = match self.dispatch.send_text(&event.from, &reply).await {
            Ok(delivery) => delivery,
            Err(e) => {
                warn!(from = %event.from, error = %e, "dispatch misuse");
                Delivery {
                    delivered: false,
                    provider_id: None,
                    error: Some(e.to_string()),
                }
            },
        };

        if delivery.delivered {
            info!(
                chat_id = chat.id,
                from = %event.from,
                provider_id = delivery.provider_id.as_deref().unwrap_or("-"),
                "reply delivered"
            );
        } else {
            warn!(
                chat_id = chat.id,
                from = %event.from,
                error = delivery.error.as_deref().unwrap_or("unknown"),
                "reply generated but not delivered"
            );
        }

        Ok(PipelineOutcome::Completed {
            chat_id: chat.id,
            delivered: delivery.delivered,
            provider_id: delivery.provider_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chatline_common::EventKind;
    use chatline_completion::FALLBACK_REPLY;

    use super::*;

    /// Generator returning a fixed string, standing in for a healthy backend.
    struct FixedReply(&'static str);

    #[async_trait]
    impl ReplyGenerator for FixedReply {
        async fn generate(&self, _latest: &str, _history: &[Turn]) -> String {
            self.0.to_string()
        }
    }

    /// Generator standing in for a failing backend: the completion client
    /// masks failures with the fallback string, so that is what the
    /// pipeline observes.
    struct DegradedReply;

    #[async_trait]
    impl ReplyGenerator for DegradedReply {
        async fn generate(&self, _latest: &str, _history: &[Turn]) -> String {
            FALLBACK_REPLY.to_string()
        }
    }

    /// Sender that records every call and reports a configurable outcome.
    struct RecordingSender {
        delivered: bool,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSender {
        fn new(delivered: bool) -> Arc<Self> {
            Arc::new(Self {
                delivered,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplySender for RecordingSender {
        async fn send_text(
            &self,
            to: &str,
            body: &str,
        ) -> std::result::Result<Delivery, chatline_dispatch::Error> {
            self.calls
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            Ok(Delivery {
                delivered: self.delivered,
                provider_id: self.delivered.then(|| "wamid.out".to_string()),
                error: (!self.delivered).then(|| "API error: rejected".to_string()),
            })
        }
    }

    fn text_event(from: &str, body: &str, provider_id: Option<&str>) -> InboundEvent {
        InboundEvent {
            provider_message_id: provider_id.map(str::to_string),
            from: from.to_string(),
            sender_name: None,
            kind: EventKind::Text,
            body: body.to_string(),
        }
    }

    async fn pipeline_with(
        generator: Arc<dyn ReplyGenerator>,
        sender: Arc<dyn ReplySender>,
    ) -> Pipeline {
        let store = Store::connect_in_memory().await.unwrap();
        Pipeline::new(store, generator, sender, 20)
    }

    #[tokio::test]
    async fn test_end_to_end_new_address() {
        let sender = RecordingSender::new(true);
        let pipeline = pipeline_with(Arc::new(FixedReply("Hi, how can I help?")), sender.clone()).await;

        let outcome = pipeline
            .handle_event(text_event("+26657683501", "Hi", Some("wamid.in1")))
            .await
            .unwrap();

        let PipelineOutcome::Completed {
            chat_id,
            delivered,
            provider_id,
        } = outcome
        else {
            panic!("expected completion, got {outcome:?}");
        };
        assert!(delivered);
        assert_eq!(provider_id.as_deref(), Some("wamid.out"));

        // Exactly one user, one chat, two turns in order.
        let store = pipeline.store();
        assert_eq!(store.list_users(1, 10).await.unwrap().len(), 1);
        assert_eq!(store.list_chats(1, 10).await.unwrap().len(), 1);
        let history = store.history(chat_id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::Human);
        assert_eq!(history[0].body, "Hi");
        assert_eq!(history[1].role, Role::Ai);
        assert_eq!(history[1].body, "Hi, how can I help?");

        // One dispatch attempt, carrying the ai turn's body.
        assert_eq!(
            sender.calls(),
            vec![("+26657683501".to_string(), "Hi, how can I help?".to_string())]
        );
    }

    #[tokio::test]
    async fn test_degraded_completion_still_replies() {
        let sender = RecordingSender::new(true);
        let pipeline = pipeline_with(Arc::new(DegradedReply), sender.clone()).await;

        let outcome = pipeline
            .handle_event(text_event("+26657683501", "Hi", None))
            .await
            .unwrap();

        let PipelineOutcome::Completed { chat_id, .. } = outcome else {
            panic!("expected completion");
        };
        let history = pipeline.store().history(chat_id, 10).await.unwrap();
        assert_eq!(history[1].body, FALLBACK_REPLY);
        assert_eq!(sender.calls().len(), 1);
        assert_eq!(sender.calls()[0].1, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_dispatch_failure_keeps_history_and_does_not_retry() {
        let sender = RecordingSender::new(false);
        let pipeline = pipeline_with(Arc::new(FixedReply("reply")), sender.clone()).await;

        let outcome = pipeline
            .handle_event(text_event("+26657683501", "Hi", None))
            .await
            .unwrap();

        let PipelineOutcome::Completed {
            chat_id, delivered, ..
        } = outcome
        else {
            panic!("expected completion");
        };
        assert!(!delivered);

        // Both turns survive the failed delivery; exactly one attempt made.
        let history = pipeline.store().history(chat_id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(sender.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_non_text_event_leaves_no_trace() {
        let sender = RecordingSender::new(true);
        let pipeline = pipeline_with(Arc::new(FixedReply("reply")), sender.clone()).await;

        let event = InboundEvent {
            provider_message_id: Some("wamid.img".into()),
            from: "+26657683501".into(),
            sender_name: None,
            kind: EventKind::Other("image".into()),
            body: String::new(),
        };
        let outcome = pipeline.handle_event(event).await.unwrap();

        assert_eq!(outcome, PipelineOutcome::Discarded);
        assert!(pipeline.store().list_users(1, 10).await.unwrap().is_empty());
        assert!(sender.calls().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_skipped() {
        let sender = RecordingSender::new(true);
        let pipeline = pipeline_with(Arc::new(FixedReply("reply")), sender.clone()).await;

        let first = pipeline
            .handle_event(text_event("+26657683501", "Hi", Some("wamid.in1")))
            .await
            .unwrap();
        let PipelineOutcome::Completed { chat_id, .. } = first else {
            panic!("expected completion");
        };

        let second = pipeline
            .handle_event(text_event("+26657683501", "Hi", Some("wamid.in1")))
            .await
            .unwrap();
        assert_eq!(second, PipelineOutcome::Duplicate);

        // No extra turns, no extra dispatch.
        assert_eq!(pipeline.store().history(chat_id, 10).await.unwrap().len(), 2);
        assert_eq!(sender.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_second_turn_reuses_identity() {
        let sender = RecordingSender::new(true);
        let pipeline = pipeline_with(Arc::new(FixedReply("reply")), sender.clone()).await;

        pipeline
            .handle_event(text_event("+26657683501", "Hi", Some("wamid.1")))
            .await
            .unwrap();
        let outcome = pipeline
            .handle_event(text_event("+26657683501", "Are you open today?", Some("wamid.2")))
            .await
            .unwrap();

        let PipelineOutcome::Completed { chat_id, .. } = outcome else {
            panic!("expected completion");
        };
        let store = pipeline.store();
        assert_eq!(store.list_users(1, 10).await.unwrap().len(), 1);
        assert_eq!(store.list_chats(1, 10).await.unwrap().len(), 1);
        assert_eq!(store.history(chat_id, 10).await.unwrap().len(), 4);
    }
}
