//! HTTP intake for WhatsApp Cloud API webhooks.
//!
//! Two endpoints: GET `/webhook` answers Meta's subscription handshake, POST
//! `/webhook` acknowledges immediately and hands normalized events to the
//! pipeline queue. Nothing in this crate touches the store or any outbound
//! API.

pub mod payload;
pub mod server;

pub use {
    payload::WebhookPayload,
    server::{AppState, EventSink, build_app, verify_webhook_subscription},
};
