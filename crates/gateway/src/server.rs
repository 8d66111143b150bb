//! Webhook HTTP surface: subscription verification and event intake.

use std::sync::Arc;

use {
    axum::{
        Router,
        body::Bytes,
        extract::{Query, State},
        http::StatusCode,
        response::{IntoResponse, Json},
        routing::get,
    },
    serde::Deserialize,
    serde_json::json,
    tower_http::trace::TraceLayer,
    tracing::{info, warn},
};

use {chatline_common::InboundEvent, chatline_pipeline::PipelineHandle};

use crate::payload::WebhookPayload;

/// Where normalized events go after the HTTP acknowledgement. The production
/// sink is the pipeline worker queue; tests substitute a recorder.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: InboundEvent);
}

impl EventSink for PipelineHandle {
    fn deliver(&self, event: InboundEvent) {
        self.enqueue(event);
    }
}

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub sink: Arc<dyn EventSink>,
    pub verify_token: String,
}

/// Build the webhook router (shared between production startup and tests).
pub fn build_app(sink: Arc<dyn EventSink>, verify_token: impl Into<String>) -> Router {
    let state = AppState {
        sink,
        verify_token: verify_token.into(),
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", get(verify_handler).post(receive_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// ── Subscription verification ────────────────────────────────────────────────

/// Meta sends `hub.mode=subscribe`, `hub.verify_token=<configured token>` and
/// `hub.challenge=<random string>`; echoing the challenge completes the
/// subscription handshake.
#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Returns `Some(challenge)` if verification succeeds.
pub fn verify_webhook_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: &str,
) -> Option<String> {
    let mode = mode?;
    let token = token?;
    let challenge = challenge?;

    if mode == "subscribe" && token == expected_token {
        Some(challenge.to_string())
    } else {
        None
    }
}

async fn verify_handler(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    match verify_webhook_subscription(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
        &state.verify_token,
    ) {
        Some(challenge) => {
            info!("webhook subscription verified");
            (StatusCode::OK, challenge)
        },
        None => {
            warn!("webhook verification rejected");
            (StatusCode::FORBIDDEN, String::new())
        },
    }
}

// ── Event intake ─────────────────────────────────────────────────────────────

/// Always acknowledges with 200. The provider retries on anything else, and a
/// payload we cannot parse today will not parse on redelivery either; real
/// processing failures are the pipeline's to log.
async fn receive_handler(State(state): State<AppState>, body: Bytes) -> StatusCode {
    match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) => {
            for event in payload.into_events() {
                state.sink.deliver(event);
            }
        },
        Err(e) => {
            warn!(error = %e, "unparseable webhook body");
        },
    }
    StatusCode::OK
}
