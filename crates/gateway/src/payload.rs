//! WhatsApp Cloud API webhook payload types and their normalization into
//! provider-neutral events.

use std::collections::HashMap;

use {serde::Deserialize, tracing::debug};

use chatline_common::{EventKind, InboundEvent};

/// Top-level webhook body. Every field the pipeline does not consume is
/// optional or defaulted so that payload evolution on Meta's side never turns
/// into a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: String,
    pub value: WebhookValue,
}

#[derive(Debug, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messaging_product: String,
    pub metadata: Option<WebhookMetadata>,
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub display_phone_number: String,
    #[serde(default)]
    pub phone_number_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookContact {
    #[serde(default)]
    pub wa_id: String,
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Deserialize)]
pub struct ContactProfile {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, rename = "type")]
    pub message_type: String,
    pub text: Option<MessageText>,
}

#[derive(Debug, Deserialize)]
pub struct MessageText {
    #[serde(default)]
    pub body: String,
}

impl WebhookMessage {
    pub fn text_body(&self) -> Option<String> {
        self.text.as_ref().map(|t| t.body.clone())
    }
}

impl WebhookPayload {
    /// Flatten the nested entry/changes/messages structure into events the
    /// pipeline understands. Changes for fields other than `messages` (status
    /// updates, template quality signals) are skipped here; messages of
    /// non-text types pass through so the pipeline can count the discard.
    pub fn into_events(self) -> Vec<InboundEvent> {
        let mut events = Vec::new();

        for entry in self.entry {
            for change in entry.changes {
                if change.field != "messages" {
                    debug!(field = %change.field, "ignoring non-message webhook change");
                    continue;
                }

                let value = change.value;
                let contacts: HashMap<String, String> = value
                    .contacts
                    .iter()
                    .filter_map(|c| {
                        c.profile
                            .as_ref()
                            .map(|p| (c.wa_id.clone(), p.name.clone()))
                    })
                    .collect();

                for msg in value.messages {
                    let body = msg.text_body().unwrap_or_default();
                    events.push(InboundEvent {
                        provider_message_id: (!msg.id.is_empty()).then(|| msg.id.clone()),
                        sender_name: contacts.get(&msg.from).cloned(),
                        kind: EventKind::from_provider(&msg.message_type),
                        from: msg.from,
                        body,
                    });
                }
            }
        }

        events
    }
}
