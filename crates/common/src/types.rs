use serde::{Deserialize, Serialize};

/// Author tag for one turn in a chat history: the human sender or the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Ai => "ai",
        }
    }

    /// Parse the stored tag. Unknown tags fall back to `Human` so a corrupted
    /// row never takes down a history read.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "ai" => Self::Ai,
            _ => Self::Human,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload kind of an inbound event. Only `Text` is processed; everything
/// else is dropped by the pipeline without a trace in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Text,
    /// Any other provider message type (image, audio, reaction, ...), kept
    /// verbatim for logging.
    Other(String),
}

impl EventKind {
    #[must_use]
    pub fn from_provider(kind: &str) -> Self {
        match kind {
            "text" => Self::Text,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

/// One normalized inbound message event, as handed from the webhook receiver
/// to the pipeline.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Provider-assigned message id, used for duplicate-delivery detection.
    pub provider_message_id: Option<String>,
    /// Sender address (phone number in international format).
    pub from: String,
    /// Display name from the provider contact record, if any.
    pub sender_name: Option<String>,
    pub kind: EventKind,
    pub body: String,
}

/// One turn handed to the completion backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    #[must_use]
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(Role::from_tag(Role::Human.as_str()), Role::Human);
        assert_eq!(Role::from_tag(Role::Ai.as_str()), Role::Ai);
    }

    #[test]
    fn test_role_unknown_tag_defaults_to_human() {
        assert_eq!(Role::from_tag("bot"), Role::Human);
        assert_eq!(Role::from_tag(""), Role::Human);
    }

    #[test]
    fn test_event_kind_from_provider() {
        assert!(EventKind::from_provider("text").is_text());
        assert!(!EventKind::from_provider("image").is_text());
        assert_eq!(EventKind::from_provider("image").to_string(), "image");
    }
}
