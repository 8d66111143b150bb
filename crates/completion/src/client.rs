use {
    serde::{Deserialize, Serialize},
    tracing::warn,
};

use chatline_common::{Role, Turn};

/// Fixed system instruction sent with every request.
pub const SYSTEM_PROMPT: &str = "You are a helpful customer service assistant for WhatsApp. \
     Keep your responses concise, friendly, and helpful. Respond in a \
     conversational tone suitable for messaging.";

/// User-safe reply sent when the completion backend is unreachable or
/// rejects the request.
pub const FALLBACK_REPLY: &str = "I'm sorry, I'm having trouble processing your message right \
     now. Please try again later.";

/// Explicit construction-time configuration; no ambient env reads.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// API base URL without the `/chat/completions` suffix.
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            model: "gpt-4o-mini".into(),
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("completion api error: {0}")]
    Api(String),
    #[error("completion response contained no choices")]
    NoChoices,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct CompletionClient {
    config: CompletionConfig,
    client: reqwest::Client,
}

impl CompletionClient {
    #[must_use]
    pub fn new(config: CompletionConfig) -> Self {
        let config = CompletionConfig {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            ..config
        };
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Generate a reply to a single user message.
    ///
    /// Never fails: degraded backends yield [`FALLBACK_REPLY`].
    pub async fn reply_to(&self, user_text: &str) -> String {
        let messages = vec![
            WireMessage::system(SYSTEM_PROMPT),
            WireMessage::new("user", user_text),
        ];
        self.complete_or_fallback(messages).await
    }

    /// Generate a reply from an ordered conversation history, oldest first.
    ///
    /// Never fails: degraded backends yield [`FALLBACK_REPLY`].
    pub async fn reply_with_history(&self, history: &[Turn]) -> String {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(WireMessage::system(SYSTEM_PROMPT));
        for turn in history {
            let role = match turn.role {
                Role::Human => "user",
                Role::Ai => "assistant",
            };
            messages.push(WireMessage::new(role, &turn.text));
        }
        self.complete_or_fallback(messages).await
    }

    async fn complete_or_fallback(&self, messages: Vec<WireMessage>) -> String {
        match self.complete(messages).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "completion failed, using fallback reply");
                FALLBACK_REPLY.to_string()
            },
        }
    }

    async fn complete(&self, messages: Vec<WireMessage>) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.config.api_base);
        let body = CompletionRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CompletionError::Api(format!("{status} {body}")));
        }

        let data: CompletionResponse = res.json().await?;
        data.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(CompletionError::NoChoices)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl WireMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    fn system(content: &str) -> Self {
        Self::new("system", content)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: WireMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::ServerGuard) -> CompletionClient {
        CompletionClient::new(CompletionConfig {
            api_base: server.url(),
            api_key: "test-key".into(),
            ..CompletionConfig::default()
        })
    }

    #[tokio::test]
    async fn test_reply_to_returns_generated_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(
                r#"{"choices": [{"message": {"role": "assistant", "content": "Hello there!"}}]}"#,
            )
            .create_async()
            .await;

        let reply = client_for(&server).reply_to("Hi").await;
        assert_eq!(reply, "Hello there!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_provider_error_yields_fallback() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body(r#"{"error": "boom"}"#)
            .create_async()
            .await;

        let reply = client_for(&server).reply_to("Hi").await;
        assert_eq!(reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_empty_choices_yields_fallback() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let reply = client_for(&server).reply_to("Hi").await;
        assert_eq!(reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_unreachable_backend_yields_fallback() {
        // Port 9 (discard) is never serving HTTP.
        let client = CompletionClient::new(CompletionConfig {
            api_base: "http://127.0.0.1:9".into(),
            ..CompletionConfig::default()
        });

        let reply = client.reply_to("Hi").await;
        assert_eq!(reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_history_is_replayed_with_roles() {
        use chatline_common::{Role, Turn};

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello!"},
                    {"role": "user", "content": "What are your hours?"}
                ]
            })))
            .with_status(200)
            .with_body(
                r#"{"choices": [{"message": {"role": "assistant", "content": "9 to 5."}}]}"#,
            )
            .create_async()
            .await;

        let history = [
            Turn::new(Role::Human, "Hi"),
            Turn::new(Role::Ai, "Hello!"),
            Turn::new(Role::Human, "What are your hours?"),
        ];
        let reply = client_for(&server).reply_with_history(&history).await;
        assert_eq!(reply, "9 to 5.");
        mock.assert_async().await;
    }
}
