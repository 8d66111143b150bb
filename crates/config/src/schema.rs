//! Config schema types (server, database, whatsapp, completion).

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatlineConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub whatsapp: WhatsAppConfig,
    pub completion: CompletionConfig,
}

/// Webhook server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

/// SQLite database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file. Created on first start if missing.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "chatline.db".into(),
        }
    }
}

/// WhatsApp Cloud API account configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Graph API base URL. Overridable for tests.
    pub api_base: String,
    /// Graph API version selector (e.g. "v23.0").
    pub api_version: String,
    /// Phone number id of the business account.
    pub phone_number_id: String,
    /// Bearer token for the Graph API.
    pub access_token: String,
    /// Token echoed back during webhook subscription verification.
    pub verify_token: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com".into(),
            api_version: "v23.0".into(),
            phone_number_id: String::new(),
            access_token: String::new(),
            verify_token: String::new(),
        }
    }
}

/// Completion backend configuration (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// API base URL, without the `/chat/completions` suffix.
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    /// Bounded output length, sized for a messaging reply.
    pub max_tokens: u32,
    pub temperature: f32,
    /// How many prior turns are replayed as context. 0 sends only the
    /// latest user message.
    pub history_window: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            model: "gpt-4o-mini".into(),
            max_tokens: 500,
            temperature: 0.7,
            history_window: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let cfg = ChatlineConfig::default();
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.completion.max_tokens, 500);
        assert_eq!(cfg.whatsapp.api_version, "v23.0");
        assert!(cfg.whatsapp.api_base.starts_with("https://"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: ChatlineConfig = toml::from_str(
            r#"
            [whatsapp]
            phone_number_id = "1004637292722037"
            access_token = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.whatsapp.phone_number_id, "1004637292722037");
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.completion.model, "gpt-4o-mini");
    }
}
