use {
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

/// Misuse errors only. Expected delivery failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid dispatch input: {message}")]
    InvalidInput { message: String },
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: bool,
    /// Provider-assigned id of the outbound message, when accepted.
    pub provider_id: Option<String>,
    /// Description of the rejection or transport failure, when not delivered.
    pub error: Option<String>,
}

impl Delivery {
    fn accepted(provider_id: Option<String>) -> Self {
        Self {
            delivered: true,
            provider_id,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            delivered: false,
            provider_id: None,
            error: Some(error.into()),
        }
    }
}

/// Static Graph API account configuration, passed in at construction time.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Graph API base URL. Overridable for tests.
    pub api_base: String,
    pub api_version: String,
    pub phone_number_id: String,
    pub access_token: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com".into(),
            api_version: "v23.0".into(),
            phone_number_id: String::new(),
            access_token: String::new(),
        }
    }
}

/// Client for the WhatsApp Cloud API `/messages` endpoint.
#[derive(Clone)]
pub struct DispatchClient {
    config: DispatchConfig,
    client: reqwest::Client,
}

impl DispatchClient {
    #[must_use]
    pub fn new(config: DispatchConfig) -> Self {
        let config = DispatchConfig {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            ..config
        };
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Send one text message to a single recipient.
    ///
    /// Provider rejections (structured 4xx/5xx error body) and transport
    /// failures both come back as `delivered: false` with a description;
    /// neither is an `Err`. No retries, no batching.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<Delivery, Error> {
        if to.trim().is_empty() {
            return Err(Error::invalid_input("recipient address is required"));
        }
        if body.trim().is_empty() {
            return Err(Error::invalid_input("message body is required"));
        }

        let url = format!(
            "{}/{}/{}/messages",
            self.config.api_base, self.config.api_version, self.config.phone_number_id
        );
        let payload = SendRequest::text(to, body);

        let res = match self
            .client
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                warn!(to, error = %e, "dispatch transport failure");
                return Ok(Delivery::failed(format!("transport failure: {e}")));
            },
        };

        let status = res.status();
        if !status.is_success() {
            let description = match res.json::<ErrorResponse>().await {
                Ok(data) => data.error.message,
                Err(_) => "unknown error".to_string(),
            };
            warn!(to, %status, error = %description, "dispatch rejected by provider");
            return Ok(Delivery::failed(format!("API error: {description}")));
        }

        let data: SendResponse = match res.json().await {
            Ok(data) => data,
            // Accepted but unparseable body: the message left, keep going.
            Err(e) => {
                debug!(to, error = %e, "dispatch response body unreadable");
                return Ok(Delivery::accepted(None));
            },
        };

        let provider_id = data.messages.into_iter().next().map(|m| m.id);
        debug!(to, ?provider_id, "dispatch accepted");
        Ok(Delivery::accepted(provider_id))
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SendRequest {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: String,
    #[serde(rename = "type")]
    message_type: &'static str,
    text: TextBody,
}

#[derive(Debug, Serialize)]
struct TextBody {
    body: String,
}

impl SendRequest {
    fn text(to: &str, body: &str) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: to.to_string(),
            message_type: "text",
            text: TextBody {
                body: body.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
}
