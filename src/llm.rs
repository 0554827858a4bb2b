//! Reply generation via a chat completion API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::history::{ConversationTurn, Role};
use crate::net::check_status;
use crate::{Error, Result};

/// Default `OpenAI` API root
pub const OPENAI_URL: &str = "https://api.openai.com";

/// Shown when the provider answers without any content
pub const EMPTY_REPLY: &str = "(no response)";

/// Produces the assistant's reply for one user turn
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Generate a reply given the persona, prior exchanges and the new text
    ///
    /// # Errors
    ///
    /// Returns error if the provider is unreachable or answers non-success;
    /// the error text carries the HTTP status and body in the latter case.
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_text: &str,
    ) -> Result<String>;
}

/// Persona instruction naming the assistant
#[must_use]
pub fn build_system_prompt(device_name: &str, persona_prompt: Option<&str>) -> String {
    match persona_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        Some(persona) => format!(
            "{persona}

Your name is \"{device_name}\". Keep answers short, natural and clear."
        ),
        None => format!(
            "You are a voice assistant named \"{device_name}\". Keep answers short, natural and clear."
        ),
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// `OpenAI`-compatible chat completions client
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
}

impl OpenAiChat {
    /// Create a new chat client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for chat".to_string(),
            ));
        }

        Ok(Self {
            client,
            api_key,
            model,
            temperature: 0.7,
            base_url: OPENAI_URL.to_string(),
        })
    }

    /// Sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Point at a different API root (proxy, local server, tests)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ReplyGenerator for OpenAiChat {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_text: &str,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: system_prompt,
        });
        messages.extend(history.iter().map(|turn| ChatMessage {
            role: turn.role.as_str(),
            content: &turn.content,
        }));
        messages.push(ChatMessage {
            role: Role::User.as_str(),
            content: user_text,
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        tracing::debug!(
            model = %self.model,
            history = history.len(),
            "requesting chat completion"
        );

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat request failed");
                e
            })?;

        let response = check_status(response).await.map_err(|e| {
            tracing::error!(error = %e, "chat API error");
            Error::Llm(e)
        })?;

        let result: ChatResponse = response.json().await?;
        let reply = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_string());

        tracing::info!(chars = reply.len(), "reply generated");
        Ok(reply)
    }
}
