use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const DEFAULT_LLM_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_LLM_MODEL: &str = "gemini-1.5-flash";

/// The two provider request shapes the rewrite step supports. Neither leaks
/// past the `TextRewriter` seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmShape {
    /// Chat-style `messages` array with system/user roles (OpenAI, Groq).
    Chat,
    /// Single-message `generateContent` call (Gemini).
    Generate,
}

/// Rewrite provider configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// For `Chat`: the full chat-completions URL. For `Generate`: the models
    /// base URL, combined with the model name per call.
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub shape: LlmShape,
}

/// Seam between the pipeline and the text-correction provider.
pub trait TextRewriter: Send + Sync {
    fn rewrite(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<GenerateCandidate>,
}

#[derive(Deserialize)]
struct GenerateCandidate {
    content: GenerateContent,
}

#[derive(Deserialize)]
struct GenerateContent {
    parts: Vec<GeneratePart>,
}

#[derive(Deserialize)]
struct GeneratePart {
    text: String,
}

fn chat_body(model: &str, system: &str, user: &str) -> serde_json::Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user }
        ],
        "temperature": 0.2,
    })
}

fn generate_body(system: &str, user: &str) -> serde_json::Value {
    json!({
        "contents": [
            {
                "role": "user",
                "parts": [ { "text": format!("{system}\n\n{user}") } ]
            }
        ]
    })
}

fn generate_url(endpoint: &str, model: &str) -> String {
    format!("{}/{}:generateContent", endpoint.trim_end_matches('/'), model)
}

/// HTTP rewrite client handling both provider shapes.
pub struct HttpRewriter {
    config: LlmConfig,
}

impl HttpRewriter {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }

    fn rewrite_chat(&self, system: &str, user: &str) -> Result<String> {
        let client = reqwest::blocking::Client::new();
        let response = client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&chat_body(&self.config.model, system, user))
            .send()
            .context("Failed to send request to rewrite provider")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            anyhow::bail!("Rewrite provider error ({status}): {body}");
        }

        let chat: ChatResponse = response
            .json()
            .context("Failed to parse chat completion response")?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .context("Chat completion returned no choices")?
            .message
            .content;

        Ok(content)
    }

    fn rewrite_generate(&self, system: &str, user: &str) -> Result<String> {
        let client = reqwest::blocking::Client::new();
        let response = client
            .post(generate_url(&self.config.endpoint, &self.config.model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&generate_body(system, user))
            .send()
            .context("Failed to send request to rewrite provider")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            anyhow::bail!("Rewrite provider error ({status}): {body}");
        }

        let generated: GenerateResponse = response
            .json()
            .context("Failed to parse generateContent response")?;
        let text = generated
            .candidates
            .into_iter()
            .next()
            .context("generateContent returned no candidates")?
            .content
            .parts
            .into_iter()
            .next()
            .context("generateContent candidate had no parts")?
            .text;

        Ok(text)
    }
}

impl TextRewriter for HttpRewriter {
    fn rewrite(&self, system: &str, user: &str) -> Result<String> {
        match self.config.shape {
            LlmShape::Chat => self.rewrite_chat(system, user),
            LlmShape::Generate => self.rewrite_generate(system, user),
        }
    }
}

/// Serializable shape used in the settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub endpoint: String,
    pub model: String,
    pub shape: LlmShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            shape: LlmShape::Generate,
            api_key: None,
        }
    }
}
