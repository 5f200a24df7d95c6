use anyhow::{Context, Result};
use reqwest::blocking::multipart;
use serde::{Deserialize, Serialize};

pub const DEFAULT_STT_ENDPOINT: &str = "https://api.groq.com/openai/v1/audio/transcriptions";
pub const DEFAULT_STT_MODEL: &str = "whisper-large-v3-turbo";

/// Speech-to-text provider configuration: one OpenAI-compatible
/// transcription endpoint plus model and credential.
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
}

/// Seam between the pipeline and the transcription provider.
pub trait SpeechToText: Send + Sync {
    fn transcribe(&self, audio_wav: &[u8]) -> Result<String>;
}

#[derive(Deserialize, Debug)]
struct TranscriptionResponse {
    text: String,
}

/// HTTP transcription client for Whisper-style multipart endpoints.
pub struct HttpTranscriber {
    config: SttConfig,
}

impl HttpTranscriber {
    pub fn new(config: SttConfig) -> Self {
        Self { config }
    }
}

impl SpeechToText for HttpTranscriber {
    fn transcribe(&self, audio_wav: &[u8]) -> Result<String> {
        let client = reqwest::blocking::Client::new();

        let form = multipart::Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "json")
            .part(
                "file",
                multipart::Part::bytes(audio_wav.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")?,
            );

        let response = client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .multipart(form)
            .send()
            .context("Failed to send request to transcription provider")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Transcription provider error ({status}): {error_text}");
        }

        let text = response.text().context("Failed to get response text")?;
        let transcription: TranscriptionResponse =
            serde_json::from_str(&text).context("Failed to parse transcription response")?;

        Ok(transcription.text)
    }
}

/// Serializable shape used in the settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttSettings {
    pub endpoint: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for SttSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_STT_ENDPOINT.to_string(),
            model: DEFAULT_STT_MODEL.to_string(),
            api_key: None,
        }
    }
}
