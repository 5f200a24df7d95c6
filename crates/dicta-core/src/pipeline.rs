use anyhow::{Context, Result};

use crate::audio::FinalizedRecording;
use crate::persona::{Persona, build_prompt};
use crate::rewrite::TextRewriter;
use crate::sanitize::{is_noise_transcript, sanitize};
use crate::transcribe::SpeechToText;

/// Output of the transcript pipeline.
///
/// `raw_text` is the transcription provider's output. `final_text` is the
/// sanitized rewrite, or `raw_text` unchanged whenever the rewrite step was
/// skipped or failed — the pipeline never surfaces a formatting error in
/// place of usable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptResult {
    pub raw_text: String,
    pub final_text: String,
    pub sanitized: bool,
}

/// Immutable per-invocation policy snapshot.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub persona: Option<Persona>,
    pub post_processing: bool,
    pub custom_prompt: Option<String>,
}

impl PipelineConfig {
    /// Rewrite is skipped only when post-processing is globally disabled
    /// and no persona is selected; a selected persona is an explicit
    /// request to process.
    pub fn should_rewrite(&self) -> bool {
        self.post_processing || self.persona.is_some()
    }
}

/// The transcription-and-correction pipeline: STT, policy, prompt assembly,
/// rewrite, sanitization.
pub struct TranscriptPipeline {
    stt: Box<dyn SpeechToText>,
    rewriter: Box<dyn TextRewriter>,
    config: PipelineConfig,
}

impl TranscriptPipeline {
    pub fn new(
        stt: Box<dyn SpeechToText>,
        rewriter: Box<dyn TextRewriter>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            stt,
            rewriter,
            config,
        }
    }

    /// Run the pipeline on a finalized recording.
    ///
    /// Transcription failure is terminal: there is no text to work with, so
    /// the error propagates and no result is produced. Every failure past
    /// that point degrades to the raw transcript instead.
    pub fn run(&self, recording: &FinalizedRecording) -> Result<TranscriptResult> {
        let raw = self
            .stt
            .transcribe(&recording.audio_wav)
            .context("transcription failed")?;
        let mut raw = raw.trim().to_string();

        if is_noise_transcript(&raw) {
            tracing::info!(transcript = %raw, "transcript looks like silence, discarding");
            raw.clear();
        }

        if raw.is_empty() || !self.config.should_rewrite() {
            return Ok(TranscriptResult {
                raw_text: raw.clone(),
                final_text: raw,
                sanitized: false,
            });
        }

        let (system, user) = build_prompt(
            self.config.persona,
            self.config.custom_prompt.as_deref(),
            &raw,
        );

        match self.rewriter.rewrite(&system, &user) {
            Ok(output) => {
                let cleaned = sanitize(&output);
                if cleaned.is_empty() {
                    // The model returned nothing but scaffolding; the
                    // user's words still exist in the raw transcript.
                    tracing::warn!("rewrite output was empty after sanitization, keeping raw text");
                    return Ok(TranscriptResult {
                        raw_text: raw.clone(),
                        final_text: raw,
                        sanitized: false,
                    });
                }
                Ok(TranscriptResult {
                    raw_text: raw,
                    final_text: cleaned,
                    sanitized: true,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "rewrite failed, falling back to raw transcript");
                Ok(TranscriptResult {
                    raw_text: raw.clone(),
                    final_text: raw,
                    sanitized: false,
                })
            }
        }
    }
}
