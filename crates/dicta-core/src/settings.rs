use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::coordinator::MIN_DURATION_MS_DEFAULT;
use crate::gesture::HOLD_THRESHOLD_MS_DEFAULT;
use crate::persona::Persona;
use crate::pipeline::PipelineConfig;
use crate::rewrite::{LlmConfig, LlmSettings};
use crate::transcribe::{SttConfig, SttSettings};

/// User settings persisted as JSON under the config directory.
///
/// Unknown or missing fields fall back to defaults so older files keep
/// loading after upgrades.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Name of the push-to-talk key (e.g. "capslock", "f8").
    pub trigger_key: String,
    /// How long the trigger must be held before recording starts.
    pub hold_threshold_ms: u64,
    /// Recordings shorter than this are discarded without transcription.
    pub min_duration_ms: u64,
    /// Global rewrite toggle. A selected persona overrides `false`.
    pub post_processing: bool,
    /// Selected persona name, if any.
    pub persona: Option<String>,
    /// Custom prompt template with a `{transcript}` placeholder. Only used
    /// when no persona is selected.
    pub custom_prompt: Option<String>,
    pub stt: SttSettings,
    pub llm: LlmSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trigger_key: "capslock".to_string(),
            hold_threshold_ms: HOLD_THRESHOLD_MS_DEFAULT,
            min_duration_ms: MIN_DURATION_MS_DEFAULT,
            post_processing: true,
            persona: None,
            custom_prompt: None,
            stt: SttSettings::default(),
            llm: LlmSettings::default(),
        }
    }
}

impl Settings {
    /// Settings file location: `$XDG_CONFIG_HOME/dicta/settings.json`,
    /// falling back to `~/.config`.
    pub fn path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".config")
            });
        config_dir.join("dicta").join("settings.json")
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// unreadable.
    pub fn load() -> Settings {
        let path = Self::path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "settings file is malformed, using defaults");
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).context("Failed to write settings file")?;
        Ok(())
    }

    /// Parsed persona selection; unknown names count as none.
    pub fn persona(&self) -> Option<Persona> {
        let name = self.persona.as_deref()?;
        let parsed = Persona::from_name(name);
        if parsed.is_none() {
            tracing::warn!(persona = name, "unknown persona in settings, ignoring");
        }
        parsed
    }

    /// Immutable pipeline policy snapshot for one invocation.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            persona: self.persona(),
            post_processing: self.post_processing,
            custom_prompt: self.custom_prompt.clone(),
        }
    }

    /// Resolve the STT provider config; the settings key wins over the
    /// environment.
    pub fn stt_config(&self, env: &ApiConfig) -> Result<SttConfig> {
        let api_key = self
            .stt
            .api_key
            .clone()
            .or_else(|| env.stt_api_key.clone())
            .context(
                "No transcription API key configured.\n\
                 Set one with: dicta config --stt-key YOUR_KEY\n\
                 Or set the DICTA_STT_API_KEY environment variable.",
            )?;
        Ok(SttConfig {
            endpoint: self.stt.endpoint.clone(),
            model: self.stt.model.clone(),
            api_key,
        })
    }

    /// Resolve the rewrite provider config; the settings key wins over the
    /// environment.
    pub fn llm_config(&self, env: &ApiConfig) -> Result<LlmConfig> {
        let api_key = self
            .llm
            .api_key
            .clone()
            .or_else(|| env.llm_api_key.clone())
            .context(
                "No rewrite API key configured.\n\
                 Set one with: dicta config --llm-key YOUR_KEY\n\
                 Or set the DICTA_LLM_API_KEY environment variable.",
            )?;
        Ok(LlmConfig {
            endpoint: self.llm.endpoint.clone(),
            model: self.llm.model.clone(),
            api_key,
            shape: self.llm.shape,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::LlmShape;

    #[test]
    fn defaults_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.trigger_key, "capslock");
        assert_eq!(s.hold_threshold_ms, 500);
        assert_eq!(s.min_duration_ms, 10_000);
        assert!(s.post_processing);
        assert!(s.persona.is_none());
        assert_eq!(s.llm.shape, LlmShape::Generate);
    }

    #[test]
    fn unknown_persona_name_counts_as_none() {
        let s = Settings {
            persona: Some("wizard".to_string()),
            ..Default::default()
        };
        assert_eq!(s.persona(), None);
        assert!(s.pipeline_config().persona.is_none());
    }

    #[test]
    fn known_persona_name_parses() {
        let s = Settings {
            persona: Some("technical".to_string()),
            ..Default::default()
        };
        assert_eq!(s.persona(), Some(Persona::Technical));
    }

    #[test]
    fn partial_settings_json_fills_defaults() {
        let s: Settings = serde_json::from_str(r#"{"post_processing": false}"#).unwrap();
        assert!(!s.post_processing);
        assert_eq!(s.trigger_key, "capslock");
        assert_eq!(s.min_duration_ms, 10_000);
    }

    #[test]
    fn settings_round_trip_through_json() {
        let mut s = Settings::default();
        s.persona = Some("casual".to_string());
        s.custom_prompt = Some("Fix: {transcript}".to_string());
        s.stt.api_key = Some("gsk_test".to_string());

        let json = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.persona, Some("casual".to_string()));
        assert_eq!(back.custom_prompt, Some("Fix: {transcript}".to_string()));
        assert_eq!(back.stt.api_key, Some("gsk_test".to_string()));
    }

    #[test]
    fn settings_key_wins_over_environment() {
        let s = Settings {
            stt: SttSettings {
                api_key: Some("from-settings".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let env = ApiConfig {
            stt_api_key: Some("from-env".to_string()),
            llm_api_key: None,
        };
        assert_eq!(s.stt_config(&env).unwrap().api_key, "from-settings");
    }

    #[test]
    fn missing_keys_are_an_error() {
        let s = Settings::default();
        let env = ApiConfig::default();
        assert!(s.stt_config(&env).is_err());
        assert!(s.llm_config(&env).is_err());
    }
}
