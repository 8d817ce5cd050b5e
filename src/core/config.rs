use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::BotError;
use crate::services::llm::LlmConfig;
use crate::services::media::MediaConfig;
use crate::services::music::MusicConfig;
use crate::services::tts::AudioConfig;

/// Upper bound for simultaneous narration voices.
pub const MAX_VOICE_COUNT: usize = 4;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub blog: BlogConfig,

    pub llm: LlmConfig,

    #[serde(default)]
    pub moderation: ModerationConfig,

    pub audio: AudioConfig,

    #[serde(default)]
    pub music: MusicConfig,

    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BlogConfig {
    /// Blog that receives video posts and reblogs.
    pub name: String,
    /// OAuth2 bearer token for the blogging API.
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ModerationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Newline separated list of banned terms.
    pub word_list: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every option up front so misconfiguration never surfaces mid-publish.
    pub fn validate(&self) -> std::result::Result<(), BotError> {
        if self.blog.name.trim().is_empty() {
            return Err(BotError::Config("blog.name must not be empty".into()));
        }
        if self.llm.text_length == 0 {
            return Err(BotError::Config("llm.text_length must be positive".into()));
        }
        match self.llm.provider.as_str() {
            "deepai" if self.llm.deepai.is_none() => {
                return Err(BotError::Config("llm.deepai section missing".into()))
            }
            "openai" if self.llm.openai.is_none() => {
                return Err(BotError::Config("llm.openai section missing".into()))
            }
            "deepai" | "openai" => {}
            other => return Err(BotError::Config(format!("Unknown LLM provider: {}", other))),
        }
        if self.moderation.enabled && self.moderation.word_list.is_none() {
            return Err(BotError::Config(
                "moderation.word_list is required when moderation is enabled".into(),
            ));
        }
        if self.audio.voice_count == 0 || self.audio.voice_count > MAX_VOICE_COUNT {
            return Err(BotError::Config(format!(
                "audio.voice_count must be between 1 and {}",
                MAX_VOICE_COUNT
            )));
        }
        if let Some(gender) = &self.audio.voice.gender {
            if gender.parse::<crate::services::tts::Gender>().is_err() {
                return Err(BotError::Config(format!(
                    "audio.voice.gender '{}' is not supported (use male or female)",
                    gender
                )));
            }
        }
        match self.audio.provider.as_str() {
            "azure" if self.audio.azure.is_none() => {
                return Err(BotError::Config("audio.azure section missing".into()))
            }
            "azure" => {}
            other => return Err(BotError::Config(format!("Unknown TTS provider: {}", other))),
        }
        if globset::Glob::new(&self.music.pattern).is_err() {
            return Err(BotError::Config(format!(
                "music.pattern '{}' is not a valid glob",
                self.music.pattern
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
blog:
  name: fieri
  token: secret
llm:
  provider: deepai
  deepai:
    api_key: key
audio:
  azure:
    key: k
    region: westus
"#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.llm.text_length, 250);
        assert_eq!(config.audio.language, "en-");
        assert_eq!(config.audio.voice_count, 1);
        assert_eq!(config.music.pattern, "*.mp3");
        assert_eq!(config.music.postfix, "instrumental");
        assert_eq!(config.music.prefix, "");
        assert!(!config.moderation.enabled);
        assert!(config.music.spotify.is_none());
        assert_eq!(config.media.ffmpeg, "ffmpeg");
    }

    #[test]
    fn test_rejects_unknown_gender() {
        let yaml = format!("{}  voice:\n    gender: robot\n", MINIMAL);
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("robot"));
    }

    #[test]
    fn test_rejects_moderation_without_word_list() {
        let yaml = format!("{}moderation:\n  enabled: true\n", MINIMAL);
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_rejects_missing_provider_section() {
        let yaml = MINIMAL.replace("provider: deepai", "provider: openai");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("llm.openai"));
    }

    #[test]
    fn test_rejects_zero_voices() {
        let yaml = MINIMAL.replace("audio:\n", "audio:\n  voice_count: 0\n");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&dir.path().join("config.yml"));
        assert!(result.is_err());
    }
}
