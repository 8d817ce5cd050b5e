use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::core::error::{BotError, BotResult};
use crate::core::random::{pick, Chooser};

pub mod azure;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Voice {
    pub short_name: String,
    #[serde(default)]
    pub local_name: String,
    pub gender: String,
    pub locale: String,
    #[serde(default)]
    pub style_list: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "Female",
            Gender::Male => "Male",
        }
    }
}

impl FromStr for Gender {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "female" => Ok(Gender::Female),
            "male" => Ok(Gender::Male),
            _ => Err(anyhow!("Gender {} not supported", s)),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_tts_provider")]
    pub provider: String,
    /// Locale prefix the voice catalog is narrowed to.
    #[serde(default = "default_language")]
    pub language: String,
    /// Voices reading the story at the same time.
    #[serde(default = "default_voice_count")]
    pub voice_count: usize,
    #[serde(default)]
    pub voice: VoiceSettings,
    pub azure: Option<azure::AzureConfig>,
}

/// Preferred voice and delivery. Unset fields leave the choice to the selector.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct VoiceSettings {
    pub name: Option<String>,
    pub style: Option<String>,
    pub gender: Option<String>,
    pub rate: Option<String>,
    pub pitch: Option<String>,
    pub contour: Option<String>,
}

fn default_tts_provider() -> String {
    "azure".to_string()
}
fn default_language() -> String {
    "en-".to_string()
}
fn default_voice_count() -> usize {
    1
}

/// A voice picked for one synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSelection {
    pub voice: String,
    pub locale: String,
    pub style: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prosody {
    pub rate: Option<String>,
    pub pitch: Option<String>,
    pub contour: Option<String>,
}

impl Prosody {
    pub fn is_empty(&self) -> bool {
        self.rate.is_none() && self.pitch.is_none() && self.contour.is_none()
    }
}

impl From<&VoiceSettings> for Prosody {
    fn from(settings: &VoiceSettings) -> Self {
        Self {
            rate: settings.rate.clone(),
            pitch: settings.pitch.clone(),
            contour: settings.contour.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
    pub voice: &'a VoiceSelection,
    pub prosody: &'a Prosody,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn list_voices(&self, language_prefix: &str) -> Result<Vec<Voice>>;
    /// Returns WAV audio for the request.
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<Vec<u8>>;
}

pub fn create_speech_synthesizer(config: &AudioConfig) -> Result<Arc<dyn SpeechSynthesizer>> {
    info!("Initializing TTS Client for provider: {}", config.provider);
    match config.provider.as_str() {
        "azure" => {
            let azure_config = config
                .azure
                .clone()
                .ok_or_else(|| anyhow!("Azure speech config missing"))?;
            Ok(Arc::new(azure::AzureSpeechClient::new(azure_config)))
        }
        _ => Err(anyhow!("Unknown TTS provider: {}", config.provider)),
    }
}

/// Picks voices from the catalog, relaxing any filter that would leave nothing.
pub struct VoiceSelector {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    chooser: Arc<dyn Chooser>,
    language: String,
    settings: VoiceSettings,
    catalog: OnceCell<Vec<Voice>>,
}

impl VoiceSelector {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        chooser: Arc<dyn Chooser>,
        language: &str,
        settings: VoiceSettings,
    ) -> Self {
        Self {
            synthesizer,
            chooser,
            language: language.to_string(),
            settings,
            catalog: OnceCell::new(),
        }
    }

    /// Voices for the configured language, fetched once per process.
    pub async fn catalog(&self) -> BotResult<&[Voice]> {
        let voices = self
            .catalog
            .get_or_try_init(|| async {
                let mut voices = self
                    .synthesizer
                    .list_voices(&self.language)
                    .await
                    .map_err(BotError::Network)?;
                voices.retain(|v| v.locale.starts_with(&self.language));
                Ok::<_, BotError>(voices)
            })
            .await?;
        Ok(voices.as_slice())
    }

    pub async fn select_voice(&self) -> BotResult<VoiceSelection> {
        let voices = self.catalog().await?;
        let mut candidates: Vec<&Voice> = voices.iter().collect();
        if candidates.is_empty() {
            return Err(BotError::NoVoices(self.language.clone()));
        }

        if let Some(name) = &self.settings.name {
            candidates = narrow(candidates, &format!("name {}", name), |v| {
                &v.short_name == name || &v.local_name == name
            });
        }

        if let Some(style) = &self.settings.style {
            candidates = narrow(candidates, &format!("style {}", style), |v| {
                v.style_list.contains(style)
            });
        }

        if let Some(gender) = &self.settings.gender {
            match gender.parse::<Gender>() {
                Ok(gender) => {
                    candidates = narrow(candidates, &format!("gender {}", gender), |v| {
                        v.gender.eq_ignore_ascii_case(gender.as_str())
                    });
                }
                Err(e) => warn!("{}", e),
            }
        }

        let voice = *pick(self.chooser.as_ref(), &candidates)
            .ok_or_else(|| BotError::NoVoices(self.language.clone()))?;

        let style = match &self.settings.style {
            Some(style) => Some(style.clone()),
            None => pick(self.chooser.as_ref(), &voice.style_list).cloned(),
        };

        info!(
            "Voice: {}{}",
            voice.short_name,
            style.as_deref().map(|s| format!(" ({})", s)).unwrap_or_default()
        );

        Ok(VoiceSelection {
            voice: voice.short_name.clone(),
            locale: voice.locale.clone(),
            style,
        })
    }
}

/// Applies `keep` unless it would leave no voices at all.
fn narrow<'v>(
    candidates: Vec<&'v Voice>,
    label: &str,
    keep: impl Fn(&Voice) -> bool,
) -> Vec<&'v Voice> {
    let filtered: Vec<&Voice> = candidates.iter().copied().filter(|v| keep(v)).collect();
    if filtered.is_empty() {
        warn!(
            "No voices match {}, keeping the {} previous candidates",
            label,
            candidates.len()
        );
        return candidates;
    }
    info!("Filtered down to {} voices based on {}", filtered.len(), label);
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::random::FixedChooser;
    use std::sync::Mutex;

    struct MockSynthesizer {
        voices: Vec<Voice>,
        list_calls: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for MockSynthesizer {
        async fn list_voices(&self, _language_prefix: &str) -> Result<Vec<Voice>> {
            *self.list_calls.lock().unwrap() += 1;
            Ok(self.voices.clone())
        }

        async fn synthesize(&self, _request: &SpeechRequest<'_>) -> Result<Vec<u8>> {
            Ok(vec![0u8; 4])
        }
    }

    fn voice(short_name: &str, gender: &str, locale: &str, styles: &[&str]) -> Voice {
        Voice {
            short_name: short_name.to_string(),
            local_name: short_name.split('-').next_back().unwrap_or_default().to_string(),
            gender: gender.to_string(),
            locale: locale.to_string(),
            style_list: styles.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn catalog() -> Vec<Voice> {
        vec![
            voice("en-US-Jenny", "Female", "en-US", &["cheerful", "sad"]),
            voice("en-US-Guy", "Male", "en-US", &["newscast"]),
            voice("en-GB-Ryan", "Male", "en-GB", &[]),
            voice("de-DE-Katja", "Female", "de-DE", &[]),
        ]
    }

    fn selector(settings: VoiceSettings, index: usize) -> (VoiceSelector, Arc<Mutex<usize>>) {
        let list_calls = Arc::new(Mutex::new(0));
        let synth = Arc::new(MockSynthesizer {
            voices: catalog(),
            list_calls: list_calls.clone(),
        });
        (
            VoiceSelector::new(synth, Arc::new(FixedChooser(index)), "en-", settings),
            list_calls,
        )
    }

    #[test]
    fn test_gender_parse() {
        assert_eq!("FEMALE".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!("male".parse::<Gender>().unwrap(), Gender::Male);
        assert!("other".parse::<Gender>().is_err());
    }

    #[tokio::test]
    async fn test_catalog_filtered_and_cached() -> anyhow::Result<()> {
        let (selector, list_calls) = selector(VoiceSettings::default(), 0);
        assert_eq!(selector.catalog().await?.len(), 3);
        selector.select_voice().await?;
        selector.select_voice().await?;
        assert_eq!(*list_calls.lock().unwrap(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_name_matches_local_name() -> anyhow::Result<()> {
        let settings = VoiceSettings {
            name: Some("Guy".to_string()),
            ..Default::default()
        };
        let (selector, _) = selector(settings, 2);
        let selection = selector.select_voice().await?;
        assert_eq!(selection.voice, "en-US-Guy");
        assert_eq!(selection.style.as_deref(), Some("newscast"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_name_rolls_back() -> anyhow::Result<()> {
        let settings = VoiceSettings {
            name: Some("Nobody".to_string()),
            gender: Some("male".to_string()),
            ..Default::default()
        };
        let (selector, _) = selector(settings, 1);
        let selection = selector.select_voice().await?;
        assert_eq!(selection.voice, "en-GB-Ryan");
        assert_eq!(selection.style, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_style_then_gender_overconstrained() -> anyhow::Result<()> {
        // cheerful leaves only Jenny; male would leave nothing so it is dropped
        let settings = VoiceSettings {
            style: Some("cheerful".to_string()),
            gender: Some("male".to_string()),
            ..Default::default()
        };
        let (selector, _) = selector(settings, 0);
        let selection = selector.select_voice().await?;
        assert_eq!(selection.voice, "en-US-Jenny");
        assert_eq!(selection.style.as_deref(), Some("cheerful"));
        Ok(())
    }

    #[tokio::test]
    async fn test_style_sampled_when_not_requested() -> anyhow::Result<()> {
        let (selector, _) = selector(VoiceSettings::default(), 1);
        let selection = selector.select_voice().await?;
        // index 1 picks Guy, then the only style he has
        assert_eq!(selection.voice, "en-US-Guy");
        assert_eq!(selection.style.as_deref(), Some("newscast"));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_catalog_errors() {
        let synth = Arc::new(MockSynthesizer {
            voices: vec![],
            list_calls: Arc::new(Mutex::new(0)),
        });
        let selector = VoiceSelector::new(
            synth,
            Arc::new(FixedChooser(0)),
            "en-",
            VoiceSettings::default(),
        );
        assert!(matches!(
            selector.select_voice().await,
            Err(BotError::NoVoices(_))
        ));
    }
}
