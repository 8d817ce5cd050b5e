use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};

use super::{Prosody, SpeechRequest, SpeechSynthesizer, Voice};

const OUTPUT_FORMAT: &str = "riff-24khz-16bit-mono-pcm";
const CLIENT_NAME: &str = "fierifiction";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AzureConfig {
    pub key: String,
    pub region: String,
}

pub struct AzureSpeechClient {
    config: AzureConfig,
    client: reqwest::Client,
}

impl AzureSpeechClient {
    pub fn new(config: AzureConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn base_url(&self) -> String {
        format!("https://{}.tts.speech.microsoft.com/cognitiveservices", self.config.region)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("Ocp-Apim-Subscription-Key", HeaderValue::from_str(&self.config.key)?);
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_NAME));
        Ok(headers)
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn attribute(name: &str, value: Option<&str>) -> String {
    value
        .map(|v| format!(" {}=\"{}\"", name, escape_xml(v)))
        .unwrap_or_default()
}

pub fn build_ssml(request: &SpeechRequest<'_>) -> String {
    let text = escape_xml(request.text);
    let Prosody {
        rate,
        pitch,
        contour,
    } = request.prosody;

    let body = if request.prosody.is_empty() {
        text
    } else {
        format!(
            "<prosody{}{}{}>{}</prosody>",
            attribute("rate", rate.as_deref()),
            attribute("pitch", pitch.as_deref()),
            attribute("contour", contour.as_deref()),
            text
        )
    };

    format!(
        "<speak version=\"1.0\" xmlns=\"http://www.w3.org/2001/10/synthesis\" xmlns:mstts=\"https://www.w3.org/2001/mstts\" xml:lang=\"{}\">\
<voice name=\"{}\"><mstts:express-as{}>{}</mstts:express-as></voice></speak>",
        escape_xml(&request.voice.locale),
        escape_xml(&request.voice.voice),
        attribute("style", request.voice.style.as_deref()),
        body
    )
}

#[async_trait]
impl SpeechSynthesizer for AzureSpeechClient {
    async fn list_voices(&self, language_prefix: &str) -> Result<Vec<Voice>> {
        let url = format!("{}/voices/list", self.base_url());
        let resp = self.client.get(&url).headers(self.headers()?).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("Failed to list voices: {}", resp.status()));
        }
        let mut voices: Vec<Voice> = resp.json().await?;
        voices.retain(|v| v.locale.starts_with(language_prefix));
        Ok(voices)
    }

    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<Vec<u8>> {
        let ssml = build_ssml(request);
        log::debug!("{}", ssml);

        let url = format!("{}/v1", self.base_url());
        let resp = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .body(ssml)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Azure speech error {}: {}", status, error_text));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tts::VoiceSelection;

    fn selection(style: Option<&str>) -> VoiceSelection {
        VoiceSelection {
            voice: "en-US-GuyNeural".to_string(),
            locale: "en-US".to_string(),
            style: style.map(str::to_string),
        }
    }

    #[test]
    fn test_ssml_plain() {
        let voice = selection(None);
        let prosody = Prosody::default();
        let ssml = build_ssml(&SpeechRequest {
            text: "Fish & chips <3",
            voice: &voice,
            prosody: &prosody,
        });
        assert!(ssml.contains("xml:lang=\"en-US\""));
        assert!(ssml.contains("<voice name=\"en-US-GuyNeural\"><mstts:express-as>Fish &amp; chips &lt;3</mstts:express-as>"));
        assert!(!ssml.contains("prosody"));
    }

    #[test]
    fn test_ssml_style_and_prosody() {
        let voice = selection(Some("cheerful"));
        let prosody = Prosody {
            rate: Some("-10%".to_string()),
            pitch: None,
            contour: Some("(0%,+20Hz)".to_string()),
        };
        let ssml = build_ssml(&SpeechRequest {
            text: "Hi",
            voice: &voice,
            prosody: &prosody,
        });
        assert!(ssml.contains("<mstts:express-as style=\"cheerful\">"));
        assert!(ssml.contains("<prosody rate=\"-10%\" contour=\"(0%,+20Hz)\">Hi</prosody>"));
    }

    #[test]
    fn test_voice_list_parsing() {
        let json = r#"[{
            "Name": "Microsoft Server Speech Text to Speech Voice (en-US, JennyNeural)",
            "DisplayName": "Jenny",
            "LocalName": "Jenny",
            "ShortName": "en-US-JennyNeural",
            "Gender": "Female",
            "Locale": "en-US",
            "StyleList": ["assistant", "chat"],
            "SampleRateHertz": "24000"
        }, {
            "ShortName": "fr-FR-HenriNeural",
            "LocalName": "Henri",
            "Gender": "Male",
            "Locale": "fr-FR"
        }]"#;
        let voices: Vec<Voice> = serde_json::from_str(json).unwrap();
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].style_list, vec!["assistant", "chat"]);
        assert!(voices[1].style_list.is_empty());
    }
}
