use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

const DEEPAI_TEXT_GENERATOR_URL: &str = "https://api.deepai.org/api/text-generator";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const CONTINUE_SYSTEM_PROMPT: &str = "You continue short stories. Reply with the continuation only, \
     a few sentences of plain prose, without repeating the text you were given.";

/// Completes a prompt with generated text.
///
/// Implementations return the prompt followed by the generated continuation,
/// or `None` when the service produced nothing usable.
#[async_trait]
pub trait TextGenerator: Send + Sync + Debug {
    async fn generate(&self, prompt: &str) -> Result<Option<String>>;
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String, // "deepai" or "openai"
    /// Characters of generated text kept after the caption.
    #[serde(default = "default_text_length")]
    pub text_length: usize,
    pub deepai: Option<DeepAiConfig>,
    pub openai: Option<OpenAiConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeepAiConfig {
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

fn default_text_length() -> usize {
    250
}

pub fn create_text_generator(config: &LlmConfig) -> Result<Box<dyn TextGenerator>> {
    match config.provider.as_str() {
        "deepai" => {
            let cfg = config.deepai.as_ref().context("DeepAI config missing")?;
            Ok(Box::new(DeepAiClient::new(&cfg.api_key)))
        }
        "openai" => {
            let cfg = config.openai.as_ref().context("OpenAI config missing")?;
            Ok(Box::new(OpenAiClient::new(
                &cfg.api_key,
                &cfg.model,
                cfg.base_url.as_deref(),
            )))
        }
        _ => Err(anyhow!("Unknown LLM provider: {}", config.provider)),
    }
}

// --- DeepAI ---

#[derive(Debug)]
pub struct DeepAiClient {
    api_key: String,
    client: reqwest::Client,
}

impl DeepAiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct DeepAiResponse {
    output: Option<String>,
    err: Option<String>,
}

#[async_trait]
impl TextGenerator for DeepAiClient {
    async fn generate(&self, prompt: &str) -> Result<Option<String>> {
        let form = reqwest::multipart::Form::new().text("text", prompt.to_string());

        let resp = self
            .client
            .post(DEEPAI_TEXT_GENERATOR_URL)
            .header("api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("DeepAI API error: {}", error_text));
        }

        let response_text = resp.text().await?;
        let result: DeepAiResponse = serde_json::from_str(&response_text).map_err(|e| {
            anyhow!("Failed to parse DeepAI response: {}. Body: {}", e, response_text)
        })?;

        if let Some(err) = result.err {
            return Err(anyhow!("DeepAI returned error: {}", err));
        }

        Ok(result.output.filter(|o| !o.trim().is_empty()))
    }
}

// --- OpenAI ---

#[derive(Debug)]
pub struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str, base_url: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or(OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageResponse,
}

#[derive(Deserialize)]
struct OpenAiMessageResponse {
    content: Option<String>,
}

/// Glues a chat continuation back onto its prompt.
fn join_continuation(prompt: &str, continuation: &str) -> String {
    let continuation = continuation.trim();
    if continuation.starts_with(prompt) {
        continuation.to_string()
    } else {
        format!("{} {}", prompt, continuation)
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<Option<String>> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAiRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: CONTINUE_SYSTEM_PROMPT.to_string(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("OpenAI API error: {}", error_text));
        }

        let result: OpenAiResponse = resp.json().await?;
        let continuation = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty());

        Ok(continuation.map(|c| join_continuation(prompt, &c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deepai_response_parsing() {
        let json = r#"{"id": "abc", "output": "Guy said hello. Then he left."}"#;
        let result: DeepAiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(result.output.as_deref(), Some("Guy said hello. Then he left."));
        assert!(result.err.is_none());
    }

    #[test]
    fn test_deepai_error_parsing() {
        let json = r#"{"err": "quota exceeded"}"#;
        let result: DeepAiResponse = serde_json::from_str(json).unwrap();
        assert!(result.output.is_none());
        assert_eq!(result.err.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn test_openai_response_parsing_success() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "The fries were on fire."
                },
                "finish_reason": "stop"
            }]
        }"#;

        let result: OpenAiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            result.choices[0].message.content.as_deref(),
            Some("The fries were on fire.")
        );
    }

    #[test]
    fn test_join_continuation() {
        assert_eq!(join_continuation("Welcome.", " It was hot."), "Welcome. It was hot.");
        assert_eq!(
            join_continuation("Welcome.", "Welcome. It was hot."),
            "Welcome. It was hot."
        );
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = LlmConfig {
            provider: "gemini".to_string(),
            text_length: 250,
            deepai: None,
            openai: None,
        };
        assert!(create_text_generator(&config).is_err());
    }
}
