use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use regex::{Regex, RegexBuilder};
use std::fmt::Debug;
use std::path::Path;

/// Screens generated text before it is narrated or posted.
#[async_trait]
pub trait Moderator: Send + Sync + Debug {
    /// `true` when the text may be used.
    async fn validate(&self, text: &str) -> Result<bool>;
}

/// Rejects text containing any banned term as a whole word, ignoring case.
#[derive(Debug)]
pub struct WordListModerator {
    pattern: Option<Regex>,
}

impl WordListModerator {
    pub fn new<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let escaped: Vec<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty() && !w.starts_with('#'))
            .map(|w| regex::escape(&w))
            .collect();

        if escaped.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = RegexBuilder::new(&format!(r"\b(?:{})\b", escaped.join("|")))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read word list {}", path.display()))?;
        Self::new(content.lines())
    }
}

#[async_trait]
impl Moderator for WordListModerator {
    async fn validate(&self, text: &str) -> Result<bool> {
        let Some(pattern) = &self.pattern else {
            return Ok(true);
        };
        if let Some(hit) = pattern.find(text) {
            debug!("Moderation hit on '{}'", hit.as_str());
            return Ok(false);
        }
        Ok(true)
    }
}
