use log::{info, warn};

use crate::core::error::{BotError, BotResult};
use crate::services::llm::TextGenerator;
use crate::services::moderation::Moderator;
use crate::utils::text::{
    collapse_blank_lines, count_quotes, insert_closing_quote, normalize_captions,
    trim_to_sentence_boundary, truncate_at_separator, CaptionInput,
};

/// Generation attempts before giving up on moderation.
pub const MODERATION_ATTEMPTS: usize = 3;
/// Appended to the caption when every attempt was rejected.
pub const SAFE_CONTINUATION: &str = "...wow.";

/// Turns captions into a story: the caption verbatim plus a generated,
/// sentence-trimmed continuation.
pub struct StoryGenerator<'a> {
    generator: &'a dyn TextGenerator,
    moderator: Option<&'a dyn Moderator>,
    text_length: usize,
}

impl<'a> StoryGenerator<'a> {
    pub fn new(
        generator: &'a dyn TextGenerator,
        moderator: Option<&'a dyn Moderator>,
        text_length: usize,
    ) -> Self {
        Self {
            generator,
            moderator,
            text_length,
        }
    }

    pub async fn generate_story(&self, captions: &CaptionInput) -> BotResult<String> {
        let text = normalize_captions(captions);

        let Some(moderator) = self.moderator else {
            return self.generate_raw(&text).await;
        };

        for attempt in 1..=MODERATION_ATTEMPTS {
            let story = self.generate_raw(&text).await?;
            let added = &story[text.len()..];
            let passed = match moderator.validate(added).await {
                Ok(passed) => passed,
                Err(e) => {
                    warn!("Moderation check failed, treating as rejected: {:#}", e);
                    false
                }
            };
            if passed {
                return Ok(story);
            }
            warn!(
                "Attempt {}/{} did not pass moderation: {}",
                attempt, MODERATION_ATTEMPTS, story
            );
        }

        warn!("Moderation exhausted, using the safe continuation");
        Ok(format!("{}{}", text, SAFE_CONTINUATION))
    }

    async fn generate_raw(&self, text: &str) -> BotResult<String> {
        info!("Talking to the text generator");
        let output = match self.generator.generate(text).await {
            Ok(Some(output)) => output,
            Ok(None) => return Err(BotError::GenerationUnavailable),
            Err(e) => {
                warn!("Text generator failed: {:#}", e);
                return Err(BotError::GenerationUnavailable);
            }
        };
        log::debug!("Raw output:\n{}", output);
        Ok(self.shape(text, &output))
    }

    /// Keeps `text` verbatim and cleans up only what was generated after it.
    fn shape(&self, text: &str, output: &str) -> String {
        let continuation = match output.strip_prefix(text) {
            Some(rest) => rest.to_string(),
            None => format!(" {}", output.trim_start()),
        };
        let continuation = truncate_at_separator(&continuation, self.text_length);

        let joined = format!("{}{}", text, continuation);
        let trimmed = trim_to_sentence_boundary(&joined, text);
        let mut continuation = collapse_blank_lines(&trimmed[text.len()..]);

        if (count_quotes(text) + count_quotes(&continuation)) % 2 == 1 {
            continuation = insert_closing_quote(&continuation);
        }
        format!("{}{}", text, continuation)
    }
}
