use log::{error, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::config::Config;
use crate::core::error::{BotError, BotResult};
use crate::services::blog::{post_url, BlogPublisher, PostState, Reblog, VideoPost};
use crate::services::llm::TextGenerator;
use crate::services::media::{with_suffix, ComposedImage, MediaAssembler};
use crate::services::moderation::Moderator;
use crate::services::story::StoryGenerator;
use crate::utils::text::{literal_story, CaptionInput};

/// How far a video publish got before it finished or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Start,
    StoryReady,
    Narrated,
    Assembled,
    Published,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Start => "start",
            PipelineStage::StoryReady => "story ready",
            PipelineStage::Narrated => "narrated",
            PipelineStage::Assembled => "assembled",
            PipelineStage::Published => "published",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A video post was created.
    Published(String),
    /// The story went out as a reblog comment instead.
    Reblogged(String),
    /// Nothing to narrate, nothing was posted.
    Aborted,
}

/// The post a story is attached to when video publishing is not possible.
#[derive(Debug, Clone)]
pub struct ReblogTarget {
    pub post_id: String,
    pub blog: String,
}

#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub images: Vec<PathBuf>,
    pub captions: CaptionInput,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub state: PostState,
    pub reblog: Option<ReblogTarget>,
    /// Use the captions as the story instead of generating one.
    pub use_story: bool,
    pub soundtrack: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TextRequest {
    pub captions: CaptionInput,
    pub target: ReblogTarget,
    pub tags: Vec<String>,
    pub use_story: bool,
}

pub struct Publisher {
    config: Config,
    generator: Box<dyn TextGenerator>,
    moderator: Option<Box<dyn Moderator>>,
    blog: Box<dyn BlogPublisher>,
    /// Only video posts need media; text reblogs run without it.
    assembler: Option<MediaAssembler>,
}

impl Publisher {
    pub fn new(
        config: Config,
        generator: Box<dyn TextGenerator>,
        moderator: Option<Box<dyn Moderator>>,
        blog: Box<dyn BlogPublisher>,
        assembler: Option<MediaAssembler>,
    ) -> Self {
        Self {
            config,
            generator,
            moderator,
            blog,
            assembler,
        }
    }

    /// Generates or takes the story. `None` means there is nothing to post.
    async fn obtain_story(&self, captions: &CaptionInput, use_story: bool) -> BotResult<Option<String>> {
        let story = if use_story {
            literal_story(captions)
        } else {
            let stories = StoryGenerator::new(
                self.generator.as_ref(),
                self.moderator.as_deref(),
                self.config.llm.text_length,
            );
            match stories.generate_story(captions).await {
                Ok(story) => story,
                Err(BotError::GenerationUnavailable) => {
                    warn!("No story was generated");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        };

        if story.trim().is_empty() {
            warn!("Story is empty");
            return Ok(None);
        }
        info!("Story:\n{}", story);
        Ok(Some(story))
    }

    pub async fn post_video(&self, request: &VideoRequest) -> BotResult<PublishOutcome> {
        let Some(assembler) = &self.assembler else {
            return Err(BotError::Config(
                "video posts need the media tools configured".into(),
            ));
        };
        let mut stage = PipelineStage::Start;
        let composed = assembler.combine_images(&request.images).await;

        let story = match self.obtain_story(&request.captions, request.use_story).await {
            Ok(Some(story)) => story,
            other => {
                if let Ok(image) = &composed {
                    cleanup(assembler, image).await;
                }
                return match other {
                    Err(e) => Err(e),
                    _ => {
                        info!("Aborting, nothing to narrate");
                        Ok(PublishOutcome::Aborted)
                    }
                };
            }
        };
        stage = advance(stage, PipelineStage::StoryReady);

        // a failed combine still gets the reblog fallback below
        let result = match composed {
            Ok(image) => {
                let result = self
                    .publish_video(assembler, &image, &story, request, &mut stage)
                    .await;
                cleanup(assembler, &image).await;
                result
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(id) => Ok(PublishOutcome::Published(id)),
            Err(e) => {
                error!("Video publish failed after stage '{}': {}", stage, e);
                let Some(target) = &request.reblog else {
                    return Err(e);
                };
                info!("Falling back to a text reblog");
                let id = self.reblog_story(target, &story, &request.tags).await?;
                Ok(PublishOutcome::Reblogged(id))
            }
        }
    }

    async fn publish_video(
        &self,
        assembler: &MediaAssembler,
        image: &ComposedImage,
        story: &str,
        request: &VideoRequest,
        stage: &mut PipelineStage,
    ) -> BotResult<String> {
        let audio = narration_path(&image.path);
        let video = video_path(&image.path);

        assembler.narrate(story, &audio).await?;
        *stage = advance(*stage, PipelineStage::Narrated);

        assembler
            .assemble_video(&image.path, &audio, &video)
            .await?;
        assembler
            .add_soundtrack(&image.path, &video, story, request.soundtrack.as_deref())
            .await?;
        *stage = advance(*stage, PipelineStage::Assembled);

        let post = VideoPost {
            caption: story.to_string(),
            video: video.clone(),
            tags: request.tags.clone(),
            source_url: request.source_url.clone(),
            state: request.state,
        };
        info!("Publishing video to {}", self.config.blog.name);
        let id = self
            .blog
            .create_video_post(&self.config.blog.name, &post)
            .await
            .map_err(BotError::Publish)?;
        *stage = advance(*stage, PipelineStage::Published);
        info!("Go check it out at {}", post_url(&self.config.blog.name, &id));
        Ok(id)
    }

    /// Reblogs the story as a comment; the media steps are skipped entirely.
    pub async fn post_text(&self, request: &TextRequest) -> BotResult<PublishOutcome> {
        let Some(story) = self.obtain_story(&request.captions, request.use_story).await? else {
            info!("Aborting, nothing to post");
            return Ok(PublishOutcome::Aborted);
        };
        let id = self.reblog_story(&request.target, &story, &request.tags).await?;
        Ok(PublishOutcome::Reblogged(id))
    }

    async fn reblog_story(&self, target: &ReblogTarget, story: &str, tags: &[String]) -> BotResult<String> {
        info!("Reblogging text post {} from {}", target.post_id, target.blog);
        let reblog_key = self
            .blog
            .get_reblog_key(&target.blog, &target.post_id)
            .await
            .map_err(BotError::Publish)?;
        let reblog = Reblog {
            post_id: target.post_id.clone(),
            reblog_key,
            tags: tags.to_vec(),
            comment: story.to_string(),
        };
        let id = self
            .blog
            .reblog_post(&self.config.blog.name, &reblog)
            .await
            .map_err(BotError::Publish)?;
        info!("Go check it out at {}", post_url(&self.config.blog.name, &id));
        Ok(id)
    }
}

/// Removes every artifact derived from `image`, and the image itself when it was generated.
async fn cleanup(assembler: &MediaAssembler, image: &ComposedImage) {
    let storage = assembler.storage();
    let mut paths = vec![narration_path(&image.path), video_path(&image.path)];
    if image.generated {
        paths.push(image.path.clone());
    }
    for path in paths {
        if let Err(e) = storage.delete(&path).await {
            warn!("Failed to remove {}: {:#}", path.display(), e);
        }
    }
}

pub fn narration_path(image: &Path) -> PathBuf {
    with_suffix(image, ".wav")
}

pub fn video_path(image: &Path) -> PathBuf {
    with_suffix(image, ".mp4")
}

fn advance(from: PipelineStage, to: PipelineStage) -> PipelineStage {
    info!("Stage: {} -> {}", from, to);
    to
}
