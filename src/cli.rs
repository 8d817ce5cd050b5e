use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use fierifiction::services::blog::PostState;
use fierifiction::services::workflow::{ReblogTarget, TextRequest, VideoRequest};
use fierifiction::utils::text::CaptionInput;

#[derive(Parser, Debug)]
#[command(name = "fierifiction", version, about = "Narrated story videos for your blog")]
pub struct Cli {
    #[arg(long, global = true, default_value = "config.yml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a story, narrate it over the image and post the video.
    Video(VideoArgs),
    /// Reblog a post with a generated story as the comment.
    Text(TextArgs),
    /// Build a video from an image and existing narration, without posting.
    Assemble(AssembleArgs),
    /// List the voices available for the configured language.
    Voices,
}

#[derive(Args, Debug)]
pub struct VideoArgs {
    #[arg(long = "image", required = true)]
    pub images: Vec<PathBuf>,

    /// Caption text; repeat for subtitle fragments.
    #[arg(long = "caption", required = true)]
    pub captions: Vec<String>,

    #[arg(long = "tag")]
    pub tags: Vec<String>,

    #[arg(long)]
    pub source_url: Option<String>,

    #[arg(long, default_value = "published")]
    pub state: PostState,

    /// Post to reblog with the story if the video cannot be published.
    #[arg(long, requires = "reblog_blog")]
    pub reblog_post_id: Option<String>,

    #[arg(long, requires = "reblog_post_id")]
    pub reblog_blog: Option<String>,

    /// Narrate the caption as given instead of generating a story.
    #[arg(long)]
    pub use_story: bool,

    #[arg(long = "loop")]
    pub loop_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TextArgs {
    #[arg(long = "caption", required = true)]
    pub captions: Vec<String>,

    #[arg(long)]
    pub post_id: String,

    #[arg(long)]
    pub blog: String,

    #[arg(long = "tag")]
    pub tags: Vec<String>,

    #[arg(long)]
    pub use_story: bool,
}

#[derive(Args, Debug)]
pub struct AssembleArgs {
    #[arg(long)]
    pub image: PathBuf,

    #[arg(long)]
    pub audio: PathBuf,

    #[arg(long, default_value = "video.mp4")]
    pub output: PathBuf,

    #[arg(long = "loop")]
    pub loop_file: Option<PathBuf>,
}

fn caption_input(mut captions: Vec<String>) -> CaptionInput {
    if captions.len() == 1 {
        CaptionInput::Text(captions.remove(0))
    } else {
        CaptionInput::Fragments(captions)
    }
}

impl VideoArgs {
    pub fn into_request(self) -> VideoRequest {
        let reblog = match (self.reblog_post_id, self.reblog_blog) {
            (Some(post_id), Some(blog)) => Some(ReblogTarget { post_id, blog }),
            _ => None,
        };
        VideoRequest {
            images: self.images,
            captions: caption_input(self.captions),
            tags: self.tags,
            source_url: self.source_url,
            state: self.state,
            reblog,
            use_story: self.use_story,
            soundtrack: self.loop_file,
        }
    }
}

impl TextArgs {
    pub fn into_request(self) -> TextRequest {
        TextRequest {
            captions: caption_input(self.captions),
            target: ReblogTarget {
                post_id: self.post_id,
                blog: self.blog,
            },
            tags: self.tags,
            use_story: self.use_story,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_args() {
        let cli = Cli::try_parse_from([
            "fierifiction",
            "video",
            "--image",
            "a.gif",
            "--caption",
            "Welcome",
            "--caption",
            "to Flavortown",
            "--tag",
            "guy",
            "--state",
            "draft",
            "--reblog-post-id",
            "42",
            "--reblog-blog",
            "source",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("config.yml"));

        let Command::Video(args) = cli.command else {
            panic!("expected video subcommand");
        };
        let request = args.into_request();
        assert_eq!(
            request.captions,
            CaptionInput::Fragments(vec!["Welcome".into(), "to Flavortown".into()])
        );
        assert_eq!(request.state, PostState::Draft);
        assert_eq!(request.reblog.unwrap().post_id, "42");
        assert!(request.soundtrack.is_none());
    }

    #[test]
    fn test_reblog_needs_both_parts() {
        let result = Cli::try_parse_from([
            "fierifiction",
            "video",
            "--image",
            "a.png",
            "--caption",
            "Hi.",
            "--reblog-post-id",
            "42",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_text_args_single_caption() {
        let cli = Cli::try_parse_from([
            "fierifiction",
            "--config",
            "bot.yml",
            "text",
            "--caption",
            "Donkey sauce.",
            "--post-id",
            "9",
            "--blog",
            "source",
            "--use-story",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("bot.yml"));
        let Command::Text(args) = cli.command else {
            panic!("expected text subcommand");
        };
        let request = args.into_request();
        assert_eq!(request.captions, CaptionInput::Text("Donkey sauce.".into()));
        assert!(request.use_story);
    }
}
