use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::error::{BotError, BotResult};
use crate::core::io::Storage;
use crate::services::music::{is_temp_clip, SongFinder};
use crate::services::tts::{Prosody, SpeechRequest, SpeechSynthesizer, VoiceSelector};
use crate::utils::text::replace_musical_notes;

pub mod ffmpeg;

/// Seconds cut from the soundtrack so it never runs past the narration.
const GIF_TRIM_SECONDS: f64 = 3.0;
const STILL_TRIM_SECONDS: f64 = 1.0;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MediaConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
    /// ImageMagick binary used to combine several images.
    #[serde(default = "default_convert")]
    pub convert: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            convert: default_convert(),
        }
    }
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}
fn default_ffprobe() -> String {
    "ffprobe".to_string()
}
fn default_convert() -> String {
    "convert".to_string()
}

/// External media programs. Every call either produces its output file or fails.
#[async_trait]
pub trait MediaTools: Send + Sync {
    async fn combine_images(&self, inputs: &[PathBuf], output: &Path, animated: bool) -> BotResult<()>;
    async fn mux_video(&self, audio: &Path, image: &Path, output: &Path, animated: bool) -> BotResult<()>;
    /// Duration in seconds.
    async fn probe_duration(&self, media: &Path) -> BotResult<f64>;
    async fn mix_soundtrack(&self, video: &Path, music: &Path, seconds: u64, output: &Path) -> BotResult<()>;
    async fn mix_voices(&self, inputs: &[PathBuf], output: &Path) -> BotResult<()>;
}

pub fn is_animated(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gif"))
}

/// `path` with `suffix` appended to its full file name (`a.png` + `.wav` is `a.png.wav`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Soundtrack length for a video, leaving a margin before it ends.
pub fn soundtrack_seconds(duration: f64, animated: bool) -> u64 {
    let trim = if animated { GIF_TRIM_SECONDS } else { STILL_TRIM_SECONDS };
    (duration - trim).floor().max(1.0) as u64
}

/// The image a video is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedImage {
    pub path: PathBuf,
    /// Set when the image was generated and must be cleaned up.
    pub generated: bool,
}

pub struct MediaAssembler {
    tools: Arc<dyn MediaTools>,
    storage: Arc<dyn Storage>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voices: VoiceSelector,
    songs: SongFinder,
    voice_count: usize,
    prosody: Prosody,
}

impl MediaAssembler {
    pub fn new(
        tools: Arc<dyn MediaTools>,
        storage: Arc<dyn Storage>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        voices: VoiceSelector,
        songs: SongFinder,
    ) -> Self {
        Self {
            tools,
            storage,
            synthesizer,
            voices,
            songs,
            voice_count: 1,
            prosody: Prosody::default(),
        }
    }

    pub fn with_voice_count(mut self, voice_count: usize) -> Self {
        self.voice_count = voice_count.max(1);
        self
    }

    pub fn with_prosody(mut self, prosody: Prosody) -> Self {
        self.prosody = prosody;
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// One image passes through. Several are merged next to the first one,
    /// as a GIF when the first is animated and a PNG otherwise.
    pub async fn combine_images(&self, images: &[PathBuf]) -> BotResult<ComposedImage> {
        match images {
            [] => Err(BotError::Config("at least one image is required".into())),
            [single] => Ok(ComposedImage {
                path: single.clone(),
                generated: false,
            }),
            [first, ..] => {
                let animated = is_animated(first);
                let output = with_suffix(first, if animated { "-combined.gif" } else { "-combined.png" });
                info!("Combining {} images into {}", images.len(), output.display());
                if let Err(e) = self.tools.combine_images(images, &output, animated).await {
                    // the tool may have written part of the output before failing
                    if let Err(del) = self.storage.delete(&output).await {
                        warn!("Failed to remove {}: {:#}", output.display(), del);
                    }
                    return Err(e);
                }
                Ok(ComposedImage {
                    path: output,
                    generated: true,
                })
            }
        }
    }

    /// Synthesizes the story to `output`, mixing several voices when configured.
    pub async fn narrate(&self, story: &str, output: &Path) -> BotResult<()> {
        info!("Synthesizing narration");
        let text = replace_musical_notes(story);

        if self.voice_count == 1 {
            let audio = self.synthesize(&text).await?;
            self.storage.write(output, &audio).await?;
            return Ok(());
        }

        let parts: Vec<PathBuf> = (0..self.voice_count)
            .map(|i| with_suffix(output, &format!("-voice{}.wav", i)))
            .collect();
        let result = self.narrate_parts(&text, &parts, output).await;
        for part in &parts {
            if let Err(e) = self.storage.delete(part).await {
                warn!("Failed to remove {}: {:#}", part.display(), e);
            }
        }
        result
    }

    async fn narrate_parts(&self, text: &str, parts: &[PathBuf], output: &Path) -> BotResult<()> {
        for part in parts {
            let audio = self.synthesize(text).await?;
            self.storage.write(part, &audio).await?;
        }
        self.tools.mix_voices(parts, output).await
    }

    async fn synthesize(&self, text: &str) -> BotResult<Vec<u8>> {
        let voice = self.voices.select_voice().await?;
        let request = SpeechRequest {
            text,
            voice: &voice,
            prosody: &self.prosody,
        };
        self.synthesizer
            .synthesize(&request)
            .await
            .map_err(BotError::Network)
    }

    pub async fn assemble_video(&self, image: &Path, audio: &Path, output: &Path) -> BotResult<()> {
        info!("Generating video {}", output.display());
        self.tools
            .mux_video(audio, image, output, is_animated(image))
            .await
    }

    /// Mixes a loop under the video's narration and replaces `video` with the result.
    /// `loop_override` skips the song search.
    pub async fn add_soundtrack(
        &self,
        image: &Path,
        video: &Path,
        story: &str,
        loop_override: Option<&Path>,
    ) -> BotResult<()> {
        let song = match loop_override {
            Some(path) => path.to_path_buf(),
            None => self.songs.find_song(story).await?,
        };
        info!("Adding music: {}", song.display());

        let temp = with_suffix(video, "-temp.mp4");
        let result = self.mix_into(image, video, &song, &temp).await;

        if result.is_err() {
            if let Err(e) = self.storage.delete(&temp).await {
                warn!("Failed to remove {}: {:#}", temp.display(), e);
            }
        }
        if loop_override.is_none() && is_temp_clip(&song) {
            if let Err(e) = self.storage.delete(&song).await {
                warn!("Failed to remove {}: {:#}", song.display(), e);
            }
        }
        result
    }

    async fn mix_into(&self, image: &Path, video: &Path, song: &Path, temp: &Path) -> BotResult<()> {
        let duration = self.tools.probe_duration(video).await?;
        let seconds = soundtrack_seconds(duration, is_animated(image));
        self.tools.mix_soundtrack(video, song, seconds, temp).await?;
        self.storage.replace(temp, video).await?;
        Ok(())
    }
}
