use async_trait::async_trait;
use log::{debug, error};
use std::path::{Path, PathBuf};

use super::{MediaConfig, MediaTools};
use crate::core::error::{BotError, BotResult};

const MAX_VIDEO_WIDTH: u32 = 720;
const NARRATION_FILTERS: &str = "extrastereo,lowpass=3000,highpass=200,alimiter";
const SOUNDTRACK_FILTER: &str = "[1:a]loudnorm[s];[0:a][s]amix=duration=shortest[a]";

/// Runs the ffmpeg suite and ImageMagick as child processes.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    config: MediaConfig,
}

impl FfmpegTools {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    async fn run(&self, program: &str, args: &[String]) -> BotResult<Vec<u8>> {
        debug!("> {} {}", program, args.join(" "));
        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("{} failed: {}\n> {} {}", program, stderr, program, args.join(" "));
            return Err(BotError::MediaTool {
                tool: program.to_string(),
                status: output.status.to_string(),
                stderr,
            });
        }
        Ok(output.stdout)
    }
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Static images are placed side by side; animations are joined frame after frame.
pub fn combine_args(inputs: &[PathBuf], output: &Path, animated: bool) -> Vec<String> {
    let mut args: Vec<String> = inputs.iter().map(|p| arg(p)).collect();
    if !animated {
        args.push("+append".to_string());
    }
    args.push(arg(output));
    args
}

pub fn mux_args(audio: &Path, image: &Path, output: &Path, animated: bool) -> Vec<String> {
    let mut args = vec!["-i".to_string(), arg(audio)];
    if animated {
        args.extend(strings(&["-ignore_loop", "0"]));
    } else {
        args.extend(strings(&["-loop", "1"]));
    }
    args.extend(["-i".to_string(), arg(image)]);
    args.extend([
        "-vf".to_string(),
        format!("scale='min({},iw)':-2", MAX_VIDEO_WIDTH),
    ]);
    args.extend(strings(&[
        "-shortest", "-strict", "-2", "-c:v", "libx264", "-threads", "4", "-c:a", "aac", "-b:a",
        "192k", "-pix_fmt", "yuv420p", "-y", "-af", NARRATION_FILTERS,
    ]));
    args.push(arg(output));
    args
}

pub fn probe_args(media: &Path) -> Vec<String> {
    let mut args = strings(&[
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]);
    args.push(arg(media));
    args
}

/// Loops `music` under the video's narration for `seconds`, normalizing its loudness.
pub fn soundtrack_args(video: &Path, music: &Path, seconds: u64, output: &Path) -> Vec<String> {
    let mut args = vec!["-i".to_string(), arg(video)];
    args.extend(strings(&["-stream_loop", "-1", "-i"]));
    args.push(arg(music));
    args.extend(strings(&[
        "-filter_complex",
        SOUNDTRACK_FILTER,
        "-map",
        "0:v",
        "-map",
        "[a]",
        "-c:v",
        "copy",
        "-t",
    ]));
    args.push(seconds.to_string());
    args.push("-y".to_string());
    args.push(arg(output));
    args
}

pub fn voice_mix_args(inputs: &[PathBuf], output: &Path) -> Vec<String> {
    let mut args = Vec::new();
    for input in inputs {
        args.push("-i".to_string());
        args.push(arg(input));
    }
    args.push("-filter_complex".to_string());
    args.push(format!(
        "amix=inputs={}:duration=longest:normalize=0",
        inputs.len()
    ));
    args.push("-y".to_string());
    args.push(arg(output));
    args
}

pub fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse::<f64>().ok())
}

#[async_trait]
impl MediaTools for FfmpegTools {
    async fn combine_images(&self, inputs: &[PathBuf], output: &Path, animated: bool) -> BotResult<()> {
        self.run(&self.config.convert, &combine_args(inputs, output, animated))
            .await?;
        Ok(())
    }

    async fn mux_video(&self, audio: &Path, image: &Path, output: &Path, animated: bool) -> BotResult<()> {
        self.run(&self.config.ffmpeg, &mux_args(audio, image, output, animated))
            .await?;
        Ok(())
    }

    async fn probe_duration(&self, media: &Path) -> BotResult<f64> {
        let stdout = self.run(&self.config.ffprobe, &probe_args(media)).await?;
        let text = String::from_utf8_lossy(&stdout);
        parse_duration(&text).ok_or_else(|| BotError::MediaTool {
            tool: self.config.ffprobe.clone(),
            status: "0".to_string(),
            stderr: format!("unreadable duration '{}'", text.trim()),
        })
    }

    async fn mix_soundtrack(&self, video: &Path, music: &Path, seconds: u64, output: &Path) -> BotResult<()> {
        self.run(&self.config.ffmpeg, &soundtrack_args(video, music, seconds, output))
            .await?;
        Ok(())
    }

    async fn mix_voices(&self, inputs: &[PathBuf], output: &Path) -> BotResult<()> {
        self.run(&self.config.ffmpeg, &voice_mix_args(inputs, output))
            .await?;
        Ok(())
    }
}
