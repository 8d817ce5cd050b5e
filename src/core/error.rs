use std::path::PathBuf;

use thiserror::Error;

/// Failures the publish pipeline distinguishes between.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("text generator returned no usable output")]
    GenerationUnavailable,

    #[error("{tool} exited with {status}: {stderr}")]
    MediaTool {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("no local loop files matched in {0}")]
    NoLoopsAvailable(PathBuf),

    #[error("voice catalog is empty for language '{0}'")]
    NoVoices(String),

    #[error("network request failed: {0:#}")]
    Network(anyhow::Error),

    #[error("publishing failed: {0:#}")]
    Publish(anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

pub type BotResult<T> = std::result::Result<T, BotError>;
