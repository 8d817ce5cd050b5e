use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub mod tumblr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostState {
    #[default]
    Published,
    Draft,
    Queue,
    Private,
}

impl PostState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostState::Published => "published",
            PostState::Draft => "draft",
            PostState::Queue => "queue",
            PostState::Private => "private",
        }
    }
}

impl FromStr for PostState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "published" => Ok(PostState::Published),
            "draft" => Ok(PostState::Draft),
            "queue" => Ok(PostState::Queue),
            "private" => Ok(PostState::Private),
            other => Err(anyhow::anyhow!("Unknown post state: {}", other)),
        }
    }
}

impl fmt::Display for PostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct VideoPost {
    /// The story; each line becomes its own text block.
    pub caption: String,
    pub video: PathBuf,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub state: PostState,
}

#[derive(Debug, Clone)]
pub struct Reblog {
    pub post_id: String,
    pub reblog_key: String,
    pub tags: Vec<String>,
    pub comment: String,
}

/// The blogging platform. Returned strings are post ids.
#[async_trait]
pub trait BlogPublisher: Send + Sync {
    async fn create_video_post(&self, blog: &str, post: &VideoPost) -> Result<String>;
    async fn get_reblog_key(&self, blog: &str, post_id: &str) -> Result<String>;
    async fn reblog_post(&self, blog: &str, reblog: &Reblog) -> Result<String>;
}

pub fn post_url(blog: &str, post_id: &str) -> String {
    format!("https://{}.tumblr.com/post/{}", blog, post_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_state_round_trip() {
        for state in [
            PostState::Published,
            PostState::Draft,
            PostState::Queue,
            PostState::Private,
        ] {
            assert_eq!(state.as_str().parse::<PostState>().unwrap(), state);
        }
        assert!("scheduled".parse::<PostState>().is_err());
        assert_eq!(PostState::default(), PostState::Published);
    }

    #[test]
    fn test_post_url() {
        assert_eq!(post_url("fieri", "42"), "https://fieri.tumblr.com/post/42");
    }
}
