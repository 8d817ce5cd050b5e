use anyhow::Result;
use async_trait::async_trait;
use globset::Glob;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::error::{BotError, BotResult};
use crate::core::io::Storage;
use crate::core::random::{pick, Chooser};
use crate::utils::text::{extract_query, slugify};

pub mod spotify;

/// Files with this name prefix were downloaded for one run and are deleted after use.
pub const TEMP_CLIP_PREFIX: &str = "temp-";
/// Longest query tried first; the ladder walks down to one word.
const MAX_QUERY_WORDS: usize = 4;
const SLUG_QUERY_WORDS: usize = 3;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MusicConfig {
    #[serde(default = "default_loops_dir")]
    pub loops_dir: PathBuf,
    /// Glob matched against file names inside `loops_dir`.
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_postfix")]
    pub postfix: String,
    /// Where downloaded preview clips are written.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    pub spotify: Option<spotify::SpotifyConfig>,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            loops_dir: default_loops_dir(),
            pattern: default_pattern(),
            prefix: String::new(),
            postfix: default_postfix(),
            download_dir: default_download_dir(),
            spotify: None,
        }
    }
}

fn default_loops_dir() -> PathBuf {
    PathBuf::from("loops")
}
fn default_pattern() -> String {
    "*.mp3".to_string()
}
fn default_postfix() -> String {
    "instrumental".to_string()
}
fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub name: String,
    pub preview_url: Option<String>,
}

#[async_trait]
pub trait MusicCatalog: Send + Sync {
    async fn search_tracks(&self, query: &str) -> Result<Vec<Track>>;
    async fn download_preview(&self, url: &str) -> Result<Vec<u8>>;
}

pub fn is_temp_clip(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(TEMP_CLIP_PREFIX))
}

/// Queries from most to least specific: with the postfix for 4..1 words, then without.
pub fn query_ladder(story: &str, prefix: &str, postfix: &str) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    for with_postfix in [true, false] {
        for words in (1..=MAX_QUERY_WORDS).rev() {
            let Some(core) = extract_query(story, words) else {
                continue;
            };
            let tail = if with_postfix { postfix } else { "" };
            let query = format!("{} {} {}", prefix, core, tail)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if !queries.contains(&query) {
                queries.push(query);
            }
        }
    }
    queries
}

/// Finds a soundtrack for a story: a matching preview clip from the catalog,
/// or one of the bundled loops when anything along the way comes up empty.
pub struct SongFinder {
    catalog: Option<Arc<dyn MusicCatalog>>,
    storage: Arc<dyn Storage>,
    chooser: Arc<dyn Chooser>,
    config: MusicConfig,
}

impl SongFinder {
    pub fn new(
        catalog: Option<Arc<dyn MusicCatalog>>,
        storage: Arc<dyn Storage>,
        chooser: Arc<dyn Chooser>,
        config: MusicConfig,
    ) -> Self {
        Self {
            catalog,
            storage,
            chooser,
            config,
        }
    }

    /// Bundled loop files matching the configured pattern.
    pub async fn loops(&self) -> BotResult<Vec<PathBuf>> {
        let matcher = Glob::new(&self.config.pattern)
            .map_err(|e| BotError::Config(e.to_string()))?
            .compile_matcher();
        let entries = self.storage.list(&self.config.loops_dir).await?;
        Ok(entries
            .into_iter()
            .filter(|p| p.file_name().is_some_and(|n| matcher.is_match(n)))
            .collect())
    }

    pub async fn random_loop(&self) -> BotResult<PathBuf> {
        let loops = self.loops().await?;
        pick(self.chooser.as_ref(), &loops)
            .cloned()
            .ok_or_else(|| BotError::NoLoopsAvailable(self.config.loops_dir.clone()))
    }

    pub async fn find_song(&self, story: &str) -> BotResult<PathBuf> {
        let Some(catalog) = self.catalog.as_ref().filter(|_| !story.is_empty()) else {
            info!("Grabbing a random track...");
            return self.random_loop().await;
        };

        match self.search_and_download(catalog.as_ref(), story).await {
            Ok(Some(path)) => Ok(path),
            Ok(None) => {
                info!("Did not find anything, grabbing a random track...");
                self.random_loop().await
            }
            Err(e) => {
                warn!("Song search failed, grabbing a random track: {:#}", e);
                self.random_loop().await
            }
        }
    }

    async fn search_and_download(
        &self,
        catalog: &dyn MusicCatalog,
        story: &str,
    ) -> Result<Option<PathBuf>> {
        let mut items = Vec::new();
        for query in query_ladder(story, &self.config.prefix, &self.config.postfix) {
            info!("Searching for \"{}\"...", query);
            items = catalog.search_tracks(&query).await?;
            if !items.is_empty() {
                break;
            }
        }

        let playable: Vec<&Track> = items.iter().filter(|t| t.preview_url.is_some()).collect();
        let Some(track) = pick(self.chooser.as_ref(), &playable) else {
            return Ok(None);
        };
        let Some(url) = track.preview_url.as_deref() else {
            return Ok(None);
        };

        let slug = slugify(&extract_query(story, SLUG_QUERY_WORDS).unwrap_or_default());
        let path = self
            .config
            .download_dir
            .join(format!("{}{}.mp3", TEMP_CLIP_PREFIX, slug));

        info!("Downloading preview of {}", track.name);
        let data = catalog.download_preview(url).await?;
        self.storage.write(&path, &data).await?;
        Ok(Some(path))
    }
}
