use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

use super::{MusicCatalog, Track};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Track search through the Spotify Web API using client credentials.
pub struct SpotifyClient {
    config: SpotifyConfig,
    client: reqwest::Client,
    token: Mutex<Option<String>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackItem>,
}

#[derive(Deserialize)]
struct TrackItem {
    name: String,
    preview_url: Option<String>,
}

impl From<TrackItem> for Track {
    fn from(item: TrackItem) -> Self {
        Track {
            name: item.name,
            preview_url: item.preview_url,
        }
    }
}

fn search_url(query: &str) -> Result<Url> {
    Ok(Url::parse_with_params(
        SEARCH_URL,
        &[("q", query), ("type", "track")],
    )?)
}

impl SpotifyClient {
    pub fn new(config: SpotifyConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .finish();
        let resp = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Spotify token error: {}", error_text));
        }

        let token: TokenResponse = resp.json().await?;
        *cached = Some(token.access_token.clone());
        Ok(token.access_token)
    }
}

#[async_trait]
impl MusicCatalog for SpotifyClient {
    async fn search_tracks(&self, query: &str) -> Result<Vec<Track>> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .get(search_url(query)?)
            .bearer_auth(token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Spotify search error: {}", error_text));
        }

        let result: SearchResponse = resp.json().await?;
        Ok(result.tracks.items.into_iter().map(Track::from).collect())
    }

    async fn download_preview(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("Preview download failed: {}", resp.status()));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}
