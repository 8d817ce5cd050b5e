use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{BlogPublisher, Reblog, VideoPost};

const API_BASE: &str = "https://api.tumblr.com/v2";
const VIDEO_PART: &str = "video0";

/// Tumblr API v2 client authenticated with an OAuth2 bearer token.
pub struct TumblrClient {
    token: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    response: Value,
}

impl TumblrClient {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            base_url: API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn read_response(resp: reqwest::Response, action: &str) -> Result<Value> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(anyhow!("Tumblr {} failed ({}): {}", action, status, body));
        }
        let envelope: Envelope = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Failed to parse Tumblr response: {}. Body: {}", e, body))?;
        Ok(envelope.response)
    }
}

/// NPF body: the video block first, then one text block per story line.
pub fn npf_video_body(post: &VideoPost) -> Value {
    let mut content = vec![json!({
        "type": "video",
        "media": { "identifier": VIDEO_PART, "type": "video/mp4" },
    })];
    content.extend(
        post.caption
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| json!({ "type": "text", "text": l })),
    );

    let mut body = json!({
        "content": content,
        "tags": post.tags.join(","),
        "state": post.state.as_str(),
    });
    if let Some(url) = &post.source_url {
        body["source_url"] = json!(url);
    }
    body
}

/// Post ids come back as numbers from some endpoints and strings from others.
fn post_id(response: &Value) -> Result<String> {
    let id = response
        .get("id_string")
        .or_else(|| response.get("id"))
        .context("Tumblr response has no post id")?;
    match id {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(anyhow!("Unexpected post id: {}", other)),
    }
}

fn reblog_key(response: &Value) -> Result<String> {
    response["posts"]
        .get(0)
        .and_then(|p| p["reblog_key"].as_str())
        .map(str::to_string)
        .context("Post not found or missing reblog key")
}

#[async_trait]
impl BlogPublisher for TumblrClient {
    async fn create_video_post(&self, blog: &str, post: &VideoPost) -> Result<String> {
        let video = tokio::fs::read(&post.video)
            .await
            .with_context(|| format!("Failed to read {}", post.video.display()))?;
        let file_name = post
            .video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        let form = Form::new()
            .part(
                "json",
                Part::text(npf_video_body(post).to_string()).mime_str("application/json")?,
            )
            .part(
                VIDEO_PART,
                Part::bytes(video).file_name(file_name).mime_str("video/mp4")?,
            );

        let resp = self
            .client
            .post(format!("{}/blog/{}/posts", self.base_url, blog))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;
        post_id(&Self::read_response(resp, "video post").await?)
    }

    async fn get_reblog_key(&self, blog: &str, post_id: &str) -> Result<String> {
        let url = url::Url::parse_with_params(
            &format!("{}/blog/{}/posts", self.base_url, blog),
            &[("id", post_id)],
        )?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        reblog_key(&Self::read_response(resp, "post lookup").await?)
    }

    async fn reblog_post(&self, blog: &str, reblog: &Reblog) -> Result<String> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id", &reblog.post_id)
            .append_pair("reblog_key", &reblog.reblog_key)
            .append_pair("comment", &reblog.comment)
            .append_pair("tags", &reblog.tags.join(","))
            .finish();

        let resp = self
            .client
            .post(format!("{}/blog/{}/post/reblog", self.base_url, blog))
            .bearer_auth(&self.token)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;
        post_id(&Self::read_response(resp, "reblog").await?)
    }
}
