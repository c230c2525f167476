use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::config::{FacebookCredentials, InstagramCredentials, WordPressCredentials};

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v20.0";

/// Why a post did not go out.
///
/// `Misconfigured` and `Rejected` will fail the same way on every attempt;
/// only `Transient` is worth retrying.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("{platform} is not configured: {reason}")]
    Misconfigured {
        platform: &'static str,
        reason: String,
    },

    #[error("{platform} request failed: {message}")]
    Transient {
        platform: &'static str,
        message: String,
    },

    #[error("{platform} rejected the request (status {status}): {body}")]
    Rejected {
        platform: &'static str,
        status: u16,
        body: String,
    },

    #[error("{platform} does not support this: {reason}")]
    Unsupported {
        platform: &'static str,
        reason: String,
    },

    #[error("failed to read attachment {path}: {source}")]
    Attachment {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PublishError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Transient { .. })
    }

    fn network(platform: &'static str, err: reqwest::Error) -> Self {
        PublishError::Transient {
            platform,
            message: err.to_string(),
        }
    }
}

/// What to publish
#[derive(Debug, Clone, Copy)]
pub struct Post<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub image: Option<&'a Path>,
}

/// Identifier the platform assigned, when it returns one
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReceipt {
    pub platform: &'static str,
    pub id: Option<String>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn platform(&self) -> &'static str;

    async fn publish(&self, post: &Post<'_>) -> Result<PublishReceipt, PublishError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Publish, retrying transient failures with exponential backoff
pub async fn publish_with_retry(
    publisher: &dyn Publisher,
    post: &Post<'_>,
    policy: RetryPolicy,
) -> Result<PublishReceipt, PublishError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        match publisher.publish(post).await {
            Ok(receipt) => return Ok(receipt),
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                let backoff = policy.base_delay * 2_u32.pow(attempt);
                warn!(
                    platform = publisher.platform(),
                    attempt = attempt + 1,
                    error = %e,
                    "publish failed, retrying in {:?}",
                    backoff
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn classify_status(platform: &'static str, status: StatusCode, body: String) -> PublishError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        PublishError::Transient {
            platform,
            message: format!("HTTP {}: {}", status, body),
        }
    } else {
        PublishError::Rejected {
            platform,
            status: status.as_u16(),
            body,
        }
    }
}

/// Body of a successful response, or the classified error.
///
/// After a 2xx the post exists. An unreadable body is logged and read as
/// `null` so it never reaches the retry loop.
async fn check_response(
    platform: &'static str,
    response: Response,
) -> Result<serde_json::Value, PublishError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("unknown error"));
        return Err(classify_status(platform, status, body));
    }
    match response.text().await {
        Ok(body) => Ok(success_body(platform, &body)),
        Err(e) => {
            warn!(platform, error = %e, "failed to read response body after success");
            Ok(serde_json::Value::Null)
        }
    }
}

fn success_body(platform: &'static str, body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|e| {
        warn!(platform, error = %e, "response body is not JSON, no id recorded");
        serde_json::Value::Null
    })
}

fn id_of(value: &serde_json::Value) -> Option<String> {
    match value.get("id")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

async fn read_attachment(path: &Path) -> Result<(String, Vec<u8>), PublishError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| PublishError::Attachment {
            path: path.display().to_string(),
            source,
        })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    Ok((name, bytes))
}

fn http_client() -> anyhow::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .context("Failed to create HTTP client")
}

pub struct FacebookPublisher {
    client: Client,
    credentials: Option<FacebookCredentials>,
}

impl FacebookPublisher {
    pub fn new(credentials: Option<FacebookCredentials>) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client()?,
            credentials,
        })
    }
}

#[async_trait]
impl Publisher for FacebookPublisher {
    fn platform(&self) -> &'static str {
        "facebook"
    }

    async fn publish(&self, post: &Post<'_>) -> Result<PublishReceipt, PublishError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| PublishError::Misconfigured {
                platform: self.platform(),
                reason: "FB_PAGE_ACCESS_TOKEN and FB_PAGE_ID must be set".to_string(),
            })?;
        let base = format!("{}/{}", GRAPH_API_BASE, creds.page_id);

        let request = match post.image {
            Some(image) => {
                let (name, bytes) = read_attachment(image).await?;
                let part = Part::bytes(bytes)
                    .file_name(name)
                    .mime_str(mime_for(image))
                    .map_err(|e| PublishError::network(self.platform(), e))?;
                let form = Form::new()
                    .text("caption", post.message.to_string())
                    .text("access_token", creds.page_access_token.clone())
                    .part("source", part);
                self.client.post(format!("{}/photos", base)).multipart(form)
            }
            None => self.client.post(format!("{}/feed", base)).form(&[
                ("message", post.message),
                ("access_token", creds.page_access_token.as_str()),
            ]),
        };

        let response = request
            .send()
            .await
            .map_err(|e| PublishError::network(self.platform(), e))?;
        let body = check_response(self.platform(), response).await?;

        info!(platform = self.platform(), "posted");
        Ok(PublishReceipt {
            platform: self.platform(),
            id: id_of(&body),
        })
    }
}

pub struct WordPressPublisher {
    client: Client,
    credentials: Option<WordPressCredentials>,
}

impl WordPressPublisher {
    pub fn new(credentials: Option<WordPressCredentials>) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client()?,
            credentials,
        })
    }

    fn endpoint(&self, creds: &WordPressCredentials, route: &str) -> Result<String, PublishError> {
        let base = Url::parse(&creds.base_url).map_err(|e| PublishError::Misconfigured {
            platform: self.platform(),
            reason: format!("WP_BASE_URL is not a valid URL: {}", e),
        })?;
        Ok(format!(
            "{}/wp-json/wp/v2/{}",
            base.as_str().trim_end_matches('/'),
            route
        ))
    }

    async fn upload_media(
        &self,
        creds: &WordPressCredentials,
        image: &Path,
    ) -> Result<Option<String>, PublishError> {
        let (name, bytes) = read_attachment(image).await?;
        let response = self
            .client
            .post(self.endpoint(creds, "media")?)
            .basic_auth(&creds.username, Some(&creds.application_password))
            .header(CONTENT_DISPOSITION, format!("attachment; filename={}", name))
            .header(CONTENT_TYPE, mime_for(image))
            .body(bytes)
            .send()
            .await
            .map_err(|e| PublishError::network(self.platform(), e))?;
        let body = check_response(self.platform(), response).await?;
        Ok(id_of(&body))
    }
}

#[async_trait]
impl Publisher for WordPressPublisher {
    fn platform(&self) -> &'static str {
        "wordpress"
    }

    async fn publish(&self, post: &Post<'_>) -> Result<PublishReceipt, PublishError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| PublishError::Misconfigured {
                platform: self.platform(),
                reason: "WP_BASE_URL, WP_USERNAME and WP_APPLICATION_PASSWORD must be set"
                    .to_string(),
            })?;

        let media_id = match post.image {
            Some(image) => self.upload_media(creds, image).await?,
            None => None,
        };

        let mut payload = serde_json::json!({
            "title": post.title,
            "content": post.message,
            "status": "publish",
        });
        if let Some(id) = media_id.as_deref().and_then(|id| id.parse::<u64>().ok()) {
            payload["featured_media"] = serde_json::Value::from(id);
        }

        let response = self
            .client
            .post(self.endpoint(creds, "posts")?)
            .basic_auth(&creds.username, Some(&creds.application_password))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PublishError::network(self.platform(), e))?;
        let body = check_response(self.platform(), response).await?;

        info!(platform = self.platform(), "posted");
        Ok(PublishReceipt {
            platform: self.platform(),
            id: id_of(&body),
        })
    }
}

/// Instagram only accepts images by public URL, so direct posting is refused
pub struct InstagramPublisher {
    credentials: Option<InstagramCredentials>,
}

impl InstagramPublisher {
    pub fn new(credentials: Option<InstagramCredentials>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl Publisher for InstagramPublisher {
    fn platform(&self) -> &'static str {
        "instagram"
    }

    async fn publish(&self, _post: &Post<'_>) -> Result<PublishReceipt, PublishError> {
        if self.credentials.is_none() {
            return Err(PublishError::Misconfigured {
                platform: self.platform(),
                reason: "IG_ACCESS_TOKEN and IG_BUSINESS_ACCOUNT_ID must be set".to_string(),
            });
        }
        Err(PublishError::Unsupported {
            platform: self.platform(),
            reason: "the Graph API needs a publicly hosted image URL; host the tile first"
                .to_string(),
        })
    }
}
