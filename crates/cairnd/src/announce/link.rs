//! Clients for the rendezvous registry.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("registry answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Publishes `(key, port)` pairs so peers can find this node.
#[async_trait]
pub trait DiscoveryLink: Send + Sync {
    async fn announce(&self, key: &str, port: u16, meta: &Value) -> Result<(), LinkError>;
}

/// HTTP link to a grape node: `POST <grape_url>/announce`.
pub struct GrapeLink {
    client: reqwest::Client,
    grape_url: String,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

impl GrapeLink {
    pub fn new(grape_url: impl Into<String>) -> Result<Self, LinkError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            grape_url: grape_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn grape_url(&self) -> &str {
        &self.grape_url
    }
}

#[async_trait]
impl DiscoveryLink for GrapeLink {
    async fn announce(&self, key: &str, port: u16, meta: &Value) -> Result<(), LinkError> {
        let mut data = vec![json!(key), json!(port)];
        if meta.as_object().is_some_and(|m| !m.is_empty()) {
            data.push(meta.clone());
        }
        let body = json!({
            "rid": request_id(),
            "data": data,
        });

        let resp = self
            .client
            .post(format!("{}/announce", self.grape_url))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

fn request_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
