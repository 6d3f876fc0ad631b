//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result};
use serde::Deserialize;

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/api", port)
}

fn unreachable(url: &str) -> String {
    format!("failed to connect to cairnd at {}. Is it running?", url)
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::get(url)
        .await
        .with_context(|| unreachable(url))?
        .error_for_status()
        .context("request rejected")?
        .json::<T>()
        .await
        .context("failed to parse response")
}

pub async fn post_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::Client::new()
        .post(url)
        .send()
        .await
        .with_context(|| unreachable(url))?
        .error_for_status()
        .context("request rejected")?
        .json::<T>()
        .await
        .context("failed to parse response")
}

pub async fn delete_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::Client::new()
        .delete(url)
        .send()
        .await
        .with_context(|| unreachable(url))?
        .error_for_status()
        .context("request rejected")?
        .json::<T>()
        .await
        .context("failed to parse response")
}
