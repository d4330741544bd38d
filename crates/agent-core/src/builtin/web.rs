//! Web Content Tool
//!
//! Fetches a page and hands the model its visible text.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::tool::Tool;

/// Characters of page text handed back to the model
pub const MAX_CONTENT_CHARS: usize = 4000;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Bytes of a response body read before the rest is ignored
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Fetches a URL and returns its cleaned visible text
pub struct WebContentTool {
    client: reqwest::Client,
}

impl Default for WebContentTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WebContentTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("agent-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn fetch(&self, url: &str) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP status {}", response.status()));
        }

        let body = read_capped(response, MAX_BODY_BYTES)
            .await
            .map_err(|e| e.to_string())?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl Tool for WebContentTool {
    fn name(&self) -> &str {
        "fetch_web_content"
    }

    fn description(&self) -> &str {
        "Downloads a web page and returns its visible text (first 4000 characters). \
         args: the full URL, starting with http:// or https://."
    }

    async fn run(&self, args: &str) -> Result<String> {
        let url = args.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Ok(format!(
                "Error fetching '{url}': the URL must start with http:// or https://"
            ));
        }

        tracing::debug!(%url, "Fetching web content");
        match self.fetch(url).await {
            Ok(body) => {
                let text = truncate_chars(&html_to_text(&body), MAX_CONTENT_CHARS);
                Ok(format!(
                    "Content of {url} (first {MAX_CONTENT_CHARS} characters):\n{text}"
                ))
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "Web fetch failed");
                Ok(format!("Error fetching '{url}': {e}"))
            }
        }
    }
}

/// Read at most `limit` bytes of the body, chunk by chunk
async fn read_capped(
    mut response: reqwest::Response,
    limit: usize,
) -> std::result::Result<Vec<u8>, reqwest::Error> {
    let mut body = Vec::with_capacity(limit.min(64 * 1024));
    while let Some(chunk) = response.chunk().await? {
        let room = limit - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            tracing::debug!(limit, "Response body truncated");
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Convert HTML to readable text, dropping script and style content
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next());

    let raw = match body {
        Some(body) => extract_text(body),
        None => extract_text(document.root_element()),
    };

    clean_text(&raw)
}

fn extract_text(element: ElementRef<'_>) -> String {
    let mut output = Vec::new();

    for node in element.descendants() {
        if let Some(text) = node.value().as_text() {
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript" | "template"))
            });
            let trimmed = text.trim();
            if !hidden && !trimmed.is_empty() {
                output.push(trimmed.to_string());
            }
        } else if let Some(el) = node.value().as_element() {
            if matches!(
                el.name(),
                "p" | "div" | "br" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" | "tr"
            ) {
                output.push("\n".to_string());
            }
        }
    }

    output.join(" ")
}

/// Collapse runs of whitespace and blank lines
fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
