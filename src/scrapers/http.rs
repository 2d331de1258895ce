use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use anyhow::{Context, Result};
use reqwest::{Client, Proxy, RequestBuilder};
use tracing::debug;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Build the browser-like HTTP client shared by the API and HTML methods.
///
/// Cookies are kept so a warm-up page visit carries over to later API calls.
pub fn build_client(config: &ScraperConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(config.request_timeout)
        .user_agent(USER_AGENT)
        .cookie_store(true);

    if let Some(proxy_url) = &config.proxy_url {
        let proxy = Proxy::all(proxy_url).context("Invalid SCRAPER_PROXY_URL")?;
        builder = builder.proxy(proxy);
    }

    builder.build().context("Failed to create HTTP client")
}

/// Headers a desktop Chrome sends when navigating to a page
pub fn document_headers(request: RequestBuilder) -> RequestBuilder {
    request
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        )
        .header("Accept-Language", "en-US,en;q=0.9")
        .header("Upgrade-Insecure-Requests", "1")
        .header("Sec-Fetch-Dest", "document")
        .header("Sec-Fetch-Mode", "navigate")
        .header("Sec-Fetch-Site", "none")
        .header("Sec-Fetch-User", "?1")
}

/// Send a request and return its body, mapping failures onto [`ScrapeError`]
pub async fn fetch_text(
    request: RequestBuilder,
    method: &'static str,
    timeout_secs: u64,
) -> Result<String, ScrapeError> {
    let response = request
        .send()
        .await
        .map_err(|err| ScrapeError::transport(method, err, timeout_secs))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::Status { method, status });
    }

    let body = response
        .text()
        .await
        .map_err(|err| ScrapeError::transport(method, err, timeout_secs))?;
    debug!("{}: downloaded {} bytes", method, body.len());
    Ok(body)
}

/// Text a provider serves instead of results when it suspects a bot
pub fn block_reason(html: &str) -> Option<&'static str> {
    if html.contains("Press & Hold") {
        Some("press-and-hold challenge")
    } else if html.contains("Access Denied") || html.contains("Access to this page has been denied") {
        Some("access denied")
    } else if html.to_ascii_lowercase().contains("captcha") {
        Some("captcha")
    } else {
        None
    }
}
