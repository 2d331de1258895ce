use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::models::Source;
use crate::scrapers::http::{self, document_headers};
use crate::scrapers::rate_limit::RateLimiter;
use crate::scrapers::traits::FetchMethod;
use crate::scrapers::types::{FetchedPage, PageToken, Region};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const SEARCH_STATE_URL: &str = "https://www.zillow.com/async-create-search-page-state";

/// Recently-sold search page for a zipcode
pub fn search_page_url(region: &Region, page: PageToken) -> String {
    if page.is_first() {
        format!("https://www.zillow.com/homes/recently_sold/{}_rb/", region.zipcode)
    } else {
        format!(
            "https://www.zillow.com/homes/recently_sold/{}_rb/{}_p/",
            region.zipcode,
            page.number()
        )
    }
}

/// Body for the search-state endpoint, filtered to recently sold homes
pub fn search_query(region: &Region, page: PageToken) -> Value {
    json!({
        "searchQueryState": {
            "isMapVisible": true,
            "isListVisible": true,
            "filterState": {
                "sortSelection": { "value": "globalrelevanceex" },
                "isAllHomes": { "value": true },
                "isRecentlySold": { "value": true },
                "isForSaleByAgent": { "value": false },
                "isForSaleByOwner": { "value": false },
                "isNewConstruction": { "value": false },
                "isComingSoon": { "value": false },
                "isAuction": { "value": false },
                "isForSaleForeclosure": { "value": false }
            },
            "usersSearchTerm": region.zipcode,
            "pagination": { "currentPage": page.number() }
        },
        "wants": {
            "cat1": ["listResults", "mapResults"],
            "cat2": ["total"]
        },
        "requestId": 10
    })
}

/// Listings and page count from a search state (`cat1.searchResults`)
pub fn search_results(state: &Value) -> (Vec<Value>, Option<u64>) {
    let results = state.pointer("/cat1/searchResults");
    let listings = ["listResults", "mapResults"]
        .iter()
        .filter_map(|key| results.and_then(|r| r.get(key)).and_then(Value::as_array))
        .find(|list| !list.is_empty())
        .cloned()
        .unwrap_or_default();
    let total_pages = state
        .pointer("/cat1/searchList/totalPages")
        .and_then(Value::as_u64);

    (listings, total_pages)
}

fn next_token(listings: &[Value], total_pages: Option<u64>, page: PageToken) -> Option<PageToken> {
    match total_pages {
        Some(total) if u64::from(page.number()) >= total => None,
        _ if listings.is_empty() => None,
        _ => Some(page.next()),
    }
}

/// Find the search state embedded in a search page's JSON script blocks
pub fn results_from_html(html: &str) -> Result<(Vec<Value>, Option<u64>), ScrapeError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/json"]"#)
        .map_err(|err| ScrapeError::parse(ZillowHtmlMethod::NAME, err.to_string()))?;

    for script in document.select(&selector) {
        let text = script.text().collect::<String>();
        let Ok(data) = serde_json::from_str::<Value>(&text) else {
            continue;
        };

        let state = data
            .get("searchPageState")
            .or_else(|| data.pointer("/props/pageProps/searchPageState"));
        if let Some(state) = state {
            let (listings, total_pages) = search_results(state);
            if !listings.is_empty() {
                debug!("Found {} listings in embedded JSON", listings.len());
                return Ok((listings, total_pages));
            }
        }
    }

    Ok((Vec::new(), None))
}

/// Zillow's internal search-state endpoint, called after a warm-up page visit
pub struct ZillowApiMethod {
    client: Client,
    timeout_secs: u64,
}

impl ZillowApiMethod {
    const NAME: &'static str = "zillow-api";

    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config)?,
            timeout_secs: config.request_timeout.as_secs(),
        })
    }

    /// Visit the search page first so the session cookies look like a browser's
    async fn warm_up(&self, region: &Region, limiter: &RateLimiter) {
        limiter.acquire().await;
        let url = search_page_url(region, PageToken::first());
        debug!("Visiting search page to establish session: {}", url);

        match http::fetch_text(document_headers(self.client.get(&url)), Self::NAME, self.timeout_secs).await {
            Ok(_) => tokio::time::sleep(Duration::from_secs(1)).await,
            Err(err) => debug!("Session warm-up failed, continuing anyway: {}", err),
        }
    }
}

#[async_trait]
impl FetchMethod for ZillowApiMethod {
    async fn fetch_page(
        &self,
        region: &Region,
        page: PageToken,
        limiter: &RateLimiter,
    ) -> Result<FetchedPage, ScrapeError> {
        if page.is_first() {
            self.warm_up(region, limiter).await;
        }

        limiter.acquire().await;
        info!("Fetching Zillow API page {} for {}...", page.number(), region);
        let body = http::fetch_text(
            self.client
                .put(SEARCH_STATE_URL)
                .header("Accept", "*/*")
                .header("Accept-Language", "en-US,en;q=0.9")
                .header("Origin", "https://www.zillow.com")
                .header("Referer", search_page_url(region, page))
                .header("Sec-Fetch-Dest", "empty")
                .header("Sec-Fetch-Mode", "cors")
                .header("Sec-Fetch-Site", "same-origin")
                .json(&search_query(region, page)),
            Self::NAME,
            self.timeout_secs,
        )
        .await?;

        let state: Value = serde_json::from_str(&body)
            .map_err(|err| ScrapeError::parse(Self::NAME, err.to_string()))?;
        let (listings, total_pages) = search_results(&state);
        let next = next_token(&listings, total_pages, page);

        Ok(FetchedPage::new(listings, next))
    }

    fn source(&self) -> Source {
        Source::Zillow
    }

    fn method_name(&self) -> &'static str {
        Self::NAME
    }
}

/// Recently-sold search page with results embedded as JSON
pub struct ZillowHtmlMethod {
    client: Client,
    timeout_secs: u64,
}

impl ZillowHtmlMethod {
    pub(crate) const NAME: &'static str = "zillow-html";

    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config)?,
            timeout_secs: config.request_timeout.as_secs(),
        })
    }
}

#[async_trait]
impl FetchMethod for ZillowHtmlMethod {
    async fn fetch_page(
        &self,
        region: &Region,
        page: PageToken,
        limiter: &RateLimiter,
    ) -> Result<FetchedPage, ScrapeError> {
        let url = search_page_url(region, page);

        limiter.acquire().await;
        info!("Fetching Zillow page {}", url);
        let html = http::fetch_text(
            document_headers(self.client.get(&url)),
            Self::NAME,
            self.timeout_secs,
        )
        .await?;

        let (listings, total_pages) = results_from_html(&html)?;
        if listings.is_empty() {
            if let Some(reason) = http::block_reason(&html) {
                return Err(ScrapeError::Blocked {
                    method: Self::NAME,
                    reason: reason.to_string(),
                });
            }
            warn!("No embedded search results on {}", url);
        }
        let next = next_token(&listings, total_pages, page);

        Ok(FetchedPage::new(listings, next))
    }

    fn source(&self) -> Source {
        Source::Zillow
    }

    fn method_name(&self) -> &'static str {
        Self::NAME
    }
}
