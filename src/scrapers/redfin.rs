use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::models::Source;
use crate::scrapers::http::{self, document_headers};
use crate::scrapers::rate_limit::RateLimiter;
use crate::scrapers::traits::FetchMethod;
use crate::scrapers::types::{FetchedPage, PageToken, Region};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};

const GIS_URL: &str = "https://www.redfin.com/stingray/api/gis";
const HOMES_PER_PAGE: u32 = 350;
/// Three years of sales
const SOLD_WITHIN_DAYS: &str = "1095";
const JSON_GUARD: &str = "{}&&";
const SERVER_STATE_MARKER: &str = "window.__reactServerState.props";

/// Keep only listings Redfin marks as sold
pub fn is_sold(home: &Value) -> bool {
    let has_sold_date = home.get("soldDate").map_or(false, |d| !d.is_null());
    let sold_status = home
        .get("mlsStatus")
        .and_then(Value::as_str)
        .map_or(false, |status| status.eq_ignore_ascii_case("sold"));
    let sold_sash = home
        .get("sashes")
        .and_then(Value::as_array)
        .map_or(false, |sashes| {
            sashes.iter().any(|sash| {
                sash.get("sashType").and_then(Value::as_i64) == Some(1)
                    || sash
                        .get("sashTypeName")
                        .and_then(Value::as_str)
                        .map_or(false, |name| name.eq_ignore_ascii_case("sold"))
            })
        });

    has_sold_date || sold_status || sold_sash
}

/// Split a provider page into sold listings, remembering how many were dropped
fn sold_page(homes: Vec<Value>, page: PageToken) -> FetchedPage {
    let total = homes.len();
    let sold: Vec<Value> = homes.into_iter().filter(is_sold).collect();
    let skipped = total - sold.len();
    if skipped > 0 {
        debug!("Skipped {} listings that are not sold", skipped);
    }
    // A page of unsold listings can still be followed by sold ones
    let next = (total > 0).then(|| page.next());
    FetchedPage::new(sold, next).with_skipped(skipped)
}

/// Parse a GIS API response body: strip the `{}&&` guard, return `payload.homes`
pub fn parse_gis_response(body: &str) -> Result<Vec<Value>, serde_json::Error> {
    let json = body.trim_start().strip_prefix(JSON_GUARD).unwrap_or(body);
    let data: Value = serde_json::from_str(json)?;

    Ok(data
        .pointer("/payload/homes")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default())
}

/// Pull `payload.gisResults.homes` out of the server state embedded in a zipcode page
pub fn parse_server_state(html: &str) -> Result<Vec<Value>, serde_json::Error> {
    let Some(start) = html.find(SERVER_STATE_MARKER) else {
        return Ok(Vec::new());
    };
    let after_marker = &html[start + SERVER_STATE_MARKER.len()..];
    let json_start = after_marker
        .find('{')
        .map(|offset| &after_marker[offset..])
        .unwrap_or("");

    // Only the first JSON value matters; whatever script follows is ignored
    let mut stream = serde_json::Deserializer::from_str(json_start).into_iter::<Value>();
    let state = match stream.next() {
        Some(state) => state?,
        None => return Ok(Vec::new()),
    };

    Ok(state
        .pointer("/payload/gisResults/homes")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default())
}

/// Resolves zipcodes to Redfin region ids, caching results
struct RegionResolver {
    patterns: Vec<Regex>,
    cache: Mutex<HashMap<String, String>>,
}

impl RegionResolver {
    fn new() -> Result<Self> {
        let patterns = [
            r#""region_id["']?\s*[:=]\s*(\d+)"#,
            r#"region_id["']?\s*[:=]\s*(\d+)"#,
            r"/region/(\d+)/",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).context("Invalid region id pattern"))
        .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn cached(&self, zipcode: &str) -> Option<String> {
        self.cache.lock().ok()?.get(zipcode).cloned()
    }

    fn remember(&self, zipcode: &str, region_id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(zipcode.to_string(), region_id.to_string());
        }
    }

    fn find_in(&self, html: &str) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|pattern| pattern.captures(html))
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Redfin GIS API: the JSON endpoint behind the map view
pub struct RedfinApiMethod {
    client: Client,
    resolver: RegionResolver,
    timeout_secs: u64,
}

impl RedfinApiMethod {
    const NAME: &'static str = "redfin-api";

    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config)?,
            resolver: RegionResolver::new()?,
            timeout_secs: config.request_timeout.as_secs(),
        })
    }

    async fn region_id(&self, region: &Region, limiter: &RateLimiter) -> Result<String, ScrapeError> {
        if let Some(region_id) = self.resolver.cached(&region.zipcode) {
            return Ok(region_id);
        }

        limiter.acquire().await;
        let url = format!("https://www.redfin.com/zipcode/{}", region.zipcode);
        let html = http::fetch_text(
            document_headers(self.client.get(&url)),
            Self::NAME,
            self.timeout_secs,
        )
        .await?;

        let region_id = self.resolver.find_in(&html).ok_or_else(|| {
            ScrapeError::parse(Self::NAME, format!("no region id on zipcode page for {}", region))
        })?;
        debug!("Found region_id {} for zipcode {}", region_id, region);
        self.resolver.remember(&region.zipcode, &region_id);
        Ok(region_id)
    }
}

#[async_trait]
impl FetchMethod for RedfinApiMethod {
    async fn fetch_page(
        &self,
        region: &Region,
        page: PageToken,
        limiter: &RateLimiter,
    ) -> Result<FetchedPage, ScrapeError> {
        let region_id = self.region_id(region, limiter).await?;
        let start = (page.number() - 1) * HOMES_PER_PAGE;
        let page_number = page.number().to_string();
        let num_homes = HOMES_PER_PAGE.to_string();
        let start = start.to_string();

        let params = [
            ("al", "1"),
            ("include_nearby_homes", "true"),
            ("market", "national"),
            ("num_homes", num_homes.as_str()),
            ("ord", "redfin-recommended-asc"),
            ("page_number", page_number.as_str()),
            ("region_id", region_id.as_str()),
            ("region_type", "2"),
            ("sold_within_days", SOLD_WITHIN_DAYS),
            ("start", start.as_str()),
            ("status", "9"),
            ("uipt", "1,2,3,4,5,6,7,8"),
            ("v", "8"),
        ];
        let referer = format!(
            "https://www.redfin.com/zipcode/{}/filter/include=sold-3yr/page-{}",
            region.zipcode,
            page.number()
        );

        limiter.acquire().await;
        info!("Fetching Redfin API page {} for {}...", page.number(), region);
        let body = http::fetch_text(
            self.client
                .get(GIS_URL)
                .query(&params)
                .header("Accept", "application/json")
                .header("Referer", referer),
            Self::NAME,
            self.timeout_secs,
        )
        .await?;

        let homes = parse_gis_response(&body)
            .map_err(|err| ScrapeError::parse(Self::NAME, err.to_string()))?;
        debug!("Page {}: {} homes", page.number(), homes.len());

        Ok(sold_page(homes, page))
    }

    fn source(&self) -> Source {
        Source::Redfin
    }

    fn method_name(&self) -> &'static str {
        Self::NAME
    }
}

/// Redfin zipcode page with the search results embedded as server state
pub struct RedfinHtmlMethod {
    client: Client,
    timeout_secs: u64,
}

impl RedfinHtmlMethod {
    const NAME: &'static str = "redfin-html";

    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config)?,
            timeout_secs: config.request_timeout.as_secs(),
        })
    }

    pub fn page_url(region: &Region, page: PageToken) -> String {
        let base = format!(
            "https://www.redfin.com/zipcode/{}/filter/include=sold-3yr",
            region.zipcode
        );
        if page.is_first() {
            base
        } else {
            format!("{}/page-{}", base, page.number())
        }
    }
}

#[async_trait]
impl FetchMethod for RedfinHtmlMethod {
    async fn fetch_page(
        &self,
        region: &Region,
        page: PageToken,
        limiter: &RateLimiter,
    ) -> Result<FetchedPage, ScrapeError> {
        let url = Self::page_url(region, page);

        limiter.acquire().await;
        info!("Fetching Redfin page {}", url);
        let html = http::fetch_text(
            document_headers(self.client.get(&url)),
            Self::NAME,
            self.timeout_secs,
        )
        .await?;

        let homes = parse_server_state(&html)
            .map_err(|err| ScrapeError::parse(Self::NAME, err.to_string()))?;

        if homes.is_empty() {
            if let Some(reason) = http::block_reason(&html) {
                return Err(ScrapeError::Blocked {
                    method: Self::NAME,
                    reason: reason.to_string(),
                });
            }
            warn!("No server state homes on {}", url);
        }

        Ok(sold_page(homes, page))
    }

    fn source(&self) -> Source {
        Source::Redfin
    }

    fn method_name(&self) -> &'static str {
        Self::NAME
    }
}
