use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::models::Source;
use crate::scrapers::http::{self, USER_AGENT};
use crate::scrapers::rate_limit::RateLimiter;
use crate::scrapers::traits::FetchMethod;
use crate::scrapers::types::{FetchedPage, PageToken, Region};
use crate::scrapers::{redfin, zillow};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cards beyond this are usually placeholders that have not rendered yet
const MAX_CARDS: usize = 20;

/// Settings the blocking browser session needs
#[derive(Debug, Clone)]
struct BrowserSettings {
    headless: bool,
    proxy_url: Option<String>,
    settle: Duration,
}

/// Headless Chrome fallback: renders the recently-sold page like a real visitor
pub struct BrowserMethod {
    source: Source,
    settings: BrowserSettings,
}

impl BrowserMethod {
    pub fn zillow(config: &ScraperConfig) -> Self {
        Self::new(Source::Zillow, config)
    }

    pub fn redfin(config: &ScraperConfig) -> Self {
        Self::new(Source::Redfin, config)
    }

    fn new(source: Source, config: &ScraperConfig) -> Self {
        Self {
            source,
            settings: BrowserSettings {
                headless: config.headless,
                proxy_url: config.proxy_url.clone(),
                settle: Duration::from_secs(5),
            },
        }
    }

    fn name_for(source: Source) -> &'static str {
        match source {
            Source::Zillow => "zillow-browser",
            Source::Redfin => "redfin-browser",
        }
    }

    fn page_url(&self, region: &Region) -> String {
        match self.source {
            Source::Zillow => zillow::search_page_url(region, PageToken::first()),
            Source::Redfin => redfin::RedfinHtmlMethod::page_url(region, PageToken::first()),
        }
    }
}

#[async_trait]
impl FetchMethod for BrowserMethod {
    async fn fetch_page(
        &self,
        region: &Region,
        page: PageToken,
        limiter: &RateLimiter,
    ) -> Result<FetchedPage, ScrapeError> {
        // Only the first rendered page is scraped
        if !page.is_first() {
            return Ok(FetchedPage::empty());
        }

        let source = self.source;
        let url = self.page_url(region);
        let settings = self.settings.clone();

        limiter.acquire().await;
        info!("Opening {} in headless Chrome...", url);
        let html = tokio::task::spawn_blocking(move || render_page(&url, &settings, source))
            .await
            .map_err(|err| browser_error(source, err))??;

        let (listings, skipped) = extract_listings(source, &html)?;
        if listings.is_empty() && skipped == 0 {
            if let Some(reason) = http::block_reason(&html) {
                return Err(ScrapeError::Blocked {
                    method: Self::name_for(source),
                    reason: reason.to_string(),
                });
            }
        }
        info!("Extracted {} candidate listings from rendered page", listings.len());
        Ok(FetchedPage::new(listings, None).with_skipped(skipped))
    }

    fn source(&self) -> Source {
        self.source
    }

    fn method_name(&self) -> &'static str {
        Self::name_for(self.source)
    }
}

fn browser_error(source: Source, err: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::Browser {
        method: BrowserMethod::name_for(source),
        reason: err.to_string(),
    }
}

/// Launch Chrome, load `url`, and return the rendered document HTML
fn render_page(url: &str, settings: &BrowserSettings, source: Source) -> Result<String, ScrapeError> {
    let args = vec![
        OsStr::new("--disable-blink-features=AutomationControlled"),
        OsStr::new("--disable-dev-shm-usage"),
    ];
    let options = LaunchOptions::default_builder()
        .headless(settings.headless)
        .proxy_server(settings.proxy_url.as_deref())
        .args(args)
        .build()
        .map_err(|err| browser_error(source, err))?;

    let browser = Browser::new(options).map_err(|err| browser_error(source, err))?;
    let tab = browser.new_tab().map_err(|err| browser_error(source, err))?;
    tab.set_user_agent(USER_AGENT, Some("en-US"), None)
        .map_err(|err| browser_error(source, err))?;

    tab.navigate_to(url).map_err(|err| browser_error(source, err))?;
    if let Err(err) = tab.wait_until_navigated() {
        // The page may still have rendered enough to scrape
        warn!("Page load warning for {}: {}", url, err);
    }

    debug!("Waiting for page content...");
    thread::sleep(settings.settle);

    // Scroll to trigger lazy-loaded cards
    let _ = tab.evaluate("window.scrollTo(0, document.body.scrollHeight)", false);
    thread::sleep(Duration::from_secs(2));
    let _ = tab.evaluate("window.scrollTo(0, 0)", false);

    let html_result = tab
        .evaluate("document.documentElement.outerHTML", false)
        .map_err(|err| browser_error(source, err))?;
    let html = html_result
        .value
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default();

    if html.is_empty() {
        warn!("HTML is empty");
    }
    Ok(html)
}

/// Embedded JSON first; for Zillow fall back to the visible property cards.
/// Also returns how many unsold homes were dropped.
fn extract_listings(source: Source, html: &str) -> Result<(Vec<Value>, usize), ScrapeError> {
    match source {
        Source::Zillow => {
            let (listings, _) = zillow::results_from_html(html)?;
            if !listings.is_empty() {
                return Ok((listings, 0));
            }
            debug!("No JSON data found, trying to scrape visible cards...");
            Ok((parse_property_cards(html)?, 0))
        }
        Source::Redfin => {
            let homes = redfin::parse_server_state(html)
                .map_err(|err| ScrapeError::parse(BrowserMethod::name_for(source), err.to_string()))?;
            let total = homes.len();
            let sold: Vec<Value> = homes.into_iter().filter(redfin::is_sold).collect();
            let skipped = total - sold.len();
            Ok((sold, skipped))
        }
    }
}

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|err| ScrapeError::parse("zillow-browser", err.to_string()))
}

/// Zillow property cards rendered into raw listings shaped like search results
pub fn parse_property_cards(html: &str) -> Result<Vec<Value>, ScrapeError> {
    let document = Html::parse_document(html);
    let card_selector = selector(r#"article[data-test="property-card"]"#)?;
    let link_selector = selector(r#"a[data-test="property-card-link"]"#)?;
    let address_selector = selector("address")?;
    let price_selector = selector(r#"[data-test="property-card-price"]"#)?;

    let cards: Vec<_> = document.select(&card_selector).take(MAX_CARDS).collect();
    info!("Found {} property cards in HTML", cards.len());

    let mut listings = Vec::new();
    for (idx, card) in cards.iter().enumerate() {
        let Some(href) = card
            .select(&link_selector)
            .next()
            .and_then(|link| link.value().attr("href"))
        else {
            debug!("Skipped card {}: no link", idx);
            continue;
        };

        let address = card
            .select(&address_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        let (street, city, state, zip) = split_card_address(&address);

        let price = card
            .select(&price_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string());

        listings.push(json!({
            "zpid": zpid_from_href(href),
            "streetAddress": street,
            "addressCity": city,
            "addressState": state,
            "addressZipcode": zip,
            "price": price,
            "dateSold": sold_text(card),
            "detailUrl": href,
        }));
    }

    Ok(listings)
}

/// `/homedetails/1-Main-St/12345_zpid/` → `12345`
fn zpid_from_href(href: &str) -> Option<String> {
    href.split('/')
        .find_map(|segment| segment.strip_suffix("_zpid"))
        .filter(|zpid| !zpid.is_empty())
        .map(str::to_string)
}

/// "1 Main St, Springfield, IL 62701" → street, city, state, zip
fn split_card_address(address: &str) -> (Option<String>, Option<String>, Option<String>, Option<String>) {
    let parts: Vec<&str> = address.split(',').map(str::trim).collect();
    let owned = |s: &str| (!s.is_empty()).then(|| s.to_string());

    match parts.as_slice() {
        [street, city, state_zip, ..] => {
            let mut tail = state_zip.split_whitespace();
            let state = tail.next().and_then(owned);
            let zip = tail.next().and_then(owned);
            (owned(*street), owned(*city), state, zip)
        }
        [street, city] => (owned(*street), owned(*city), None, None),
        [street] => (owned(*street), None, None, None),
        [] => (None, None, None, None),
    }
}

/// Badge text such as "Sold 03/15/2024"
fn sold_text(card: &ElementRef<'_>) -> Option<String> {
    card.text()
        .map(str::trim)
        .find(|text| {
            text.get(..5)
                .map_or(false, |head| head.eq_ignore_ascii_case("sold "))
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RecordBuilder;

    const CARDS: &str = r#"
        <ul>
          <li><article data-test="property-card">
            <a data-test="property-card-link" href="https://www.zillow.com/homedetails/1-Main-St-Springfield-IL-62701/12345_zpid/">
              <address>1 Main St, Springfield, IL 62701</address>
            </a>
            <span data-test="property-card-price">$500,000</span>
            <span>Sold 03/15/2024</span>
          </article></li>
          <li><article data-test="property-card">
            <address>no link here</address>
          </article></li>
          <li><article data-test="property-card">
            <a data-test="property-card-link" href="/homedetails/9-Oak-Ave/777_zpid/">
              <address>9 Oak Ave</address>
            </a>
          </article></li>
        </ul>
    "#;

    #[test]
    fn test_parse_property_cards() {
        let listings = parse_property_cards(CARDS).unwrap();
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first["zpid"], "12345");
        assert_eq!(first["streetAddress"], "1 Main St");
        assert_eq!(first["addressCity"], "Springfield");
        assert_eq!(first["addressState"], "IL");
        assert_eq!(first["addressZipcode"], "62701");
        assert_eq!(first["price"], "$500,000");
        assert_eq!(first["dateSold"], "Sold 03/15/2024");

        assert_eq!(listings[1]["zpid"], "777");
        assert!(listings[1]["price"].is_null());
    }

    #[test]
    fn test_cards_feed_the_record_builder() {
        let listings = parse_property_cards(CARDS).unwrap();
        let builder = RecordBuilder::new(Source::Zillow);

        let property = builder.build(&listings[0], "62701").unwrap();
        assert_eq!(property.identifiers.listing_id, "12345");
        assert_eq!(property.sale.final_sale_price, 500_000);

        // No price or sale date on the second card
        assert!(builder.build(&listings[1], "62701").is_err());
    }

    #[test]
    fn test_zpid_from_href() {
        assert_eq!(zpid_from_href("/homedetails/x/42_zpid/").as_deref(), Some("42"));
        assert_eq!(zpid_from_href("/homedetails/x/"), None);
        assert_eq!(zpid_from_href("/b/_zpid/"), None);
    }

    #[test]
    fn test_split_card_address() {
        assert_eq!(
            split_card_address("12 Elm St UNIT 3, Austin, TX 78701"),
            (
                Some("12 Elm St UNIT 3".to_string()),
                Some("Austin".to_string()),
                Some("TX".to_string()),
                Some("78701".to_string())
            )
        );
        assert_eq!(split_card_address("12 Elm St"), (Some("12 Elm St".to_string()), None, None, None));
    }

    #[test]
    fn test_extract_prefers_embedded_json() {
        let html = r#"<script type="application/json">{"searchPageState":{"cat1":{"searchResults":{"mapResults":[{"zpid":"5"}]}}}}</script>"#;
        let (listings, skipped) = extract_listings(Source::Zillow, html).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0]["zpid"], "5");
    }

    #[test]
    fn test_extract_redfin_keeps_sold_only() {
        let html = r#"<script>window.__reactServerState.props = {"payload":{"gisResults":{"homes":[
            {"propertyId":1,"mlsStatus":"Sold"},{"propertyId":2,"mlsStatus":"Active"}]}}};</script>"#;
        let (listings, skipped) = extract_listings(Source::Redfin, html).unwrap();
        assert_eq!(skipped, 1);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0]["propertyId"], 1);
    }
}
