use crate::error::ScrapeError;
use crate::models::Source;
use crate::scrapers::rate_limit::RateLimiter;
use crate::scrapers::types::{FetchedPage, PageToken, Region};
use async_trait::async_trait;

/// Common interface for every way of pulling sold listings off a provider.
///
/// API calls, embedded-JSON page parsing and headless-browser scraping all
/// implement this, so the orchestrator can chain them as fallbacks.
/// Implementations must call [`RateLimiter::acquire`] before each network
/// request they make.
#[async_trait]
pub trait FetchMethod: Send + Sync {
    /// Fetch one page of raw candidate listings for `region`
    async fn fetch_page(
        &self,
        region: &Region,
        page: PageToken,
        limiter: &RateLimiter,
    ) -> Result<FetchedPage, ScrapeError>;

    /// Provider whose listing shape this method returns
    fn source(&self) -> Source;

    /// Short name used in logs and errors
    fn method_name(&self) -> &'static str;
}
