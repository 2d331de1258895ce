use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Scraper configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub requests_per_minute: u32,
    /// Fraction of the per-region target below which the next fetch method runs
    pub fallback_ratio: f64,
    /// Hard safety limit on pages fetched per method
    pub max_pages: u32,
    pub target_per_region: usize,
    pub request_timeout: Duration,
    /// Budget for one `fetch_page` call, including rate-limit waits and warm-up requests
    pub page_timeout: Duration,
    pub proxy_url: Option<String>,
    pub headless: bool,
    pub miner_hot_key: Option<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 10,
            fallback_ratio: 0.5,
            max_pages: 20,
            target_per_region: 100,
            request_timeout: Duration::from_secs(30),
            page_timeout: Duration::from_secs(120),
            proxy_url: None,
            headless: true,
            miner_hot_key: None,
        }
    }
}

impl ScraperConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        let defaults = Self::default();

        Ok(Self {
            requests_per_minute: parse_var(
                "SCRAPER_REQUESTS_PER_MINUTE",
                defaults.requests_per_minute,
            )?,
            fallback_ratio: parse_var("SCRAPER_FALLBACK_RATIO", defaults.fallback_ratio)?
                .clamp(0.0, 1.0),
            max_pages: parse_var("SCRAPER_MAX_PAGES", defaults.max_pages)?,
            target_per_region: parse_var("SCRAPER_TARGET_PER_REGION", defaults.target_per_region)?,
            request_timeout: Duration::from_secs(parse_var(
                "SCRAPER_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            page_timeout: Duration::from_secs(parse_var(
                "SCRAPER_PAGE_TIMEOUT_SECS",
                defaults.page_timeout.as_secs(),
            )?),
            proxy_url: env::var("SCRAPER_PROXY_URL").ok().filter(|v| !v.is_empty()),
            headless: parse_var("SCRAPER_HEADLESS", defaults.headless)?,
            miner_hot_key: env::var("MINER_HOTKEY").ok().filter(|v| !v.is_empty()),
        })
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid {}", key, std::any::type_name::<T>())),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScraperConfig::default();
        assert_eq!(config.requests_per_minute, 10);
        assert_eq!(config.fallback_ratio, 0.5);
        assert_eq!(config.max_pages, 20);
        assert!(config.headless);
    }

    #[test]
    fn test_parse_var() {
        env::set_var("SOLD_SCOUT_TEST_PAGES", " 7 ");
        assert_eq!(parse_var("SOLD_SCOUT_TEST_PAGES", 20u32).unwrap(), 7);

        env::set_var("SOLD_SCOUT_TEST_BAD", "many");
        assert!(parse_var("SOLD_SCOUT_TEST_BAD", 20u32).is_err());

        assert_eq!(parse_var("SOLD_SCOUT_TEST_UNSET", 0.5f64).unwrap(), 0.5);
    }
}
