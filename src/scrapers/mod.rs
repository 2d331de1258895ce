pub mod browser;
pub mod http;
pub mod rate_limit;
pub mod redfin;
pub mod traits;
pub mod types;
pub mod zillow;

pub use browser::BrowserMethod;
pub use rate_limit::RateLimiter;
pub use redfin::{RedfinApiMethod, RedfinHtmlMethod};
pub use traits::FetchMethod;
pub use types::{FetchedPage, PageToken, Region, ScrapeRequest};
pub use zillow::{ZillowApiMethod, ZillowHtmlMethod};
