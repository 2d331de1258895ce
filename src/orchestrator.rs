//! Drives fetch methods per zipcode and merges their output.
//!
//! Per region the orchestrator walks `Idle -> Fetching(method, page) ->
//! Complete | Failed`: it pages through the primary method, falls back to
//! the next method while the accepted count stays under
//! `fallback_ratio * target`, and passes every candidate through the
//! record builder and the run-wide deduplicator.

use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::models::CanonicalProperty;
use crate::pipeline::{Deduplicator, RecordBuilder};
use crate::scrapers::{FetchMethod, FetchedPage, PageToken, RateLimiter, Region, ScrapeRequest};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Knobs controlling pagination and fallback
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub fallback_ratio: f64,
    pub max_pages: u32,
    pub target_per_region: usize,
    pub page_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&ScraperConfig::default())
    }
}

impl From<&ScraperConfig> for OrchestratorSettings {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            fallback_ratio: config.fallback_ratio,
            max_pages: config.max_pages,
            target_per_region: config.target_per_region,
            page_timeout: config.page_timeout,
        }
    }
}

/// Counters surfaced alongside the records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeStats {
    pub requests_made: usize,
    pub records_accepted: usize,
    pub records_rejected: usize,
    pub duplicates_skipped: usize,
    pub candidates_skipped: usize,
    pub errors: usize,
    pub regions_completed: usize,
    pub regions_failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeState {
    Idle,
    Fetching { method: &'static str, page: u32 },
    Complete,
    Failed,
}

/// Result for one zipcode
#[derive(Debug)]
pub struct RegionOutcome {
    pub region: Region,
    pub state: ScrapeState,
    pub records: Vec<CanonicalProperty>,
    /// Set when the region ended in [`ScrapeState::Failed`]
    pub error: Option<ScrapeError>,
}

/// Result for a whole batch
#[derive(Debug)]
pub struct ScrapeReport {
    pub outcomes: Vec<RegionOutcome>,
    pub stats: ScrapeStats,
}

impl ScrapeReport {
    /// All accepted records in discovery order
    pub fn records(&self) -> impl Iterator<Item = (&Region, &CanonicalProperty)> {
        self.outcomes
            .iter()
            .flat_map(|outcome| outcome.records.iter().map(move |record| (&outcome.region, record)))
    }

    pub fn record_count(&self) -> usize {
        self.outcomes.iter().map(|outcome| outcome.records.len()).sum()
    }
}

/// Why a method stopped producing pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Exhausted,
    AllDuplicates,
    LastPage,
    PageLimit,
    TargetReached,
    Failed,
}

#[derive(Debug, Default)]
struct PageTally {
    accepted: usize,
    rejected: usize,
    duplicates: usize,
}

pub struct ScrapeOrchestrator {
    methods: Vec<Box<dyn FetchMethod>>,
    limiter: RateLimiter,
    settings: OrchestratorSettings,
    dedup: Deduplicator,
    stats: ScrapeStats,
}

impl ScrapeOrchestrator {
    /// `methods` are tried in order; the first is the primary
    pub fn new(
        methods: Vec<Box<dyn FetchMethod>>,
        limiter: RateLimiter,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            methods,
            limiter,
            settings,
            dedup: Deduplicator::new(),
            stats: ScrapeStats::default(),
        }
    }

    pub fn stats(&self) -> &ScrapeStats {
        &self.stats
    }

    /// Scrape every region in the request sequentially
    pub async fn scrape(&mut self, request: &ScrapeRequest) -> ScrapeReport {
        info!("Starting scrape for {} zipcode(s)", request.regions.len());
        let mut outcomes = Vec::new();
        let mut total = 0;

        for region in &request.regions {
            let target = match request.max_records {
                Some(max) => self.settings.target_per_region.min(max.saturating_sub(total)),
                None => self.settings.target_per_region,
            };
            if target == 0 {
                info!("Reached record limit, skipping remaining zipcodes");
                break;
            }

            let outcome = self.scrape_region(region, target).await;
            total += outcome.records.len();
            outcomes.push(outcome);
        }

        info!(
            "✅ Scraped {} properties from {} zipcode(s) ({} failed)",
            total, self.stats.regions_completed, self.stats.regions_failed
        );
        ScrapeReport {
            outcomes,
            stats: self.stats.clone(),
        }
    }

    /// Scrape one region, returning at most `target` records in discovery order
    pub async fn scrape_region(&mut self, region: &Region, target: usize) -> RegionOutcome {
        let mut records = Vec::new();
        let mut state = ScrapeState::Idle;
        let mut methods_tried = 0;

        for (index, method) in self.methods.iter().enumerate() {
            if index > 0 {
                if !needs_fallback(records.len(), target, self.settings.fallback_ratio) {
                    break;
                }
                info!(
                    "{} yielded {}/{} records for {}, falling back to {}",
                    self.methods[index - 1].method_name(),
                    records.len(),
                    target,
                    region,
                    method.method_name()
                );
            }
            methods_tried += 1;

            let mut run = MethodRun {
                region,
                target,
                limiter: &self.limiter,
                settings: &self.settings,
                dedup: &mut self.dedup,
                stats: &mut self.stats,
                records: &mut records,
                state: &mut state,
            };
            let reason = run.drain(method.as_ref()).await;
            debug!("{} stopped for {}: {:?}", method.method_name(), region, reason);
        }

        records.truncate(target);
        let error = if records.is_empty() {
            let err = ScrapeError::Exhausted {
                region: region.zipcode.clone(),
                methods: methods_tried,
            };
            error!("Error scraping {}: {}", region, err);
            self.stats.regions_failed += 1;
            advance(region, &mut state, ScrapeState::Failed);
            Some(err)
        } else {
            info!("Zipcode {}: {} sold properties", region, records.len());
            self.stats.records_accepted += records.len();
            self.stats.regions_completed += 1;
            advance(region, &mut state, ScrapeState::Complete);
            None
        };

        RegionOutcome {
            region: region.clone(),
            state,
            records,
            error,
        }
    }
}

fn advance(region: &Region, state: &mut ScrapeState, next: ScrapeState) {
    debug!("{}: {:?} -> {:?}", region, state, next);
    *state = next;
}

/// Below `ratio * target` accepted records, the next method is worth trying
fn needs_fallback(accepted: usize, target: usize, ratio: f64) -> bool {
    (accepted as f64) < ratio * target as f64
}

/// Borrowed state for paging through one method on one region
struct MethodRun<'a> {
    region: &'a Region,
    target: usize,
    limiter: &'a RateLimiter,
    settings: &'a OrchestratorSettings,
    dedup: &'a mut Deduplicator,
    stats: &'a mut ScrapeStats,
    records: &'a mut Vec<CanonicalProperty>,
    state: &'a mut ScrapeState,
}

impl MethodRun<'_> {
    async fn drain(&mut self, method: &dyn FetchMethod) -> StopReason {
        let builder = RecordBuilder::new(method.source());
        let mut token = PageToken::first();
        let mut pages = 0;

        loop {
            if self.records.len() >= self.target {
                return StopReason::TargetReached;
            }
            if pages >= self.settings.max_pages {
                warn!("Reached safety limit of {} pages, stopping", self.settings.max_pages);
                return StopReason::PageLimit;
            }

            pages += 1;
            advance(
                self.region,
                self.state,
                ScrapeState::Fetching {
                    method: method.method_name(),
                    page: token.number(),
                },
            );
            let page = match self.fetch(method, token).await {
                Some(page) => page,
                None => return StopReason::Failed,
            };

            if page.is_exhausted() {
                info!("No more properties, stopping at page {}", token.number());
                return StopReason::Exhausted;
            }
            self.stats.candidates_skipped += page.skipped;

            let tally = self.absorb(&builder, &page.listings);
            info!(
                "Page {}: {} candidates ({} new, {} duplicates, {} rejected)",
                token.number(),
                page.listings.len(),
                tally.accepted,
                tally.duplicates,
                tally.rejected
            );

            // Rejected candidates keep paging alive; only a page of pure repeats ends it
            if tally.duplicates > 0 && tally.duplicates == page.listings.len() {
                info!("All properties on page {} are duplicates, stopping pagination", token.number());
                return StopReason::AllDuplicates;
            }

            match page.next {
                Some(next) => token = next,
                None => return StopReason::LastPage,
            }
        }
    }

    /// One page call; any failure counts as zero results
    async fn fetch(&mut self, method: &dyn FetchMethod, token: PageToken) -> Option<FetchedPage> {
        self.stats.requests_made += 1;
        let call = method.fetch_page(self.region, token, self.limiter);

        let err = match tokio::time::timeout(self.settings.page_timeout, call).await {
            Ok(Ok(page)) => return Some(page),
            Ok(Err(err)) => err,
            Err(_) => ScrapeError::Timeout {
                method: method.method_name(),
                seconds: self.settings.page_timeout.as_secs(),
            },
        };
        warn!("{} failed on page {} for {}: {}", method.method_name(), token.number(), self.region, err);
        self.stats.errors += 1;
        None
    }

    fn absorb(&mut self, builder: &RecordBuilder, listings: &[Value]) -> PageTally {
        let mut tally = PageTally::default();

        for raw in listings {
            if self.records.len() >= self.target {
                break;
            }
            let property = match builder.build(raw, &self.region.zipcode) {
                Ok(property) => property,
                Err(rejection) => {
                    debug!("Rejected candidate: {}", rejection);
                    tally.rejected += 1;
                    continue;
                }
            };

            if self.dedup.admit(&property) {
                tally.accepted += 1;
                self.records.push(property);
            } else {
                tally.duplicates += 1;
            }
        }

        self.stats.records_rejected += tally.rejected;
        self.stats.duplicates_skipped += tally.duplicates;
        tally
    }
}
