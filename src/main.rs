mod config;
mod error;
mod models;
mod orchestrator;
mod pipeline;
mod scrapers;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use config::ScraperConfig;
use models::DataEntity;
use orchestrator::{OrchestratorSettings, ScrapeOrchestrator, ScrapeReport};
use scrapers::{
    BrowserMethod, FetchMethod, RateLimiter, RedfinApiMethod, RedfinHtmlMethod, ScrapeRequest,
    ZillowApiMethod, ZillowHtmlMethod,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Provider {
    Redfin,
    Zillow,
}

/// Scrape recently sold homes for a set of zipcodes
#[derive(Parser)]
#[command(name = "sold-scout")]
struct Cli {
    /// Zipcodes to scrape
    #[arg(required = true)]
    zipcodes: Vec<String>,

    /// Stop after this many records across all zipcodes
    #[arg(long)]
    max_records: Option<usize>,

    #[arg(long, value_enum, default_value = "redfin")]
    provider: Provider,

    /// Add a headless browser as the last fallback
    #[arg(long)]
    browser: bool,

    /// Write the collected entities as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Fetch methods in fallback order
fn build_methods(provider: Provider, browser: bool, config: &ScraperConfig) -> Result<Vec<Box<dyn FetchMethod>>> {
    let mut methods: Vec<Box<dyn FetchMethod>> = match provider {
        Provider::Redfin => vec![
            Box::new(RedfinApiMethod::new(config)?),
            Box::new(RedfinHtmlMethod::new(config)?),
        ],
        Provider::Zillow => vec![
            Box::new(ZillowApiMethod::new(config)?),
            Box::new(ZillowHtmlMethod::new(config)?),
        ],
    };

    if browser {
        methods.push(Box::new(match provider {
            Provider::Redfin => BrowserMethod::redfin(config),
            Provider::Zillow => BrowserMethod::zillow(config),
        }));
    }
    Ok(methods)
}

fn entities(report: &ScrapeReport, config: &ScraperConfig) -> Result<Vec<DataEntity>> {
    let scraped_at = Utc::now();
    report
        .records()
        .map(|(region, property)| {
            DataEntity::from_property(property, &region.zipcode, scraped_at, config.miner_hot_key.clone())
                .context("Failed to serialize property document")
        })
        .collect()
}

fn print_summary(report: &ScrapeReport) {
    for (i, (region, property)) in report.records().enumerate() {
        println!(
            "{}. {}, {} {} ({})",
            i + 1,
            property.location.address,
            property.location.city,
            region,
            property.characteristics.property_type
        );
        println!(
            "   Sold {} for ${}",
            property.sale.date.format("%Y-%m-%d"),
            property.sale.final_sale_price
        );
        println!("   URL: {}", property.source_uri);
    }

    for outcome in &report.outcomes {
        if let Some(err) = &outcome.error {
            println!("⚠️  {}", err);
        }
    }

    let stats = &report.stats;
    println!();
    println!("Requests made:      {}", stats.requests_made);
    println!("Records accepted:   {}", stats.records_accepted);
    println!("Records rejected:   {}", stats.records_rejected);
    println!("Duplicates skipped: {}", stats.duplicates_skipped);
    println!("Unsold skipped:     {}", stats.candidates_skipped);
    println!("Errors:             {}", stats.errors);
    println!(
        "Zipcodes:           {} complete, {} failed",
        stats.regions_completed, stats.regions_failed
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ScraperConfig::from_env()?;
    if cli.max_records == Some(0) {
        bail!("--max-records must be at least 1");
    }

    info!("🏠 Sold Scout - {:?} sold-property scraper", cli.provider);
    info!("==========================================");

    let methods = build_methods(cli.provider, cli.browser, &config)?;
    let limiter = RateLimiter::per_minute(config.requests_per_minute);
    let mut orchestrator = ScrapeOrchestrator::new(methods, limiter, OrchestratorSettings::from(&config));

    let mut request = ScrapeRequest::new(cli.zipcodes);
    if let Some(max) = cli.max_records {
        request = request.with_max_records(max);
    }

    let report = orchestrator.scrape(&request).await;
    print_summary(&report);

    if let Some(path) = cli.output {
        let entities = entities(&report, &config)?;
        let json = serde_json::to_string_pretty(&entities)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("💾 Saved {} entities to {}", entities.len(), path.display());
    }

    Ok(())
}
