//! The platform's standard ETL job catalog.
//!
//! Collection jobs pull market data feeds, processing jobs clean and
//! validate what the collectors stored, and maintenance jobs keep caches
//! and reports current. The real scrapers and processors live in their own
//! services; the work units here stand in for them with lightweight
//! producers so the scheduler can run the full catalog end to end.

use anyhow::Result;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use dataflux_scheduler::{work_fn, Scheduler, SchedulerError, WorkFn};
use dataflux_types::{JobPriority, JobSpec};

/// Simulated collection cycle for one data source.
async fn collect(
    source: &'static str,
    records: u64,
    cancel: CancellationToken,
) -> Result<serde_json::Value> {
    if cancel.is_cancelled() {
        anyhow::bail!("{} collection cancelled", source);
    }
    debug!(source, records, "Collection cycle finished");
    Ok(json!({
        "status": "success",
        "source": source,
        "count": records,
    }))
}

fn collector(source: &'static str, records: u64) -> WorkFn {
    work_fn(move |cancel| collect(source, records, cancel))
}

/// Register the standard catalog with a scheduler. Returns the number of
/// jobs registered.
pub async fn register_collection_jobs(scheduler: &Scheduler) -> Result<usize, SchedulerError> {
    let jobs: Vec<(JobSpec, WorkFn)> = vec![
        (
            JobSpec::new(
                "jse_quotes_collection",
                "JSE Real-time Quotes Collection",
                "every 2 minutes",
            )
            .with_priority(JobPriority::High)
            .with_timeout(300)
            .with_retries(2, 30)
            .with_tags(["market_data", "jse", "quotes", "real_time"]),
            collector("JSE", 120),
        ),
        (
            JobSpec::new(
                "crypto_quotes_collection",
                "Cryptocurrency Quotes Collection",
                "every 1 minutes",
            )
            .with_priority(JobPriority::High)
            .with_timeout(180)
            .with_retries(3, 20)
            .with_tags(["market_data", "crypto", "quotes", "real_time"]),
            collector("CRYPTO", 100),
        ),
        (
            JobSpec::new(
                "forex_quotes_collection",
                "Forex Quotes Collection",
                "every 5 minutes",
            )
            .with_timeout(120)
            .with_retries(2, 30)
            .with_tags(["market_data", "forex", "quotes"]),
            collector("FOREX", 28),
        ),
        (
            JobSpec::new(
                "market_news_collection",
                "Market News Collection",
                "every 15 minutes",
            )
            .with_timeout(300)
            .with_retries(2, 60)
            .with_tags(["news", "sentiment", "market_intelligence"]),
            collector("NEWS", 50),
        ),
        (
            JobSpec::new(
                "sentiment_analysis",
                "News Sentiment Analysis",
                "every 30 minutes",
            )
            .with_priority(JobPriority::Low)
            .with_timeout(600)
            .with_retries(1, 120)
            .with_tags(["news", "sentiment", "ai"])
            .with_dependencies(["market_news_collection"]),
            collector("SENTIMENT", 50),
        ),
        (
            JobSpec::new("esg_data_collection", "ESG Data Collection", "daily at 02:00")
                .with_timeout(3600)
                .with_retries(2, 600)
                .with_tags(["esg", "sustainability", "governance"]),
            collector("ESG", 40),
        ),
        (
            JobSpec::new(
                "data_cleaning",
                "Data Cleaning and Normalization",
                "daily at 01:00",
            )
            .with_timeout(1800)
            .with_retries(2, 300)
            .with_tags(["data_processing", "cleaning", "quality"]),
            collector("CLEANER", 10000),
        ),
        (
            JobSpec::new("data_validation", "Data Quality Validation", "daily at 03:00")
                .with_timeout(900)
                .with_retries(1, 300)
                .with_tags(["data_processing", "validation", "quality"])
                .with_dependencies(["data_cleaning"]),
            collector("VALIDATOR", 10000),
        ),
        (
            JobSpec::new(
                "cache_cleanup",
                "Cache Cleanup and Maintenance",
                "daily at 04:00",
            )
            .with_priority(JobPriority::Low)
            .with_timeout(300)
            .with_retries(1, 60)
            .with_tags(["maintenance", "cache", "cleanup"]),
            collector("CACHE", 150),
        ),
        (
            JobSpec::new(
                "weekly_report",
                "Weekly Analytics Report",
                "weekly on monday at 06:00",
            )
            .with_priority(JobPriority::Low)
            .with_timeout(600)
            .with_retries(1, 300)
            .with_tags(["analytics", "reporting"]),
            collector("REPORT", 1),
        ),
    ];

    let count = jobs.len();
    for (spec, work) in jobs {
        scheduler.register(spec, work).await?;
    }
    Ok(count)
}
