//! Stats command - prints the cache store's counters

use clap::Args;

use crate::infrastructure::observability::init_metrics;
use crate::infrastructure::services::{CacheStatsReport, CacheStatsService};

/// Arguments for the stats command
#[derive(Args, Clone, Debug)]
pub struct StatsArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Print cache statistics
pub async fn run(args: StatsArgs) -> anyhow::Result<()> {
    let config = super::bootstrap();
    let metrics = init_metrics(&config.observability.metrics);

    let cache = crate::create_cache(&config.cache).await?;
    let report = CacheStatsService::new(cache).get_stats().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(metrics) = metrics {
        println!("{}", metrics.render());
    }

    super::shutdown(&config);
    Ok(())
}

pub(crate) fn print_report(report: &CacheStatsReport) {
    println!("connected_clients: {}", report.connected_clients);
    println!("used_memory: {}", report.used_memory_human);
    println!("keyspace_hits: {}", report.keyspace_hits);
    println!("keyspace_misses: {}", report.keyspace_misses);
    println!("hit_rate: {:.2}%", report.hit_rate);
}
