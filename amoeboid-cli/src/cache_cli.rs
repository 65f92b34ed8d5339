//! Card cache maintenance commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use amoeboid_core::{CacheStats, CardService};

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show cache and index statistics
    Stats {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Drop every cached card
    Clear,
}

#[derive(Serialize)]
struct StoreReport {
    #[serde(flatten)]
    cache: CacheStats,
    refresh_interval_hours: i64,
    indexed_names: usize,
    configured_servers: usize,
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

impl CacheCommand {
    pub fn execute(self, service: &CardService) -> Result<()> {
        match self {
            CacheCommand::Stats { json } => {
                let report = StoreReport {
                    cache: service.cache_stats()?,
                    refresh_interval_hours: service.cache().refresh_interval().num_hours(),
                    indexed_names: service.corpus_size(),
                    configured_servers: service.settings().server_count()?,
                };

                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    return Ok(());
                }

                let rows = vec![
                    StatRow {
                        metric: "Cached cards",
                        value: report.cache.entry_count.to_string(),
                    },
                    StatRow {
                        metric: "Stale entries",
                        value: report.cache.stale_count.to_string(),
                    },
                    StatRow {
                        metric: "Image bytes",
                        value: report.cache.image_bytes.to_string(),
                    },
                    StatRow {
                        metric: "Refresh interval (h)",
                        value: report.refresh_interval_hours.to_string(),
                    },
                    StatRow {
                        metric: "Indexed names",
                        value: report.indexed_names.to_string(),
                    },
                    StatRow {
                        metric: "Configured servers",
                        value: report.configured_servers.to_string(),
                    },
                ];
                let table = Table::new(&rows)
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()))
                    .to_string();
                println!("{table}");
                Ok(())
            }
            CacheCommand::Clear => {
                let removed = service.clear_cache()?;
                println!("Removed {removed} cached cards");
                Ok(())
            }
        }
    }
}
