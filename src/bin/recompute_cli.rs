//! One-shot repair: recompute the summary from the stored transactions and
//! print it. Uses the same configuration sources as the server.

use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use txn_stats_rs::config::{Settings, StorageBackend};
use txn_stats_rs::engine::RecomputeService;
use txn_stats_rs::model::StatisticsResponse;
use txn_stats_rs::persistence;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .init();

    dotenv::dotenv().ok();
    let settings = Settings::new()?;

    if settings.storage.backend == StorageBackend::Memory {
        error!("Memory storage has nothing to repair");
        return Err("recompute_cli needs storage.backend = \"redb\"".into());
    }

    info!("🔧 Recomputing summary from {}", settings.storage.path.display());
    let store = persistence::open_store(&settings.storage)?;
    let summary = RecomputeService::new(store).recompute()?;

    println!(
        "{}",
        serde_json::to_string_pretty(&StatisticsResponse::from(summary))?
    );
    Ok(())
}
