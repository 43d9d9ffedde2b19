use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use txn_stats_rs::api::{self, AppState};
use txn_stats_rs::config::{LoggingConfig, Settings};
use txn_stats_rs::context::ServiceContext;
use txn_stats_rs::dispatcher::{ChannelDispatcher, RecomputeTrigger, TriggerReason};
use txn_stats_rs::engine::RecomputeService;
use txn_stats_rs::persistence;
use txn_stats_rs::worker::{WorkerConfig, WorkerPool};

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn cors(origins: &[String]) -> actix_cors::Cors {
    let cors = actix_cors::Cors::default()
        .allow_any_method()
        .allow_any_header();
    if origins.iter().any(|o| o == "*") {
        return cors.allow_any_origin();
    }
    origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables
    dotenv::dotenv().ok();

    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    init_tracing(&settings.logging);

    info!("╔═══════════════════════════════════════════════════════════════╗");
    info!("║               TXN STATS RS                                    ║");
    info!("║               Transaction Ingestion & Statistics              ║");
    info!("╚═══════════════════════════════════════════════════════════════╝");

    let ctx = ServiceContext::new_system();
    let store = persistence::open_store(&settings.storage)?;

    // --- Recompute Workers ---
    let (dispatcher, jobs) = ChannelDispatcher::new();
    let recompute = Arc::new(RecomputeService::new(store.clone()));
    let pool = WorkerPool::start(
        WorkerConfig::from(&settings.worker),
        recompute,
        jobs,
        dispatcher.sender(),
        ctx.clone(),
    )?;

    let dispatcher = Arc::new(dispatcher);

    // Bring the summary in line with whatever is already stored.
    if let Err(e) = RecomputeTrigger::new(dispatcher.clone(), ctx.clone()).fire(TriggerReason::Manual) {
        error!("Failed to schedule startup recompute: {}", e);
    }

    info!("✅ Core components initialized");

    // --- API Server ---
    let state = AppState::new(store, dispatcher, ctx);
    let bind_address = settings.http.bind_address();
    info!("🚀 Starting API Server on {}", bind_address);

    let http = settings.http.clone();
    let auth = settings.auth.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&http.allowed_origins))
            .app_data(web::Data::new(state.clone()))
            .configure(|cfg| api::config(cfg, &http, &auth))
    })
    .bind(&bind_address)?
    .run()
    .await?;

    info!("API server stopped, draining recompute workers");
    pool.shutdown();

    Ok(())
}
