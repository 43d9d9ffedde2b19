use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::auth_middleware::AuthMiddleware;
use crate::config::{AuthConfig, HttpConfig};
use crate::context::ServiceContext;
use crate::dispatcher::{RecomputeTrigger, TaskDispatcher};
use crate::error::ServiceError;
use crate::ingestion::IngestionService;
use crate::metrics;
use crate::model::{StatisticsResponse, TransactionInput, TransactionReceipt};
use crate::persistence::LedgerStore;
use crate::query::QueryService;

/// Services shared by every HTTP worker.
#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<IngestionService>,
    pub query: Arc<QueryService>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        dispatcher: Arc<dyn TaskDispatcher>,
        ctx: ServiceContext,
    ) -> Self {
        let trigger = RecomputeTrigger::new(dispatcher, ctx.clone());
        Self {
            ingestion: Arc::new(IngestionService::new(store.clone(), trigger, ctx)),
            query: Arc::new(QueryService::new(store)),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn create_transaction(
    state: web::Data<AppState>,
    body: web::Json<TransactionInput>,
) -> Result<HttpResponse, ServiceError> {
    let ingestion = state.ingestion.clone();
    let receipt = web::block(move || ingestion.ingest(body.into_inner())).await??;

    Ok(HttpResponse::Created().json(TransactionReceipt {
        message: receipt.message,
        task_id: receipt.task.task_id,
    }))
}

pub async fn delete_transactions(state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let ingestion = state.ingestion.clone();
    web::block(move || ingestion.purge()).await??;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn get_statistics(state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let query = state.query.clone();
    let summary = web::block(move || query.get_summary()).await??;
    Ok(HttpResponse::Ok().json(StatisticsResponse::from(summary)))
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| ServiceError::InvalidRequest(err.to_string()).into())
}

// Define scope configuration
pub fn config(cfg: &mut web::ServiceConfig, http: &HttpConfig, auth: &AuthConfig) {
    cfg.app_data(json_config())
        .service(web::resource("/health").route(web::get().to(health_check)))
        .service(web::resource("/metrics").route(web::get().to(metrics_endpoint)))
        .service(
            web::scope(&http.base_path)
                .wrap(AuthMiddleware::new(auth))
                .service(
                    web::resource("/transactions")
                        .route(web::post().to(create_transaction))
                        .route(web::delete().to(delete_transactions)),
                )
                .service(web::resource("/statistics").route(web::get().to(get_statistics))),
        );
}
