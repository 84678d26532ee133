// HTTP boundary: route table, shared application state, server lifecycle.

mod admin;
mod handlers;
pub mod middleware;

use std::sync::Arc;

use actix_web::{dev::ServerHandle, web, App, HttpServer};
use log::{info, warn};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::{
    audit::AnomalyDetector,
    chain::RpcPool,
    config::Config,
    payer::FeePayerPool,
    services::{burn::BurnWorker, quote::QuoteService, submit::SubmitService},
    store::{cold::ColdStore, hot::HotStore},
    tokens::TokenRegistry,
};

pub struct AppState {
    pub config: Arc<Config>,
    pub hot: HotStore,
    pub cold: Arc<ColdStore>,
    pub payers: Arc<FeePayerPool>,
    // Present in production; integration harnesses drive mocks instead
    pub rpc_pool: Option<Arc<RpcPool>>,
    pub quotes: Arc<QuoteService>,
    pub submits: Arc<SubmitService>,
    pub burner: Arc<BurnWorker>,
    pub anomaly: Arc<AnomalyDetector>,
    pub registry: Arc<TokenRegistry>,
    pub prometheus: Option<PrometheusHandle>,
}

// Malformed bodies surface in the same closed-set error shape as every
// other failure, not as actix's default text response
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|error, _req| {
            crate::error::RelayError::validation(error.to_string()).into()
        })
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1")
            .route("/quote", web::post().to(handlers::create_quote))
            .route("/submit", web::post().to(handlers::submit))
            .route("/ignition/quote", web::post().to(handlers::create_ignition_quote))
            .route("/ignition/submit", web::post().to(handlers::submit))
            .route("/tokens", web::get().to(handlers::list_tokens))
            .route("/stats", web::get().to(handlers::stats))
            .route("/stats/wallet/{wallet}", web::get().to(handlers::wallet_stats))
            .route("/stats/leaderboard", web::get().to(handlers::leaderboard))
            .route("/stats/burns", web::get().to(handlers::recent_burns))
            .route("/stats/burns/{signature}", web::get().to(handlers::burn_by_signature)),
    )
    .service(
        web::scope("/admin")
            .route("/burn", web::post().to(admin::trigger_burn))
            .route("/treasury", web::get().to(admin::treasury))
            .route("/burns", web::get().to(admin::burn_history))
            .route("/transactions", web::get().to(admin::transaction_history))
            .route("/migrate-keys", web::post().to(admin::migrate_keys)),
    )
    .route("/health", web::get().to(handlers::health))
    .route("/metrics", web::get().to(handlers::prometheus_metrics));
}

/// Bind and spawn the HTTP server, returning its handle for shutdown.
pub async fn start_http_server(state: Arc<AppState>) -> std::io::Result<ServerHandle> {
    let bind_address = format!("0.0.0.0:{}", state.config.port);
    let allowed_origins = Arc::new(state.config.allowed_origins());
    if allowed_origins.is_empty() {
        warn!("no allowed origins configured, browser callers are unrestricted (development only)");
    }

    let app_state = web::Data::from(Arc::clone(&state));
    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(json_config())
            .wrap(middleware::RequestBoundary::new(Arc::clone(&allowed_origins)))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run();

    info!("http server listening on {}", bind_address);
    let handle = server.handle();
    tokio::spawn(server);
    Ok(handle)
}
