// HTTP boundary tests: route wiring, the closed-set error body, rate
// limiting, admin authentication and the request-boundary middleware.

mod common;

use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use common::Harness;
use pyre_common::api::{ErrorBody, HealthResponse, HealthStatus, QuoteResponse};
use pyre_daemon::{
    api::{configure_routes, json_config, middleware::RequestBoundary, AppState},
    audit::AnomalyDetector,
    config::Config,
    services::{
        burn::BurnWorker, quote::QuoteService, submit::SubmitService, velocity::VelocityTracker,
    },
    tokens::TokenRegistry,
};
use serde_json::json;

fn app_state(harness: &Harness, config: Arc<Config>) -> Arc<AppState> {
    let audit = common::audit_logger(&harness.hot);
    let velocity = Arc::new(VelocityTracker::new(harness.hot.clone()));
    let quotes = Arc::new(QuoteService::new(
        harness.hot.clone(),
        harness.payers.clone(),
        harness.dex.clone(),
        harness.oracle.clone(),
        audit.clone(),
        config.clone(),
        *harness.payer_keys[0].pubkey(),
    ));
    let submits = Arc::new(SubmitService::new(
        harness.hot.clone(),
        harness.cold.clone(),
        harness.payers.clone(),
        harness.chain.clone(),
        velocity.clone(),
        audit.clone(),
        config.clone(),
    ));
    let burner = Arc::new(BurnWorker::new(
        harness.hot.clone(),
        harness.cold.clone(),
        harness.chain.clone(),
        harness.dex.clone(),
        harness.oracle.clone(),
        harness.payers.clone(),
        velocity,
        audit.clone(),
        config.clone(),
        *harness.payer_keys[0].pubkey(),
        None,
    ));
    Arc::new(AppState {
        config,
        hot: harness.hot.clone(),
        cold: harness.cold.clone(),
        payers: harness.payers.clone(),
        rpc_pool: None,
        quotes,
        submits,
        burner,
        anomaly: Arc::new(AnomalyDetector::new(harness.hot.clone(), audit)),
        registry: Arc::new(TokenRegistry::new(None)),
        prometheus: None,
    })
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::from(Arc::clone(&$state)))
                .app_data(json_config())
                .wrap(RequestBoundary::new(Arc::new(
                    $state.config.allowed_origins(),
                )))
                .configure(configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn test_health_reports_per_component_checks() {
    let harness = Harness::new();
    let state = app_state(&harness, harness.config.clone());
    let app = test_app!(state);

    let response = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-correlation-id"));

    let health: HealthResponse = test::read_body_json(response).await;
    // The harness has no reachable cold store, so the relay is degraded
    assert_eq!(health.status, HealthStatus::Degraded);
    assert!(health.checks.hot_store);
    assert!(!health.checks.cold_store);
    assert!(health.checks.rpc_pool);
    assert!(health.checks.fee_payer_pool);
}

#[actix_web::test]
async fn test_quote_round_trip_over_http() {
    let harness = Harness::new();
    let state = app_state(&harness, harness.config.clone());
    let app = test_app!(state);

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/v1/quote")
            .set_json(json!({
                "userPubkey": harness.user().pubkey().to_base58(),
                "paymentToken": harness.payment_token().to_base58(),
                "estimatedComputeUnits": 200_000,
            }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let quote: QuoteResponse = test::read_body_json(response).await;
    assert_eq!(quote.fee_native, "50200");
    assert_eq!(quote.ttl_seconds, 60);
}

#[actix_web::test]
async fn test_invalid_body_yields_closed_set_error() {
    let harness = Harness::new();
    let state = app_state(&harness, harness.config.clone());
    let app = test_app!(state);

    // Unknown field rejected by the schema, surfaced in the standard shape
    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/v1/quote")
            .set_json(json!({
                "userPubkey": harness.user().pubkey().to_base58(),
                "paymentToken": harness.payment_token().to_base58(),
                "surprise": true,
            }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = test::read_body_json(response).await;
    assert_eq!(body.code, "VALIDATION_ERROR");
    assert_eq!(body.status_code, 400);
}

#[actix_web::test]
async fn test_bad_account_yields_validation_error() {
    let harness = Harness::new();
    let state = app_state(&harness, harness.config.clone());
    let app = test_app!(state);

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/v1/quote")
            .set_json(json!({
                "userPubkey": "not-an-account",
                "paymentToken": harness.payment_token().to_base58(),
            }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = test::read_body_json(response).await;
    assert_eq!(body.code, "VALIDATION_ERROR");
}

#[actix_web::test]
async fn test_wallet_rate_limit() {
    let harness = Harness::new();
    let mut config = common::test_config();
    config.wallet_quote_limit = 2;
    let state = app_state(&harness, Arc::new(config));
    let app = test_app!(state);

    let request = |_: u32| {
        test::TestRequest::post()
            .uri("/v1/quote")
            .set_json(json!({
                "userPubkey": harness.user().pubkey().to_base58(),
                "paymentToken": harness.payment_token().to_base58(),
            }))
            .to_request()
    };

    for i in 0..2 {
        let response = test::call_service(&app, request(i)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = test::call_service(&app, request(3)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: ErrorBody = test::read_body_json(response).await;
    assert_eq!(body.code, "RATE_LIMIT");
    assert_eq!(body.retry_after, Some(60));
}

#[actix_web::test]
async fn test_admin_guard() {
    let harness = Harness::new();

    // Unconfigured surface refuses everything
    let state = app_state(&harness, harness.config.clone());
    let app = test_app!(state);
    let response = test::call_service(
        &app,
        test::TestRequest::get().uri("/admin/treasury").to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: ErrorBody = test::read_body_json(response).await;
    assert_eq!(body.code, "ADMIN_NOT_CONFIGURED");

    // Configured surface: wrong key, key in the query string, correct key
    let mut config = common::test_config();
    config.admin_api_key = Some("sekrit-admin-key".to_string());
    let state = app_state(&harness, Arc::new(config));
    let app = test_app!(state);

    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/admin/treasury")
            .insert_header(("x-admin-key", "wrong"))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/admin/treasury?adminKey=sekrit-admin-key")
            .insert_header(("x-admin-key", "sekrit-admin-key"))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/admin/treasury")
            .insert_header(("x-admin-key", "sekrit-admin-key"))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_preflight_carries_cors_headers() {
    let harness = Harness::new();
    let state = app_state(&harness, harness.config.clone());
    let app = test_app!(state);

    // No allow-list configured (development): any origin passes
    let response = test::call_service(
        &app,
        test::TestRequest::default()
            .method(actix_web::http::Method::OPTIONS)
            .uri("/v1/quote")
            .insert_header(("origin", "https://app.example.com"))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://app.example.com")
    );
    assert!(response.headers().contains_key("x-correlation-id"));
}

#[actix_web::test]
async fn test_stats_and_tokens_routes() {
    let harness = Harness::new();
    let state = app_state(&harness, harness.config.clone());
    let app = test_app!(state);

    let response =
        test::call_service(&app, test::TestRequest::get().uri("/v1/stats").to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response =
        test::call_service(&app, test::TestRequest::get().uri("/v1/tokens").to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Unknown burn signature is a 404 in the standard shape
    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/v1/stats/burns/3xyzUnknownSignature")
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
