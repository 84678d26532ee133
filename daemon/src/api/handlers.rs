// Public route handlers. Everything returns RelayError so the closed-set
// JSON error body is the only failure shape a client ever sees.

use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use pyre_common::api::{
    BurnProofView, HealthChecks, HealthResponse, HealthStatus, LeaderboardEntry, QuoteRequest,
    StatsResponse, SubmitRequest, TokenMetaView, TokensResponse, WalletStatsResponse,
};

use crate::{
    config::RATE_WINDOW_SECS,
    error::RelayError,
    types::BurnProof,
};

use super::AppState;

const LEADERBOARD_LIMIT: usize = 25;
const BURN_STREAM_LIMIT: usize = 50;

fn client_ip(req: &HttpRequest) -> Option<String> {
    req.connection_info()
        .realip_remote_addr()
        .map(str::to_string)
}

/// Per-wallet and per-IP rolling-window caps. The IP cap is wider: several
/// wallets legitimately share an IP, no wallet legitimately spans many.
async fn enforce_rate_limit(
    state: &AppState,
    kind: &str,
    wallet: &str,
    ip: Option<&str>,
    wallet_limit: u64,
) -> Result<(), RelayError> {
    let window = Duration::from_secs(RATE_WINDOW_SECS);
    let wallet_count = state
        .hot
        .window_count(&format!("wallet:{}", kind), wallet, window)
        .await?;
    if wallet_count > wallet_limit {
        return Err(RelayError::RateLimit {
            retry_after: RATE_WINDOW_SECS,
        });
    }
    if let Some(ip) = ip {
        let ip_count = state
            .hot
            .window_count(&format!("ip:{}", kind), ip, window)
            .await?;
        if ip_count > wallet_limit.saturating_mul(5) {
            return Err(RelayError::RateLimit {
                retry_after: RATE_WINDOW_SECS,
            });
        }
    }
    Ok(())
}

async fn quote_inner(
    state: &AppState,
    req: &HttpRequest,
    body: &QuoteRequest,
    ignition: bool,
) -> Result<HttpResponse, RelayError> {
    let ip = client_ip(req);
    enforce_rate_limit(
        state,
        "quote",
        &body.user_pubkey,
        ip.as_deref(),
        state.config.wallet_quote_limit,
    )
    .await?;
    state
        .anomaly
        .observe("quote", Some(&body.user_pubkey), ip.as_deref())
        .await;
    let response = state.quotes.create_quote(body, ignition).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn create_quote(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<QuoteRequest>,
) -> Result<HttpResponse, RelayError> {
    quote_inner(&state, &req, &body, false).await
}

pub async fn create_ignition_quote(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<QuoteRequest>,
) -> Result<HttpResponse, RelayError> {
    quote_inner(&state, &req, &body, true).await
}

pub async fn submit(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<SubmitRequest>,
) -> Result<HttpResponse, RelayError> {
    let ip = client_ip(&req);
    enforce_rate_limit(
        &state,
        "submit",
        &body.user_pubkey,
        ip.as_deref(),
        state.config.wallet_submit_limit,
    )
    .await?;
    state
        .anomaly
        .observe("submit", Some(&body.user_pubkey), ip.as_deref())
        .await;
    let response = state.submits.submit(&body).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn list_tokens(state: web::Data<AppState>) -> Result<HttpResponse, RelayError> {
    let tokens: Vec<TokenMetaView> = state
        .registry
        .all()
        .map(|info| TokenMetaView {
            mint: info.mint.to_base58(),
            symbol: info.symbol.clone(),
            decimals: info.decimals,
            tier: info.tier.to_string(),
            score: info.score,
        })
        .collect();
    Ok(HttpResponse::Ok().json(TokensResponse { tokens }))
}

pub async fn stats(state: web::Data<AppState>) -> Result<HttpResponse, RelayError> {
    let snapshot = state.hot.stats_snapshot().await?;
    Ok(HttpResponse::Ok().json(StatsResponse {
        burn_total: snapshot.burn_total.to_string(),
        tx_count: snapshot.tx_count,
        treasury_balance: snapshot.treasury_balance.to_string(),
    }))
}

pub async fn wallet_stats(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, RelayError> {
    let wallet = path.into_inner();
    let burned = state.hot.leaderboard_score(&wallet).await?.unwrap_or(0);
    let rank = state.hot.leaderboard_rank(&wallet).await?;
    Ok(HttpResponse::Ok().json(WalletStatsResponse {
        wallet,
        burn_contribution: burned.to_string(),
        // One-based for display
        rank: rank.map(|r| r + 1),
    }))
}

pub async fn leaderboard(state: web::Data<AppState>) -> Result<HttpResponse, RelayError> {
    let top = state.hot.leaderboard_top(LEADERBOARD_LIMIT).await?;
    let entries: Vec<LeaderboardEntry> = top
        .into_iter()
        .enumerate()
        .map(|(index, (wallet, burned))| LeaderboardEntry {
            rank: index as u64 + 1,
            wallet,
            burned: burned.to_string(),
        })
        .collect();
    Ok(HttpResponse::Ok().json(entries))
}

pub fn burn_view(proof: &BurnProof) -> BurnProofView {
    BurnProofView {
        signature: proof.signature.to_base58(),
        kind: proof.kind.to_string(),
        amount_ecotoken: proof.amount_ecotoken.to_string(),
        amount_native: proof.amount_native.to_string(),
        treasury_retained: proof.treasury_retained.to_string(),
        source_token: proof.source_token.map(|mint| mint.to_base58()),
        timestamp: proof.timestamp,
        explorer_url: proof.explorer_url.clone(),
    }
}

pub async fn recent_burns(state: web::Data<AppState>) -> Result<HttpResponse, RelayError> {
    let proofs = state.hot.recent_burn_proofs(BURN_STREAM_LIMIT).await?;
    let views: Vec<BurnProofView> = proofs.iter().map(burn_view).collect();
    Ok(HttpResponse::Ok().json(views))
}

pub async fn burn_by_signature(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, RelayError> {
    let signature = path.into_inner();
    let proof = state
        .cold
        .burn_by_signature(&signature)
        .await
        .ok_or(RelayError::ResourceNotFound("burn"))?;
    Ok(HttpResponse::Ok().json(burn_view(&proof)))
}

pub async fn health(state: web::Data<AppState>) -> Result<HttpResponse, RelayError> {
    let checks = HealthChecks {
        hot_store: state.hot.ping().await,
        cold_store: state.cold.health().await,
        rpc_pool: state
            .rpc_pool
            .as_ref()
            .map(|pool| pool.is_healthy())
            .unwrap_or(true),
        fee_payer_pool: state.payers.any_healthy(),
    };
    let healthy = [checks.hot_store, checks.cold_store, checks.rpc_pool, checks.fee_payer_pool];
    let status = match healthy.iter().filter(|ok| **ok).count() {
        4 => HealthStatus::Ok,
        0 => HealthStatus::Down,
        // The relay keeps serving what it can
        _ => HealthStatus::Degraded,
    };
    Ok(HttpResponse::Ok().json(HealthResponse { status, checks }))
}

pub async fn prometheus_metrics(state: web::Data<AppState>) -> Result<HttpResponse, RelayError> {
    match state.prometheus.as_ref() {
        Some(handle) => Ok(HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render())),
        None => Err(RelayError::ResourceNotFound("metrics")),
    }
}
