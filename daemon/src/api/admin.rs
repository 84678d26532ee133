// Admin surface. Guarded by the x-admin-key header with a timing-safe
// comparison; keys in the query string are rejected outright so they never
// land in access logs or browser history.

use actix_web::{web, HttpRequest, HttpResponse};
use log::info;
use pyre_common::api::{
    BurnTriggerResponse, MigrateKeysRequest, MigrateKeysResponse, TreasuryTokenView,
    TreasuryView, ADMIN_KEY_HEADER,
};
use subtle::ConstantTimeEq;

use crate::error::RelayError;

use super::{handlers::burn_view, AppState};

const HISTORY_LIMIT: i64 = 100;

// Query parameter names that would smuggle the key outside the header
const FORBIDDEN_QUERY_KEYS: [&str; 3] = ["key", "admin_key", "adminKey"];

fn authorize(state: &AppState, req: &HttpRequest) -> Result<(), RelayError> {
    let Some(expected) = state.config.admin_api_key.as_deref() else {
        return Err(RelayError::AdminNotConfigured);
    };

    let query = req.query_string();
    if FORBIDDEN_QUERY_KEYS
        .iter()
        .any(|name| query.split('&').any(|pair| pair.starts_with(&format!("{}=", name))))
    {
        return Err(RelayError::InvalidApiKey);
    }

    let provided = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(RelayError::InvalidApiKey)?;

    // Slice ct_eq already folds the length difference into the verdict
    if provided.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        Err(RelayError::InvalidApiKey)
    }
}

pub async fn trigger_burn(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, RelayError> {
    authorize(&state, &req)?;
    info!("burn cycle triggered by admin");
    let report = state
        .burner
        .run_cycle()
        .await
        .map_err(RelayError::Internal)?;
    Ok(HttpResponse::Ok().json(BurnTriggerResponse {
        executed: report.executed,
        proofs: report.proofs.iter().map(burn_view).collect(),
    }))
}

pub async fn treasury(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, RelayError> {
    authorize(&state, &req)?;
    let holdings = state
        .burner
        .scan_treasury()
        .await
        .map_err(RelayError::Internal)?;
    let address = state
        .payers
        .primary()
        .map(|payer| payer.pubkey().to_base58())
        .unwrap_or_default();
    let native_balance = state
        .hot
        .stats_snapshot()
        .await
        .map(|snapshot| snapshot.treasury_balance)
        .unwrap_or(0);
    Ok(HttpResponse::Ok().json(TreasuryView {
        address,
        native_balance: native_balance.to_string(),
        tokens: holdings
            .iter()
            .map(|holding| TreasuryTokenView {
                mint: holding.mint.to_base58(),
                token_account: holding.token_account.to_base58(),
                amount: holding.amount.to_string(),
                usd_value: holding.usd_value,
            })
            .collect(),
    }))
}

pub async fn burn_history(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, RelayError> {
    authorize(&state, &req)?;
    let burns = state.cold.recent_burns(HISTORY_LIMIT).await;
    let views: Vec<_> = burns.iter().map(burn_view).collect();
    Ok(HttpResponse::Ok().json(views))
}

pub async fn transaction_history(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, RelayError> {
    authorize(&state, &req)?;
    let transactions = state.cold.recent_transactions(HISTORY_LIMIT).await;
    Ok(HttpResponse::Ok().json(transactions))
}

pub async fn migrate_keys(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<MigrateKeysRequest>,
) -> Result<HttpResponse, RelayError> {
    authorize(&state, &req)?;
    if body.legacy_prefix.is_empty() || body.legacy_prefix == crate::config::KEY_PREFIX {
        return Err(RelayError::validation("legacyPrefix must name a foreign namespace"));
    }
    let migrated = state.hot.migrate_keys(&body.legacy_prefix).await?;
    info!(
        "migrated {} hot-store keys from prefix '{}'",
        migrated, body.legacy_prefix
    );
    Ok(HttpResponse::Ok().json(MigrateKeysResponse { migrated }))
}
