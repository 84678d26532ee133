// End-to-end quote -> submit flow against the in-memory hot tier and mock
// collaborators: happy path, replay rejection, expiry, circuit exhaustion
// and validation failures.

mod common;

use std::{str::FromStr, sync::Arc, time::Duration};

use common::{Harness, MOCK_DEX_RATE};
use pyre_common::{
    api::{QuoteRequest, SubmitRequest},
    crypto::Pubkey,
    time::get_current_time_in_seconds,
    transaction::{build_transaction, transfer_instruction, Transaction},
};
use pyre_daemon::{
    chain::ChainError,
    error::RelayError,
    services::{quote::QuoteService, submit::SubmitService, velocity::VelocityTracker},
    types::{HolderTierSnapshot, PaymentTokenMeta, Quote, QuoteKind},
};

fn quote_service(harness: &Harness) -> QuoteService {
    QuoteService::new(
        harness.hot.clone(),
        harness.payers.clone(),
        harness.dex.clone(),
        harness.oracle.clone(),
        common::audit_logger(&harness.hot),
        harness.config.clone(),
        *harness.payer_keys[0].pubkey(),
    )
}

fn submit_service(harness: &Harness) -> SubmitService {
    SubmitService::new(
        harness.hot.clone(),
        harness.cold.clone(),
        harness.payers.clone(),
        harness.chain.clone(),
        Arc::new(VelocityTracker::new(harness.hot.clone())),
        common::audit_logger(&harness.hot),
        harness.config.clone(),
    )
}

fn quote_request(harness: &Harness) -> QuoteRequest {
    QuoteRequest {
        user_pubkey: harness.user().pubkey().to_base58(),
        payment_token: harness.payment_token().to_base58(),
        estimated_compute_units: Some(200_000),
    }
}

// The user's side of the deal: a transfer paying the treasury, fee payer
// slot left for the relay, user signature attached
fn signed_payment_tx(harness: &Harness, fee_payer: &Pubkey) -> Transaction {
    let user = harness.user();
    let instruction = transfer_instruction(user.pubkey(), fee_payer, 1);
    let mut tx = build_transaction(fee_payer, &[instruction], pyre_common::crypto::hash_bytes(b"user-side"));
    tx.co_sign(&user).unwrap();
    tx
}

#[tokio::test]
async fn test_happy_path() {
    let harness = Harness::new();
    let quotes = quote_service(&harness);
    let submits = submit_service(&harness);

    let response = quotes.create_quote(&quote_request(&harness), false).await.unwrap();

    // 200k CU at 0.001/unit over a 50k base, markup 1.0, no discount
    assert_eq!(response.fee_native, "50200");
    assert_eq!(
        response.fee_amount,
        (50_200 / MOCK_DEX_RATE).to_string()
    );
    assert_eq!(response.token.tier, "diamond");
    assert!(!response.holder_tier.is_at_break_even);
    assert_eq!(response.fee_payer, harness.payer_keys[0].pubkey().to_base58());

    // The reservation is visible in the hot store while the quote lives
    assert!(harness
        .hot
        .reservation_get(&response.quote_id)
        .await
        .unwrap()
        .is_some());

    let fee_payer = Pubkey::from_str(&response.fee_payer).unwrap();
    let tx = signed_payment_tx(&harness, &fee_payer);
    let submitted = submits
        .submit(&SubmitRequest {
            quote_id: response.quote_id.clone(),
            signed_transaction: tx.to_base64(),
            user_pubkey: harness.user().pubkey().to_base58(),
        })
        .await
        .unwrap();
    assert!(!submitted.signature.is_empty());
    assert_eq!(harness.chain.sent_count(), 1);

    // Settlement: quote consumed, reservation released, books updated
    assert!(harness
        .hot
        .get_quote(&response.quote_id)
        .await
        .unwrap()
        .is_none());
    assert!(harness
        .hot
        .reservation_get(&response.quote_id)
        .await
        .unwrap()
        .is_none());
    let stats = harness.hot.stats_snapshot().await.unwrap();
    assert_eq!(stats.tx_count, 1);
    // The books carry the fee charged, not the reservation with its buffer
    let raw = harness.hot.stats_raw().await.unwrap();
    assert_eq!(
        raw.get(pyre_daemon::store::hot::STAT_FEES_NATIVE).copied(),
        Some(50_200)
    );
    let contribution = harness
        .hot
        .leaderboard_score(&harness.user().pubkey().to_base58())
        .await
        .unwrap();
    let expected = (50_200f64 * harness.config.burn_ratio).floor() as u64;
    assert_eq!(contribution, Some(expected));
}

#[tokio::test]
async fn test_replay_is_rejected_without_chain_io() {
    let harness = Harness::new();
    let quotes = quote_service(&harness);
    let submits = submit_service(&harness);

    let first = quotes.create_quote(&quote_request(&harness), false).await.unwrap();
    let fee_payer = Pubkey::from_str(&first.fee_payer).unwrap();
    let tx = signed_payment_tx(&harness, &fee_payer);
    let encoded = tx.to_base64();

    submits
        .submit(&SubmitRequest {
            quote_id: first.quote_id,
            signed_transaction: encoded.clone(),
            user_pubkey: harness.user().pubkey().to_base58(),
        })
        .await
        .unwrap();
    let sent_after_first = harness.chain.sent_count();

    // Same signed bytes against a fresh quote
    let second = quotes.create_quote(&quote_request(&harness), false).await.unwrap();
    let error = submits
        .submit(&SubmitRequest {
            quote_id: second.quote_id,
            signed_transaction: encoded,
            user_pubkey: harness.user().pubkey().to_base58(),
        })
        .await
        .unwrap_err();
    assert!(matches!(error, RelayError::ReplayDetected));
    assert_eq!(error.code(), "REPLAY_DETECTED");
    // The RPC pool was never touched for the replay
    assert_eq!(harness.chain.sent_count(), sent_after_first);
}

#[tokio::test]
async fn test_expired_quote_releases_reservation() {
    let harness = Harness::new();
    let submits = submit_service(&harness);

    let fee_payer = *harness.payer_keys[0].pubkey();
    let mint = harness.payment_token();
    let quote = Quote {
        id: "expired-quote".to_string(),
        user_account: *harness.user().pubkey(),
        payment_token: mint,
        fee_payer_account: fee_payer,
        fee_amount: 5_000,
        fee_native: 50_200,
        reserved_native: 60_200,
        expires_at: get_current_time_in_seconds() - 1,
        payment_token_meta: PaymentTokenMeta {
            mint,
            symbol: "X".into(),
            decimals: 6,
            tier: "diamond".into(),
            score: 100,
        },
        holder_tier: HolderTierSnapshot {
            share_pct: 0.0,
            discount: 0.0,
            is_at_break_even: false,
            tier_label: "none".into(),
        },
        dual_burn_pct: 0.0,
        kind: QuoteKind::Standard,
    };
    harness
        .hot
        .set_quote(&quote, Duration::from_secs(60))
        .await
        .unwrap();

    let tx = signed_payment_tx(&harness, &fee_payer);
    let error = submits
        .submit(&SubmitRequest {
            quote_id: quote.id.clone(),
            signed_transaction: tx.to_base64(),
            user_pubkey: harness.user().pubkey().to_base58(),
        })
        .await
        .unwrap_err();
    assert!(matches!(error, RelayError::QuoteExpired));

    // The payer is free again: a fresh reservation succeeds
    assert!(harness
        .payers
        .reserve("next-quote", 100_000, Duration::from_secs(90))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_all_circuits_open_rejects_quotes() {
    let harness = Harness::new();
    let quotes = quote_service(&harness);

    for key in &harness.payer_keys {
        for _ in 0..pyre_daemon::config::PAYER_FAILURE_THRESHOLD {
            harness.payers.report_failure(key.pubkey(), &ChainError::Timeout);
        }
    }

    let error = quotes
        .create_quote(&quote_request(&harness), false)
        .await
        .unwrap_err();
    assert_eq!(error.code(), "CIRCUIT_BREAKER_OPEN");
    assert!(error.retry_after().unwrap_or(0) > 0);
}

#[tokio::test]
async fn test_tier_rejection() {
    let harness = Harness::new();
    *harness.oracle.reject_all.lock().unwrap() = true;
    let quotes = quote_service(&harness);

    let error = quotes
        .create_quote(&quote_request(&harness), false)
        .await
        .unwrap_err();
    assert_eq!(error.code(), "TIER_REJECTED");
}

#[tokio::test]
async fn test_holder_discount_floors_at_break_even() {
    let harness = Harness::new();
    // A whale: 1% of supply maxes the discount out
    *harness.oracle.share.lock().unwrap() = 0.01;
    let quotes = quote_service(&harness);

    let response = quotes.create_quote(&quote_request(&harness), false).await.unwrap();
    assert!(response.holder_tier.is_at_break_even);
    // ceil(5000 / (1/phi^3)) with the default knobs
    assert_eq!(response.fee_native, "21181");
    assert!(response.holder_tier.discount_pct < 95.0);
}

#[tokio::test]
async fn test_submit_validation_reports_every_problem() {
    let harness = Harness::new();
    let quotes = quote_service(&harness);
    let submits = submit_service(&harness);

    let response = quotes.create_quote(&quote_request(&harness), false).await.unwrap();

    // Wrong fee payer and no user signature at all
    let outsider = pyre_common::crypto::Keypair::from_seed([99; 32]);
    let instruction =
        transfer_instruction(harness.user().pubkey(), outsider.pubkey(), 1);
    let tx = build_transaction(
        outsider.pubkey(),
        &[instruction],
        pyre_common::crypto::hash_bytes(b"bad"),
    );

    let error = submits
        .submit(&SubmitRequest {
            quote_id: response.quote_id,
            signed_transaction: tx.to_base64(),
            user_pubkey: harness.user().pubkey().to_base58(),
        })
        .await
        .unwrap_err();
    assert_eq!(error.code(), "VALIDATION_ERROR");
    let details = error.details().unwrap();
    assert!(details.iter().any(|d| d.contains("fee payer")));
    assert!(details.iter().any(|d| d.contains("signature")));
}

#[tokio::test]
async fn test_ignition_flow_pays_the_fixed_destination() {
    let harness = Harness::new();
    let destination = pyre_common::crypto::Keypair::from_seed([55; 32]);

    let mut config = common::test_config();
    config.ignition_enabled = true;
    config.ignition_destination = Some(destination.pubkey().to_base58());
    config.ignition_lamports = 1_000_000;
    let config = Arc::new(config);

    let quotes = QuoteService::new(
        harness.hot.clone(),
        harness.payers.clone(),
        harness.dex.clone(),
        harness.oracle.clone(),
        common::audit_logger(&harness.hot),
        config.clone(),
        *harness.payer_keys[0].pubkey(),
    );
    let submits = SubmitService::new(
        harness.hot.clone(),
        harness.cold.clone(),
        harness.payers.clone(),
        harness.chain.clone(),
        Arc::new(VelocityTracker::new(harness.hot.clone())),
        common::audit_logger(&harness.hot),
        config,
    );

    let response = quotes.create_quote(&quote_request(&harness), true).await.unwrap();
    let ignition = response.ignition.as_ref().expect("ignition view");
    assert_eq!(ignition.amount, "1000000");
    assert_eq!(ignition.destination, destination.pubkey().to_base58());

    let fee_payer = Pubkey::from_str(&response.fee_payer).unwrap();
    let tx = signed_payment_tx(&harness, &fee_payer);
    let submitted = submits
        .submit(&SubmitRequest {
            quote_id: response.quote_id,
            signed_transaction: tx.to_base64(),
            user_pubkey: harness.user().pubkey().to_base58(),
        })
        .await
        .unwrap();
    assert!(submitted.ignition_signature.is_some());
    // The user's transaction plus the payout leg
    assert_eq!(harness.chain.sent_count(), 2);

    // The payout transfer is an outflow, not a fee: the public fees total
    // must only grow by what the user was charged
    let raw = harness.hot.stats_raw().await.unwrap();
    assert_eq!(
        raw.get(pyre_daemon::store::hot::STAT_FEES_NATIVE).copied(),
        Some(50_200)
    );
}

#[tokio::test]
async fn test_ignition_disabled_by_default() {
    let harness = Harness::new();
    let quotes = quote_service(&harness);
    let error = quotes
        .create_quote(&quote_request(&harness), true)
        .await
        .unwrap_err();
    assert_eq!(error.code(), "IGNITION_DISABLED");
}

#[tokio::test]
async fn test_unknown_quote() {
    let harness = Harness::new();
    let submits = submit_service(&harness);
    let fee_payer = *harness.payer_keys[0].pubkey();
    let tx = signed_payment_tx(&harness, &fee_payer);

    let error = submits
        .submit(&SubmitRequest {
            quote_id: "never-issued".to_string(),
            signed_transaction: tx.to_base64(),
            user_pubkey: harness.user().pubkey().to_base58(),
        })
        .await
        .unwrap_err();
    assert_eq!(error.code(), "QUOTE_NOT_FOUND");
}
