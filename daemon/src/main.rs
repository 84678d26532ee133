use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use pyre_common::crypto::Keypair;

use pyre_daemon::{
    api::{start_http_server, AppState},
    audit::{AnomalyDetector, AuditLogger},
    chain::{ChainRpc, RpcPool},
    config::{Config, BALANCE_REFRESH_INTERVAL_SECS, ECOTOKEN_DECIMALS, ECOTOKEN_SYMBOL},
    logger,
    oracle::{DexAggregator, HolderOracle, JupiterClient, VerificationClient},
    payer::FeePayerPool,
    services::{
        burn::BurnWorker, quote::QuoteService, submit::SubmitService, sync::DataSyncWorker,
        velocity::VelocityTracker,
    },
    store::{
        cold::ColdStore,
        hot::{HotStore, HotTier},
    },
    tokens::TokenRegistry,
};

// Placeholder database in development when DATABASE_URL is absent; the lazy
// pool never connects until a query runs, and every query has a fallback
const DEV_DATABASE_URL: &str = "postgres://127.0.0.1/pyre";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    logger::init(&config.env).context("failed to initialize logging")?;
    info!(
        "pyre relay v{} starting in {} mode",
        pyre_common::config::VERSION,
        config.env
    );
    config.validate()?;
    let config = Arc::new(config);

    // Signing material: configured keys, or an ephemeral development signer
    let mut keypairs = config.signing_keys()?;
    if keypairs.is_empty() {
        let ephemeral = Keypair::from_seed(rand::random());
        warn!(
            "no fee payer keys configured, using ephemeral development signer {}",
            ephemeral.pubkey()
        );
        keypairs.push(ephemeral);
    }

    // Hot tier (with the development-only memory fallback inside)
    let tier = Arc::new(
        HotTier::connect(config.redis_url.as_deref(), config.env)
            .await
            .context("hot store connection failed")?,
    );
    let hot = HotStore::new(tier.clone());

    // Cold tier: lazy pool, schema on first boot
    let database_url = config
        .database_url
        .clone()
        .unwrap_or_else(|| DEV_DATABASE_URL.to_string());
    let cold = Arc::new(ColdStore::connect_lazy(&database_url)?);
    if let Err(error) = cold.init_schema().await {
        if config.env.requires_remote_stores() {
            return Err(error.context("cold store schema init failed"));
        }
        warn!("cold store unavailable, continuing with fallbacks: {:#}", error);
    }

    let rpc = Arc::new(RpcPool::from_config(&config)?);
    let chain: Arc<dyn ChainRpc> = rpc.clone();

    let payers = Arc::new(FeePayerPool::new(keypairs, hot.clone()));
    let primary = *payers.primary().expect("at least one fee payer").pubkey();
    let treasury = config.treasury(&primary)?;
    let ecotoken = config.ecotoken().ok();
    if ecotoken.is_none() {
        warn!("ECOTOKEN_MINT not configured, burn pipeline stays idle");
    }

    let registry = Arc::new(TokenRegistry::new(ecotoken.map(|mint| {
        (mint, ECOTOKEN_SYMBOL.to_string(), ECOTOKEN_DECIMALS)
    })));

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build http client")?;
    let dex: Arc<dyn DexAggregator> = Arc::new(JupiterClient::new(
        http.clone(),
        config.jupiter_base_url.clone(),
        config.jupiter_api_key.clone(),
        hot.clone(),
    ));
    let oracle: Arc<dyn HolderOracle> = Arc::new(VerificationClient::new(
        http,
        config.verifier_base_url.clone(),
        TokenRegistry::new(ecotoken.map(|mint| {
            (mint, ECOTOKEN_SYMBOL.to_string(), ECOTOKEN_DECIMALS)
        })),
        chain.clone(),
        hot.clone(),
        ecotoken,
    ));

    let audit = Arc::new(AuditLogger::new(hot.clone(), cold.clone()));
    let anomaly = Arc::new(AnomalyDetector::new(hot.clone(), audit.clone()));
    let velocity = Arc::new(VelocityTracker::new(hot.clone()));

    let quotes = Arc::new(QuoteService::new(
        hot.clone(),
        payers.clone(),
        dex.clone(),
        oracle.clone(),
        audit.clone(),
        config.clone(),
        treasury,
    ));
    let submits = Arc::new(SubmitService::new(
        hot.clone(),
        cold.clone(),
        payers.clone(),
        chain.clone(),
        velocity.clone(),
        audit.clone(),
        config.clone(),
    ));
    let burner = Arc::new(BurnWorker::new(
        hot.clone(),
        cold.clone(),
        chain.clone(),
        dex,
        oracle,
        payers.clone(),
        velocity,
        audit.clone(),
        config.clone(),
        treasury,
        ecotoken,
    ));

    // A hot-tier wipe must not reset the public counters
    let sync = Arc::new(DataSyncWorker::new(hot.clone(), tier, cold.clone()));
    sync.seed_from_cold()
        .await
        .context("cold-to-hot seed failed")?;

    // Background tasks, all draining on the shutdown broadcast
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    cold.spawn_reconnect_task(shutdown_tx.subscribe());
    let burn_task = burner.clone().spawn(shutdown_tx.subscribe());
    let sync_task = sync.spawn(shutdown_tx.subscribe());

    // First balance read before serving so the pool starts healthy
    payers.refresh_balances(chain.as_ref()).await;
    let refresh_task = {
        let payers = payers.clone();
        let chain = chain.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(
                BALANCE_REFRESH_INTERVAL_SECS,
            ));
            loop {
                tokio::select! {
                    _ = ticker.tick() => payers.refresh_balances(chain.as_ref()).await,
                    _ = shutdown.recv() => break,
                }
            }
        })
    };

    let prometheus = if config.metrics_enabled {
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .install_recorder()
            .context("failed to install prometheus recorder")?;
        info!("prometheus metrics enabled on /metrics");
        Some(handle)
    } else {
        None
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        hot,
        cold,
        payers,
        rpc_pool: Some(rpc),
        quotes,
        submits,
        burner,
        anomaly,
        registry,
        prometheus,
    });
    let server = start_http_server(state).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, draining");

    // Refuse new requests, let in-flight work finish, stop the workers
    let _ = shutdown_tx.send(());
    server.stop(true).await;
    for task in [burn_task, sync_task, refresh_task] {
        task.abort();
    }
    info!("bye");
    Ok(())
}
