// Shared harness for integration tests: in-memory hot tier, fallback-only
// cold tier, and scriptable mock collaborators standing in for the chain,
// the DEX aggregator and the holder oracle.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use pyre_common::{
    crypto::{hash_bytes, Hash, Keypair, Pubkey, Signature},
    transaction::Transaction,
};
use pyre_daemon::{
    audit::AuditLogger,
    chain::{ChainError, ChainRpc, TokenAccountInfo, TokenSupply},
    config::Config,
    oracle::{DexAggregator, DexQuote, HolderOracle, TokenAcceptance},
    payer::FeePayerPool,
    store::{cold::ColdStore, hot::HotStore},
    tokens::{AcceptanceTier, TokenInfo},
};

pub fn test_config() -> Config {
    use clap::Parser;
    Config::parse_from(["pyre_daemon"])
}

// A cold store pointed at a dead address: every operation resolves to its
// declared fallback, which is exactly what these tests need
pub fn dead_cold_store() -> Arc<ColdStore> {
    Arc::new(ColdStore::connect_lazy("postgres://127.0.0.1:1/pyre").unwrap())
}

pub fn audit_logger(hot: &HotStore) -> Arc<AuditLogger> {
    Arc::new(AuditLogger::new(hot.clone(), dead_cold_store()))
}

pub struct MockChain {
    pub balances: Mutex<HashMap<Pubkey, u64>>,
    pub token_balances: Mutex<HashMap<(Pubkey, Pubkey), u64>>,
    pub token_accounts: Mutex<HashMap<Pubkey, Vec<TokenAccountInfo>>>,
    pub supply: Mutex<HashMap<Pubkey, TokenSupply>>,
    // Scripted outcomes for send_transaction, popped per call; empty = Ok
    pub send_script: Mutex<VecDeque<Result<(), ChainError>>>,
    pub sent: Mutex<Vec<Transaction>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            token_balances: Mutex::new(HashMap::new()),
            token_accounts: Mutex::new(HashMap::new()),
            supply: Mutex::new(HashMap::new()),
            send_script: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_balance(&self, account: Pubkey, amount: u64) {
        self.balances.lock().unwrap().insert(account, amount);
    }

    pub fn script_sends(&self, outcomes: Vec<Result<(), ChainError>>) {
        *self.send_script.lock().unwrap() = outcomes.into();
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn get_balance(&self, account: &Pubkey) -> Result<u64, ChainError> {
        Ok(*self.balances.lock().unwrap().get(account).unwrap_or(&0))
    }

    async fn get_token_balance(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<u64, ChainError> {
        Ok(*self
            .token_balances
            .lock()
            .unwrap()
            .get(&(*owner, *mint))
            .unwrap_or(&0))
    }

    async fn get_token_accounts(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<TokenAccountInfo>, ChainError> {
        Ok(self
            .token_accounts
            .lock()
            .unwrap()
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_token_supply(&self, mint: &Pubkey) -> Result<TokenSupply, ChainError> {
        Ok(*self
            .supply
            .lock()
            .unwrap()
            .get(mint)
            .unwrap_or(&TokenSupply {
                amount: 1_000_000_000_000,
                decimals: 6,
            }))
    }

    async fn latest_blockhash(&self) -> Result<Hash, ChainError> {
        Ok(hash_bytes(b"mock-blockhash"))
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ChainError> {
        if let Some(outcome) = self.send_script.lock().unwrap().pop_front() {
            outcome?;
        }
        self.sent.lock().unwrap().push(tx.clone());
        tx.chain_signature()
            .copied()
            .ok_or_else(|| ChainError::InvalidResponse("unsigned transaction".into()))
    }

    async fn confirm(&self, _signature: &Signature, _timeout: Duration) -> Result<(), ChainError> {
        Ok(())
    }
}

/// Fixed-rate aggregator: 10 input units buy 1 output unit.
pub struct MockDex {
    pub prices_usd: Mutex<HashMap<Pubkey, f64>>,
    pub swaps_built: Mutex<u32>,
}

pub const MOCK_DEX_RATE: u64 = 10;

impl MockDex {
    pub fn new() -> Self {
        Self {
            prices_usd: Mutex::new(HashMap::new()),
            swaps_built: Mutex::new(0),
        }
    }

    pub fn set_price(&self, mint: Pubkey, price: f64) {
        self.prices_usd.lock().unwrap().insert(mint, price);
    }
}

#[async_trait]
impl DexAggregator for MockDex {
    async fn quote(
        &self,
        input: &Pubkey,
        output: &Pubkey,
        amount: u64,
    ) -> Result<DexQuote, pyre_daemon::oracle::OracleError> {
        Ok(DexQuote {
            input_mint: *input,
            output_mint: *output,
            in_amount: amount,
            out_amount: amount / MOCK_DEX_RATE,
            raw: serde_json::Value::Null,
        })
    }

    async fn swap_transaction(
        &self,
        quote: &DexQuote,
        signer: &Pubkey,
    ) -> Result<Transaction, pyre_daemon::oracle::OracleError> {
        *self.swaps_built.lock().unwrap() += 1;
        // A minimal self-transfer shaped like a swap: signable by `signer`
        let instruction =
            pyre_common::transaction::transfer_instruction(signer, signer, quote.in_amount);
        Ok(pyre_common::transaction::build_transaction(
            signer,
            &[instruction],
            hash_bytes(b"mock-blockhash"),
        ))
    }

    async fn token_price_usd(
        &self,
        mint: &Pubkey,
    ) -> Result<f64, pyre_daemon::oracle::OracleError> {
        self.prices_usd
            .lock()
            .unwrap()
            .get(mint)
            .copied()
            .ok_or(pyre_daemon::oracle::OracleError::NoRoute)
    }
}

pub struct MockOracle {
    pub share: Mutex<f64>,
    pub dual_burn: Mutex<f64>,
    pub reject_all: Mutex<bool>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            share: Mutex::new(0.0),
            dual_burn: Mutex::new(0.0),
            reject_all: Mutex::new(false),
        }
    }
}

#[async_trait]
impl HolderOracle for MockOracle {
    async fn token_acceptance(
        &self,
        mint: &Pubkey,
    ) -> Result<TokenAcceptance, pyre_daemon::oracle::OracleError> {
        let rejected = *self.reject_all.lock().unwrap();
        Ok(TokenAcceptance {
            accepted: !rejected,
            info: TokenInfo {
                mint: *mint,
                symbol: "X".to_string(),
                decimals: 6,
                tier: if rejected {
                    AcceptanceTier::Rejected
                } else {
                    AcceptanceTier::Diamond
                },
                score: if rejected { 0 } else { 100 },
            },
        })
    }

    async fn holder_share(
        &self,
        _wallet: &Pubkey,
    ) -> Result<f64, pyre_daemon::oracle::OracleError> {
        Ok(*self.share.lock().unwrap())
    }

    async fn dual_burn_pct(
        &self,
        _wallet: Option<&Pubkey>,
    ) -> Result<f64, pyre_daemon::oracle::OracleError> {
        Ok(*self.dual_burn.lock().unwrap())
    }
}

pub struct Harness {
    pub hot: HotStore,
    pub cold: Arc<ColdStore>,
    pub chain: Arc<MockChain>,
    pub dex: Arc<MockDex>,
    pub oracle: Arc<MockOracle>,
    pub payers: Arc<FeePayerPool>,
    pub payer_keys: Vec<Keypair>,
    pub config: Arc<Config>,
}

impl Harness {
    pub fn new() -> Self {
        let hot = HotStore::memory();
        let cold = dead_cold_store();
        let chain = Arc::new(MockChain::new());
        let dex = Arc::new(MockDex::new());
        let oracle = Arc::new(MockOracle::new());

        let payer_keys = vec![Keypair::from_seed([41; 32]), Keypair::from_seed([42; 32])];
        let pool_keys = vec![Keypair::from_seed([41; 32]), Keypair::from_seed([42; 32])];
        let payers = Arc::new(FeePayerPool::new(pool_keys, hot.clone()));
        for key in &payer_keys {
            payers.set_balance(key.pubkey(), 10_000_000_000);
            chain.set_balance(*key.pubkey(), 10_000_000_000);
        }

        Self {
            hot,
            cold,
            chain,
            dex,
            oracle,
            payers,
            payer_keys,
            config: Arc::new(test_config()),
        }
    }

    pub fn user(&self) -> Keypair {
        Keypair::from_seed([77; 32])
    }

    pub fn payment_token(&self) -> Pubkey {
        *Keypair::from_seed([90; 32]).pubkey()
    }
}
