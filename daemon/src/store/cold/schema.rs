// Cold-store DDL, applied statement by statement at boot. Idempotent so a
// restart against an initialized database is a no-op.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS burns (
    signature TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    amount_ecotoken BIGINT NOT NULL,
    amount_native BIGINT NOT NULL,
    treasury_retained BIGINT NOT NULL,
    source_token TEXT,
    timestamp BIGINT NOT NULL,
    explorer_url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS burns_timestamp_idx ON burns (timestamp DESC);

CREATE TABLE IF NOT EXISTS transactions (
    quote_id TEXT PRIMARY KEY,
    signature TEXT NOT NULL,
    user_account TEXT NOT NULL,
    payment_token TEXT NOT NULL,
    fee_amount BIGINT NOT NULL,
    fee_native BIGINT NOT NULL,
    fee_payer TEXT NOT NULL,
    timestamp BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS transactions_timestamp_idx ON transactions (timestamp DESC);
CREATE INDEX IF NOT EXISTS transactions_user_idx ON transactions (user_account);

CREATE TABLE IF NOT EXISTS token_stats (
    mint TEXT PRIMARY KEY,
    tx_count BIGINT NOT NULL DEFAULT 0,
    fees_amount BIGINT NOT NULL DEFAULT 0,
    updated_at BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_log (
    id BIGSERIAL PRIMARY KEY,
    timestamp BIGINT NOT NULL,
    kind TEXT NOT NULL,
    wallet TEXT,
    ip TEXT,
    severity TEXT NOT NULL,
    payload JSONB
);

CREATE INDEX IF NOT EXISTS audit_log_timestamp_idx ON audit_log (timestamp DESC);

CREATE TABLE IF NOT EXISTS daily_stats (
    day TEXT PRIMARY KEY,
    burns BIGINT NOT NULL DEFAULT 0,
    transactions BIGINT NOT NULL DEFAULT 0,
    unique_wallets BIGINT NOT NULL DEFAULT 0,
    fees_native BIGINT NOT NULL DEFAULT 0,
    treasury_balance BIGINT
)
"#;
