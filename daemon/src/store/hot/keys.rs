// Hot-store key layout. Every key lives under the process-wide prefix so a
// shared instance can host several deployments and the legacy migration can
// target foreign prefixes safely.

use crate::config::KEY_PREFIX;

pub fn namespaced(rest: &str) -> String {
    format!("{}{}", KEY_PREFIX, rest)
}

pub fn quote(id: &str) -> String {
    namespaced(&format!("quote:{}", id))
}

// Anti-replay slot, keyed by the transaction fingerprint
pub fn slot(fingerprint: &str) -> String {
    namespaced(&format!("slot:{}", fingerprint))
}

pub fn rate(scope: &str, id: &str) -> String {
    namespaced(&format!("rate:{}:{}", scope, id))
}

pub fn anomaly(scope: &str, id: &str, kind: &str) -> String {
    namespaced(&format!("anomaly:{}:{}:{}", scope, id, kind))
}

pub fn lock(name: &str) -> String {
    namespaced(&format!("lock:{}", name))
}

pub fn reservation(quote_id: &str) -> String {
    namespaced(&format!("reservation:{}", quote_id))
}

pub fn velocity(minute: u64) -> String {
    namespaced(&format!("velocity:{}", minute))
}

pub fn stats() -> String {
    namespaced("stats")
}

pub fn leaderboard() -> String {
    namespaced("leaderboard")
}

pub fn audit_log() -> String {
    namespaced("audit:log")
}

pub fn burn_proofs() -> String {
    namespaced("burns:recent")
}

pub fn treasury_events() -> String {
    namespaced("treasury:events")
}

pub fn cache(kind: &str, rest: &str) -> String {
    namespaced(&format!("cache:{}:{}", kind, rest))
}

pub fn day_wallets(day: &str) -> String {
    namespaced(&format!("wallets:{}", day))
}
