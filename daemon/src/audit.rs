// Anomaly and audit plumbing.
//
// Every quote/submit bumps rolling-window counters keyed by wallet and IP
// and appends an audit entry. Anomaly thresholds are learned: during the
// warm-up period samples accumulate, afterwards a counter crossing
// mean + k*sigma (floored at the configured minimum) emits a WARN audit
// event. No throttling happens here; rate limiting is a surface concern.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use dashmap::DashMap;
use log::warn;
use serde_json::json;

use crate::{
    config::{ANOMALY_MIN_THRESHOLD, ANOMALY_SIGMA, ANOMALY_WARMUP_SAMPLES, ANOMALY_WINDOW_SECS},
    store::hot::HotStore,
    store::cold::ColdStore,
    types::{AuditEntry, AuditSeverity},
};

pub struct AuditLogger {
    hot: HotStore,
    cold: Arc<ColdStore>,
}

impl AuditLogger {
    pub fn new(hot: HotStore, cold: Arc<ColdStore>) -> Self {
        Self { hot, cold }
    }

    // Best-effort on the hot tail, durable through the cold archive
    pub async fn record(&self, entry: AuditEntry) {
        if let Err(error) = self.hot.push_audit(&entry).await {
            warn!("audit entry dropped from hot tail: {}", error);
        }
        self.cold.append_audit(&entry).await;
    }
}

/// Streaming mean/stddev threshold learner over a bounded sample window.
pub struct ThresholdLearner {
    samples: VecDeque<f64>,
    warmup: usize,
    sigma: f64,
    floor: f64,
}

impl ThresholdLearner {
    pub fn new(warmup: usize, sigma: f64, floor: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(warmup * 2),
            warmup,
            sigma,
            floor,
        }
    }

    // Threshold once warmed up, None while still collecting
    pub fn threshold(&self) -> Option<f64> {
        if self.samples.len() < self.warmup {
            return None;
        }
        let n = self.samples.len() as f64;
        let mean = self.samples.iter().sum::<f64>() / n;
        let variance = self
            .samples
            .iter()
            .map(|sample| (sample - mean).powi(2))
            .sum::<f64>()
            / n;
        Some((mean + self.sigma * variance.sqrt()).max(self.floor))
    }

    /// Feed one observation; true when it crosses the learned threshold.
    pub fn observe(&mut self, value: f64) -> bool {
        let crossed = self.threshold().is_some_and(|threshold| value > threshold);
        self.samples.push_back(value);
        if self.samples.len() > self.warmup * 2 {
            self.samples.pop_front();
        }
        crossed
    }
}

pub struct AnomalyDetector {
    hot: HotStore,
    logger: Arc<AuditLogger>,
    learners: DashMap<String, ThresholdLearner>,
}

impl AnomalyDetector {
    pub fn new(hot: HotStore, logger: Arc<AuditLogger>) -> Self {
        Self {
            hot,
            logger,
            learners: DashMap::new(),
        }
    }

    /// Bump the rolling activity counters for this actor and emit a WARN
    /// audit event when one of them crosses its learned threshold.
    pub async fn observe(&self, kind: &str, wallet: Option<&str>, ip: Option<&str>) {
        let window = Duration::from_secs(ANOMALY_WINDOW_SECS);
        let mut crossings: Vec<(String, u64)> = Vec::new();

        for (scope, id) in [("wallet", wallet), ("ip", ip)] {
            let Some(id) = id else { continue };
            let count = match self.hot.anomaly_count(scope, id, kind, window).await {
                Ok(count) => count,
                Err(error) => {
                    warn!("anomaly counter unavailable: {}", error);
                    continue;
                }
            };
            let crossed = self
                .learners
                .entry(format!("{}:{}", scope, kind))
                .or_insert_with(|| {
                    ThresholdLearner::new(
                        ANOMALY_WARMUP_SAMPLES,
                        ANOMALY_SIGMA,
                        ANOMALY_MIN_THRESHOLD,
                    )
                })
                .observe(count as f64);
            if crossed {
                crossings.push((format!("{}:{}", scope, id), count));
            }
        }

        for (actor, count) in crossings {
            self.logger
                .record(
                    AuditEntry::new("anomaly_detected", AuditSeverity::Warn)
                        .with_payload(json!({
                            "actor": actor,
                            "kind": kind,
                            "count": count,
                        })),
                )
                .await;
        }
    }
}
