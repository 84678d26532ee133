// Velocity and retention accounting.
//
// Every confirmed submit records the native cost it put on the fee payer
// into the current minute bucket. The burn worker reads the last hour in
// one bulk op and derives the refill thresholds from it: how much native
// coin must stay liquid to keep signing at the observed rate.

use log::trace;
use pyre_common::time::get_current_minute;
use serde::Serialize;
use std::time::Duration;

use crate::{
    config::{
        REFILL_TARGET_MULTIPLIER, VELOCITY_BUCKET_TTL_SECS, VELOCITY_MIN_OBSERVED_MINUTES,
        VELOCITY_WINDOW_MINUTES,
    },
    store::hot::{HotResult, HotStore},
};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct VelocityMetrics {
    pub tx_count: u64,
    pub total_cost: u64,
    pub avg_cost: u64,
    pub tx_per_hour: f64,
    // Non-empty minute buckets inside the window
    pub observed_minutes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefillBuffers {
    pub required: u64,
    pub target: u64,
    pub basis: &'static str,
}

pub struct VelocityTracker {
    hot: HotStore,
}

impl VelocityTracker {
    pub fn new(hot: HotStore) -> Self {
        Self { hot }
    }

    pub async fn record(&self, cost_native: u64) -> HotResult<()> {
        let minute = get_current_minute();
        trace!("velocity sample: minute={} cost={}", minute, cost_native);
        self.hot
            .velocity_record(
                minute,
                cost_native,
                Duration::from_secs(VELOCITY_BUCKET_TTL_SECS),
            )
            .await
    }

    /// Collapse the last hour of minute buckets with a single bulk read.
    pub async fn metrics(&self) -> HotResult<VelocityMetrics> {
        let now = get_current_minute();
        let minutes: Vec<u64> = (0..VELOCITY_WINDOW_MINUTES)
            .map(|back| now.saturating_sub(back))
            .collect();
        let buckets = self.hot.velocity_buckets(&minutes).await?;

        let mut metrics = VelocityMetrics::default();
        for (count, cost) in buckets {
            if count > 0 {
                metrics.observed_minutes += 1;
            }
            metrics.tx_count += count;
            metrics.total_cost += cost;
        }
        if metrics.tx_count > 0 {
            metrics.avg_cost = metrics.total_cost / metrics.tx_count;
        }
        if metrics.observed_minutes > 0 {
            let hours = metrics.observed_minutes as f64 / 60.0;
            metrics.tx_per_hour = metrics.tx_count as f64 / hours;
        }
        Ok(metrics)
    }

    /// Refill thresholds from observed velocity. Below the observation
    /// minimum the hard floor applies verbatim.
    pub fn buffers(metrics: &VelocityMetrics, hours_runway: f64, min_floor: u64) -> RefillBuffers {
        if metrics.observed_minutes < VELOCITY_MIN_OBSERVED_MINUTES {
            return RefillBuffers {
                required: min_floor,
                target: min_floor.saturating_mul(REFILL_TARGET_MULTIPLIER),
                basis: "no data",
            };
        }
        let projected =
            (metrics.tx_per_hour * metrics.avg_cost as f64 * hours_runway).ceil() as u64;
        let required = projected.max(min_floor);
        RefillBuffers {
            required,
            target: required.saturating_mul(REFILL_TARGET_MULTIPLIER),
            basis: "velocity",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_metrics() {
        let tracker = VelocityTracker::new(HotStore::memory());
        for _ in 0..10 {
            tracker.record(5_000).await.unwrap();
        }
        let metrics = tracker.metrics().await.unwrap();
        assert_eq!(metrics.tx_count, 10);
        assert_eq!(metrics.total_cost, 50_000);
        assert_eq!(metrics.avg_cost, 5_000);
        assert_eq!(metrics.observed_minutes, 1);
    }

    #[test]
    fn test_buffers_fall_back_without_data() {
        let metrics = VelocityMetrics {
            tx_count: 3,
            total_cost: 15_000,
            avg_cost: 5_000,
            tx_per_hour: 36.0,
            observed_minutes: 5,
        };
        let buffers = VelocityTracker::buffers(&metrics, 2.0, 100_000);
        assert_eq!(buffers.basis, "no data");
        assert_eq!(buffers.required, 100_000);
        assert_eq!(buffers.target, 10_000_000);
    }

    #[test]
    fn test_buffers_scale_with_velocity() {
        let metrics = VelocityMetrics {
            tx_count: 600,
            total_cost: 3_000_000,
            avg_cost: 5_000,
            tx_per_hour: 600.0,
            observed_minutes: 60,
        };
        let buffers = VelocityTracker::buffers(&metrics, 2.0, 100_000);
        assert_eq!(buffers.basis, "velocity");
        // 600 tx/h * 5000 units * 2 h
        assert_eq!(buffers.required, 6_000_000);
        assert_eq!(buffers.target, 600_000_000);
    }

    #[test]
    fn test_floor_dominates_low_velocity() {
        let metrics = VelocityMetrics {
            tx_count: 10,
            total_cost: 50_000,
            avg_cost: 5_000,
            tx_per_hour: 10.0,
            observed_minutes: 60,
        };
        let buffers = VelocityTracker::buffers(&metrics, 1.0, 10_000_000);
        assert_eq!(buffers.required, 10_000_000);
    }
}
