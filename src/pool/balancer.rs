use std::sync::Arc;
use std::time::Duration;

use crate::foundation::error::{FleetError, FleetResult};
use crate::payload::shard::{BalancedFields, ShardSelector, shard_selectors};
use crate::schedule::stats::PerformanceStats;

/// Mean frame time bounds outside of which the pool is resized.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameTimeThresholds {
    /// Grow when the mean frame time (ms) exceeds this.
    pub too_slow_if_more_than: f64,
    /// Shrink when the mean frame time (ms) is below this.
    pub too_fast_if_less_than: f64,
}

impl Default for FrameTimeThresholds {
    fn default() -> Self {
        Self {
            too_slow_if_more_than: 16.0,
            too_fast_if_less_than: 5.0,
        }
    }
}

/// Pool sizing policy.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BalancerOptions {
    pub min_executors: usize,
    pub max_executors: usize,
    /// Balancing period in milliseconds.
    pub frequency_ms: u64,
    /// Array-valued payload fields partitioned across members.
    pub balanced_fields: Vec<String>,
    pub thresholds: FrameTimeThresholds,
}

impl Default for BalancerOptions {
    fn default() -> Self {
        Self {
            min_executors: 1,
            max_executors: 8,
            frequency_ms: 5000,
            balanced_fields: Vec::new(),
            thresholds: FrameTimeThresholds::default(),
        }
    }
}

impl BalancerOptions {
    pub fn validate(&self) -> FleetResult<()> {
        if self.min_executors == 0 {
            return Err(FleetError::configuration("min_executors must be >= 1"));
        }
        if self.min_executors > self.max_executors {
            return Err(FleetError::configuration(format!(
                "min_executors ({}) must not exceed max_executors ({})",
                self.min_executors, self.max_executors
            )));
        }
        if self.frequency_ms == 0 {
            return Err(FleetError::configuration("frequency_ms must be >= 1"));
        }
        let t = &self.thresholds;
        if t.too_fast_if_less_than > t.too_slow_if_more_than {
            return Err(FleetError::configuration(format!(
                "too_fast_if_less_than ({}) must not exceed too_slow_if_more_than ({})",
                t.too_fast_if_less_than, t.too_slow_if_more_than
            )));
        }
        Ok(())
    }

    pub fn frequency(&self) -> Duration {
        Duration::from_millis(self.frequency_ms)
    }

    pub fn fields(&self) -> BalancedFields {
        Arc::from(self.balanced_fields.clone())
    }
}

/// Outcome of one balancing round.
#[derive(Clone, Debug, PartialEq)]
pub enum BalancerDecision {
    Keep,
    /// Resize to `selectors.len()` members, member `i` taking `selectors[i]`.
    Rebalance { selectors: Vec<ShardSelector> },
}

/// Decide the next pool size from per-member stats.
///
/// Members that have not reported are left out of the mean. The result differs from the current
/// size by at most one and stays within `[min_executors, max_executors]`.
pub fn decide(stats: &[PerformanceStats], options: &BalancerOptions) -> BalancerDecision {
    let current = stats.len();
    let reported: Vec<f64> = stats
        .iter()
        .filter(|s| s.frames_count > 0)
        .map(PerformanceStats::average_frame_time)
        .collect();
    if reported.is_empty() {
        return BalancerDecision::Keep;
    }
    let mean = reported.iter().sum::<f64>() / reported.len() as f64;

    let t = &options.thresholds;
    let target = if mean > t.too_slow_if_more_than && current < options.max_executors {
        current + 1
    } else if mean < t.too_fast_if_less_than && current > options.min_executors {
        current - 1
    } else {
        current
    };

    if target == current {
        BalancerDecision::Keep
    } else {
        tracing::debug!(mean, current, target, "balancer resizes pool");
        BalancerDecision::Rebalance {
            selectors: shard_selectors(target, &options.fields()),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pool/balancer.rs"]
mod tests;
