//! Owner check-in advisory
//!
//! Pure logic — no I/O, no network. Evaluates how much of the check-in
//! interval has elapsed and recommends action; the caller (daemon, UI)
//! decides whether to nag. Release decisions belong to guardians, never
//! to this module.
//!
//! ```text
//! |--- Healthy ---|--- CheckinRecommended ---|--- CheckinRequired ---|--- Overdue
//! 0%             50%                        90%                    100%
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::switch::{Switch, SwitchStatus};

/// Advisory thresholds as fractions of the interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    /// Elapsed fraction after which a check-in is recommended. Default 0.5.
    pub recommend_threshold: f64,
    /// Elapsed fraction after which a check-in is urgent. Default 0.9.
    pub critical_threshold: f64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            recommend_threshold: 0.5,
            critical_threshold: 0.9,
        }
    }
}

impl AdvisoryConfig {
    pub fn validate(&self) -> Result<(), AdvisoryError> {
        if self.recommend_threshold <= 0.0 || self.recommend_threshold >= 1.0 {
            return Err(AdvisoryError::InvalidThreshold(
                "recommend_threshold must be in (0, 1)".into(),
            ));
        }
        if self.critical_threshold <= self.recommend_threshold || self.critical_threshold >= 1.0 {
            return Err(AdvisoryError::InvalidThreshold(
                "critical_threshold must be between recommend_threshold and 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum AdvisoryError {
    #[error("invalid threshold: {0}")]
    InvalidThreshold(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Advisory {
    /// Far from the deadline, or paused.
    Healthy,
    /// Past the recommend threshold.
    CheckinRecommended,
    /// Past the critical threshold.
    CheckinRequired,
    /// Deadline passed — guardians may begin releasing after grace.
    Overdue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryStatus {
    pub switch_id: String,
    pub elapsed_fraction: f64,
    pub advisory: Advisory,
}

/// Evaluate the advisory for one switch at time `now`.
pub fn evaluate_advisory(switch: &Switch, now: u64) -> AdvisoryStatus {
    let elapsed = now.saturating_sub(switch.last_checkin);
    let elapsed_fraction = elapsed as f64 / switch.interval_secs as f64;

    let advisory = match switch.status {
        SwitchStatus::Paused
        | SwitchStatus::Cancelled
        | SwitchStatus::Released => Advisory::Healthy,
        SwitchStatus::Triggered => Advisory::Overdue,
        SwitchStatus::Armed => {
            let config = AdvisoryConfig::default();
            classify(elapsed_fraction, &config)
        }
    };

    AdvisoryStatus {
        switch_id: switch.id.to_string(),
        elapsed_fraction,
        advisory,
    }
}

/// Same, with explicit thresholds.
pub fn evaluate_advisory_with(
    switch: &Switch,
    now: u64,
    config: &AdvisoryConfig,
) -> AdvisoryStatus {
    let mut status = evaluate_advisory(switch, now);
    if switch.status == SwitchStatus::Armed {
        status.advisory = classify(status.elapsed_fraction, config);
    }
    status
}

fn classify(elapsed_fraction: f64, config: &AdvisoryConfig) -> Advisory {
    if elapsed_fraction >= 1.0 {
        Advisory::Overdue
    } else if elapsed_fraction >= config.critical_threshold {
        Advisory::CheckinRequired
    } else if elapsed_fraction >= config.recommend_threshold {
        Advisory::CheckinRecommended
    } else {
        Advisory::Healthy
    }
}

/// Batch evaluation, most urgent first.
pub fn evaluate_batch(switches: &[Switch], now: u64, config: &AdvisoryConfig) -> Vec<AdvisoryStatus> {
    let mut statuses: Vec<AdvisoryStatus> = switches
        .iter()
        .map(|s| evaluate_advisory_with(s, now, config))
        .collect();

    statuses.sort_by(|a, b| {
        let rank = |advisory: &Advisory| -> u8 {
            match advisory {
                Advisory::Overdue => 0,
                Advisory::CheckinRequired => 1,
                Advisory::CheckinRecommended => 2,
                Advisory::Healthy => 3,
            }
        };
        rank(&a.advisory).cmp(&rank(&b.advisory)).then(
            b.elapsed_fraction
                .partial_cmp(&a.elapsed_fraction)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });

    statuses
}
