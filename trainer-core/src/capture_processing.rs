//! # Capture Processing Module
//!
//! Combines the per-tick pitch estimates collected during one capture into
//! the single pitch reported for that capture.

use crate::config::PitchAggregation;

/// Processes the estimates of one capture with the given strategy.
///
/// # Returns
/// * `Some(pitch)` - Aggregated pitch in Hz
/// * `None` - No valid estimate was collected
pub fn process(estimates: &[f64], operation: PitchAggregation) -> Option<f64> {
    let valid: Vec<f64> = estimates
        .iter()
        .copied()
        .filter(|f| f.is_finite() && *f > 0.0)
        .collect();
    if valid.is_empty() {
        return None;
    }

    let pitch = match operation {
        PitchAggregation::Mean => process_mean(&valid),
        PitchAggregation::Median => process_median(valid),
    };
    tracing::debug!(?operation, samples = estimates.len(), pitch, "capture processed");
    Some(pitch)
}

fn process_mean(estimates: &[f64]) -> f64 {
    estimates.iter().sum::<f64>() / estimates.len() as f64
}

fn process_median(mut estimates: Vec<f64>) -> f64 {
    estimates.sort_by(|a, b| a.total_cmp(b));
    let mid = estimates.len() / 2;
    if estimates.len() % 2 == 0 {
        (estimates[mid - 1] + estimates[mid]) / 2.0
    } else {
        estimates[mid]
    }
}
