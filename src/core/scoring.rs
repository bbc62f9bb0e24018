// src/core/scoring.rs

use thiserror::Error;

use crate::core::models::Score;

#[derive(Debug, Error, PartialEq)]
pub enum ScoringError {
    #[error("no test results to aggregate")]
    Empty,
}

/// Unweighted arithmetic mean of sub-test scores. Skipped tests are passed
/// in like any other and pull the mean down with their FAILED score.
pub fn mean_score<I>(scores: I) -> Result<f64, ScoringError>
where
    I: IntoIterator<Item = Score>,
{
    let (sum, count) = scores
        .into_iter()
        .fold((0u32, 0u32), |(sum, count), s| (sum + u32::from(s.value()), count + 1));
    if count == 0 {
        return Err(ScoringError::Empty);
    }
    Ok(f64::from(sum) / f64::from(count))
}

/// Weighted sum of category scores, rounded to one decimal.
///
/// `entries` pairs each enabled category's score (`None` when it never
/// produced one) with its table weight. Weights are renormalized over the
/// enabled set, so a full table that already sums to 1.0 is used as-is.
/// Categories without a score contribute nothing; if none has one the
/// result is 0.
pub fn weighted_score(entries: &[(Option<f64>, f64)]) -> f64 {
    let total_weight: f64 = entries.iter().map(|(_, w)| w).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let sum: f64 = entries
        .iter()
        .filter_map(|(score, weight)| score.map(|s| s * weight / total_weight))
        .sum();
    round1(sum)
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
