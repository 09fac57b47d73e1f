//! Paired two-sample tests built on `statrs` distributions.
//!
//! Differences are always `survey - backcheck`.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// Paired-sample test routines. The engine only sees this trait, so callers
/// may swap in another implementation.
pub trait PairedTests {
    fn ttest(&self, survey: &[f64], backcheck: &[f64], level: f64) -> Result<TTestResult, String>;
    fn signrank(&self, survey: &[f64], backcheck: &[f64]) -> Result<SignRankResult, String>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TTestResult {
    pub n: usize,
    pub mean_survey: f64,
    pub mean_backcheck: f64,
    pub mean_diff: f64,
    pub sd_diff: f64,
    pub std_err: f64,
    pub df: f64,
    /// Absent when every difference is identical (zero standard error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<f64>,
    /// Two-sided, Ha: mean difference != 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    /// Ha: mean difference < 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_lower: Option<f64>,
    /// Ha: mean difference > 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_upper: Option<f64>,
    pub level: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignRankResult {
    pub n: usize,
    pub positive: usize,
    pub negative: usize,
    pub zero: usize,
    pub rank_sum_positive: f64,
    pub rank_sum_negative: f64,
    pub expected: f64,
    /// Tie-corrected variance of the positive rank sum.
    pub variance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Two-sided normal approximation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
}

/// Default implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatrsTests;

impl PairedTests for StatrsTests {
    fn ttest(&self, survey: &[f64], backcheck: &[f64], level: f64) -> Result<TTestResult, String> {
        let diffs = differences(survey, backcheck)?;
        let n = diffs.len();
        if n < 2 {
            return Err(format!("needs at least 2 pairs, got {n}"));
        }

        let nf = n as f64;
        let mean_diff = mean(&diffs);
        let sd_diff = (diffs.iter().map(|d| (d - mean_diff).powi(2)).sum::<f64>() / (nf - 1.0)).sqrt();
        let std_err = sd_diff / nf.sqrt();
        let df = nf - 1.0;

        let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| e.to_string())?;
        let crit = dist.inverse_cdf(1.0 - (1.0 - level) / 2.0);

        let (t, p_value, p_lower, p_upper) = if std_err > 0.0 {
            let t = mean_diff / std_err;
            let lower = dist.cdf(t);
            let two_sided = (2.0 * (1.0 - dist.cdf(t.abs()))).min(1.0);
            (Some(t), Some(two_sided), Some(lower), Some(1.0 - lower))
        } else {
            (None, None, None, None)
        };

        Ok(TTestResult {
            n,
            mean_survey: mean(survey),
            mean_backcheck: mean(backcheck),
            mean_diff,
            sd_diff,
            std_err,
            df,
            t,
            p_value,
            p_lower,
            p_upper,
            level,
            ci_lower: mean_diff - crit * std_err,
            ci_upper: mean_diff + crit * std_err,
        })
    }

    fn signrank(&self, survey: &[f64], backcheck: &[f64]) -> Result<SignRankResult, String> {
        let diffs = differences(survey, backcheck)?;
        if diffs.len() < 2 {
            return Err(format!("needs at least 2 pairs, got {}", diffs.len()));
        }

        let zero = diffs.iter().filter(|d| **d == 0.0).count();
        let nonzero: Vec<f64> = diffs.into_iter().filter(|d| *d != 0.0).collect();
        let n = nonzero.len();
        let nf = n as f64;

        let (ranks, tie_term) = average_ranks(&nonzero);
        let mut rank_sum_positive = 0.0;
        let mut rank_sum_negative = 0.0;
        for (d, r) in nonzero.iter().zip(&ranks) {
            if *d > 0.0 {
                rank_sum_positive += r;
            } else {
                rank_sum_negative += r;
            }
        }

        let expected = nf * (nf + 1.0) / 4.0;
        let variance = nf * (nf + 1.0) * (2.0 * nf + 1.0) / 24.0 - tie_term / 48.0;

        let (z, p_value) = if variance > 0.0 {
            let z = (rank_sum_positive - expected) / variance.sqrt();
            let normal = Normal::new(0.0, 1.0).map_err(|e| e.to_string())?;
            let p = (2.0 * (1.0 - normal.cdf(z.abs()))).min(1.0);
            (Some(z), Some(p))
        } else {
            (None, None)
        };

        Ok(SignRankResult {
            n,
            positive: nonzero.iter().filter(|d| **d > 0.0).count(),
            negative: nonzero.iter().filter(|d| **d < 0.0).count(),
            zero,
            rank_sum_positive,
            rank_sum_negative,
            expected,
            variance,
            z,
            p_value,
        })
    }
}

fn differences(survey: &[f64], backcheck: &[f64]) -> Result<Vec<f64>, String> {
    if survey.len() != backcheck.len() {
        return Err(format!(
            "series lengths differ ({} vs {})",
            survey.len(),
            backcheck.len()
        ));
    }
    Ok(survey.iter().zip(backcheck).map(|(s, b)| s - b).collect())
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Average ranks of `|d|` (1-based) plus the tie correction `Σ (t³ - t)`.
fn average_ranks(diffs: &[f64]) -> (Vec<f64>, f64) {
    let mut order: Vec<usize> = (0..diffs.len()).collect();
    order.sort_by(|&a, &b| diffs[a].abs().total_cmp(&diffs[b].abs()));

    let mut ranks = vec![0.0; diffs.len()];
    let mut tie_term = 0.0;
    let mut start = 0;
    while start < order.len() {
        let value = diffs[order[start]].abs();
        let mut end = start + 1;
        while end < order.len() && diffs[order[end]].abs() == value {
            end += 1;
        }
        // positions start..end share ranks start+1..=end
        let avg = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = avg;
        }
        let t = (end - start) as f64;
        tie_term += t * t * t - t;
        start = end;
    }
    (ranks, tie_term)
}
