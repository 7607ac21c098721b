// Composite scorer: weighted percentile sum, standardization and ranking.

use crate::metrics::{MetricId, CANONICAL_WEIGHTS};
use crate::model::PlayerIdentity;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Pool statistics
// ---------------------------------------------------------------------------

/// Mean and standard deviation of the raw weighted sums across the population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolStats {
    pub mean: f64,
    pub stdev: f64,
}

/// Threshold below which standard deviation is treated as zero.
const STDEV_EPSILON: f64 = 1e-9;

/// Compute mean and standard deviation for a slice of values.
///
/// Returns `PoolStats { mean: 0.0, stdev: 0.0 }` for an empty slice.
/// Uses the population standard deviation (N denominator): the scored
/// players are the whole population, not a sample of it.
pub fn compute_pool_stats(values: &[f64]) -> PoolStats {
    if values.is_empty() {
        return PoolStats {
            mean: 0.0,
            stdev: 0.0,
        };
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    PoolStats {
        mean,
        stdev: variance.sqrt(),
    }
}

/// Compute a z-score given a value and pool stats.
///
/// Returns 0.0 if the standard deviation is approximately zero.
pub fn compute_zscore(value: f64, stats: &PoolStats) -> f64 {
    if stats.stdev < STDEV_EPSILON {
        return 0.0;
    }
    (value - stats.mean) / stats.stdev
}

// ---------------------------------------------------------------------------
// Weights and parameters
// ---------------------------------------------------------------------------

/// Metric weights used by the composite. Metrics absent from the table carry
/// no weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    weights: BTreeMap<MetricId, f64>,
}

impl Default for WeightTable {
    fn default() -> Self {
        WeightTable::canonical()
    }
}

impl WeightTable {
    pub fn canonical() -> Self {
        WeightTable::from_pairs(CANONICAL_WEIGHTS)
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (MetricId, f64)>) -> Self {
        WeightTable {
            weights: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, metric: MetricId) -> Option<f64> {
        self.weights.get(&metric).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricId, f64)> + '_ {
        self.weights.iter().map(|(m, w)| (*m, *w))
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Each weight as a percentage of the total, in catalog order.
    pub fn breakdown(&self) -> Vec<(MetricId, f64)> {
        let total = self.total();
        self.iter()
            .map(|(m, w)| {
                let pct = if total > 0.0 { w / total * 100.0 } else { 0.0 };
                (m, pct)
            })
            .collect()
    }
}

/// Standardization target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    pub scale: f64,
    pub offset: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        ScoringParams {
            scale: 15.0,
            offset: 100.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Weighted sum over the metrics present in `percentiles`. A weighted metric
/// without a percentile contributes zero; weights are not renormalized.
pub fn weighted_sum(percentiles: &BTreeMap<MetricId, f64>, weights: &WeightTable) -> f64 {
    weights
        .iter()
        .filter_map(|(metric, weight)| percentiles.get(&metric).map(|p| p * weight))
        .sum()
}

/// `z * scale + offset`. A flat population scores `offset` throughout.
pub fn standardized_score(raw: f64, stats: &PoolStats, params: &ScoringParams) -> f64 {
    compute_zscore(raw, stats) * params.scale + params.offset
}

pub fn standardize(raw: &[f64], params: &ScoringParams) -> Vec<f64> {
    let stats = compute_pool_stats(raw);
    raw.iter()
        .map(|r| standardized_score(*r, &stats, params))
        .collect()
}

/// Indices of `scores` ordered best-first. Equal scores keep input order.
fn descending_order(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

/// Competition ranks ("1224"): equal scores share the best rank and the next
/// distinct score ranks `1 + count strictly better`. Aligned with `scores`.
pub fn competition_ranks(scores: &[f64]) -> Vec<u32> {
    let mut ranks = vec![0u32; scores.len()];
    let mut previous: Option<(f64, u32)> = None;
    for (position, &i) in descending_order(scores).iter().enumerate() {
        let rank = match previous {
            Some((score, rank)) if scores[i] == score => rank,
            _ => position as u32 + 1,
        };
        ranks[i] = rank;
        previous = Some((scores[i], rank));
    }
    ranks
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeResult {
    pub identity: PlayerIdentity,
    pub raw_weighted: f64,
    pub score: f64,
    pub rank: u32,
}

/// Standardize and rank every player. Results come back sorted by rank, ties
/// in input order.
pub fn score_players(
    entries: Vec<(PlayerIdentity, f64)>,
    params: &ScoringParams,
) -> Vec<CompositeResult> {
    let raw: Vec<f64> = entries.iter().map(|(_, r)| *r).collect();
    let scores = standardize(&raw, params);
    let ranks = competition_ranks(&scores);
    let order = descending_order(&scores);

    let mut slots: Vec<Option<(PlayerIdentity, f64)>> = entries.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| {
            slots[i].take().map(|(identity, raw_weighted)| CompositeResult {
                identity,
                raw_weighted,
                score: scores[i],
                rank: ranks[i],
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
