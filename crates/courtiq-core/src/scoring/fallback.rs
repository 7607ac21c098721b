// Fallback resolver: league and cohort averages for missing raw values.

use crate::metrics::{FallbackSource, MetricId, CATALOG};
use crate::model::{PlayerRecord, Position, RawValue};
use std::collections::BTreeMap;
use tracing::debug;

/// Where a baseline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Averaged over this run's finite observations.
    Computed,
    /// Configured constant; the run had no finite observations.
    Default,
}

impl Provenance {
    pub fn label(self) -> &'static str {
        match self {
            Provenance::Computed => "computed",
            Provenance::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub value: f64,
    pub provenance: Provenance,
    pub observations: usize,
}

/// Hard defaults from the metric catalog.
pub fn catalog_defaults() -> BTreeMap<MetricId, f64> {
    CATALOG
        .iter()
        .filter_map(|spec| spec.default_baseline.map(|v| (spec.id, v)))
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Per-run baseline cache. Built once from the full set of loaded players,
/// read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct FallbackTable {
    league: BTreeMap<MetricId, Baseline>,
    cohort: BTreeMap<(MetricId, String), Baseline>,
}

impl FallbackTable {
    /// Average every metric over finite measured values. Infinite ratios and
    /// missing values are ignored.
    pub fn build(records: &[PlayerRecord], defaults: &BTreeMap<MetricId, f64>) -> Self {
        let mut table = FallbackTable::default();

        for spec in &CATALOG {
            let metric = spec.id;
            let observed: Vec<f64> = records
                .iter()
                .filter_map(|r| r.value(metric).observed_finite())
                .collect();

            let league = match mean(&observed) {
                Some(value) => Some(Baseline {
                    value,
                    provenance: Provenance::Computed,
                    observations: observed.len(),
                }),
                None => defaults.get(&metric).map(|&value| Baseline {
                    value,
                    provenance: Provenance::Default,
                    observations: 0,
                }),
            };
            if let Some(baseline) = league {
                debug!(
                    metric = metric.name(),
                    value = baseline.value,
                    provenance = baseline.provenance.label(),
                    observations = baseline.observations,
                    "league baseline"
                );
                table.league.insert(metric, baseline);
            }

            if spec.fallback != FallbackSource::CohortAverage {
                continue;
            }
            let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
            for record in records {
                let Some(key) = record.identity.position.cohort_key() else {
                    continue;
                };
                if let Some(v) = record.value(metric).observed_finite() {
                    groups.entry(key).or_default().push(v);
                }
            }
            for (key, values) in groups {
                if let Some(value) = mean(&values) {
                    table.cohort.insert(
                        (metric, key),
                        Baseline {
                            value,
                            provenance: Provenance::Computed,
                            observations: values.len(),
                        },
                    );
                }
            }
        }

        table
    }

    pub fn league(&self, metric: MetricId) -> Option<Baseline> {
        self.league.get(&metric).copied()
    }

    /// Baseline for one player. Cohort-averaged metrics use the player's
    /// cohort when it has observations, otherwise the league baseline.
    pub fn baseline_for(&self, metric: MetricId, position: &Position) -> Option<Baseline> {
        if metric.spec().fallback == FallbackSource::CohortAverage {
            if let Some(key) = position.cohort_key() {
                if let Some(baseline) = self.cohort.get(&(metric, key)) {
                    return Some(*baseline);
                }
            }
        }
        self.league(metric)
    }

    /// Replace every missing value with its baseline and record the metric in
    /// the player's audit list. Values with no baseline stay missing.
    pub fn resolve(&self, record: &mut PlayerRecord) {
        for metric in MetricId::ALL {
            if !record.value(metric).is_missing() {
                continue;
            }
            let Some(baseline) = self.baseline_for(metric, &record.identity.position) else {
                debug!(
                    player_id = record.identity.id,
                    player = record.identity.name.as_str(),
                    metric = metric.name(),
                    "no baseline, value stays missing"
                );
                continue;
            };
            record.values.insert(metric, RawValue::Imputed(baseline.value));
            record.imputed.push(metric);
            debug!(
                player_id = record.identity.id,
                player = record.identity.name.as_str(),
                metric = metric.name(),
                value = baseline.value,
                provenance = baseline.provenance.label(),
                "imputed"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
