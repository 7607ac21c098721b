// Percentile engine: strict-inequality rank percentiles against a league or
// position-cohort population.
//
// A value is only credited for population members it strictly beats, so the
// population maximum never reaches 100 and the minimum scores exactly 0.

use crate::metrics::{Direction, MetricId, Scope, CATALOG};
use crate::model::{PlayerRecord, Position};
use std::collections::{BTreeMap, HashMap};

/// A cohort needs at least this many observations to be used as the
/// reference population.
pub const MIN_COHORT_OBSERVATIONS: usize = 2;

/// Percentile standing in for "no information".
pub const NEUTRAL_PERCENTILE: f64 = 50.0;

/// Share of `population` strictly worse than `value`, scaled to [0, 100].
/// `None` for an empty population.
pub fn percentile(population: &[f64], value: f64, direction: Direction) -> Option<f64> {
    if population.is_empty() {
        return None;
    }
    let beaten = population
        .iter()
        .filter(|&&p| match direction {
            Direction::HigherIsBetter => p < value,
            Direction::LowerIsBetter => p > value,
        })
        .count();
    Some(beaten as f64 / population.len() as f64 * 100.0)
}

// ---------------------------------------------------------------------------
// Populations
// ---------------------------------------------------------------------------

/// Observed values for one metric, league-wide and per cohort. Imputed values
/// never join a population.
#[derive(Debug, Clone, Default)]
pub struct Population {
    league: Vec<f64>,
    cohorts: HashMap<String, Vec<f64>>,
}

impl Population {
    pub fn build(metric: MetricId, records: &[PlayerRecord]) -> Self {
        let mut population = Population::default();
        for record in records {
            let value = record.value(metric);
            if !value.is_observed() {
                continue;
            }
            let Some(v) = value.comparable() else {
                continue;
            };
            population.league.push(v);
            if let Some(key) = record.identity.position.cohort_key() {
                population.cohorts.entry(key).or_default().push(v);
            }
        }
        population
    }

    pub fn league(&self) -> &[f64] {
        &self.league
    }

    /// Reference values for one player. Cohort scope falls back to the league
    /// for unknown positions and undersized cohorts.
    pub fn reference_for(&self, scope: Scope, position: &Position) -> &[f64] {
        if scope == Scope::PositionCohort {
            if let Some(cohort) = position
                .cohort_key()
                .and_then(|key| self.cohorts.get(&key))
            {
                if cohort.len() >= MIN_COHORT_OBSERVATIONS {
                    return cohort;
                }
            }
        }
        &self.league
    }
}

// ---------------------------------------------------------------------------
// Percentile table
// ---------------------------------------------------------------------------

/// One player's percentiles. `None` marks a metric with no usable value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PercentileRow {
    values: BTreeMap<MetricId, Option<f64>>,
}

impl PercentileRow {
    pub fn get(&self, metric: MetricId) -> Option<f64> {
        self.values.get(&metric).copied().flatten()
    }

    /// Percentile with missing entries read as neutral.
    pub fn resolved(&self, metric: MetricId) -> f64 {
        self.get(metric).unwrap_or(NEUTRAL_PERCENTILE)
    }

    /// Every catalog metric with missing entries neutral-filled.
    pub fn resolved_vector(&self) -> BTreeMap<MetricId, f64> {
        MetricId::ALL
            .into_iter()
            .map(|m| (m, self.resolved(m)))
            .collect()
    }

    /// Metrics that will be neutral-filled.
    pub fn neutral_filled(&self) -> Vec<MetricId> {
        MetricId::ALL
            .into_iter()
            .filter(|m| self.get(*m).is_none())
            .collect()
    }
}

/// Percentiles for every player, aligned with the input records.
#[derive(Debug, Clone, Default)]
pub struct PercentileTable {
    rows: Vec<PercentileRow>,
}

impl PercentileTable {
    pub fn build(records: &[PlayerRecord]) -> Self {
        let mut rows = vec![PercentileRow::default(); records.len()];
        for spec in &CATALOG {
            let population = Population::build(spec.id, records);
            for (record, row) in records.iter().zip(rows.iter_mut()) {
                let pct = record.value(spec.id).comparable().and_then(|v| {
                    let reference = population.reference_for(spec.scope, &record.identity.position);
                    percentile(reference, v, spec.direction)
                });
                row.values.insert(spec.id, pct);
            }
        }
        PercentileTable { rows }
    }

    pub fn rows(&self) -> &[PercentileRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PlayerIdentity, RawValue, Slot, EFFECTIVELY_INFINITE};
    use proptest::prelude::*;

    fn record(id: u32, position: Position, metric: MetricId, value: RawValue) -> PlayerRecord {
        let mut r = PlayerRecord::new(PlayerIdentity {
            id,
            name: format!("Player {id}"),
            team: "MIA".into(),
            position,
            games: 60,
            minutes: 28.0,
        });
        r.values.insert(metric, value);
        r
    }

    #[test]
    fn ast_tov_example() {
        let pop = [0.5, 2.0, 5.0];
        let pcts: Vec<f64> = pop
            .iter()
            .map(|v| percentile(&pop, *v, Direction::HigherIsBetter).unwrap())
            .collect();
        assert_eq!(pcts[0], 0.0);
        assert!((pcts[1] - 100.0 / 3.0).abs() < 1e-9);
        assert!((pcts[2] - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn lower_is_better_counts_values_above() {
        let pop = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&pop, 1.0, Direction::LowerIsBetter), Some(75.0));
        assert_eq!(percentile(&pop, 4.0, Direction::LowerIsBetter), Some(0.0));
    }

    #[test]
    fn empty_population_has_no_percentile() {
        assert_eq!(percentile(&[], 1.0, Direction::HigherIsBetter), None);
    }

    #[test]
    fn infinite_ratio_ranks_above_everyone() {
        let records = vec![
            record(1, Position::Unknown, MetricId::AstTovRatio, RawValue::Measured(1.0)),
            record(2, Position::Unknown, MetricId::AstTovRatio, RawValue::Measured(4.0)),
            record(3, Position::Unknown, MetricId::AstTovRatio, RawValue::Infinite),
        ];
        let population = Population::build(MetricId::AstTovRatio, &records);
        assert_eq!(population.league(), &[1.0, 4.0, EFFECTIVELY_INFINITE]);

        let table = PercentileTable::build(&records);
        let p = table.rows()[2].get(MetricId::AstTovRatio).unwrap();
        assert!((p - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn imputed_values_are_scored_but_not_counted() {
        let records = vec![
            record(1, Position::Unknown, MetricId::EfgPct, RawValue::Measured(0.50)),
            record(2, Position::Unknown, MetricId::EfgPct, RawValue::Measured(0.60)),
            record(3, Position::Unknown, MetricId::EfgPct, RawValue::Imputed(0.55)),
        ];
        assert_eq!(Population::build(MetricId::EfgPct, &records).league().len(), 2);

        let table = PercentileTable::build(&records);
        assert_eq!(table.rows()[2].get(MetricId::EfgPct), Some(50.0));
    }

    #[test]
    fn cohort_scope_with_league_fallback() {
        let pg = Position::Single(Slot::PG);
        let c = Position::Single(Slot::C);
        let m = MetricId::ScreenAssistsPer36;
        let records = vec![
            record(1, pg, m, RawValue::Measured(0.2)),
            record(2, pg, m, RawValue::Measured(0.8)),
            record(3, c, m, RawValue::Measured(4.0)),
            record(4, Position::Unknown, m, RawValue::Measured(1.0)),
        ];
        let table = PercentileTable::build(&records);

        // PG cohort [0.2, 0.8]
        assert_eq!(table.rows()[1].get(m), Some(50.0));
        // Lone center: league [0.2, 0.8, 4.0, 1.0]
        assert_eq!(table.rows()[2].get(m), Some(75.0));
        // Unknown position: league
        assert_eq!(table.rows()[3].get(m), Some(50.0));
    }

    #[test]
    fn missing_values_are_neutral_filled() {
        let records = vec![record(1, Position::Unknown, MetricId::EfgPct, RawValue::Missing)];
        let table = PercentileTable::build(&records);
        let row = &table.rows()[0];
        assert_eq!(row.get(MetricId::EfgPct), None);
        assert_eq!(row.resolved(MetricId::EfgPct), NEUTRAL_PERCENTILE);
        assert!(row.neutral_filled().contains(&MetricId::EfgPct));
        assert_eq!(row.resolved_vector().len(), MetricId::COUNT);
    }

    proptest! {
        #[test]
        fn percentiles_stay_in_range(pop in prop::collection::vec(-1.0e3f64..1.0e3, 1..50)) {
            for v in &pop {
                for direction in [Direction::HigherIsBetter, Direction::LowerIsBetter] {
                    let p = percentile(&pop, *v, direction).unwrap();
                    prop_assert!((0.0..=100.0).contains(&p));
                }
            }
        }

        #[test]
        fn best_value_never_reaches_100(pop in prop::collection::vec(-1.0e3f64..1.0e3, 1..50)) {
            let max = pop.iter().cloned().fold(f64::MIN, f64::max);
            let min = pop.iter().cloned().fold(f64::MAX, f64::min);
            prop_assert!(percentile(&pop, max, Direction::HigherIsBetter).unwrap() < 100.0);
            prop_assert!(percentile(&pop, min, Direction::LowerIsBetter).unwrap() < 100.0);
            prop_assert!(percentile(&pop, min, Direction::HigherIsBetter).unwrap() == 0.0);
        }
    }
}
