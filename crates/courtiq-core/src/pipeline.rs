// Batch pipeline: join, compute, impute, rank.
//
// Per-player failures are recorded and the batch continues. Only a
// cancellation or an empty scored population aborts a run.

use crate::config::Config;
use crate::data::{PlayerBundle, SeasonData};
use crate::metrics::{MetricId, CATALOG};
use crate::model::{PlayerId, PlayerRecord, RawValue};
use crate::scoring::composite::{score_players, weighted_sum, CompositeResult, ScoringParams, WeightTable};
use crate::scoring::fallback::{catalog_defaults, FallbackTable};
use crate::scoring::percentile::{PercentileRow, PercentileTable};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Which players enter the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationFilter {
    /// Explicit list; `None` means every player in the totals table.
    pub players: Option<Vec<PlayerId>>,
    pub min_games: u32,
    pub min_minutes: f64,
}

impl PopulationFilter {
    fn qualifies(&self, games: u32, minutes: f64) -> bool {
        games >= self.min_games && minutes >= self.min_minutes
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub weights: WeightTable,
    pub params: ScoringParams,
    pub fallback_defaults: BTreeMap<MetricId, f64>,
    pub filter: PopulationFilter,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            weights: WeightTable::canonical(),
            params: ScoringParams::default(),
            fallback_defaults: catalog_defaults(),
            filter: PopulationFilter::default(),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        let population = &config.population;
        PipelineOptions {
            weights: config.weights.clone(),
            params: config.scoring,
            fallback_defaults: config.fallback_defaults.clone(),
            filter: PopulationFilter {
                players: (!population.players.is_empty()).then(|| population.players.clone()),
                min_games: population.min_games,
                min_minutes: population.min_minutes,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerFailure {
    pub player_id: PlayerId,
    pub reason: String,
}

/// Per-metric value provenance across the scored players.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricAvailability {
    pub metric: MetricId,
    pub measured: usize,
    pub imputed: usize,
    pub missing: usize,
}

impl MetricAvailability {
    fn total(&self) -> usize {
        self.measured + self.imputed + self.missing
    }

    fn pct(&self, count: usize) -> f64 {
        match self.total() {
            0 => 0.0,
            total => count as f64 / total as f64 * 100.0,
        }
    }

    pub fn measured_pct(&self) -> f64 {
        self.pct(self.measured)
    }

    pub fn imputed_pct(&self) -> f64 {
        self.pct(self.imputed)
    }

    pub fn missing_pct(&self) -> f64 {
        self.pct(self.missing)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Totals rows dropped at load time (no usable id or name, duplicate id).
    pub skipped_rows: usize,
    pub processed: usize,
    pub failed: usize,
    pub unqualified: usize,
    pub availability: Vec<MetricAvailability>,
}

/// Everything a run produces. `records` and `percentiles` are aligned and in
/// input order; `rankings` is sorted by rank.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub records: Vec<PlayerRecord>,
    pub percentiles: Vec<PercentileRow>,
    pub rankings: Vec<CompositeResult>,
    pub failures: Vec<PlayerFailure>,
    pub summary: RunSummary,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("run cancelled after {processed} players")]
    Cancelled { processed: usize },

    #[error("no players qualified for scoring")]
    EmptyPopulation,
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

pub fn run(data: &SeasonData, options: &PipelineOptions) -> Result<RunOutput, PipelineError> {
    run_with_cancel(data, options, || false)
}

/// Run the pipeline, checking `should_stop` before each player.
pub fn run_with_cancel(
    data: &SeasonData,
    options: &PipelineOptions,
    should_stop: impl Fn() -> bool,
) -> Result<RunOutput, PipelineError> {
    log_weights(&options.weights);

    let candidates: Vec<PlayerId> = match &options.filter.players {
        Some(ids) => dedup_requested(ids),
        None => data.players().iter().map(|p| p.id).collect(),
    };
    info!(
        season = %data.season(),
        candidates = candidates.len(),
        "starting run"
    );

    let mut records = Vec::with_capacity(candidates.len());
    let mut failures = Vec::new();
    let mut unqualified = 0;

    for player_id in candidates {
        if should_stop() {
            warn!(processed = records.len(), "run cancelled");
            return Err(PipelineError::Cancelled {
                processed: records.len(),
            });
        }

        let bundle = match data.bundle(player_id) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(player_id, "skipping player: {}", e);
                failures.push(PlayerFailure {
                    player_id,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !options
            .filter
            .qualifies(bundle.player.games, bundle.player.minutes)
        {
            debug!(
                player_id,
                player = bundle.player.name.as_str(),
                games = bundle.player.games,
                minutes = bundle.player.minutes,
                "below qualification minimums"
            );
            unqualified += 1;
            continue;
        }

        records.push(compute_record(&bundle));
    }

    if records.is_empty() {
        return Err(PipelineError::EmptyPopulation);
    }

    let baselines = FallbackTable::build(&records, &options.fallback_defaults);
    for record in &mut records {
        baselines.resolve(record);
        if !record.imputed.is_empty() {
            debug!(
                player_id = record.identity.id,
                player = record.identity.name.as_str(),
                "imputed: {}",
                join_names(&record.imputed)
            );
        }
    }

    let percentiles = PercentileTable::build(&records);
    let entries: Vec<_> = records
        .iter()
        .zip(percentiles.rows())
        .map(|(record, row)| {
            let neutral = row.neutral_filled();
            if !neutral.is_empty() {
                debug!(
                    player_id = record.identity.id,
                    "neutral percentile for: {}",
                    join_names(&neutral)
                );
            }
            let raw = weighted_sum(&row.resolved_vector(), &options.weights);
            (record.identity.clone(), raw)
        })
        .collect();
    let rankings = score_players(entries, &options.params);

    let summary = RunSummary {
        skipped_rows: data.skipped_rows(),
        processed: records.len(),
        failed: failures.len(),
        unqualified,
        availability: availability(&records),
    };
    log_summary(&summary);

    Ok(RunOutput {
        records,
        percentiles: percentiles.rows().to_vec(),
        rankings,
        failures,
        summary,
    })
}

/// Requested ids in order, each kept once.
fn dedup_requested(ids: &[PlayerId]) -> Vec<PlayerId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .copied()
        .filter(|&player_id| {
            let first = seen.insert(player_id);
            if !first {
                warn!(player_id, "duplicate player id in requested list, keeping first");
            }
            first
        })
        .collect()
}

/// Run every catalog calculator against one bundle. Calculator errors are
/// logged and treated as missing.
pub fn compute_record(bundle: &PlayerBundle<'_>) -> PlayerRecord {
    let mut record = PlayerRecord::new(bundle.identity());
    for spec in &CATALOG {
        let value = match (spec.compute)(bundle) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    player_id = bundle.player.id,
                    player = bundle.player.name.as_str(),
                    metric = spec.id.name(),
                    "calculation failed, treating as missing: {}",
                    e
                );
                RawValue::Missing
            }
        };
        record.values.insert(spec.id, value);
    }
    record
}

fn availability(records: &[PlayerRecord]) -> Vec<MetricAvailability> {
    MetricId::ALL
        .into_iter()
        .map(|metric| {
            let mut a = MetricAvailability {
                metric,
                measured: 0,
                imputed: 0,
                missing: 0,
            };
            for record in records {
                match record.value(metric) {
                    RawValue::Measured(_) | RawValue::Infinite => a.measured += 1,
                    RawValue::Imputed(_) => a.imputed += 1,
                    RawValue::Missing => a.missing += 1,
                }
            }
            a
        })
        .collect()
}

fn join_names(metrics: &[MetricId]) -> String {
    metrics
        .iter()
        .map(|m| m.name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn log_weights(weights: &WeightTable) {
    info!("composite weights (total {:.3}):", weights.total());
    for (metric, pct) in weights.breakdown() {
        info!("  {:<28} {:>5.1}%", metric.name(), pct);
    }
}

fn log_summary(summary: &RunSummary) {
    info!(
        skipped_rows = summary.skipped_rows,
        processed = summary.processed,
        failed = summary.failed,
        unqualified = summary.unqualified,
        "run complete"
    );
    for a in &summary.availability {
        info!(
            "  {:<28} measured {:>5.1}%  imputed {:>5.1}%  missing {:>5.1}%",
            a.metric.name(),
            a.measured_pct(),
            a.imputed_pct(),
            a.missing_pct()
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
