// Metric catalog: one declarative entry per derived statistic.

pub mod calculators;

use crate::data::{DatasetKey, PlayerBundle, TableError};
use crate::model::RawValue;
use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Every metric the pipeline computes. Variant order is catalog order, which
/// is also the column order of every output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricId {
    AstTovRatio,
    ClutchAstTov,
    AstPct,
    EfgPct,
    LateClockEfficiency,
    QuickDecisionEfficiency,
    ShotSelectionValue,
    DeflectionsPer36,
    ScreenAssistsPer36,
    LooseBallsPer36,
    SuccessfulBoxoutsPer36,
    ChargesDrawnPer36,
    ShootingFoulPct,
    PersonalFoulRate,
    Age,
}

impl MetricId {
    pub const COUNT: usize = 15;

    pub const ALL: [MetricId; MetricId::COUNT] = [
        MetricId::AstTovRatio,
        MetricId::ClutchAstTov,
        MetricId::AstPct,
        MetricId::EfgPct,
        MetricId::LateClockEfficiency,
        MetricId::QuickDecisionEfficiency,
        MetricId::ShotSelectionValue,
        MetricId::DeflectionsPer36,
        MetricId::ScreenAssistsPer36,
        MetricId::LooseBallsPer36,
        MetricId::SuccessfulBoxoutsPer36,
        MetricId::ChargesDrawnPer36,
        MetricId::ShootingFoulPct,
        MetricId::PersonalFoulRate,
        MetricId::Age,
    ];

    /// Column name used in config keys and output tables.
    pub fn name(self) -> &'static str {
        match self {
            MetricId::AstTovRatio => "ast_tov_ratio",
            MetricId::ClutchAstTov => "clutch_ast_tov",
            MetricId::AstPct => "ast_pct",
            MetricId::EfgPct => "efg_pct",
            MetricId::LateClockEfficiency => "late_clock_efficiency",
            MetricId::QuickDecisionEfficiency => "quick_decision_efficiency",
            MetricId::ShotSelectionValue => "shot_selection_value",
            MetricId::DeflectionsPer36 => "deflections_per_36",
            MetricId::ScreenAssistsPer36 => "screen_assists_per_36",
            MetricId::LooseBallsPer36 => "loose_balls_per_36",
            MetricId::SuccessfulBoxoutsPer36 => "successful_boxouts_per_36",
            MetricId::ChargesDrawnPer36 => "charges_drawn_per_36",
            MetricId::ShootingFoulPct => "shooting_foul_pct",
            MetricId::PersonalFoulRate => "personal_foul_rate",
            MetricId::Age => "age",
        }
    }

    pub fn from_name(name: &str) -> Option<MetricId> {
        MetricId::ALL.into_iter().find(|m| m.name() == name)
    }

    pub fn spec(self) -> &'static MetricSpec {
        &CATALOG[self as usize]
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Spec attributes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Which population a percentile is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    League,
    PositionCohort,
}

/// Which average fills a missing raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    LeagueAverage,
    CohortAverage,
}

/// Internal calculator failure. Treated like a missing value downstream.
#[derive(Debug, thiserror::Error)]
pub enum CalcError {
    #[error("{dataset}: {source}")]
    Table {
        dataset: &'static str,
        #[source]
        source: TableError,
    },
}

impl CalcError {
    pub(crate) fn in_dataset(key: DatasetKey) -> impl Fn(TableError) -> CalcError {
        move |source| CalcError::Table {
            dataset: key.key(),
            source,
        }
    }
}

pub type Calculator = fn(&PlayerBundle<'_>) -> Result<RawValue, CalcError>;

pub struct MetricSpec {
    pub id: MetricId,
    pub label: &'static str,
    pub direction: Direction,
    pub scope: Scope,
    pub fallback: FallbackSource,
    /// Baseline used when no player in the run has a finite value.
    pub default_baseline: Option<f64>,
    pub compute: Calculator,
}

impl fmt::Debug for MetricSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricSpec")
            .field("id", &self.id)
            .field("direction", &self.direction)
            .field("scope", &self.scope)
            .field("fallback", &self.fallback)
            .field("default_baseline", &self.default_baseline)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

const fn league(
    id: MetricId,
    label: &'static str,
    direction: Direction,
    default_baseline: Option<f64>,
    compute: Calculator,
) -> MetricSpec {
    MetricSpec {
        id,
        label,
        direction,
        scope: Scope::League,
        fallback: FallbackSource::LeagueAverage,
        default_baseline,
        compute,
    }
}

const fn cohort(
    id: MetricId,
    label: &'static str,
    direction: Direction,
    default_baseline: Option<f64>,
    compute: Calculator,
) -> MetricSpec {
    MetricSpec {
        id,
        label,
        direction,
        scope: Scope::PositionCohort,
        fallback: FallbackSource::CohortAverage,
        default_baseline,
        compute,
    }
}

use self::calculators as calc;
use self::Direction::{HigherIsBetter as Higher, LowerIsBetter as Lower};

pub static CATALOG: [MetricSpec; MetricId::COUNT] = [
    league(MetricId::AstTovRatio, "AST/TOV", Higher, None, calc::ast_tov_ratio),
    league(MetricId::ClutchAstTov, "Clutch AST/TOV", Higher, None, calc::clutch_ast_tov),
    league(MetricId::AstPct, "AST%", Higher, None, calc::ast_pct),
    league(MetricId::EfgPct, "eFG%", Higher, None, calc::efg_pct),
    league(
        MetricId::LateClockEfficiency,
        "Late-clock FG%",
        Higher,
        Some(0.403),
        calc::late_clock_efficiency,
    ),
    league(
        MetricId::QuickDecisionEfficiency,
        "Quick-decision FG%",
        Higher,
        Some(0.471),
        calc::quick_decision_efficiency,
    ),
    league(
        MetricId::ShotSelectionValue,
        "Shot selection",
        Higher,
        Some(0.794),
        calc::shot_selection_value,
    ),
    league(MetricId::DeflectionsPer36, "Deflections/36", Higher, Some(2.392), calc::deflections),
    cohort(
        MetricId::ScreenAssistsPer36,
        "Screen assists/36",
        Higher,
        Some(1.094),
        calc::screen_assists,
    ),
    league(MetricId::LooseBallsPer36, "Loose balls/36", Higher, Some(0.702), calc::loose_balls),
    league(MetricId::SuccessfulBoxoutsPer36, "Box-outs/36", Higher, Some(0.462), calc::boxouts),
    league(MetricId::ChargesDrawnPer36, "Charges/36", Higher, Some(0.044), calc::charges_drawn),
    cohort(
        MetricId::ShootingFoulPct,
        "Shooting foul %",
        Lower,
        Some(1.69),
        calc::shooting_foul_pct,
    ),
    league(MetricId::PersonalFoulRate, "PF/36", Lower, None, calc::personal_foul_rate),
    league(MetricId::Age, "Age", Higher, None, calc::age),
];

/// Default composite weights. `age` is reported but carries no weight.
pub const CANONICAL_WEIGHTS: [(MetricId, f64); 14] = [
    (MetricId::AstTovRatio, 0.14),
    (MetricId::ClutchAstTov, 0.05),
    (MetricId::AstPct, 0.12),
    (MetricId::EfgPct, 0.12),
    (MetricId::LateClockEfficiency, 0.08),
    (MetricId::QuickDecisionEfficiency, 0.06),
    (MetricId::ShotSelectionValue, 0.07),
    (MetricId::DeflectionsPer36, 0.08),
    (MetricId::ScreenAssistsPer36, 0.06),
    (MetricId::LooseBallsPer36, 0.02),
    (MetricId::SuccessfulBoxoutsPer36, 0.01),
    (MetricId::ChargesDrawnPer36, 0.03),
    (MetricId::ShootingFoulPct, 0.12),
    (MetricId::PersonalFoulRate, 0.04),
];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
