// Configuration loading and parsing (courtiq.toml).

use crate::data::{DataPaths, HustleBasis};
use crate::metrics::MetricId;
use crate::model::{PlayerId, Season};
use crate::scoring::composite::{ScoringParams, WeightTable};
use crate::scoring::fallback::catalog_defaults;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "courtiq.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub season: Season,
    pub data_paths: DataPathsConfig,
    pub population: PopulationConfig,
    pub hustle_basis: HustleBasis,
    pub scoring: ScoringParams,
    pub weights: WeightTable,
    /// Catalog hard defaults merged with `[fallback_defaults]` overrides.
    pub fallback_defaults: BTreeMap<MetricId, f64>,
    pub output: OutputConfig,
}

impl Config {
    /// Input locations with relative paths resolved against `base_dir`.
    pub fn resolve_paths(&self, base_dir: &Path) -> DataPaths {
        let p = &self.data_paths;
        DataPaths {
            player_totals: base_dir.join(&p.player_totals),
            player_dir: base_dir.join(&p.player_dir),
            player_file_template: p.player_file_template.clone(),
            hustle: p.hustle.as_ref().map(|h| base_dir.join(h)),
            clutch: p.clutch.as_ref().map(|c| base_dir.join(c)),
            reference: p.reference.iter().map(|r| base_dir.join(r)).collect(),
        }
    }

    pub fn output_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.output.dir)
    }
}

// ---------------------------------------------------------------------------
// courtiq.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire courtiq.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    season: SeasonSection,
    data_paths: DataPathsConfig,
    #[serde(default)]
    population: PopulationConfig,
    #[serde(default)]
    hustle: HustleSection,
    #[serde(default)]
    scoring: ScoringSection,
    weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    fallback_defaults: BTreeMap<String, f64>,
    #[serde(default)]
    output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct SeasonSection {
    label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPathsConfig {
    pub player_totals: String,
    pub player_dir: String,
    #[serde(default = "default_player_file_template")]
    pub player_file_template: String,
    #[serde(default)]
    pub hustle: Option<String>,
    #[serde(default)]
    pub clutch: Option<String>,
    #[serde(default)]
    pub reference: Vec<String>,
}

fn default_player_file_template() -> String {
    "{player_id}_{dataset}.csv".into()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PopulationConfig {
    /// Explicit player list. Empty means every player in the totals table.
    #[serde(default)]
    pub players: Vec<PlayerId>,
    #[serde(default)]
    pub min_games: u32,
    #[serde(default)]
    pub min_minutes: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct HustleSection {
    #[serde(default)]
    basis: HustleBasis,
}

#[derive(Debug, Clone, Deserialize)]
struct ScoringSection {
    #[serde(default = "default_scale")]
    scale: f64,
    #[serde(default = "default_offset")]
    offset: f64,
}

impl Default for ScoringSection {
    fn default() -> Self {
        ScoringSection {
            scale: default_scale(),
            offset: default_offset(),
        }
    }
}

fn default_scale() -> f64 {
    ScoringParams::default().scale
}

fn default_offset() -> f64 {
    ScoringParams::default().offset
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_export_json")]
    pub export_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: default_output_dir(),
            export_json: default_export_json(),
        }
    }
}

fn default_output_dir() -> String {
    "output".into()
}

fn default_export_json() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/courtiq.toml` relative to
/// the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    parse_config(&text).map_err(|e| match e {
        ParseFailure::Toml(source) => ConfigError::ParseError { path, source },
        ParseFailure::Invalid(err) => err,
    })
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(ConfigError),
}

fn parse_config(text: &str) -> Result<Config, ParseFailure> {
    let file: ConfigFile = toml::from_str(text).map_err(ParseFailure::Toml)?;
    assemble(file).map_err(ParseFailure::Invalid)
}

/// Turn the raw file into a validated `Config`.
fn assemble(file: ConfigFile) -> Result<Config, ConfigError> {
    let season: Season = file
        .season
        .label
        .parse()
        .map_err(|e: crate::model::SeasonParseError| invalid("season.label", e.to_string()))?;

    let weights = match file.weights {
        Some(raw) => WeightTable::from_pairs(metric_map("weights", raw)?),
        None => WeightTable::canonical(),
    };

    let mut fallback_defaults = catalog_defaults();
    fallback_defaults.extend(metric_map("fallback_defaults", file.fallback_defaults)?);

    let config = Config {
        season,
        data_paths: file.data_paths,
        population: file.population,
        hustle_basis: file.hustle.basis,
        scoring: ScoringParams {
            scale: file.scoring.scale,
            offset: file.scoring.offset,
        },
        weights,
        fallback_defaults,
        output: file.output,
    };

    validate(&config)?;
    Ok(config)
}

/// Convert a name-keyed TOML table into metric ids.
fn metric_map(
    section: &str,
    raw: BTreeMap<String, f64>,
) -> Result<Vec<(MetricId, f64)>, ConfigError> {
    raw.into_iter()
        .map(|(name, value)| {
            MetricId::from_name(&name)
                .map(|id| (id, value))
                .ok_or_else(|| invalid(format!("{section}.{name}"), "unknown metric"))
        })
        .collect()
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or pass --base-dir",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // Keep the user's edited copy.
            }
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Copy missing defaults into `base_dir/config/`, then load from there.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.data_paths.player_totals.trim().is_empty() {
        return Err(invalid("data_paths.player_totals", "must not be empty"));
    }
    if !config.data_paths.player_file_template.contains("{player_id}") {
        return Err(invalid(
            "data_paths.player_file_template",
            "must contain the {player_id} placeholder",
        ));
    }
    if !config.data_paths.player_file_template.contains("{dataset}") {
        return Err(invalid(
            "data_paths.player_file_template",
            "must contain the {dataset} placeholder",
        ));
    }

    let min_minutes = config.population.min_minutes;
    if !min_minutes.is_finite() || min_minutes < 0.0 {
        return Err(invalid(
            "population.min_minutes",
            format!("must be a finite value >= 0, got {min_minutes}"),
        ));
    }

    let scale = config.scoring.scale;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(invalid("scoring.scale", format!("must be > 0, got {scale}")));
    }
    if !config.scoring.offset.is_finite() {
        return Err(invalid("scoring.offset", "must be finite"));
    }

    for (metric, weight) in config.weights.iter() {
        if !weight.is_finite() || weight < 0.0 {
            return Err(invalid(
                format!("weights.{metric}"),
                format!("must be a finite value >= 0, got {weight}"),
            ));
        }
    }
    let total = config.weights.total();
    if total <= 0.0 {
        return Err(invalid("weights", "total weight must be > 0"));
    }

    for (metric, value) in &config.fallback_defaults {
        if !value.is_finite() {
            return Err(invalid(
                format!("fallback_defaults.{metric}"),
                format!("must be finite, got {value}"),
            ));
        }
    }

    if config.output.dir.trim().is_empty() {
        return Err(invalid("output.dir", "must not be empty"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
