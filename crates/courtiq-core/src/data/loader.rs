// Source loading and per-player joining.
//
// The primary season-totals table defines the population. Everything else
// (tracking splits, hustle, clutch, reference sheets) is optional: a missing
// file or row becomes an empty table in the player's bundle, never an error.

use crate::data::reference::{CrossReference, ReferenceTable};
use crate::data::table::{Table, TableError};
use crate::model::{PlayerId, PlayerIdentity, Position, Season};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("table error in {path}: {source}")]
    Table { path: String, source: TableError },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("player {player_id} not found in the season totals table")]
    PlayerNotFound { player_id: PlayerId },
}

// ---------------------------------------------------------------------------
// Dataset keys
// ---------------------------------------------------------------------------

/// Named sources joined into a player bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetKey {
    GeneralSplits,
    ClosestDefender,
    ShotClock,
    TouchTime,
    ShotType,
    Hustle,
    Clutch,
}

impl DatasetKey {
    pub const COUNT: usize = 7;

    pub const ALL: [DatasetKey; DatasetKey::COUNT] = [
        DatasetKey::GeneralSplits,
        DatasetKey::ClosestDefender,
        DatasetKey::ShotClock,
        DatasetKey::TouchTime,
        DatasetKey::ShotType,
        DatasetKey::Hustle,
        DatasetKey::Clutch,
    ];

    pub fn key(self) -> &'static str {
        match self {
            DatasetKey::GeneralSplits => "general_splits",
            DatasetKey::ClosestDefender => "closest_defender",
            DatasetKey::ShotClock => "shot_clock",
            DatasetKey::TouchTime => "touch_time",
            DatasetKey::ShotType => "shot_type",
            DatasetKey::Hustle => "hustle_stats",
            DatasetKey::Clutch => "clutch_stats",
        }
    }

    /// File stem for per-player sources; `None` for league-wide tables.
    pub fn file_stem(self) -> Option<&'static str> {
        match self {
            DatasetKey::GeneralSplits => Some("general_splits"),
            DatasetKey::ClosestDefender => Some("ClosestDefenderShooting"),
            DatasetKey::ShotClock => Some("DribbleShooting"),
            DatasetKey::TouchTime => Some("TouchTimeShooting"),
            DatasetKey::ShotType => Some("ShotTypeShooting"),
            DatasetKey::Hustle | DatasetKey::Clutch => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// How the league hustle table expresses its counting stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HustleBasis {
    /// Values are already per 36 minutes.
    #[default]
    Per36,
    /// Season totals with a `MIN` column to normalize against.
    Totals,
}

// ---------------------------------------------------------------------------
// Season totals (primary population table)
// ---------------------------------------------------------------------------

/// One row of the season player-totals table. Box-score cells that are blank
/// or unparseable are `None` and flow through to the calculators as missing.
#[derive(Debug, Clone, PartialEq)]
pub struct TotalsRow {
    pub id: PlayerId,
    pub name: String,
    pub team: String,
    pub listed_position: Option<String>,
    pub games: u32,
    pub minutes: f64,
    pub fgm: Option<f64>,
    pub fga: Option<f64>,
    pub fg3m: Option<f64>,
    pub ast: Option<f64>,
    pub tov: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawTotalsRow {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    PLAYER_ID: Option<PlayerId>,
    #[serde(default)]
    PLAYER_NAME: String,
    #[serde(default)]
    TEAM_ID: String,
    #[serde(default)]
    TEAM_ABBREVIATION: String,
    #[serde(default, alias = "POS")]
    POSITION: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    GP: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    MIN: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    FGM: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    FGA: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    FG3M: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    AST: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    TOV: Option<f64>,
}

/// The totals table after row-level validation.
#[derive(Debug, Clone, Default)]
pub struct PlayerTotals {
    pub players: Vec<TotalsRow>,
    /// Rows dropped for lacking a usable player id or name.
    pub skipped: usize,
}

/// Drops NaN and infinities so they read as missing.
fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

fn load_totals_from_reader<R: Read>(rdr: R) -> Result<PlayerTotals, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(rdr);
    let mut totals = PlayerTotals::default();
    for result in reader.deserialize::<RawTotalsRow>() {
        match result {
            Ok(raw) => {
                let Some(id) = raw.PLAYER_ID.filter(|_| !raw.PLAYER_NAME.is_empty()) else {
                    warn!(
                        "skipping totals row without a usable player id or name ('{}')",
                        raw.PLAYER_NAME
                    );
                    totals.skipped += 1;
                    continue;
                };
                let (games, minutes) = (finite(raw.GP), finite(raw.MIN));
                if games.is_none() || minutes.is_none() {
                    warn!(
                        player_id = id,
                        "'{}' has no usable GP/MIN, counting as zero", raw.PLAYER_NAME
                    );
                }
                let team = if raw.TEAM_ABBREVIATION.is_empty() {
                    raw.TEAM_ID
                } else {
                    raw.TEAM_ABBREVIATION
                };
                totals.players.push(TotalsRow {
                    id,
                    name: raw.PLAYER_NAME,
                    team,
                    listed_position: Some(raw.POSITION).filter(|p| !p.is_empty()),
                    games: games.unwrap_or(0.0).max(0.0).round() as u32,
                    minutes: minutes.unwrap_or(0.0).max(0.0),
                    fgm: finite(raw.FGM),
                    fga: finite(raw.FGA),
                    fg3m: finite(raw.FG3M),
                    ast: finite(raw.AST),
                    tov: finite(raw.TOV),
                });
            }
            Err(e) => {
                warn!("skipping malformed totals row: {}", e);
                totals.skipped += 1;
            }
        }
    }
    Ok(totals)
}

/// Load the season player-totals table.
pub fn load_player_totals(path: &Path) -> Result<PlayerTotals, LoadError> {
    let file = std::fs::File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_totals_from_reader(file).map_err(|e| LoadError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// League-wide tables keyed by player id
// ---------------------------------------------------------------------------

/// A league-wide table (hustle, clutch) indexed by `PLAYER_ID`.
#[derive(Debug, Clone, Default)]
pub struct LeagueTable {
    table: Table,
    index: HashMap<PlayerId, usize>,
}

impl LeagueTable {
    pub fn from_table(table: Table) -> Result<Self, TableError> {
        let mut index = HashMap::new();
        for (i, row) in table.rows().enumerate() {
            let Some(id) = row.number("PLAYER_ID")? else {
                continue;
            };
            let id = id as PlayerId;
            if index.contains_key(&id) {
                warn!("duplicate PLAYER_ID {} in league table, keeping first row", id);
                continue;
            }
            index.insert(id, i);
        }
        Ok(LeagueTable { table, index })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The player's row as a one-row table, or an empty table.
    pub fn row_for(&self, player_id: PlayerId) -> Table {
        match self.index.get(&player_id) {
            Some(&i) => self.table.single_row(i),
            None => Table::empty(),
        }
    }

    /// Load an optional league table. An absent or unreadable file is logged
    /// and yields an empty table.
    pub fn load_optional(path: Option<&Path>, label: &str) -> LeagueTable {
        let Some(path) = path else {
            info!("no {} table configured", label);
            return LeagueTable::default();
        };
        match read_table(path).and_then(|t| {
            LeagueTable::from_table(t).map_err(|e| LoadError::Table {
                path: path.display().to_string(),
                source: e,
            })
        }) {
            Ok(table) => {
                info!("loaded {} {} rows from {}", table.len(), label, path.display());
                table
            }
            Err(e) => {
                warn!("{} table unavailable, treating as absent: {}", label, e);
                LeagueTable::default()
            }
        }
    }
}

fn read_table(path: &Path) -> Result<Table, LoadError> {
    let file = std::fs::File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    Table::from_reader(file).map_err(|e| LoadError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Per-player sources
// ---------------------------------------------------------------------------

/// Where per-player tracking tables come from.
pub trait PlayerTableSource: std::fmt::Debug {
    /// Fetch one per-player table. `Ok(None)` means the source is absent.
    fn player_table(
        &self,
        season: Season,
        player_id: PlayerId,
        key: DatasetKey,
    ) -> Result<Option<Table>, LoadError>;
}

/// Per-player CSV files in a directory, located through a path template with
/// `{season}`, `{player_id}` and `{dataset}` placeholders.
#[derive(Debug, Clone)]
pub struct DirectoryTables {
    root: PathBuf,
    template: String,
}

impl DirectoryTables {
    pub fn new(root: impl Into<PathBuf>, template: impl Into<String>) -> Self {
        DirectoryTables {
            root: root.into(),
            template: template.into(),
        }
    }

    pub fn path_for(&self, season: Season, player_id: PlayerId, stem: &str) -> PathBuf {
        let relative = self
            .template
            .replace("{season}", &season.to_string())
            .replace("{player_id}", &player_id.to_string())
            .replace("{dataset}", stem);
        self.root.join(relative)
    }
}

impl PlayerTableSource for DirectoryTables {
    fn player_table(
        &self,
        season: Season,
        player_id: PlayerId,
        key: DatasetKey,
    ) -> Result<Option<Table>, LoadError> {
        let Some(stem) = key.file_stem() else {
            return Ok(None);
        };
        let path = self.path_for(season, player_id, stem);
        if !path.exists() {
            return Ok(None);
        }
        read_table(&path).map(Some)
    }
}

/// Per-player tables held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTables {
    tables: HashMap<(PlayerId, DatasetKey), Table>,
}

impl InMemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, player_id: PlayerId, key: DatasetKey, table: Table) {
        self.tables.insert((player_id, key), table);
    }
}

impl PlayerTableSource for InMemoryTables {
    fn player_table(
        &self,
        _season: Season,
        player_id: PlayerId,
        key: DatasetKey,
    ) -> Result<Option<Table>, LoadError> {
        Ok(self.tables.get(&(player_id, key)).cloned())
    }
}

// ---------------------------------------------------------------------------
// Data path bundle
// ---------------------------------------------------------------------------

/// Resolved input locations.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPaths {
    pub player_totals: PathBuf,
    pub player_dir: PathBuf,
    pub player_file_template: String,
    pub hustle: Option<PathBuf>,
    pub clutch: Option<PathBuf>,
    pub reference: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// Season snapshot + joiner
// ---------------------------------------------------------------------------

/// Everything loaded for one season. Read-only once built.
#[derive(Debug)]
pub struct SeasonData {
    season: Season,
    players: Vec<TotalsRow>,
    index: HashMap<PlayerId, usize>,
    hustle: LeagueTable,
    clutch: LeagueTable,
    hustle_basis: HustleBasis,
    reference: CrossReference,
    source: Box<dyn PlayerTableSource>,
    skipped_rows: usize,
}

impl SeasonData {
    /// Build a snapshot from already-loaded totals. Duplicate player ids keep
    /// their first row.
    pub fn new(
        season: Season,
        players: Vec<TotalsRow>,
        source: Box<dyn PlayerTableSource>,
    ) -> Result<Self, LoadError> {
        let mut unique = Vec::with_capacity(players.len());
        let mut index = HashMap::new();
        let mut duplicates = 0;
        for player in players {
            if index.contains_key(&player.id) {
                warn!(
                    "duplicate player id {} ('{}') in totals, keeping first row",
                    player.id, player.name
                );
                duplicates += 1;
                continue;
            }
            index.insert(player.id, unique.len());
            unique.push(player);
        }
        if unique.is_empty() {
            return Err(LoadError::Validation(
                "player totals produced zero valid rows".into(),
            ));
        }
        Ok(SeasonData {
            season,
            players: unique,
            index,
            hustle: LeagueTable::default(),
            clutch: LeagueTable::default(),
            hustle_basis: HustleBasis::default(),
            reference: CrossReference::default(),
            source,
            skipped_rows: duplicates,
        })
    }

    /// Record totals rows the loader dropped before this snapshot was built.
    pub fn with_skipped_rows(mut self, skipped: usize) -> Self {
        self.skipped_rows += skipped;
        self
    }

    pub fn with_hustle(mut self, hustle: LeagueTable, basis: HustleBasis) -> Self {
        self.hustle = hustle;
        self.hustle_basis = basis;
        self
    }

    pub fn with_clutch(mut self, clutch: LeagueTable) -> Self {
        self.clutch = clutch;
        self
    }

    pub fn with_reference(mut self, reference: CrossReference) -> Self {
        self.reference = reference;
        self
    }

    /// Load every configured source from disk. Only the totals table is
    /// required.
    pub fn load(paths: &DataPaths, season: Season, hustle_basis: HustleBasis) -> Result<Self, LoadError> {
        let totals = load_player_totals(&paths.player_totals)?;
        info!(
            "loaded {} players from {} ({} rows skipped)",
            totals.players.len(),
            paths.player_totals.display(),
            totals.skipped
        );

        let hustle = LeagueTable::load_optional(paths.hustle.as_deref(), "hustle");
        let clutch = LeagueTable::load_optional(paths.clutch.as_deref(), "clutch");

        let mut reference = ReferenceTable::default();
        for path in &paths.reference {
            match ReferenceTable::load(path) {
                Ok(table) => {
                    info!("loaded {} reference rows from {}", table.rows().len(), path.display());
                    reference.merge(table);
                }
                Err(e) => warn!("reference table unavailable, skipping: {}", e),
            }
        }

        let source = DirectoryTables::new(&paths.player_dir, &paths.player_file_template);
        Ok(SeasonData::new(season, totals.players, Box::new(source))?
            .with_skipped_rows(totals.skipped)
            .with_hustle(hustle, hustle_basis)
            .with_clutch(clutch)
            .with_reference(CrossReference::new(reference)))
    }

    pub fn season(&self) -> Season {
        self.season
    }

    /// Players in input order.
    pub fn players(&self) -> &[TotalsRow] {
        &self.players
    }

    pub fn reference(&self) -> &CrossReference {
        &self.reference
    }

    /// Totals rows left out of the population: unreadable rows plus
    /// duplicate ids.
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Join every source for one player.
    pub fn bundle(&self, player_id: PlayerId) -> Result<PlayerBundle<'_>, LoadError> {
        let &idx = self
            .index
            .get(&player_id)
            .ok_or(LoadError::PlayerNotFound { player_id })?;
        let player = &self.players[idx];

        let tables = DatasetKey::ALL.map(|key| self.table_for(player, key));
        let bundle = PlayerBundle {
            player,
            position: resolve_position(player, &self.reference),
            hustle_basis: self.hustle_basis,
            reference: &self.reference,
            tables,
        };

        let absent = bundle.absent_sources();
        if !absent.is_empty() {
            debug!(
                player_id,
                player = player.name.as_str(),
                "absent sources: {}",
                absent.iter().map(|k| k.key()).collect::<Vec<_>>().join(", ")
            );
        }
        Ok(bundle)
    }

    fn table_for(&self, player: &TotalsRow, key: DatasetKey) -> Table {
        match key {
            DatasetKey::Hustle => self.hustle.row_for(player.id),
            DatasetKey::Clutch => self.clutch.row_for(player.id),
            _ => match self.source.player_table(self.season, player.id, key) {
                Ok(Some(table)) => table,
                Ok(None) => Table::empty(),
                Err(e) => {
                    warn!(
                        player_id = player.id,
                        player = player.name.as_str(),
                        "{} unreadable, treating as absent: {}",
                        key.key(),
                        e
                    );
                    Table::empty()
                }
            },
        }
    }
}

/// Listed position from the totals table, then from the reference sheets.
fn resolve_position(player: &TotalsRow, reference: &CrossReference) -> Position {
    let listed = player
        .listed_position
        .as_deref()
        .map(Position::parse)
        .filter(Position::is_known);
    listed
        .or_else(|| {
            reference
                .position(&player.name)
                .map(Position::parse)
                .filter(Position::is_known)
        })
        .unwrap_or(Position::Unknown)
}

// ---------------------------------------------------------------------------
// Player bundle
// ---------------------------------------------------------------------------

/// Every source joined for one player. Absent sources are empty tables.
#[derive(Debug)]
pub struct PlayerBundle<'a> {
    pub player: &'a TotalsRow,
    pub position: Position,
    pub hustle_basis: HustleBasis,
    pub reference: &'a CrossReference,
    tables: [Table; DatasetKey::COUNT],
}

impl<'a> PlayerBundle<'a> {
    /// A bundle with every source absent; fill it with [`Self::with_table`].
    pub fn new(player: &'a TotalsRow, reference: &'a CrossReference) -> Self {
        PlayerBundle {
            player,
            position: resolve_position(player, reference),
            hustle_basis: HustleBasis::default(),
            reference,
            tables: Default::default(),
        }
    }

    pub fn with_table(mut self, key: DatasetKey, table: Table) -> Self {
        self.tables[key.index()] = table;
        self
    }

    pub fn with_hustle_basis(mut self, basis: HustleBasis) -> Self {
        self.hustle_basis = basis;
        self
    }

    pub fn table(&self, key: DatasetKey) -> &Table {
        &self.tables[key.index()]
    }

    pub fn absent_sources(&self) -> Vec<DatasetKey> {
        DatasetKey::ALL
            .into_iter()
            .filter(|k| self.table(*k).is_empty())
            .collect()
    }

    pub fn identity(&self) -> PlayerIdentity {
        PlayerIdentity {
            id: self.player.id,
            name: self.player.name.clone(),
            team: self.player.team.clone(),
            position: self.position,
            games: self.player.games,
            minutes: self.player.minutes,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
