// Name-keyed reference tables (box-score aggregations keyed by player name
// rather than id) and the ordered name-matching strategies used to join them.

use serde::Deserialize;
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use super::loader::LoadError;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One reference row. Every field is optional because the reference files
/// each carry a different subset of columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceRow {
    pub name: String,
    pub games: Option<f64>,
    pub position: Option<String>,
    pub age: Option<f64>,
    pub personal_fouls_per_36: Option<f64>,
    pub ast_pct: Option<f64>,
    pub shooting_fouls: Option<f64>,
}

/// Numeric fields a calculator can request from the reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceField {
    Age,
    PersonalFoulsPer36,
    AssistPct,
    ShootingFouls,
}

impl ReferenceField {
    fn read(self, row: &ReferenceRow) -> Option<f64> {
        match self {
            ReferenceField::Age => row.age,
            ReferenceField::PersonalFoulsPer36 => row.personal_fouls_per_36,
            ReferenceField::AssistPct => row.ast_pct,
            ReferenceField::ShootingFouls => row.shooting_fouls,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawReferenceRow {
    #[serde(rename = "Player")]
    player: String,
    #[serde(rename = "G", default, deserialize_with = "csv::invalid_option")]
    games: Option<f64>,
    #[serde(rename = "Pos", default)]
    position: Option<String>,
    #[serde(rename = "Age", default, deserialize_with = "csv::invalid_option")]
    age: Option<f64>,
    #[serde(rename = "PF", default, deserialize_with = "csv::invalid_option")]
    personal_fouls: Option<f64>,
    #[serde(rename = "AST%", default, deserialize_with = "csv::invalid_option")]
    ast_pct: Option<f64>,
    #[serde(
        rename = "Shoot",
        alias = "Fouls Committed_Shoot",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    shooting_fouls: Option<f64>,
}

/// Reference sheets repeat their header row every few dozen lines.
fn is_repeated_header(raw: &RawReferenceRow) -> bool {
    raw.player == "Player"
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// All reference rows from every configured reference file, in file order.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    rows: Vec<ReferenceRow>,
}

impl ReferenceTable {
    pub fn new(rows: Vec<ReferenceRow>) -> Self {
        ReferenceTable { rows }
    }

    pub fn rows(&self) -> &[ReferenceRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn merge(&mut self, other: ReferenceTable) {
        self.rows.extend(other.rows);
    }

    pub(crate) fn from_reader<R: Read>(rdr: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(rdr);
        let mut rows = Vec::new();
        for result in reader.deserialize::<RawReferenceRow>() {
            match result {
                Ok(raw) => {
                    if raw.player.is_empty() || is_repeated_header(&raw) {
                        continue;
                    }
                    rows.push(ReferenceRow {
                        name: raw.player,
                        games: finite(raw.games),
                        position: raw.position.filter(|p| !p.is_empty()),
                        age: finite(raw.age),
                        personal_fouls_per_36: finite(raw.personal_fouls),
                        ast_pct: finite(raw.ast_pct),
                        shooting_fouls: finite(raw.shooting_fouls),
                    });
                }
                Err(e) => {
                    warn!("skipping malformed reference row: {}", e);
                }
            }
        }
        Ok(ReferenceTable { rows })
    }

    /// Load one reference CSV file.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let file = std::fs::File::open(path).map_err(|e| LoadError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(file).map_err(|e| LoadError::Csv {
            path: path.display().to_string(),
            source: e,
        })
    }
}

// ---------------------------------------------------------------------------
// Name matching strategies
// ---------------------------------------------------------------------------

/// A strategy for finding a player's rows in a name-keyed reference table.
///
/// Strategies are tried in order by [`CrossReference`]; the first one that
/// yields a usable row wins.
pub trait NameMatcher: fmt::Debug {
    fn name(&self) -> &'static str;

    fn select<'a>(&self, player_name: &str, rows: &'a [ReferenceRow]) -> Vec<&'a ReferenceRow>;
}

/// Byte-for-byte name equality (after trimming).
#[derive(Debug, Default)]
pub struct ExactName;

impl NameMatcher for ExactName {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn select<'a>(&self, player_name: &str, rows: &'a [ReferenceRow]) -> Vec<&'a ReferenceRow> {
        let target = player_name.trim();
        rows.iter().filter(|r| r.name.trim() == target).collect()
    }
}

/// Case-, punctuation- and suffix-insensitive equality
/// (`"Jaren Jackson Jr."` matches `"jaren jackson"`).
#[derive(Debug, Default)]
pub struct NormalizedName;

impl NameMatcher for NormalizedName {
    fn name(&self) -> &'static str {
        "normalized"
    }

    fn select<'a>(&self, player_name: &str, rows: &'a [ReferenceRow]) -> Vec<&'a ReferenceRow> {
        let target = normalize_name(player_name);
        if target.is_empty() {
            return Vec::new();
        }
        rows.iter()
            .filter(|r| normalize_name(&r.name) == target)
            .collect()
    }
}

/// Reference names containing the player's surname. Only matches when the
/// surname identifies exactly one distinct reference name.
#[derive(Debug, Default)]
pub struct SurnameSubstring;

impl NameMatcher for SurnameSubstring {
    fn name(&self) -> &'static str {
        "surname"
    }

    fn select<'a>(&self, player_name: &str, rows: &'a [ReferenceRow]) -> Vec<&'a ReferenceRow> {
        let normalized = normalize_name(player_name);
        let Some(surname) = normalized.split(' ').last().filter(|s| !s.is_empty()) else {
            return Vec::new();
        };

        let hits: Vec<&ReferenceRow> = rows
            .iter()
            .filter(|r| normalize_name(&r.name).contains(surname))
            .collect();

        let first_name = hits.first().map(|r| normalize_name(&r.name));
        let ambiguous = hits
            .iter()
            .any(|r| Some(normalize_name(&r.name)) != first_name);
        if ambiguous {
            debug!(
                player = player_name,
                surname, "surname matches several reference players, ignoring"
            );
            return Vec::new();
        }
        hits
    }
}

const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv"];

/// Lowercase, strip punctuation, drop generational suffixes, collapse spaces.
// TODO: fold Latin diacritics so reference names like "Jokić" match "Jokic".
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c.is_whitespace() || c == '-' {
                Some(' ')
            } else {
                None
            }
        })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|t| !NAME_SUFFIXES.contains(t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The default strategy chain: exact, then normalized, then surname.
pub fn default_matchers() -> Vec<Box<dyn NameMatcher>> {
    vec![
        Box::new(ExactName),
        Box::new(NormalizedName),
        Box::new(SurnameSubstring),
    ]
}

// ---------------------------------------------------------------------------
// Cross reference
// ---------------------------------------------------------------------------

/// A reference table together with its ordered matching strategies.
#[derive(Debug)]
pub struct CrossReference {
    table: ReferenceTable,
    matchers: Vec<Box<dyn NameMatcher>>,
}

impl Default for CrossReference {
    fn default() -> Self {
        CrossReference::new(ReferenceTable::default())
    }
}

impl CrossReference {
    pub fn new(table: ReferenceTable) -> Self {
        CrossReference {
            table,
            matchers: default_matchers(),
        }
    }

    pub fn with_matchers(table: ReferenceTable, matchers: Vec<Box<dyn NameMatcher>>) -> Self {
        CrossReference { table, matchers }
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    /// Walk the strategy chain and return the best row that satisfies
    /// `usable`. Among several usable rows from one strategy (a traded player
    /// listed once per team plus a season total) the row with the most games
    /// wins; earlier rows win ties.
    fn best_row(
        &self,
        player_name: &str,
        usable: impl Fn(&ReferenceRow) -> bool,
    ) -> Option<&ReferenceRow> {
        for matcher in &self.matchers {
            let mut best: Option<&ReferenceRow> = None;
            for row in matcher.select(player_name, self.table.rows()) {
                if !usable(row) {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some(current) => row.games.unwrap_or(0.0) > current.games.unwrap_or(0.0),
                };
                if better {
                    best = Some(row);
                }
            }
            if let Some(row) = best {
                if matcher.name() != "exact" {
                    debug!(
                        player = player_name,
                        matched = row.name.as_str(),
                        strategy = matcher.name(),
                        "reference matched by fallback strategy"
                    );
                }
                return Some(row);
            }
        }
        None
    }

    /// Numeric reference value for a player, or `None` when no strategy finds
    /// a row carrying the field.
    pub fn value(&self, player_name: &str, field: ReferenceField) -> Option<f64> {
        self.best_row(player_name, |r| field.read(r).is_some())
            .and_then(|r| field.read(r))
    }

    /// Listed position label for a player, if any reference row carries one.
    pub fn position(&self, player_name: &str) -> Option<&str> {
        self.best_row(player_name, |r| r.position.is_some())
            .and_then(|r| r.position.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, games: f64) -> ReferenceRow {
        ReferenceRow {
            name: name.into(),
            games: Some(games),
            ..ReferenceRow::default()
        }
    }

    #[test]
    fn reads_shooting_foul_sheet() {
        let csv_data = "\
Player,Team,G,MP,Fouls Committed_Shoot
Jalen Brunson,NYK,65,2279,61
Player,Team,G,MP,Fouls Committed_Shoot
Rudy Gobert,MIN,72,2380,";

        let table = ReferenceTable::from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[0].shooting_fouls, Some(61.0));
        assert_eq!(table.rows()[1].shooting_fouls, None);
        assert_eq!(table.rows()[1].games, Some(72.0));
    }

    #[test]
    fn reads_per36_and_advanced_sheets() {
        let basic = "\
Player,Age,Pos,G,PF
Jalen Brunson,28,PG,65,2.1";
        let advanced = "\
Player,G,AST%
Jalen Brunson,65,36.4";

        let mut table = ReferenceTable::from_reader(basic.as_bytes()).unwrap();
        table.merge(ReferenceTable::from_reader(advanced.as_bytes()).unwrap());

        let xref = CrossReference::new(table);
        assert_eq!(xref.value("Jalen Brunson", ReferenceField::Age), Some(28.0));
        assert_eq!(
            xref.value("Jalen Brunson", ReferenceField::PersonalFoulsPer36),
            Some(2.1)
        );
        assert_eq!(xref.value("Jalen Brunson", ReferenceField::AssistPct), Some(36.4));
        assert_eq!(xref.position("Jalen Brunson"), Some("PG"));
    }

    #[test]
    fn unparseable_cells_become_none() {
        let csv_data = "\
Player,G,Age
Someone,--,twenty";
        let table = ReferenceTable::from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(table.rows()[0].games, None);
        assert_eq!(table.rows()[0].age, None);
    }

    #[test]
    fn normalize_strips_case_punctuation_and_suffixes() {
        assert_eq!(normalize_name("Jaren Jackson Jr."), "jaren jackson");
        assert_eq!(normalize_name("  D'Angelo   Russell "), "dangelo russell");
        assert_eq!(normalize_name("Shai Gilgeous-Alexander"), "shai gilgeous alexander");
        assert_eq!(normalize_name("Gary Trent Jr"), "gary trent");
    }

    #[test]
    fn exact_match_wins_over_other_strategies() {
        let table = ReferenceTable::new(vec![
            ReferenceRow {
                shooting_fouls: Some(40.0),
                ..row("jalen williams", 70.0)
            },
            ReferenceRow {
                shooting_fouls: Some(55.0),
                ..row("Jalen Williams", 69.0)
            },
        ]);
        let xref = CrossReference::new(table);
        assert_eq!(
            xref.value("Jalen Williams", ReferenceField::ShootingFouls),
            Some(55.0)
        );
    }

    #[test]
    fn normalized_match_handles_suffix() {
        let table = ReferenceTable::new(vec![ReferenceRow {
            ast_pct: Some(12.0),
            ..row("Jaren Jackson", 74.0)
        }]);
        let xref = CrossReference::new(table);
        assert_eq!(
            xref.value("Jaren Jackson Jr.", ReferenceField::AssistPct),
            Some(12.0)
        );
    }

    #[test]
    fn surname_match_when_unique() {
        let table = ReferenceTable::new(vec![ReferenceRow {
            shooting_fouls: Some(44.0),
            ..row("Alperen Sengun", 76.0)
        }]);
        let xref = CrossReference::new(table);
        assert_eq!(
            xref.value("A. Sengun", ReferenceField::ShootingFouls),
            Some(44.0)
        );
    }

    #[test]
    fn accented_names_do_not_fold() {
        let table = ReferenceTable::new(vec![ReferenceRow {
            shooting_fouls: Some(30.0),
            ..row("Nikola Jokić", 70.0)
        }]);
        let xref = CrossReference::new(table);
        assert_eq!(xref.value("Nikola Jokic", ReferenceField::ShootingFouls), None);
    }

    #[test]
    fn ambiguous_surname_is_no_match() {
        let table = ReferenceTable::new(vec![
            ReferenceRow {
                shooting_fouls: Some(20.0),
                ..row("Jalen Green", 82.0)
            },
            ReferenceRow {
                shooting_fouls: Some(35.0),
                ..row("Draymond Green", 68.0)
            },
        ]);
        let xref = CrossReference::new(table);
        assert_eq!(xref.value("Josh Green", ReferenceField::ShootingFouls), None);
    }

    #[test]
    fn traded_player_uses_row_with_most_games() {
        let table = ReferenceTable::new(vec![
            ReferenceRow {
                shooting_fouls: Some(10.0),
                ..row("Dennis Schroder", 23.0)
            },
            ReferenceRow {
                shooting_fouls: Some(31.0),
                ..row("Dennis Schroder", 77.0)
            },
            ReferenceRow {
                shooting_fouls: Some(21.0),
                ..row("Dennis Schroder", 54.0)
            },
        ]);
        let xref = CrossReference::new(table);
        assert_eq!(
            xref.value("Dennis Schroder", ReferenceField::ShootingFouls),
            Some(31.0)
        );
    }

    #[test]
    fn field_absent_everywhere_is_none() {
        let table = ReferenceTable::new(vec![row("Jalen Brunson", 65.0)]);
        let xref = CrossReference::new(table);
        assert_eq!(xref.value("Jalen Brunson", ReferenceField::Age), None);
        assert_eq!(xref.position("Jalen Brunson"), None);
    }

    #[test]
    fn custom_matcher_chain() {
        let table = ReferenceTable::new(vec![ReferenceRow {
            age: Some(30.0),
            ..row("Jalen Brunson", 65.0)
        }]);
        let xref = CrossReference::with_matchers(table, vec![Box::new(ExactName)]);
        assert_eq!(xref.value("jalen brunson", ReferenceField::Age), None);
        assert_eq!(xref.value("Jalen Brunson", ReferenceField::Age), Some(30.0));
    }
}
