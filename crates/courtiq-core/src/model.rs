// Player identity, positions, seasons and raw metric values.

use crate::metrics::MetricId;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Stats-provider player identifier.
pub type PlayerId = u32;

/// Comparison stand-in for an "effectively infinite" ratio (e.g. assists with
/// zero turnovers). Large enough to beat every real ratio, small enough to
/// keep arithmetic and ordering well-defined.
pub const EFFECTIVELY_INFINITE: f64 = 1.0e6;

// ---------------------------------------------------------------------------
// Season
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid season label `{0}`: expected YYYY-YY (e.g. 2024-25)")]
pub struct SeasonParseError(pub String);

/// An NBA season label such as `2024-25`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Season {
    start_year: u16,
}

impl Season {
    pub fn start_year(&self) -> u16 {
        self.start_year
    }
}

impl FromStr for Season {
    type Err = SeasonParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = || SeasonParseError(trimmed.to_string());

        let (start, end) = trimmed.split_once('-').ok_or_else(err)?;
        if start.len() != 4 || end.len() != 2 {
            return Err(err());
        }
        let start_year: u16 = start.parse().map_err(|_| err())?;
        let end_suffix: u16 = end.parse().map_err(|_| err())?;
        if (start_year + 1) % 100 != end_suffix {
            return Err(err());
        }
        Ok(Season { start_year })
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.start_year, (self.start_year + 1) % 100)
    }
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// One of the five traditional positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    PG,
    SG,
    SF,
    PF,
    C,
}

impl Slot {
    pub fn label(self) -> &'static str {
        match self {
            Slot::PG => "PG",
            Slot::SG => "SG",
            Slot::SF => "SF",
            Slot::PF => "PF",
            Slot::C => "C",
        }
    }
}

/// A position token before pairing. The provider's long labels ("Guard",
/// "Forward") do not name a single slot until we know what they are paired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Exact(Slot),
    Guard,
    Forward,
}

impl Token {
    fn parse(s: &str) -> Option<Token> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PG" => Some(Token::Exact(Slot::PG)),
            "SG" => Some(Token::Exact(Slot::SG)),
            "SF" => Some(Token::Exact(Slot::SF)),
            "PF" => Some(Token::Exact(Slot::PF)),
            "C" | "CENTER" => Some(Token::Exact(Slot::C)),
            "G" | "GUARD" => Some(Token::Guard),
            "F" | "FORWARD" => Some(Token::Forward),
            _ => None,
        }
    }

    /// Resolve this token to a slot given the other half of a hybrid label.
    fn resolve_against(self, other: Token) -> Slot {
        match self {
            Token::Exact(slot) => slot,
            Token::Guard => Slot::SG,
            Token::Forward => match other {
                Token::Exact(Slot::C) | Token::Exact(Slot::PF) => Slot::PF,
                _ => Slot::SF,
            },
        }
    }
}

/// Listed position. Hybrids keep their listed order (`SG-PG` != `PG-SG`)
/// because the cohort key is the label as listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Position {
    Single(Slot),
    Hybrid(Slot, Slot),
    Unknown,
}

impl Position {
    /// Parse a short (`PG`, `SG-PG`) or long (`Guard`, `Forward-Center`)
    /// position label. Anything unrecognised is `Unknown`.
    pub fn parse(label: &str) -> Position {
        let tokens: Vec<Option<Token>> = label
            .split('-')
            .filter(|t| !t.trim().is_empty())
            .map(Token::parse)
            .collect();

        match tokens.as_slice() {
            [Some(Token::Exact(slot))] => Position::Single(*slot),
            [Some(Token::Guard)] => Position::Hybrid(Slot::PG, Slot::SG),
            [Some(Token::Forward)] => Position::Hybrid(Slot::SF, Slot::PF),
            [Some(a), Some(b), ..] => {
                let first = a.resolve_against(*b);
                let second = b.resolve_against(*a);
                if first == second {
                    Position::Single(first)
                } else {
                    Position::Hybrid(first, second)
                }
            }
            _ => Position::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Position::Unknown)
    }

    /// Cohort key: the canonical label, or `None` for `Unknown`.
    pub fn cohort_key(&self) -> Option<String> {
        self.is_known().then(|| self.to_string())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Single(slot) => f.write_str(slot.label()),
            Position::Hybrid(a, b) => write!(f, "{}-{}", a.label(), b.label()),
            Position::Unknown => f.write_str("Unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw metric values
// ---------------------------------------------------------------------------

/// A raw metric value as produced by a calculator or the fallback resolver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    /// Computed from the player's own data.
    Measured(f64),
    /// Degenerate denominator resolved to "effectively infinite".
    Infinite,
    /// Substituted by the fallback resolver.
    Imputed(f64),
    /// No value, and no baseline to substitute.
    Missing,
}

impl RawValue {
    /// Wrap a computed number; NaN or infinite arithmetic results are Missing.
    pub fn measured(value: f64) -> RawValue {
        if value.is_finite() {
            RawValue::Measured(value)
        } else {
            RawValue::Missing
        }
    }

    /// Value used for percentile comparisons.
    pub fn comparable(self) -> Option<f64> {
        match self {
            RawValue::Measured(v) | RawValue::Imputed(v) => Some(v),
            RawValue::Infinite => Some(EFFECTIVELY_INFINITE),
            RawValue::Missing => None,
        }
    }

    /// Finite value measured from the player's own data, if any.
    pub fn observed_finite(self) -> Option<f64> {
        match self {
            RawValue::Measured(v) => Some(v),
            _ => None,
        }
    }

    /// True for values that came from the player's own data.
    pub fn is_observed(self) -> bool {
        matches!(self, RawValue::Measured(_) | RawValue::Infinite)
    }

    pub fn is_missing(self) -> bool {
        matches!(self, RawValue::Missing)
    }
}

// ---------------------------------------------------------------------------
// Player record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerIdentity {
    pub id: PlayerId,
    pub name: String,
    pub team: String,
    pub position: Position,
    pub games: u32,
    pub minutes: f64,
}

/// A player's identity plus every catalog metric's raw value.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub identity: PlayerIdentity,
    pub values: BTreeMap<MetricId, RawValue>,
    /// Metrics whose value was substituted by the fallback resolver, in
    /// catalog order.
    pub imputed: Vec<MetricId>,
}

impl PlayerRecord {
    pub fn new(identity: PlayerIdentity) -> Self {
        PlayerRecord {
            identity,
            values: BTreeMap::new(),
            imputed: Vec::new(),
        }
    }

    pub fn value(&self, metric: MetricId) -> RawValue {
        self.values.get(&metric).copied().unwrap_or(RawValue::Missing)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
