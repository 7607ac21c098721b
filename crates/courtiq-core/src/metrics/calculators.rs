// Metric calculators. Each is a pure function of a player's bundle.

use super::CalcError;
use crate::data::{DatasetKey, HustleBasis, PlayerBundle, ReferenceField, RowRef};
use crate::model::RawValue;

type CalcResult = Result<RawValue, CalcError>;

/// Clutch ratio scale applied to the regular ratio when a player has no
/// clutch turnovers.
const CLUTCH_NO_TOV_SCALE: f64 = 0.9;

/// Regular ratio assumed for the clutch substitution when the player has no
/// regular-season turnovers either.
const CLUTCH_NO_TOV_BASE_RATIO: f64 = 3.0;

// ---------------------------------------------------------------------------
// Playmaking
// ---------------------------------------------------------------------------

pub fn ast_tov_ratio(b: &PlayerBundle<'_>) -> CalcResult {
    let (Some(ast), Some(tov)) = (b.player.ast, b.player.tov) else {
        return Ok(RawValue::Missing);
    };
    Ok(if tov > 0.0 {
        RawValue::measured(ast / tov)
    } else if ast > 0.0 {
        RawValue::Infinite
    } else {
        RawValue::Missing
    })
}

pub fn clutch_ast_tov(b: &PlayerBundle<'_>) -> CalcResult {
    let err = CalcError::in_dataset(DatasetKey::Clutch);
    let Some(row) = b.table(DatasetKey::Clutch).first() else {
        return Ok(RawValue::Missing);
    };
    let (Some(ast), Some(tov)) = (
        row.number("AST").map_err(&err)?,
        row.number("TOV").map_err(&err)?,
    ) else {
        return Ok(RawValue::Missing);
    };

    if tov > 0.0 {
        return Ok(RawValue::measured(ast / tov));
    }
    // Too few clutch possessions to turn the ball over: scale the regular ratio.
    let regular = match (b.player.ast, b.player.tov) {
        (Some(ast), Some(tov)) if tov > 0.0 => ast / tov,
        _ => CLUTCH_NO_TOV_BASE_RATIO,
    };
    Ok(RawValue::measured(regular * CLUTCH_NO_TOV_SCALE))
}

pub fn ast_pct(b: &PlayerBundle<'_>) -> CalcResult {
    Ok(reference_value(b, ReferenceField::AssistPct))
}

// ---------------------------------------------------------------------------
// Shooting
// ---------------------------------------------------------------------------

pub fn efg_pct(b: &PlayerBundle<'_>) -> CalcResult {
    let p = b.player;
    let (Some(fgm), Some(fga), Some(fg3m)) = (p.fgm, p.fga, p.fg3m) else {
        return Ok(RawValue::Missing);
    };
    if fga <= 0.0 {
        return Ok(RawValue::Missing);
    }
    Ok(RawValue::measured((fgm + 0.5 * fg3m) / fga))
}

/// Frequency-weighted FG% over the two final shot-clock ranges. Both rows
/// must be present with a positive combined frequency.
pub fn late_clock_efficiency(b: &PlayerBundle<'_>) -> CalcResult {
    let table = b.table(DatasetKey::ShotClock);
    let err = CalcError::in_dataset(DatasetKey::ShotClock);

    let late = table.find("SHOT_CLOCK_RANGE", "7-4 Late").map_err(&err)?;
    let very_late = table
        .find("SHOT_CLOCK_RANGE", "4-0 Very Late")
        .map_err(&err)?;
    let (Some(late), Some(very_late)) = (late, very_late) else {
        return Ok(RawValue::Missing);
    };

    let (Some(f1), Some(p1), Some(f2), Some(p2)) = (
        late.number("FGA_FREQUENCY").map_err(&err)?,
        late.number("FG_PCT").map_err(&err)?,
        very_late.number("FGA_FREQUENCY").map_err(&err)?,
        very_late.number("FG_PCT").map_err(&err)?,
    ) else {
        return Ok(RawValue::Missing);
    };

    let combined = f1 + f2;
    if combined <= 0.0 {
        return Ok(RawValue::Missing);
    }
    Ok(RawValue::measured((p1 * f1 + p2 * f2) / combined))
}

pub fn quick_decision_efficiency(b: &PlayerBundle<'_>) -> CalcResult {
    let err = CalcError::in_dataset(DatasetKey::TouchTime);
    let row = b
        .table(DatasetKey::TouchTime)
        .find("TOUCH_TIME_RANGE", "Touch < 2 Seconds")
        .map_err(&err)?;
    match row {
        Some(row) => Ok(row
            .number("FG_PCT")
            .map_err(&err)?
            .map_or(RawValue::Missing, RawValue::measured)),
        None => Ok(RawValue::Missing),
    }
}

/// Frequency-weighted shot value over three shot types: close attempts are
/// worth 2·FG%, catch-and-shoot and pull-ups their eFG%.
pub fn shot_selection_value(b: &PlayerBundle<'_>) -> CalcResult {
    const ZONES: [(&str, &str, f64); 3] = [
        ("Less than 10 ft", "FG_PCT", 2.0),
        ("Catch and Shoot", "EFG_PCT", 1.0),
        ("Pull Ups", "EFG_PCT", 1.0),
    ];

    let table = b.table(DatasetKey::ShotType);
    let err = CalcError::in_dataset(DatasetKey::ShotType);
    let mut total = 0.0;
    for (shot_type, pct_column, points) in ZONES {
        let Some(row) = table.find("SHOT_TYPE", shot_type).map_err(&err)? else {
            return Ok(RawValue::Missing);
        };
        let (Some(freq), Some(pct)) = (
            row.number("FGA_FREQUENCY").map_err(&err)?,
            row.number(pct_column).map_err(&err)?,
        ) else {
            return Ok(RawValue::Missing);
        };
        total += freq * pct * points;
    }
    Ok(RawValue::measured(total))
}

// ---------------------------------------------------------------------------
// Hustle
// ---------------------------------------------------------------------------

fn hustle_stat(b: &PlayerBundle<'_>, column: &str) -> CalcResult {
    let err = CalcError::in_dataset(DatasetKey::Hustle);
    let Some(row) = b.table(DatasetKey::Hustle).first() else {
        return Ok(RawValue::Missing);
    };
    let Some(value) = row.number(column).map_err(&err)? else {
        return Ok(RawValue::Missing);
    };
    match b.hustle_basis {
        HustleBasis::Per36 => Ok(RawValue::measured(value)),
        HustleBasis::Totals => per_36(value, &row).map_err(&err),
    }
}

fn per_36(value: f64, row: &RowRef<'_>) -> Result<RawValue, crate::data::TableError> {
    Ok(match row.number("MIN")? {
        Some(minutes) if minutes > 0.0 => RawValue::measured(value / minutes * 36.0),
        _ => RawValue::Missing,
    })
}

pub fn deflections(b: &PlayerBundle<'_>) -> CalcResult {
    hustle_stat(b, "DEFLECTIONS")
}

pub fn screen_assists(b: &PlayerBundle<'_>) -> CalcResult {
    hustle_stat(b, "SCREEN_ASSISTS")
}

pub fn loose_balls(b: &PlayerBundle<'_>) -> CalcResult {
    hustle_stat(b, "LOOSE_BALLS_RECOVERED")
}

pub fn boxouts(b: &PlayerBundle<'_>) -> CalcResult {
    hustle_stat(b, "BOX_OUT_PLAYER_REBS")
}

pub fn charges_drawn(b: &PlayerBundle<'_>) -> CalcResult {
    hustle_stat(b, "CHARGES_DRAWN")
}

// ---------------------------------------------------------------------------
// Fouls and reference-table metrics
// ---------------------------------------------------------------------------

fn reference_value(b: &PlayerBundle<'_>, field: ReferenceField) -> RawValue {
    b.reference
        .value(&b.player.name, field)
        .map_or(RawValue::Missing, RawValue::measured)
}

/// Shooting fouls per hundred contested shots, where contests are the
/// opponent attempts with this player as closest defender over the season.
pub fn shooting_foul_pct(b: &PlayerBundle<'_>) -> CalcResult {
    let Some(overall) = b.table(DatasetKey::GeneralSplits).first() else {
        return Ok(RawValue::Missing);
    };
    let defended = b.table(DatasetKey::ClosestDefender);
    if defended.is_empty() {
        return Ok(RawValue::Missing);
    }

    let Some(games) = overall
        .number("GP")
        .map_err(CalcError::in_dataset(DatasetKey::GeneralSplits))?
    else {
        return Ok(RawValue::Missing);
    };
    let per_game = defended
        .sum("FGA")
        .map_err(CalcError::in_dataset(DatasetKey::ClosestDefender))?;
    let contests = per_game * games;
    if contests <= 0.0 {
        return Ok(RawValue::Missing);
    }

    let Some(fouls) = b.reference.value(&b.player.name, ReferenceField::ShootingFouls) else {
        return Ok(RawValue::Missing);
    };
    Ok(RawValue::measured(fouls / contests * 100.0))
}

pub fn personal_foul_rate(b: &PlayerBundle<'_>) -> CalcResult {
    Ok(reference_value(b, ReferenceField::PersonalFoulsPer36))
}

pub fn age(b: &PlayerBundle<'_>) -> CalcResult {
    Ok(reference_value(b, ReferenceField::Age))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CrossReference, ReferenceRow, ReferenceTable, Table, TotalsRow};
    use crate::model::EFFECTIVELY_INFINITE;

    fn player(ast: f64, tov: f64) -> TotalsRow {
        TotalsRow {
            id: 1,
            name: "Tyrese Haliburton".into(),
            team: "IND".into(),
            listed_position: Some("PG".into()),
            games: 73,
            minutes: 33.6,
            fgm: Some(6.5),
            fga: Some(13.9),
            fg3m: Some(2.9),
            ast: Some(ast),
            tov: Some(tov),
        }
    }

    fn approx(value: RawValue, expected: f64) {
        match value {
            RawValue::Measured(v) => assert!((v - expected).abs() < 1e-9, "{v} != {expected}"),
            other => panic!("expected Measured({expected}), got {other:?}"),
        }
    }

    #[test]
    fn ast_tov_policies() {
        let reference = CrossReference::default();

        let p = player(9.2, 1.6);
        approx(ast_tov_ratio(&PlayerBundle::new(&p, &reference)).unwrap(), 5.75);

        let p = player(4.0, 0.0);
        let value = ast_tov_ratio(&PlayerBundle::new(&p, &reference)).unwrap();
        assert_eq!(value, RawValue::Infinite);
        assert_eq!(value.comparable(), Some(EFFECTIVELY_INFINITE));

        let p = player(0.0, 0.0);
        assert_eq!(
            ast_tov_ratio(&PlayerBundle::new(&p, &reference)).unwrap(),
            RawValue::Missing
        );
    }

    #[test]
    fn blank_box_score_cells_are_missing() {
        let reference = CrossReference::default();

        let mut p = player(3.7, 0.0);
        p.tov = None;
        assert_eq!(
            ast_tov_ratio(&PlayerBundle::new(&p, &reference)).unwrap(),
            RawValue::Missing
        );
        // eFG% does not depend on turnovers.
        approx(
            efg_pct(&PlayerBundle::new(&p, &reference)).unwrap(),
            (6.5 + 0.5 * 2.9) / 13.9,
        );

        // No regular ratio to scale, so the base ratio applies.
        let clutch = Table::from_rows(&["PLAYER_ID", "AST", "TOV"], &[&["1", "1.0", "0"]]);
        let b = PlayerBundle::new(&p, &reference).with_table(DatasetKey::Clutch, clutch);
        approx(clutch_ast_tov(&b).unwrap(), 2.7);

        let mut p = player(1.0, 1.0);
        p.fg3m = None;
        assert_eq!(
            efg_pct(&PlayerBundle::new(&p, &reference)).unwrap(),
            RawValue::Missing
        );
    }

    #[test]
    fn clutch_ratio_and_zero_turnover_rule() {
        let reference = CrossReference::default();
        let p = player(8.0, 2.0);

        let clutch = Table::from_rows(&["PLAYER_ID", "AST", "TOV"], &[&["1", "1.5", "0.5"]]);
        let b = PlayerBundle::new(&p, &reference).with_table(DatasetKey::Clutch, clutch);
        approx(clutch_ast_tov(&b).unwrap(), 3.0);

        let clutch = Table::from_rows(&["PLAYER_ID", "AST", "TOV"], &[&["1", "1.0", "0"]]);
        let b = PlayerBundle::new(&p, &reference).with_table(DatasetKey::Clutch, clutch);
        approx(clutch_ast_tov(&b).unwrap(), 3.6);

        let p = player(8.0, 0.0);
        let clutch = Table::from_rows(&["PLAYER_ID", "AST", "TOV"], &[&["1", "1.0", "0"]]);
        let b = PlayerBundle::new(&p, &reference).with_table(DatasetKey::Clutch, clutch);
        approx(clutch_ast_tov(&b).unwrap(), 2.7);

        let b = PlayerBundle::new(&p, &reference);
        assert_eq!(clutch_ast_tov(&b).unwrap(), RawValue::Missing);
    }

    #[test]
    fn efg_requires_attempts() {
        let reference = CrossReference::default();
        let p = player(1.0, 1.0);
        approx(
            efg_pct(&PlayerBundle::new(&p, &reference)).unwrap(),
            (6.5 + 0.5 * 2.9) / 13.9,
        );

        let mut p = player(1.0, 1.0);
        p.fga = Some(0.0);
        assert_eq!(
            efg_pct(&PlayerBundle::new(&p, &reference)).unwrap(),
            RawValue::Missing
        );
    }

    fn shot_clock(rows: &[&[&str]]) -> Table {
        Table::from_rows(&["SHOT_CLOCK_RANGE", "FGA_FREQUENCY", "FG_PCT"], rows)
    }

    #[test]
    fn late_clock_weights_by_frequency() {
        let reference = CrossReference::default();
        let p = player(1.0, 1.0);
        let table = shot_clock(&[
            &["24-22", "0.05", "0.60"],
            &["7-4 Late", "0.10", "0.40"],
            &["4-0 Very Late", "0.05", "0.34"],
        ]);
        let b = PlayerBundle::new(&p, &reference).with_table(DatasetKey::ShotClock, table);
        approx(late_clock_efficiency(&b).unwrap(), (0.4 * 0.1 + 0.34 * 0.05) / 0.15);
    }

    #[test]
    fn late_clock_needs_both_ranges_and_volume() {
        let reference = CrossReference::default();
        let p = player(1.0, 1.0);

        let table = shot_clock(&[&["7-4 Late", "0.10", "0.40"]]);
        let b = PlayerBundle::new(&p, &reference).with_table(DatasetKey::ShotClock, table);
        assert_eq!(late_clock_efficiency(&b).unwrap(), RawValue::Missing);

        let table = shot_clock(&[&["7-4 Late", "0", "0"], &["4-0 Very Late", "0", "0"]]);
        let b = PlayerBundle::new(&p, &reference).with_table(DatasetKey::ShotClock, table);
        assert_eq!(late_clock_efficiency(&b).unwrap(), RawValue::Missing);

        let b = PlayerBundle::new(&p, &reference);
        assert_eq!(late_clock_efficiency(&b).unwrap(), RawValue::Missing);
    }

    #[test]
    fn missing_column_is_a_calc_error() {
        let reference = CrossReference::default();
        let p = player(1.0, 1.0);
        let table = Table::from_rows(&["RANGE", "FG_PCT"], &[&["7-4 Late", "0.4"]]);
        let b = PlayerBundle::new(&p, &reference).with_table(DatasetKey::ShotClock, table);
        let err = late_clock_efficiency(&b).unwrap_err();
        assert!(err.to_string().starts_with("shot_clock"));
    }

    #[test]
    fn quick_decision_reads_short_touches() {
        let reference = CrossReference::default();
        let p = player(1.0, 1.0);
        let table = Table::from_rows(
            &["TOUCH_TIME_RANGE", "FG_PCT"],
            &[&["Touch < 2 Seconds", "0.52"], &["Touch 6+ Seconds", "0.41"]],
        );
        let b = PlayerBundle::new(&p, &reference).with_table(DatasetKey::TouchTime, table);
        approx(quick_decision_efficiency(&b).unwrap(), 0.52);
    }

    #[test]
    fn shot_selection_sums_three_zones() {
        let reference = CrossReference::default();
        let p = player(1.0, 1.0);
        let headers = ["SHOT_TYPE", "FGA_FREQUENCY", "FG_PCT", "EFG_PCT"];
        let table = Table::from_rows(
            &headers,
            &[
                &["Less than 10 ft", "0.30", "0.60", "0.60"],
                &["Catch and Shoot", "0.25", "0.38", "0.57"],
                &["Pull Ups", "0.20", "0.36", "0.45"],
            ],
        );
        let b = PlayerBundle::new(&p, &reference).with_table(DatasetKey::ShotType, table);
        approx(
            shot_selection_value(&b).unwrap(),
            0.30 * 1.2 + 0.25 * 0.57 + 0.20 * 0.45,
        );

        let partial = Table::from_rows(&headers, &[&["Pull Ups", "0.20", "0.36", "0.45"]]);
        let b = PlayerBundle::new(&p, &reference).with_table(DatasetKey::ShotType, partial);
        assert_eq!(shot_selection_value(&b).unwrap(), RawValue::Missing);
    }

    #[test]
    fn hustle_per36_and_totals_basis() {
        let reference = CrossReference::default();
        let p = player(1.0, 1.0);
        let hustle = Table::from_rows(
            &["PLAYER_ID", "MIN", "DEFLECTIONS", "SCREEN_ASSISTS"],
            &[&["1", "1800", "150", ""]],
        );

        let b = PlayerBundle::new(&p, &reference).with_table(DatasetKey::Hustle, hustle.clone());
        approx(deflections(&b).unwrap(), 150.0);
        assert_eq!(screen_assists(&b).unwrap(), RawValue::Missing);

        let b = PlayerBundle::new(&p, &reference)
            .with_table(DatasetKey::Hustle, hustle)
            .with_hustle_basis(HustleBasis::Totals);
        approx(deflections(&b).unwrap(), 3.0);

        let b = PlayerBundle::new(&p, &reference);
        assert_eq!(charges_drawn(&b).unwrap(), RawValue::Missing);
    }

    fn reference_for(name: &str, pf: f64, shoot: f64) -> CrossReference {
        CrossReference::new(ReferenceTable::new(vec![ReferenceRow {
            name: name.into(),
            games: Some(73.0),
            personal_fouls_per_36: Some(pf),
            shooting_fouls: Some(shoot),
            age: Some(24.0),
            ast_pct: Some(39.7),
            ..ReferenceRow::default()
        }]))
    }

    #[test]
    fn shooting_foul_pct_uses_contests() {
        let reference = reference_for("Tyrese Haliburton", 1.7, 40.0);
        let p = player(1.0, 1.0);
        let splits = Table::from_rows(&["GP", "MIN"], &[&["80", "33.6"]]);
        let defended = Table::from_rows(
            &["CLOSE_DEF_DIST_RANGE", "FGA"],
            &[&["0-2 Feet - Very Tight", "1.5"], &["2-4 Feet - Tight", "3.5"]],
        );
        let b = PlayerBundle::new(&p, &reference)
            .with_table(DatasetKey::GeneralSplits, splits)
            .with_table(DatasetKey::ClosestDefender, defended);
        approx(shooting_foul_pct(&b).unwrap(), 40.0 / 400.0 * 100.0);
    }

    #[test]
    fn shooting_foul_pct_needs_reference_match() {
        let reference = reference_for("Someone Else", 1.7, 40.0);
        let p = player(1.0, 1.0);
        let b = PlayerBundle::new(&p, &reference)
            .with_table(
                DatasetKey::GeneralSplits,
                Table::from_rows(&["GP"], &[&["80"]]),
            )
            .with_table(
                DatasetKey::ClosestDefender,
                Table::from_rows(&["FGA"], &[&["5"]]),
            );
        assert_eq!(shooting_foul_pct(&b).unwrap(), RawValue::Missing);
    }

    #[test]
    fn reference_metrics() {
        let reference = reference_for("Tyrese Haliburton", 1.7, 40.0);
        let p = player(1.0, 1.0);
        let b = PlayerBundle::new(&p, &reference);
        approx(personal_foul_rate(&b).unwrap(), 1.7);
        approx(age(&b).unwrap(), 24.0);
        approx(ast_pct(&b).unwrap(), 39.7);

        let empty = CrossReference::default();
        let b = PlayerBundle::new(&p, &empty);
        assert_eq!(age(&b).unwrap(), RawValue::Missing);
    }
}
