// Output tables and JSON export.
//
// Every file is rendered to memory before anything touches the output
// directory, then written to a temporary sibling and renamed into place.

use crate::metrics::MetricId;
use crate::model::{PlayerIdentity, RawValue};
use crate::pipeline::{RunOutput, RunSummary};
use crate::scoring::composite::CompositeResult;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const METRICS_FILE: &str = "iq_metrics.csv";
pub const PERCENTILES_FILE: &str = "iq_percentiles.csv";
pub const RANKINGS_FILE: &str = "iq_rankings.csv";
pub const RANKINGS_JSON_FILE: &str = "iq_rankings.json";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Cell formatting
// ---------------------------------------------------------------------------

/// Raw metric cell: 3 decimals, `inf` for effectively-infinite, blank for
/// missing.
pub fn format_raw(value: RawValue) -> String {
    match value {
        RawValue::Measured(v) | RawValue::Imputed(v) => format!("{v:.3}"),
        RawValue::Infinite => "inf".into(),
        RawValue::Missing => String::new(),
    }
}

fn format_percentile(value: f64) -> String {
    format!("{value:.1}")
}

fn join_metric_names(metrics: &[MetricId]) -> String {
    metrics
        .iter()
        .map(|m| m.name())
        .collect::<Vec<_>>()
        .join(";")
}

const IDENTITY_HEADERS: [&str; 6] = ["PLAYER_ID", "PLAYER_NAME", "TEAM", "POSITION", "GP", "MIN"];

fn identity_cells(identity: &PlayerIdentity) -> Vec<String> {
    vec![
        identity.id.to_string(),
        identity.name.clone(),
        identity.team.clone(),
        identity.position.to_string(),
        identity.games.to_string(),
        format!("{:.1}", identity.minutes),
    ]
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------

fn render_csv(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Vec<u8>, ReportError> {
    let mut buf = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer.write_record(&headers)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush().map_err(|e| ReportError::Io {
            path: "<memory>".into(),
            source: e,
        })?;
    }
    Ok(buf)
}

/// One row per player: identity, every raw metric, and the audit list.
pub fn render_metrics(output: &RunOutput) -> Result<Vec<u8>, ReportError> {
    let mut headers: Vec<String> = IDENTITY_HEADERS.iter().map(|h| h.to_string()).collect();
    headers.extend(MetricId::ALL.iter().map(|m| m.name().to_string()));
    headers.push("IMPUTED".into());

    let rows = output
        .records
        .iter()
        .map(|record| {
            let mut row = identity_cells(&record.identity);
            row.extend(MetricId::ALL.iter().map(|m| format_raw(record.value(*m))));
            row.push(join_metric_names(&record.imputed));
            row
        })
        .collect();
    render_csv(headers, rows)
}

/// Identity, raw values, then `<metric>_percentile` columns holding the
/// percentile the composite used. `NEUTRAL_FILLED` lists the metrics that
/// had no percentile and were scored at the neutral value.
pub fn render_percentiles(output: &RunOutput) -> Result<Vec<u8>, ReportError> {
    let mut headers: Vec<String> = IDENTITY_HEADERS.iter().map(|h| h.to_string()).collect();
    headers.extend(MetricId::ALL.iter().map(|m| m.name().to_string()));
    headers.extend(MetricId::ALL.iter().map(|m| format!("{}_percentile", m.name())));
    headers.push("NEUTRAL_FILLED".into());

    let rows = output
        .records
        .iter()
        .zip(&output.percentiles)
        .map(|(record, pct)| {
            let mut row = identity_cells(&record.identity);
            row.extend(MetricId::ALL.iter().map(|m| format_raw(record.value(*m))));
            row.extend(MetricId::ALL.iter().map(|m| format_percentile(pct.resolved(*m))));
            row.push(join_metric_names(&pct.neutral_filled()));
            row
        })
        .collect();
    render_csv(headers, rows)
}

/// Plain-text run summary: row counts, then measured/imputed/missing counts
/// and percentages for every metric.
pub fn render_availability(summary: &RunSummary) -> String {
    let mut out = format!(
        "scored {} players ({} failed, {} below minimums, {} totals rows skipped)\n",
        summary.processed, summary.failed, summary.unqualified, summary.skipped_rows
    );
    out.push_str(&format!(
        "{:<28} {:>14} {:>14} {:>14}\n",
        "METRIC", "MEASURED", "IMPUTED", "MISSING"
    ));
    for a in &summary.availability {
        out.push_str(&format!(
            "{:<28} {:>5} ({:>5.1}%) {:>5} ({:>5.1}%) {:>5} ({:>5.1}%)\n",
            a.metric.name(),
            a.measured,
            a.measured_pct(),
            a.imputed,
            a.imputed_pct(),
            a.missing,
            a.missing_pct()
        ));
    }
    out
}

pub fn render_rankings(rankings: &[CompositeResult]) -> Result<Vec<u8>, ReportError> {
    let mut headers: Vec<String> = IDENTITY_HEADERS.iter().map(|h| h.to_string()).collect();
    headers.extend(["RAW_WEIGHTED", "COMPOSITE_IQ", "RANK"].map(String::from));

    let rows = rankings
        .iter()
        .map(|r| {
            let mut row = identity_cells(&r.identity);
            row.push(format!("{:.3}", r.raw_weighted));
            row.push(format!("{:.2}", r.score));
            row.push(r.rank.to_string());
            row
        })
        .collect();
    render_csv(headers, rows)
}

/// Frontend export row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub rank: u32,
    pub name: String,
    pub team: String,
    pub position: String,
    pub score: f64,
    pub minutes: f64,
    pub games: u32,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

impl From<&CompositeResult> for ExportRow {
    fn from(r: &CompositeResult) -> Self {
        ExportRow {
            rank: r.rank,
            name: r.identity.name.clone(),
            team: r.identity.team.clone(),
            position: r.identity.position.to_string(),
            score: round1(r.score),
            minutes: round1(r.identity.minutes),
            games: r.identity.games,
        }
    }
}

pub fn render_json(rankings: &[CompositeResult]) -> Result<Vec<u8>, ReportError> {
    let rows: Vec<ExportRow> = rankings.iter().map(ExportRow::from).collect();
    let mut buf = serde_json::to_vec_pretty(&rows)?;
    buf.push(b'\n');
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    std::fs::write(&tmp, contents).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)
}

/// Render every output, then write them into `dir`. Returns the written paths.
pub fn write_all(
    dir: &Path,
    output: &RunOutput,
    export_json: bool,
) -> Result<Vec<PathBuf>, ReportError> {
    let mut files = vec![
        (METRICS_FILE, render_metrics(output)?),
        (PERCENTILES_FILE, render_percentiles(output)?),
        (RANKINGS_FILE, render_rankings(&output.rankings)?),
    ];
    if export_json {
        files.push((RANKINGS_JSON_FILE, render_json(&output.rankings)?));
    }

    std::fs::create_dir_all(dir).map_err(|e| ReportError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut written = Vec::with_capacity(files.len());
    for (name, contents) in files {
        let path = dir.join(name);
        write_atomic(&path, &contents)?;
        info!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PlayerRecord, Position, Slot};
    use crate::pipeline::MetricAvailability;
    use crate::scoring::percentile::PercentileTable;

    fn identity(id: u32, name: &str) -> PlayerIdentity {
        PlayerIdentity {
            id,
            name: name.into(),
            team: "GSW".into(),
            position: Position::Hybrid(Slot::SG, Slot::PG),
            games: 70,
            minutes: 32.68,
        }
    }

    fn sample_output() -> RunOutput {
        let mut a = PlayerRecord::new(identity(201939, "Stephen Curry"));
        a.values.insert(MetricId::AstTovRatio, RawValue::Infinite);
        a.values.insert(MetricId::EfgPct, RawValue::Measured(0.5612));
        a.values.insert(MetricId::DeflectionsPer36, RawValue::Imputed(2.5));
        a.imputed = vec![MetricId::DeflectionsPer36, MetricId::ShootingFoulPct];
        let b = PlayerRecord::new(identity(1, "Reserve, Jr."));
        let records = vec![a, b];
        let percentiles = PercentileTable::build(&records).rows().to_vec();

        let rankings = vec![
            CompositeResult {
                identity: records[0].identity.clone(),
                raw_weighted: 61.23456,
                score: 115.049,
                rank: 1,
            },
            CompositeResult {
                identity: records[1].identity.clone(),
                raw_weighted: 38.0,
                score: 84.95,
                rank: 2,
            },
        ];
        RunOutput {
            records,
            percentiles,
            rankings,
            failures: Vec::new(),
            summary: RunSummary {
                skipped_rows: 1,
                processed: 2,
                failed: 0,
                unqualified: 0,
                availability: Vec::new(),
            },
        }
    }

    #[test]
    fn raw_cells() {
        assert_eq!(format_raw(RawValue::Measured(1.23456)), "1.235");
        assert_eq!(format_raw(RawValue::Infinite), "inf");
        assert_eq!(format_raw(RawValue::Missing), "");
    }

    #[test]
    fn metrics_table_layout() {
        let text = String::from_utf8(render_metrics(&sample_output()).unwrap()).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("PLAYER_ID,PLAYER_NAME,TEAM,POSITION,GP,MIN,ast_tov_ratio,"));
        assert!(header.ends_with(",age,IMPUTED"));

        let curry = lines.next().unwrap();
        assert!(curry.starts_with("201939,Stephen Curry,GSW,SG-PG,70,32.7,inf,,,0.561,"));
        assert!(curry.ends_with(",deflections_per_36;shooting_foul_pct"));

        // Names with commas are quoted.
        assert!(lines.next().unwrap().starts_with("1,\"Reserve, Jr.\","));
    }

    #[test]
    fn percentile_table_has_suffixed_columns() {
        let text = String::from_utf8(render_percentiles(&sample_output()).unwrap()).unwrap();
        let header: Vec<&str> = text.lines().next().unwrap().split(',').collect();
        assert_eq!(header.len(), 6 + 2 * MetricId::COUNT + 1);
        assert_eq!(header[6 + MetricId::COUNT], "ast_tov_ratio_percentile");
        assert_eq!(*header.last().unwrap(), "NEUTRAL_FILLED");
    }

    #[test]
    fn percentile_table_shows_neutral_fill() {
        let output = sample_output();
        let text = String::from_utf8(render_percentiles(&output).unwrap()).unwrap();
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        let first_pct = 6 + MetricId::COUNT;

        // The reserve has no values at all: every percentile is the neutral 50.
        let reserve = &rows[1];
        for i in first_pct..first_pct + MetricId::COUNT {
            assert_eq!(&reserve[i], "50.0");
        }
        let neutral: Vec<&str> = reserve[first_pct + MetricId::COUNT].split(';').collect();
        assert_eq!(neutral.len(), MetricId::COUNT);
        assert!(neutral.contains(&"ast_tov_ratio"));

        // Cells agree with what the composite consumed.
        let curry = &rows[0];
        for (i, m) in MetricId::ALL.iter().enumerate() {
            let expected = format!("{:.1}", output.percentiles[0].resolved(*m));
            assert_eq!(&curry[first_pct + i], expected.as_str());
        }
    }

    #[test]
    fn availability_summary_lists_counts_and_percentages() {
        let summary = RunSummary {
            skipped_rows: 1,
            processed: 4,
            failed: 1,
            unqualified: 2,
            availability: vec![MetricAvailability {
                metric: MetricId::AstTovRatio,
                measured: 3,
                imputed: 1,
                missing: 0,
            }],
        };
        let text = render_availability(&summary);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "scored 4 players (1 failed, 2 below minimums, 1 totals rows skipped)"
        );
        assert!(lines[1].starts_with("METRIC"));
        assert!(lines[2].starts_with("ast_tov_ratio"));
        assert!(lines[2].contains("3 ( 75.0%)"));
        assert!(lines[2].contains("1 ( 25.0%)"));
        assert!(lines[2].contains("0 (  0.0%)"));
    }

    #[test]
    fn rankings_table_and_json() {
        let output = sample_output();
        let text = String::from_utf8(render_rankings(&output.rankings).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "PLAYER_ID,PLAYER_NAME,TEAM,POSITION,GP,MIN,RAW_WEIGHTED,COMPOSITE_IQ,RANK"
        );
        assert_eq!(lines[1], "201939,Stephen Curry,GSW,SG-PG,70,32.7,61.235,115.05,1");

        let json: serde_json::Value =
            serde_json::from_slice(&render_json(&output.rankings).unwrap()).unwrap();
        assert_eq!(json[0]["rank"], 1);
        assert_eq!(json[0]["name"], "Stephen Curry");
        assert_eq!(json[0]["position"], "SG-PG");
        assert_eq!(json[0]["score"], 115.0);
        assert_eq!(json[1]["minutes"], 32.7);
    }

    #[test]
    fn write_all_creates_files_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output");
        let written = write_all(&out, &sample_output(), false).unwrap();
        assert_eq!(written.len(), 3);
        assert!(out.join(RANKINGS_FILE).exists());
        assert!(!out.join(RANKINGS_JSON_FILE).exists());

        let leftovers = std::fs::read_dir(&out)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }
}
