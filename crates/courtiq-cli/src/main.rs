// CourtIQ batch entry point.
//
// Startup sequence:
// 1. Parse arguments, initialize tracing (log file unless --log-stderr)
// 2. Load config (copying defaults on first run), apply overrides
// 3. Load the season snapshot
// 4. Run the pipeline
// 5. Write output tables, print the summary

use courtiq_core::config;
use courtiq_core::data::SeasonData;
use courtiq_core::model::Season;
use courtiq_core::pipeline::{self, PipelineOptions, RunOutput};
use courtiq_core::report;

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "courtiq")]
#[command(about = "Compute composite Basketball IQ rankings from a season snapshot")]
#[command(version)]
struct Cli {
    /// Project directory holding config/, defaults/ and the data paths
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Season label overriding the config (e.g. 2024-25)
    #[arg(long)]
    season: Option<Season>,

    /// Output directory overriding the config
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Log to stderr instead of logs/courtiq.log
    #[arg(long)]
    log_stderr: bool,

    /// Skip the JSON rankings export
    #[arg(long)]
    no_json: bool,

    /// Number of leaders to print
    #[arg(long, default_value_t = 10)]
    top: usize,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Tracing
    init_tracing(&cli.base_dir, cli.log_stderr)?;
    info!("CourtIQ starting up");

    // 2. Config
    let copied = config::ensure_config_files(&cli.base_dir)
        .context("failed to initialize configuration")?;
    for path in &copied {
        info!("Copied default config to {}", path.display());
    }
    let mut config =
        config::load_config_from(&cli.base_dir).context("failed to load configuration")?;
    if let Some(season) = cli.season {
        config.season = season;
    }
    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output_dir(&cli.base_dir));
    let export_json = config.output.export_json && !cli.no_json;
    info!(
        "Config loaded: season {}, hustle basis {:?}",
        config.season, config.hustle_basis
    );

    // 3. Season snapshot
    let paths = config.resolve_paths(&cli.base_dir);
    let data = SeasonData::load(&paths, config.season, config.hustle_basis)
        .with_context(|| format!("failed to load season data for {}", config.season))?;

    // 4. Pipeline
    let options = PipelineOptions::from_config(&config);
    let output = pipeline::run(&data, &options).context("pipeline run failed")?;

    // 5. Outputs
    let written = report::write_all(&output_dir, &output, export_json)
        .with_context(|| format!("failed to write outputs to {}", output_dir.display()))?;

    print_summary(&output, cli.top);
    for path in written {
        println!("wrote {}", path.display());
    }

    info!("CourtIQ finished");
    Ok(())
}

fn print_summary(output: &RunOutput, top: usize) {
    print!("{}", report::render_availability(&output.summary));
    for failure in &output.failures {
        println!("  failed {}: {}", failure.player_id, failure.reason);
    }

    println!();
    println!("{:>4}  {:<28} {:<5} {:<6} {:>7}", "RANK", "PLAYER", "TEAM", "POS", "IQ");
    for r in output.rankings.iter().take(top) {
        println!(
            "{:>4}  {:<28} {:<5} {:<6} {:>7.1}",
            r.rank,
            r.identity.name,
            r.identity.team,
            r.identity.position.to_string(),
            r.score
        );
    }
    println!();
}

/// Initialize tracing to a log file under `base_dir/logs`, or to stderr.
fn init_tracing(base_dir: &Path, to_stderr: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("courtiq=info,courtiq_core=info,warn"));

    if to_stderr {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("failed to set tracing subscriber")?;
        return Ok(());
    }

    let log_dir = base_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("courtiq.log");
    let log_file = std::fs::File::create(&log_path)
        .with_context(|| format!("failed to create {}", log_path.display()))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
