use anyhow::{Context, Result};
use clap::Parser;
use concilio_import::{defaults, Categorizer, RuleTable};
use concilio_reconcile::{Pipeline, ReportInputs, Settings};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "concilio.toml";

#[derive(Parser)]
#[command(
    name = "concilio",
    version,
    about = "Categorize checking and card exports and reconcile card payments against charges"
)]
struct Cli {
    /// Settings file [default: ./concilio.toml when present]
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the JSON report to this file instead of stdout
    #[arg(long, short)]
    out: Option<PathBuf>,
    /// Checking-account CSV export
    checking: PathBuf,
    /// Credit-card CSV export
    card: PathBuf,
    /// Optional roster CSV (`name,expected_total[,source]`)
    roster: Option<PathBuf>,
}

fn main() {
    // Logs go to stderr so the report on stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(cli.config.as_deref())?;
    let checking_rules = categorizer(settings.rules.checking.as_deref(), defaults::checking_rules)?;
    let card_rules = categorizer(settings.rules.card.as_deref(), defaults::card_rules)?;
    let pipeline = Pipeline::new(settings, checking_rules, card_rules);

    let checking = read(&cli.checking)?;
    let card = read(&cli.card)?;
    let roster = cli.roster.as_deref().map(read).transpose()?;

    let report = pipeline
        .run(ReportInputs {
            checking: &checking,
            card: &card,
            roster: roster.as_deref(),
        })
        .context("Failed to build report")?;

    tracing::info!(
        periods = report.reconciliation.periods.len(),
        unreconciled = report.reconciliation.summary.unreconciled_count,
        cash = %report.totals.current_cash_balance,
        plug = %report.totals.unaccounted_credits,
        "report ready"
    );

    let json = report.to_json().context("Failed to serialize report")?;
    match cli.out {
        Some(path) => std::fs::write(&path, format!("{json}\n"))
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    match explicit {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => Settings::load(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("Failed to load settings from {DEFAULT_CONFIG}")),
        None => Ok(Settings::default()),
    }
}

fn categorizer(path: Option<&Path>, builtin: fn() -> RuleTable) -> Result<Categorizer> {
    let table = match path {
        Some(path) => RuleTable::from_toml(&read(path)?)
            .with_context(|| format!("Invalid rule table {}", path.display()))?,
        None => builtin(),
    };
    Categorizer::new(table).context("Failed to compile rule table")
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
