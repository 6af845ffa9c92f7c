use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod checklist;
mod clock;
mod db;
mod error;
mod health;
mod import;
mod level;
mod models;
mod policy;
mod report;

use crate::checklist::ChecklistModel;
use crate::clock::{Clock, FixedClock, SystemClock};
use crate::level::HealthLevel;
use crate::models::{DealHealth, OpportunitySnapshot, ScoredOpportunity, Stage};

#[derive(Parser)]
#[command(name = "deal-health", version)]
#[command(about = "Deal health scores and close probability recommendations", long_about = None)]
struct Cli {
    /// Increase verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON checklist table replacing the built-in one
    #[arg(long, global = true, env = "DEAL_HEALTH_CHECKLIST")]
    checklist: Option<PathBuf>,

    /// Score as of this date (YYYY-MM-DD, timestamps read as UTC) instead of the local clock
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("source")
        .args(["json", "csv", "db"])
        .required(true)
        .multiple(false)
))]
struct SourceArgs {
    /// JSON array of opportunity snapshots
    #[arg(long)]
    json: Option<PathBuf>,
    /// CSV export with one opportunity per row
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Read opportunities from Postgres (DATABASE_URL)
    #[arg(long)]
    db: bool,
    /// Only score opportunities in this stage
    #[arg(long)]
    stage: Option<Stage>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Score opportunities, weakest first
    Score {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Generate a markdown pipeline health report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value = "pipeline-health.md")]
        out: PathBuf,
    },
    /// Check whether an opportunity's entered probability needs a justification
    Check {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        justification: Option<String>,
    },
    /// Print the active checklist table
    Checklist {
        #[arg(long)]
        stage: Option<Stage>,
    },
}

#[derive(Serialize)]
struct ScoreRow<'a> {
    id: Uuid,
    name: &'a str,
    stage: Stage,
    current_probability: Option<i32>,
    level: HealthLevel,
    health: &'a DealHealth,
}

impl<'a> From<&'a ScoredOpportunity> for ScoreRow<'a> {
    fn from(deal: &'a ScoredOpportunity) -> Self {
        Self {
            id: deal.id,
            name: &deal.name,
            stage: deal.stage,
            current_probability: deal.current_probability,
            level: level::classify(deal.health.score),
            health: &deal.health,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_checklist(path: Option<&PathBuf>) -> anyhow::Result<ChecklistModel> {
    match path {
        Some(path) => ChecklistModel::load(path)
            .with_context(|| format!("failed to load checklist table from {}", path.display())),
        None => Ok(ChecklistModel::default()),
    }
}

async fn load_snapshots(source: &SourceArgs) -> anyhow::Result<Vec<OpportunitySnapshot>> {
    let mut snapshots = if let Some(path) = &source.json {
        import::load_json(path).with_context(|| format!("failed to read {}", path.display()))?
    } else if let Some(path) = &source.csv {
        import::load_csv(path).with_context(|| format!("failed to read {}", path.display()))?
    } else {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set when reading opportunities with --db")?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .context("failed to connect to Postgres")?;
        db::fetch_opportunities(&pool).await?
    };

    if let Some(stage) = source.stage {
        snapshots.retain(|snapshot| snapshot.input.stage == stage);
    }
    Ok(snapshots)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let checklist = load_checklist(cli.checklist.as_ref())?;
    let clock: Box<dyn Clock> = match cli.today {
        Some(today) => Box::new(FixedClock::utc(today)),
        None => Box::new(SystemClock),
    };
    let clock = clock.as_ref();

    match cli.command {
        Commands::Score {
            source,
            limit,
            format,
        } => {
            let snapshots = load_snapshots(&source).await?;
            let scored = health::score_opportunities(&checklist, snapshots, clock);

            match format {
                OutputFormat::Json => {
                    let rows: Vec<ScoreRow> =
                        scored.iter().take(limit).map(ScoreRow::from).collect();
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                }
                OutputFormat::Text => {
                    if scored.is_empty() {
                        println!("No opportunities found.");
                        return Ok(());
                    }

                    println!("Opportunities by health score (weakest first):");
                    for deal in scored.iter().take(limit) {
                        println!("- {}", report::format_deal_line(deal));
                        for signal in &deal.health.signals {
                            println!("    [{}] {}", signal.severity, signal.label);
                        }
                    }
                }
            }
        }
        Commands::Report { source, out } => {
            let snapshots = load_snapshots(&source).await?;
            let scored = health::score_opportunities(&checklist, snapshots, clock);
            let stage_label = source.stage.map(|stage| stage.to_string());
            let report = report::build_report(stage_label.as_deref(), clock.today(), &scored);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            tracing::info!(path = %out.display(), deals = scored.len(), "report written");
            println!("Report written to {}.", out.display());
        }
        Commands::Check {
            source,
            id,
            justification,
        } => {
            let snapshots = load_snapshots(&source).await?;
            let snapshot = snapshots
                .into_iter()
                .find(|snapshot| snapshot.id == id)
                .with_context(|| format!("opportunity {id} not found"))?;

            let health = health::compute_health(&checklist, &snapshot.input, clock);
            let tier = level::classify(health.score);
            println!(
                "{}: score {} [{}], recommended {}%, delta {:+}",
                snapshot.name,
                health.score,
                tier.label,
                health.recommended_probability,
                health.probability_delta
            );
            for signal in &health.signals {
                println!("    [{}] {}", signal.severity, signal.label);
            }

            policy::check_override(
                &health,
                snapshot.input.probability,
                justification.as_deref(),
            )?;
            println!("Probability accepted.");
        }
        Commands::Checklist { stage } => {
            for entry in checklist.stages() {
                if stage.is_some_and(|wanted| wanted != entry.stage) {
                    continue;
                }
                println!("{} (base {}%)", entry.stage, entry.base_probability);
                for item in checklist.items(entry.stage) {
                    println!("  - {} [{}] +{}", item.label, item.id, item.weight);
                }
            }
        }
    }

    Ok(())
}
