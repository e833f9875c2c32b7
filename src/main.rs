use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use rotaplan_lib::commands::optimization::{optimization_accept, optimization_propose, AcceptInput};
use rotaplan_lib::commands::snapshot::snapshot_import;
use rotaplan_lib::commands::AppState;
use rotaplan_lib::config::AppConfig;
use rotaplan_lib::db::DbPool;
use rotaplan_lib::models::assignment::OptimizationProposal;
use rotaplan_lib::models::constraints::{OptimizationConstraints, PeriodConfig, PeriodUnit};
use rotaplan_lib::models::snapshot::Snapshot;
use rotaplan_lib::services::assignment_service::OptimizationRequest;
use rotaplan_lib::utils::logger::init_logging;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum UnitArg {
    Weeks,
    Months,
}

impl From<UnitArg> for PeriodUnit {
    fn from(value: UnitArg) -> Self {
        match value {
            UnitArg::Weeks => PeriodUnit::Weeks,
            UnitArg::Months => PeriodUnit::Months,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "rotaplan",
    about = "Distributes a group's recurring tasks across its members"
)]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long, env = "ROTAPLAN_CONFIG")]
    config: Option<PathBuf>,
    /// Overrides `databasePath` from the configuration.
    #[arg(long)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load groups, members, tasks and availability from a JSON snapshot.
    Import { file: PathBuf },
    /// Compute a proposal for one period without touching the database.
    Propose {
        #[arg(long)]
        group: String,
        /// Period start as an RFC 3339 timestamp.
        #[arg(long)]
        start: String,
        #[arg(long, default_value_t = 4)]
        duration: u32,
        #[arg(long, value_enum, default_value_t = UnitArg::Weeks)]
        unit: UnitArg,
        /// YAML file with constraint overrides.
        #[arg(long)]
        constraints: Option<PathBuf>,
        /// Where to write the proposal JSON.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Commit the assignments of a proposal file.
    Accept { file: PathBuf },
}

fn main() {
    if let Err(error) = run() {
        eprintln!("rotaplan: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    init_logging(config.log_dir.as_deref())?;

    let pool = DbPool::new(&config.database_path)?;
    let state = AppState::new(pool, config)?;

    match cli.command {
        Commands::Import { file } => {
            let snapshot: Snapshot = serde_json::from_str(&fs::read_to_string(&file)?)?;
            let summary = snapshot_import(&state, snapshot)?;
            println!(
                "imported {} group(s), {} member(s), {} task(s), {} availability window(s)",
                summary.groups, summary.members, summary.tasks, summary.availabilities
            );
        }
        Commands::Propose {
            group,
            start,
            duration,
            unit,
            constraints,
            output,
        } => {
            let constraints = constraints
                .map(|path| read_constraints(&path))
                .transpose()?;
            let request = OptimizationRequest {
                group_id: group,
                period_start: start,
                period: PeriodConfig {
                    duration,
                    unit: unit.into(),
                },
                constraints,
            };
            let proposal = optimization_propose(&state, request)?;
            print_summary(&proposal);

            let json = serde_json::to_string_pretty(&proposal)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    info!(path = %path.display(), "proposal written");
                }
                None => println!("{json}"),
            }
        }
        Commands::Accept { file } => {
            let raw = fs::read_to_string(&file)?;
            let input = match serde_json::from_str::<OptimizationProposal>(&raw) {
                Ok(proposal) => AcceptInput::from(proposal),
                Err(_) => serde_json::from_str::<AcceptInput>(&raw)?,
            };
            let report = optimization_accept(&state, input)?;
            println!(
                "committed {} assignment(s) at {}",
                report.applied.len(),
                report.committed_at
            );
        }
    }

    Ok(())
}

fn read_constraints(path: &Path) -> Result<OptimizationConstraints, Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&raw)?)
}

fn print_summary(proposal: &OptimizationProposal) {
    let stats = &proposal.result.stats;
    eprintln!(
        "group {} | {} .. {}",
        proposal.group_id,
        proposal.period.start_at.to_rfc3339(),
        proposal.period.end_at.to_rfc3339()
    );
    eprintln!(
        "{} of {} task(s) assigned, {} conflict(s), {} repetition(s), {} consecutive week(s)",
        stats.assigned_tasks,
        stats.total_tasks,
        stats.conflicts_detected,
        stats.repetitions_count,
        stats.consecutive_weeks_count
    );
    for assignment in &proposal.result.assignments {
        eprintln!(
            "  w{} {:<24} -> {:<16} {:>4}  {}",
            assignment.week_index,
            assignment.task_title,
            assignment.member_name,
            assignment.score,
            assignment.score_details
        );
    }
    for task in &proposal.result.unassigned_tasks {
        eprintln!(
            "  unassigned {:<24} {:?} {}",
            task.title,
            task.reason,
            task.detail.as_deref().unwrap_or("")
        );
    }
    for load in &stats.workload_distribution {
        eprintln!(
            "  {:<16} {:>5.1}h  {} task(s)",
            load.member_name, load.hours, load.task_count
        );
    }
}
