//! corpussync CLI
//!
//! Maintenance jobs over a JSON document store.
//!
//! # Commands
//!
//! - `assign`: put unlabeled documents into their nearest existing cluster
//! - `dedupe`: delete duplicate titles, keeping the most complete record
//! - `categorize`: fill missing macro-categories from cluster majorities
//! - `run`: all three, committed together
//! - `verify`: read-only coverage counts
//!
//! Exit code 0 on success, including runs that change nothing or a declined dedupe.
//! Exit code 1 on any error.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::{path::PathBuf, process::ExitCode};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

use corpussync::{
    clustering::BelowThreshold,
    config::MaintenanceConfig,
    sync::{AssumeYes, DeletionGate, RepositorySync, Stage, StageSet},
};
use corpussync_jsonstore::{JsonFileStore, JsonStoreConfig};

mod prompt;
mod report;

use prompt::StdinPrompt;

#[derive(Parser, Debug)]
#[command(name = "corpussync", version)]
#[command(about = "Keeps a clustered document corpus consistent as new documents arrive")]
#[command(propagate_version = true)]
struct Cli {
    /// Documents file (JSON)
    #[arg(long, global = true, env = "CORPUSSYNC_STORE", default_value = "data/documents.json")]
    store: PathBuf,

    /// Cluster labels file, a JSON array of {"cluster_id", "label"}
    #[arg(long, global = true, env = "CORPUSSYNC_CLUSTERS")]
    clusters: Option<PathBuf>,

    /// Directory for the assignment and dedupe CSV logs
    #[arg(long, global = true, env = "CORPUSSYNC_AUDIT_DIR")]
    audit_dir: Option<PathBuf>,

    /// Maintenance config file (JSON), flags override its values
    #[arg(long, global = true, env = "CORPUSSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assign unlabeled documents to the nearest cluster centroid
    Assign(AssignArgs),
    /// Delete duplicate documents after confirmation
    Dedupe(ConfirmArgs),
    /// Propagate macro-categories from each cluster's majority
    Categorize(CategorizeArgs),
    /// Assign, dedupe and categorize in one commit
    Run {
        #[command(flatten)]
        confirm: ConfirmArgs,
        #[command(flatten)]
        assign: AssignArgs,
        #[command(flatten)]
        categorize: CategorizeArgs,
    },
    /// Print annotation coverage without changing anything
    Verify,
}

#[derive(Args, Debug, Default)]
struct AssignArgs {
    /// Similarity below which a document isn't put into its nearest cluster
    #[arg(long)]
    min_similarity: Option<f64>,

    /// What happens to documents under --min-similarity
    #[arg(long, value_enum)]
    below_threshold: Option<BelowThresholdArg>,
}

#[derive(Args, Debug, Default)]
struct ConfirmArgs {
    /// Delete duplicates without asking
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(Args, Debug, Default)]
struct CategorizeArgs {
    /// Category for noise documents and clusters without categorized members
    #[arg(long)]
    fallback: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum BelowThresholdArg {
    Unassigned,
    Noise,
}

impl From<BelowThresholdArg> for BelowThreshold {
    fn from(arg: BelowThresholdArg) -> Self {
        match arg {
            BelowThresholdArg::Unassigned => BelowThreshold::LeaveUnassigned,
            BelowThresholdArg::Noise => BelowThreshold::Noise,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => MaintenanceConfig::from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => MaintenanceConfig::default(),
    };
    if let Some(dir) = &cli.audit_dir {
        config.audit_dir = dir.clone();
    }

    let (stages, yes) = match &cli.command {
        Commands::Assign(args) => {
            args.apply(&mut config);
            (StageSet::only(Stage::Assign), false)
        }
        Commands::Dedupe(args) => (StageSet::only(Stage::Dedupe), args.yes),
        Commands::Categorize(args) => {
            args.apply(&mut config);
            (StageSet::only(Stage::Categorize), false)
        }
        Commands::Run {
            confirm,
            assign,
            categorize,
        } => {
            assign.apply(&mut config);
            categorize.apply(&mut config);
            (StageSet::ALL, confirm.yes)
        }
        Commands::Verify => {
            let sync = RepositorySync::new(open_store(&cli), config);
            let report = sync.verify().await.context("Verification failed")?;
            print!("{}", report::render_verification(&report));
            return Ok(());
        }
    };
    config.validate().context("Invalid maintenance settings")?;

    let gate: &dyn DeletionGate = if yes { &AssumeYes } else { &StdinPrompt };
    let sync = RepositorySync::new(open_store(&cli), config);
    let report = sync
        .run(stages, gate)
        .await
        .with_context(|| format!("Maintenance run on {} failed", cli.store.display()))?;
    print!("{}", report::render_run(&report));
    Ok(())
}

fn open_store(cli: &Cli) -> JsonFileStore {
    JsonFileStore::new(JsonStoreConfig {
        documents_path: cli.store.clone(),
        clusters_path: cli.clusters.clone(),
        backup_dir: None,
    })
}

impl AssignArgs {
    fn apply(&self, config: &mut MaintenanceConfig) {
        if let Some(min) = self.min_similarity {
            config.min_similarity = Some(min);
        }
        if let Some(below) = self.below_threshold {
            config.below_threshold = below.into();
        }
    }
}

impl CategorizeArgs {
    fn apply(&self, config: &mut MaintenanceConfig) {
        if let Some(fallback) = &self.fallback {
            config.fallback_category = fallback.clone();
        }
    }
}
