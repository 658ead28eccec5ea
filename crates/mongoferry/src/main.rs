//! mongoferry CLI
//!
//! Analyze a source MongoDB deployment and copy its databases to a target.
//! Pedantic lints relaxed for CLI ergonomics.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use mongoferry::config::parse_name_list;
use mongoferry::settings::DEFAULT_ENV_FILE;
use mongoferry::wizard::SetupWizard;
use mongoferry::{
    analyze_databases, report, validate_compatibility, ConnectionManager, MigrationOptions,
    MigrationStatus, Migrator, MongoConnector, Settings,
};

#[derive(Parser)]
#[command(name = "mongoferry")]
#[command(version)]
#[command(about = "Copy documents, indexes and collection metadata between MongoDB deployments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Key-value settings file
    #[arg(long, value_name = "FILE", default_value = DEFAULT_ENV_FILE, global = true)]
    env_file: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for run log files
    #[arg(long, value_name = "DIR", default_value = "logs", global = true)]
    log_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze source MongoDB structure
    Analyze {
        /// Comma-separated list of source databases to analyze
        #[arg(short = 's', long = "source-dbs", value_name = "DATABASES")]
        source_dbs: Option<String>,

        /// Output file for analysis results (JSON format)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Migrate data from source to target MongoDB
    Migrate(MigrateArgs),

    /// Interactive setup for MongoDB migration configuration
    Setup,
}

#[derive(Args)]
struct MigrateArgs {
    /// Comma-separated list of source databases to migrate
    #[arg(short = 's', long = "source-dbs", value_name = "DATABASES")]
    source_dbs: Option<String>,

    /// Target database name (defaults to source database name)
    #[arg(short = 't', long = "target-db", value_name = "DATABASE")]
    target_db: Option<String>,

    /// Comma-separated list of collections to migrate
    #[arg(short = 'c', long, value_name = "COLLECTIONS")]
    collections: Option<String>,

    /// Comma-separated list of collections to skip
    #[arg(short = 'k', long = "skip-collections", value_name = "COLLECTIONS")]
    skip_collections: Option<String>,

    /// Delete data in target collections before migration
    #[arg(long)]
    drop_target: bool,

    /// Number of documents to migrate in each batch [default: 1000]
    #[arg(short = 'b', long, value_name = "SIZE")]
    batch_size: Option<usize>,

    /// Number of parallel operations [default: 5]
    #[arg(long, value_name = "NUMBER")]
    concurrency: Option<usize>,

    /// Operation timeout in milliseconds [default: 30000]
    #[arg(long, value_name = "MILLISECONDS")]
    timeout: Option<u64>,

    /// Analyze source and target but do not migrate data
    #[arg(long)]
    dry_run: bool,
}

impl MigrateArgs {
    fn apply(&self, options: &mut MigrationOptions) {
        if let Some(dbs) = &self.source_dbs {
            options.source_databases = Some(parse_name_list(dbs));
        }
        if let Some(db) = &self.target_db {
            options.target_database = Some(db.clone());
        }
        if let Some(colls) = &self.collections {
            options.collections = Some(parse_name_list(colls));
        }
        if let Some(colls) = &self.skip_collections {
            options.skip_collections = Some(parse_name_list(colls));
        }
        if self.drop_target {
            options.drop_target = true;
        }
        if let Some(size) = self.batch_size {
            options.batch_size = size;
        }
        if let Some(concurrency) = self.concurrency {
            options.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            options.timeout_ms = timeout;
        }
        if self.dry_run {
            options.dry_run = true;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", style("Error:").red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if let Commands::Setup = cli.command {
        let _guard = init_logging(&cli, "info", None)?;
        SetupWizard::new(&cli.env_file).run()?;
        return Ok(ExitCode::SUCCESS);
    }

    let settings = Settings::load(&cli.env_file)?;
    let _guard = init_logging(&cli, &settings.log_level, Some(&cli.log_dir))?;

    match &cli.command {
        Commands::Analyze { source_dbs, output } => {
            let filter = source_dbs.as_deref().map(parse_name_list);
            run_analyze(&settings, filter, output.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Migrate(args) => run_migrate(&settings, args).await,
        Commands::Setup => Ok(ExitCode::SUCCESS),
    }
}

/// Console layer plus, when `log_dir` is given, a plain-text run log file.
fn init_logging(
    cli: &Cli,
    default_level: &str,
    log_dir: Option<&Path>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if cli.verbose => EnvFilter::new("debug"),
        Err(_) => EnvFilter::try_new(default_level).unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let name = format!("migration-{}.log", chrono::Utc::now().format("%Y%m%dT%H%M%SZ"));
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;
    Ok(guard)
}

fn spinner(message: &str) -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message(message.to_string());
    Ok(bar)
}

async fn run_analyze(
    settings: &Settings,
    filter: Option<Vec<String>>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let spinner = spinner("Connecting to source MongoDB")?;
    let connector = MongoConnector::new(settings.options.request_timeout());
    let mut connections = ConnectionManager::new(Arc::new(connector));

    let result = async {
        let source = connections.connect_source(&settings.source).await?;
        spinner.set_message("Analyzing databases");
        analyze_databases(source.as_ref(), filter.as_deref()).await
    }
    .await;
    connections.close().await;

    let databases = match result {
        Ok(databases) => databases,
        Err(e) => {
            spinner.abandon_with_message("Analysis failed");
            error!(error = %e, "Analysis command failed");
            return Err(e.into());
        }
    };

    match output {
        Some(path) => {
            std::fs::write(path, serde_json::to_string_pretty(&databases)?)?;
            spinner.finish_with_message(format!(
                "Analysis completed and saved to {}",
                path.display()
            ));
        }
        None => {
            spinner.finish_with_message("Analysis completed");
            println!();
            print!("{}", report::analysis_summary(&databases));
        }
    }

    info!("Analysis command completed");
    Ok(())
}

async fn run_migrate(settings: &Settings, args: &MigrateArgs) -> anyhow::Result<ExitCode> {
    let mut options = settings.options.clone();
    args.apply(&mut options);
    options.validate()?;

    let spinner = spinner("Connecting to MongoDB servers")?;
    let connector = MongoConnector::new(options.request_timeout());
    let mut connections = ConnectionManager::new(Arc::new(connector));

    let (source, target) = match connections.connect(&settings.source, &settings.target).await {
        Ok(handles) => handles,
        Err(e) => {
            spinner.abandon_with_message("Migration failed");
            error!(error = %e, "Migration command failed");
            return Err(e.into());
        }
    };

    spinner.set_message("Validating compatibility");
    let compatibility = validate_compatibility(source.as_ref(), target.as_ref()).await;
    if !compatibility.compatible {
        spinner.suspend(|| {
            println!("{}", style("Compatibility issues detected:").yellow());
            for issue in &compatibility.issues {
                println!("- {}", style(issue).yellow());
            }
            if !options.dry_run {
                println!(
                    "Continuing with migration despite compatibility issues. Use --dry-run to analyze without migrating."
                );
            }
        });
    }

    spinner.set_message("Analyzing source databases");
    let mut migrator = match Migrator::new(source, target, options.clone()) {
        Ok(migrator) => migrator,
        Err(e) => {
            connections.close().await;
            spinner.abandon_with_message("Migration failed");
            return Err(e.into());
        }
    };

    let mut progress = migrator.subscribe();
    let progress_bar = spinner.clone();
    let progress_task = tokio::spawn(async move {
        loop {
            match progress.recv().await {
                Ok(snapshot) => progress_bar.set_message(report::progress_line(&snapshot)),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let stop = migrator.stop_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current batch");
            stop.stop();
        }
    });

    let stats = migrator.migrate().await;
    drop(migrator);
    interrupt.abort();
    let _ = progress_task.await;
    connections.close().await;

    if !stats.errors.is_empty() {
        let headline = if stats.status == MigrationStatus::Failed {
            "Migration failed"
        } else {
            "Migration completed with errors"
        };
        spinner.abandon_with_message(headline);
        println!();
        println!("{}", style("Errors encountered:").yellow());
        for line in report::error_list(&stats) {
            println!("{}", style(line).red());
        }
    } else if stats.status == MigrationStatus::Stopped {
        spinner.abandon_with_message("Migration stopped");
    } else if options.dry_run {
        spinner.finish_with_message("Dry run completed successfully");
    } else {
        spinner.finish_with_message("Migration completed successfully");
    }

    println!();
    for line in report::migration_summary(&stats) {
        println!("{line}");
    }

    info!(status = %stats.status, "Migration command completed");
    if stats.status == MigrationStatus::Failed {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
