//! CLI binary for treadle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use treadle_core::handlers::{
    EvaluationHandler, EvaluationTask, PrintHandler, PrintTask, TrainingHandler, TrainingTask,
};
use treadle_core::typed::Handler;
use treadle_core::{
    App, AppBuilder, FsProcessLog, HandlerKind, ProcessLogSink, SqliteTaskStore, TaskId,
    TaskStatus, TaskStore, TreadleConfig,
};

const DEFAULT_FILTER: &str = "treadle=info,treadle_core=info,treadle_cli=info";

/// Treadle: a durable, sequential job queue for long-running commands.
#[derive(Parser)]
#[command(name = "treadle", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite task store (overrides `store_path`).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Log directory (overrides `log_root`).
    #[arg(long, global = true)]
    log_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until the store stays empty or Ctrl+C.
    Run {
        /// Seconds between empty fetches.
        #[arg(long)]
        interval: Option<u64>,

        /// Consecutive empty fetches before stopping.
        #[arg(long)]
        max_empty: Option<u32>,
    },

    /// Trial-run pending tasks for a bounded time.
    Probe {
        #[arg(required = true)]
        ids: Vec<TaskId>,

        /// Bound per task, in seconds.
        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },

    /// Add a task.
    Enqueue {
        #[command(subcommand)]
        task: EnqueueCommand,
    },

    /// Print one task as JSON.
    Show { id: TaskId },

    /// List tasks, oldest first.
    List {
        #[arg(long)]
        status: Option<TaskStatus>,
    },

    /// Task counts per status.
    Status,
}

#[derive(Subcommand)]
enum EnqueueCommand {
    /// Diagnostic task that only logs its message.
    Print { message: String },

    /// Training run.
    Train {
        #[command(flatten)]
        command: ScriptArgs,

        #[arg(long, default_value = "train.py")]
        script: String,
    },

    /// Evaluation run.
    Test {
        #[command(flatten)]
        command: ScriptArgs,

        #[arg(long, default_value = "test.py")]
        script: String,

        #[arg(long, default_value = "latest.pth")]
        checkpoint: String,
    },
}

#[derive(Args)]
struct ScriptArgs {
    #[arg(long, default_value = "python")]
    interpreter: String,

    #[arg(long, default_value = "default_config.py")]
    config_file: String,

    /// Defaults to the script's grandparent directory.
    #[arg(long)]
    working_dir: Option<String>,

    /// Extra arguments after `--`.
    #[arg(last = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let _guard = init_logging(&config.log_root)?;

    let store: Arc<dyn TaskStore> = Arc::new(
        SqliteTaskStore::open(&config.store_path)
            .with_context(|| format!("opening task store {}", config.store_path.display()))?,
    );
    let log: Arc<dyn ProcessLogSink> = Arc::new(FsProcessLog::new(&config.log_root));
    let expected: Vec<&str> = HandlerKind::ALL.iter().map(|k| k.type_name()).collect();
    let app = AppBuilder::new(store)
        .with_builtin_handlers(log.clone())?
        .expect_tasks(&expected)
        .build()?;

    match cli.command {
        Command::Run {
            interval,
            max_empty,
        } => run_scheduler(&app, config, interval, max_empty).await,
        Command::Probe { ids, seconds } => run_probe(&app, &ids, seconds).await,
        Command::Enqueue { task } => enqueue(&app, log, task).await,
        Command::Show { id } => {
            let record = app.store().get_task(id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::List { status } => {
            for record in app.store().list_tasks(status).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.id,
                    record.task_type,
                    record.status,
                    record.create_time.format("%Y-%m-%d %H:%M:%S"),
                    record.update_time.format("%Y-%m-%d %H:%M:%S"),
                );
            }
            Ok(())
        }
        Command::Status => {
            let counts = app.status().await?;
            for status in TaskStatus::ALL {
                println!("{:<13}{}", status.as_str(), counts.get(status));
            }
            println!("{:<13}{}", "total", counts.total());
            Ok(())
        }
    }
}

/// Defaults, then the TOML file, then flags.
fn load_config(cli: &Cli) -> anyhow::Result<TreadleConfig> {
    let mut config = match &cli.config {
        Some(path) => TreadleConfig::from_file(path)?,
        None => TreadleConfig::default(),
    };
    if let Some(store) = &cli.store {
        config.store_path = store.clone();
    }
    if let Some(log_root) = &cli.log_root {
        config.log_root = log_root.clone();
    }
    Ok(config)
}

/// Console output plus a daily file under `log_root`.
fn init_logging(log_root: &Path) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_root)
        .with_context(|| format!("creating log directory {}", log_root.display()))?;
    let file_appender = tracing_appender::rolling::daily(log_root, "treadle.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_filter(filter()))
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter()),
        )
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(guard)
}

async fn run_scheduler(
    app: &App,
    mut config: TreadleConfig,
    interval: Option<u64>,
    max_empty: Option<u32>,
) -> anyhow::Result<()> {
    if let Some(interval) = interval {
        config.fetch_interval_secs = interval;
    }
    if let Some(max_empty) = max_empty {
        config.max_empty_fetches = max_empty;
    }
    config.validate()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received Ctrl+C, finishing the current task...");
            let _ = shutdown_tx.send(true);
        }
    });

    let report = app
        .scheduler(config.scheduler_config())?
        .run_until(shutdown_rx)
        .await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_probe(app: &App, ids: &[TaskId], seconds: u64) -> anyhow::Result<()> {
    let probe = app.probe();
    let bound = Duration::from_secs(seconds);
    for &id in ids {
        let feasible = probe
            .run(id, bound)
            .await
            .with_context(|| format!("probing task {id}"))?;
        println!(
            "task {id}: {}",
            if feasible { "feasible" } else { "not feasible" }
        );
    }
    Ok(())
}

async fn enqueue(
    app: &App,
    log: Arc<dyn ProcessLogSink>,
    task: EnqueueCommand,
) -> anyhow::Result<()> {
    let store = app.store().as_ref();
    let id = match task {
        EnqueueCommand::Print { message } => {
            PrintHandler.enqueue(store, PrintTask::new(message)).await?
        }
        EnqueueCommand::Train { command, script } => {
            let mut task = TrainingTask::new(command.interpreter, script, command.config_file)
                .with_arguments(command.args);
            task.working_dir = command.working_dir;
            TrainingHandler::new(log).enqueue(store, task).await?
        }
        EnqueueCommand::Test {
            command,
            script,
            checkpoint,
        } => {
            let mut task =
                EvaluationTask::new(command.interpreter, script, command.config_file, checkpoint)
                    .with_arguments(command.args);
            task.working_dir = command.working_dir;
            EvaluationHandler::new(log).enqueue(store, task).await?
        }
    };
    println!("{id}");
    Ok(())
}
