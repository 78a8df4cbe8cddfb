//! spindle: demo producer for spindle-core.
//!
//! Builds simulated repository sync jobs (random duration, random transient
//! failure), runs them through the scheduler and prints a report.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use spindle_core::report::{self, Summary};
use spindle_core::{
    Executable, ExecutionError, Scheduler, SchedulerConfig, Task, TracingObserver,
};

/// Run simulated repository syncs through a priority scheduler.
#[derive(Parser, Debug)]
#[command(name = "spindle", version, about)]
struct Cli {
    /// JSON scheduler config. Flags below override its values.
    #[arg(long, env = "SPINDLE_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum number of syncs running at once.
    #[arg(long, env = "SPINDLE_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Attempts per sync before it is marked failed.
    #[arg(long, env = "SPINDLE_ATTEMPTS")]
    attempts: Option<u32>,

    /// Delay before the first retry, in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Delay growth per retry (1.0 keeps it constant).
    #[arg(long)]
    backoff: Option<f64>,

    /// Per-attempt timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Number of sync jobs to submit.
    #[arg(long, default_value_t = 8)]
    tasks: usize,

    /// Probability that a single sync attempt fails.
    #[arg(long, default_value_t = 0.2)]
    failure_rate: f64,

    /// Seed for the simulation; random when unset.
    #[arg(long)]
    seed: Option<u64>,

    /// Write the JSON report to this path.
    #[arg(long)]
    export: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn scheduler_config(&self) -> Result<SchedulerConfig> {
        let mut config = match &self.config {
            Some(path) => SchedulerConfig::from_json_file(path)?,
            None => SchedulerConfig::default(),
        };
        if let Some(n) = self.concurrency {
            config.max_concurrency = n;
        }
        if let Some(n) = self.attempts {
            config.retry.attempts = n;
        }
        if let Some(ms) = self.delay_ms {
            config.retry.delay_ms = ms;
        }
        if let Some(m) = self.backoff {
            config.retry.backoff_multiplier = m;
        }
        if self.timeout_ms.is_some() {
            config.attempt_timeout_ms = self.timeout_ms;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

const SYNC_MILLIS: RangeInclusive<u64> = 500..=1500;

/// Pretends to sync a repository: sleeps a random while and fails with
/// probability `failure_rate`.
struct SyncJob {
    name: String,
    failure_rate: f64,
    rng: Arc<Mutex<StdRng>>,
}

#[async_trait]
impl Executable for SyncJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<(), ExecutionError> {
        let (millis, fail) = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| ExecutionError::failed("simulation rng poisoned"))?;
            (rng.gen_range(SYNC_MILLIS), rng.gen_bool(self.failure_rate))
        };
        tokio::time::sleep(Duration::from_millis(millis)).await;
        if fail {
            return Err(ExecutionError::failed(format!(
                "network error while syncing {} after {millis}ms",
                self.name
            )));
        }
        Ok(())
    }
}

struct Repo {
    name: &'static str,
    priority: i64,
    description: &'static str,
    tags: &'static [&'static str],
}

const REPOS: &[Repo] = &[
    Repo {
        name: "tokio",
        priority: 10,
        description: "async runtime",
        tags: &["rust", "async"],
    },
    Repo {
        name: "actix-web",
        priority: 8,
        description: "web framework",
        tags: &["rust", "web"],
    },
    Repo {
        name: "spindle",
        priority: 7,
        description: "this scheduler",
        tags: &["rust", "tooling"],
    },
    Repo {
        name: "fastapi-demo",
        priority: 5,
        description: "demo API",
        tags: &["python", "web"],
    },
    Repo {
        name: "react-native-app",
        priority: 3,
        description: "mobile client",
        tags: &["javascript", "mobile"],
    },
    Repo {
        name: "ml-notebooks",
        priority: 2,
        description: "experiments",
        tags: &["python", "data"],
    },
    Repo {
        name: "legacy-monolith",
        priority: 1,
        description: "old backend",
        tags: &["legacy"],
    },
    Repo {
        name: "dotfiles",
        priority: 0,
        description: "shell setup",
        tags: &["config"],
    },
];

/// `count` sync tasks cycling through the repository list; later rounds
/// get a numeric suffix.
fn sync_tasks(count: usize, failure_rate: f64, rng: &Arc<Mutex<StdRng>>) -> Vec<Task> {
    (0..count)
        .map(|i| {
            let repo = &REPOS[i % REPOS.len()];
            let round = i / REPOS.len();
            let name = match round {
                0 => repo.name.to_string(),
                n => format!("{}-{n}", repo.name),
            };
            let job = SyncJob {
                name: format!("sync-{name}"),
                failure_rate,
                rng: Arc::clone(rng),
            };
            Task::new(name, repo.priority, job)
                .with_description(repo.description)
                .with_tags(repo.tags.iter().copied())
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    anyhow::ensure!(
        (0.0..=1.0).contains(&cli.failure_rate),
        "--failure-rate must be within 0..=1, got {}",
        cli.failure_rate
    );
    let config = cli.scheduler_config()?;
    info!(
        max_concurrency = config.max_concurrency,
        attempts = config.retry.attempts,
        tasks = cli.tasks,
        "starting spindle"
    );

    let scheduler = Arc::new(
        Scheduler::builder()
            .config(&config)?
            .observer(Arc::new(TracingObserver))
            .build()?,
    );

    let rng = Arc::new(Mutex::new(match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }));
    for task in sync_tasks(cli.tasks, cli.failure_rate, &rng) {
        scheduler.submit(task)?;
    }

    let finished = scheduler.drain().await?;

    println!("{}", report::render_table(&finished));
    let summary = Summary::from_records(&finished);
    println!("{summary}");
    for (tag, counts) in &summary.by_tag {
        println!("  {tag:<12} {} completed, {} failed", counts.completed, counts.failed);
    }

    if let Some(path) = &cli.export {
        report::write_json(&finished, path)
            .with_context(|| format!("exporting report to {}", path.display()))?;
    }
    Ok(())
}
