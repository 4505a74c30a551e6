//! Command-line front end for the pronunciation coach.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the progress store, the speech gateway and the word pools.
//! 5. Run the requested subcommand and print its result as JSON.
//!
//! Ctrl-C cancels an in-flight submission without touching progress.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use pronunciation_coach::coach::{CoachService, WordPools};
use pronunciation_coach::config::{AppConfig, AppPaths, StoreBackend};
use pronunciation_coach::gateway::{AudioClip, EnvSecretStore, HttpGateway};
use pronunciation_coach::store::{InMemoryProgressStore, JsonFileProgressStore, ProgressStore};
use pronunciation_coach::CoachError;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "pronunciation-coach", version, about = "Pronunciation calibration and practice")]
struct Cli {
    /// Settings file (defaults to the platform config dir).  Word pools and
    /// progress then default to the same directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Enrol a learner and start calibration.
    Enroll {
        learner: String,
        /// Target language (defaults to `words.default_language`).
        #[arg(long)]
        language: Option<String>,
    },
    /// Show the learner's current word, band and mode.
    Current { learner: String },
    /// Submit a recorded attempt at the current word.
    Submit {
        learner: String,
        /// Audio file; MIME type is guessed from the extension.
        #[arg(long)]
        audio: PathBuf,
        /// Idempotency key; resubmitting a key replays the first result.
        #[arg(long)]
        key: Option<String>,
    },
    /// Retry word selection for a learner left without a word.
    NextWord { learner: String },
    /// Restart calibration (admin).
    Reset { learner: String },
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn build_service(config: &AppConfig, paths: &AppPaths) -> Result<CoachService> {
    let store: Arc<dyn ProgressStore> = match config.store.backend {
        StoreBackend::Memory => {
            log::warn!("Using in-memory progress store; nothing will be saved");
            Arc::new(InMemoryProgressStore::new())
        }
        StoreBackend::File => {
            let dir = config.progress_dir(paths);
            log::info!("Progress directory: {}", dir.display());
            Arc::new(JsonFileProgressStore::new(dir))
        }
    };

    let gateway = HttpGateway::from_config(&config.gateway, Arc::new(EnvSecretStore));
    let words = WordPools::load_from(&config.word_pools_file(paths))?;

    Ok(CoachService::new(config, store, Arc::new(gateway), words))
}

async fn run(command: Command, coach: &CoachService) -> Result<serde_json::Value> {
    let value = match command {
        Command::Enroll { learner, language } => {
            let language = language.unwrap_or_else(|| coach.default_language().to_string());
            let progress = coach.enroll_learner(&learner, &language).await?;
            serde_json::to_value(progress)?
        }

        Command::Current { learner } => serde_json::to_value(coach.get_current_item(&learner).await?)?,

        Command::Submit { learner, audio, key } => {
            let clip = AudioClip::from_file(&audio)
                .with_context(|| format!("reading audio from {}", audio.display()))?;
            let key = key.unwrap_or_else(|| format!("cli-{}", chrono::Utc::now().to_rfc3339()));

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupted; cancelling submission");
                    on_ctrl_c.cancel();
                }
            });

            let outcome = coach
                .submit_attempt_cancellable(&learner, clip, &key, &cancel)
                .await?;
            json!({
                "idempotency_key": key,
                "replayed": outcome.replayed,
                "action": outcome.action,
                "diagnosis": outcome.diagnosis,
                "current": pronunciation_coach::progression::current_item(&outcome.progress),
                "word_error": outcome.word_error.as_ref().map(|e| json!({
                    "kind": e.kind(),
                    "message": e.user_message(),
                })),
            })
        }

        Command::NextWord { learner } => {
            let progress = coach.select_next_word(&learner).await?;
            serde_json::to_value(pronunciation_coach::progression::current_item(&progress))?
        }

        Command::Reset { learner } => serde_json::to_value(coach.reset_calibration(&learner).await?)?,
    };
    Ok(value)
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match try_main(cli) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Err(e) => {
            let body = match e.downcast_ref::<CoachError>() {
                Some(coach_err) => {
                    log::error!("{coach_err}");
                    json!({ "error": coach_err.kind(), "message": coach_err.user_message() })
                }
                None => {
                    log::error!("{e:#}");
                    json!({ "error": "internal", "message": format!("{e:#}") })
                }
            };
            eprintln!("{body}");
            ExitCode::FAILURE
        }
    }
}

fn try_main(cli: Cli) -> Result<serde_json::Value> {
    // 2. Configuration
    let (config, paths) = match &cli.config {
        Some(path) => {
            let config = AppConfig::load_from(path)
                .with_context(|| format!("loading config from {}", path.display()))?;
            let root = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            (config, AppPaths::under(root))
        }
        None => {
            let config = AppConfig::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config ({e}); using defaults");
                AppConfig::default()
            });
            (config, AppPaths::new())
        }
    };

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Service
    let coach = build_service(&config, &paths)?;

    // 5. Command
    rt.block_on(run(cli.command, &coach))
}
