//! `prompt-alchemy` — three-phase prompt generation, storage, and
//! ranking, exposed over a JSON-RPC tool server (C8) and an HTTP REST
//! API (C9).
//!
//! Exit codes (§6): 0 success, 1 generic failure, 2 configuration
//! error, 3 no providers available.

#![forbid(unsafe_code)]

use std::process::ExitCode;
use std::sync::Arc;

use alchemy_engine::PhaseEngine;
use alchemy_rpc::DispatcherDeps;
use alchemy_storage::Store;
use clap::Parser;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prompt_alchemy::cli::{Cli, Command};
use prompt_alchemy::config::Config;
use prompt_alchemy::http::{self, AppState};
use prompt_alchemy::metrics::Metrics;

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_NO_PROVIDERS: u8 = 3;

fn main() -> ExitCode {
    // All diagnostic output goes to stderr, never stdout — stdout is
    // reserved for JSON-RPC frames the moment the rpc transport runs, and
    // mixing the two is a contract violation per §4.8.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "prompt_alchemy=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let _ = dotenvy::dotenv();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    runtime.block_on(run())
}

async fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!(error = %e, dir = %config.data_dir.display(), "failed to create data directory");
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    let providers = Arc::new(alchemy_providers::registry_from_env());
    if providers.list().is_empty() {
        warn!("no completion providers registered from the environment");
        return ExitCode::from(EXIT_NO_PROVIDERS);
    }
    info!(providers = ?providers.list(), "provider registry initialized");

    let storage = match Store::open(&config.db_path(), config.embedding_dimensions).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "failed to open storage engine");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let weights = load_ranker_weights(&config.ranker_weights_path());

    let engine = Arc::new(PhaseEngine::new(providers.clone()).with_storage(storage.clone()).with_weights(weights));

    let deps = DispatcherDeps { engine: engine.clone(), storage: storage.clone(), providers: providers.clone() };

    let result = match cli.command.unwrap_or_default() {
        Command::Serve => run_both(config, engine, storage, providers, deps).await,
        Command::Rpc => alchemy_rpc::serve_stdio(deps).await.map_err(anyhow::Error::from),
        Command::Http => http::serve(app_state(config, engine, storage, providers)).await.map_err(anyhow::Error::from),
        Command::Learn => run_learning_job(&config, &storage).await,
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            error!(error = %e, "fatal error");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run_both(
    config: Config,
    engine: Arc<PhaseEngine>,
    storage: Arc<Store>,
    providers: Arc<alchemy_providers::ProviderRegistry>,
    deps: DispatcherDeps,
) -> anyhow::Result<()> {
    let state = app_state(config, engine, storage, providers);
    let http_handle = tokio::spawn(http::serve(state));

    // The rpc transport reads stdin on the main task; it returns once
    // stdin closes (e.g. the parent agent process exits), at which point
    // the http server is stopped too rather than orphaned.
    let rpc_result = alchemy_rpc::serve_stdio(deps).await;
    http_handle.abort();

    rpc_result.map_err(anyhow::Error::from)
}

fn app_state(
    config: Config,
    engine: Arc<PhaseEngine>,
    storage: Arc<Store>,
    providers: Arc<alchemy_providers::ProviderRegistry>,
) -> AppState {
    let config = Arc::new(config);
    AppState {
        generation_limiter: Arc::new(Semaphore::new(config.http.max_concurrent_generations)),
        engine,
        storage,
        providers,
        metrics: Arc::new(Metrics::default()),
        config,
        started_at: std::time::Instant::now(),
    }
}

fn load_ranker_weights(path: &std::path::Path) -> alchemy_core::RankingWeights {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(weights) => weights,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to parse ranker weights file, using defaults");
                alchemy_core::RankingWeights::default()
            }
        },
        Err(_) => alchemy_core::RankingWeights::default(),
    }
}

async fn run_learning_job(config: &Config, storage: &Store) -> anyhow::Result<()> {
    let current = load_ranker_weights(&config.ranker_weights_path());
    let since = chrono::Utc::now() - chrono::Duration::days(config.learning_lookback_days);
    let report = alchemy_engine::learn_once_and_persist(storage, since, &current, &config.ranker_weights_path()).await?;

    if report.updated {
        info!(pairs_used = report.pairs_used, weights = ?report.weights, "ranker weights updated");
    } else {
        info!(pairs_used = report.pairs_used, "learning run was a no-op, not enough training pairs");
    }
    Ok(())
}
