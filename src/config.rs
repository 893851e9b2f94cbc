//! Process configuration: a plain record built once at startup from
//! defaults plus `PROMPT_ALCHEMY_`-prefixed environment variables (§6),
//! then handed to every component rather than read back out of a global.
//! Grounded on the teacher's `server::loader::load_config` (`config`
//! crate, `Environment::with_prefix`), trimmed to what this workspace
//! actually needs: the rest of the teacher's layered TOML file sources
//! are CLI/config-loading machinery §1 places out of core scope.

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment};
use serde::Deserialize;

/// Process-wide configuration, constructed once in `main` and passed by
/// reference/`Arc` into the HTTP server, the RPC server, and the
/// learning job.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the SQLite store and the ranker weights file.
    pub data_dir: PathBuf,
    /// File name of the SQLite store within `data_dir`.
    pub db_file: String,
    /// Dimensionality new embeddings must match (§3's invariant that
    /// `(embedding_model, embedding_dim)` is constant per store).
    pub embedding_dimensions: usize,
    pub http: HttpConfig,
    /// How far back the learning job reads interactions on its first
    /// run, if no prior watermark is recorded.
    pub learning_lookback_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// §4.9's "wait ≤ configured timeout for in-flight requests" on
    /// graceful shutdown.
    pub shutdown_timeout_secs: u64,
    /// Semaphore size bounding concurrent generations (§5 "backpressure").
    pub max_concurrent_generations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file: "prompts.db".to_string(),
            embedding_dimensions: 1536,
            http: HttpConfig::default(),
            learning_lookback_days: 30,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            shutdown_timeout_secs: 30,
            max_concurrent_generations: 100,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir().or_else(dirs::home_dir).map(|p| p.join("prompt-alchemy")).unwrap_or_else(|| PathBuf::from(".prompt-alchemy"))
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    pub fn ranker_weights_path(&self) -> PathBuf {
        self.data_dir.join("ranker_weights.toml")
    }

    /// Loads defaults overlaid with `PROMPT_ALCHEMY_*` environment
    /// variables (e.g. `PROMPT_ALCHEMY_HTTP_PORT=9000`,
    /// `PROMPT_ALCHEMY_DATA_DIR=/var/lib/prompt-alchemy`).
    pub fn load() -> anyhow::Result<Self> {
        let defaults = Config::default();
        let built = ConfigBuilder::builder()
            .set_default("data_dir", defaults.data_dir.to_string_lossy().to_string())?
            .set_default("db_file", defaults.db_file.clone())?
            .set_default("embedding_dimensions", defaults.embedding_dimensions as i64)?
            .set_default("learning_lookback_days", defaults.learning_lookback_days)?
            .set_default("http.host", defaults.http.host.clone())?
            .set_default("http.port", defaults.http.port as i64)?
            .set_default("http.shutdown_timeout_secs", defaults.http.shutdown_timeout_secs as i64)?
            .set_default("http.max_concurrent_generations", defaults.http.max_concurrent_generations as i64)?
            .add_source(Environment::with_prefix("PROMPT_ALCHEMY").prefix_separator("_").separator("__").try_parsing(true))
            .build()?;

        Ok(built.try_deserialize()?)
    }
}
