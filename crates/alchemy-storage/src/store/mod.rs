//! `Store` — SQLite persistence for prompts, interactions, relationships
//! and usage analytics, paired with an HNSW index over prompt embeddings.

use std::path::Path;
use std::sync::Arc;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::vector::{IndexConfig, VectorIndex};

mod crud;
mod migrations;
mod query;

#[cfg(test)]
mod tests;

pub use query::{EmbeddingStats, SearchFilter, SemanticSearchResult};

/// Combined SQLite + vector-index persistence layer.
#[derive(Clone)]
pub struct Store {
    pub(crate) pool: SqlitePool,
    pub(crate) vectors: Arc<VectorIndex>,
}

impl Store {
    /// Opens (or creates) a store at `db_path`, with a vector index
    /// persisted alongside it at `db_path` with a `.usearch` extension.
    pub async fn open(db_path: &Path, embedding_dimensions: usize) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new().max_connections(5).connect(&url).await?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;

        let store = Self {
            pool,
            vectors: Arc::new(VectorIndex::open(db_path, IndexConfig::new(embedding_dimensions))?),
        };
        store.run_migrations().await?;
        info!(path = %db_path.display(), "storage engine initialized");
        Ok(store)
    }

    /// In-memory store for tests; the vector index is also in-memory and
    /// `save`/`load` are no-ops for it.
    pub async fn in_memory(embedding_dimensions: usize) -> Result<Self> {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await?;
        let store = Self { pool, vectors: Arc::new(VectorIndex::new(IndexConfig::new(embedding_dimensions))?) };
        store.run_migrations().await?;
        debug!("in-memory storage engine initialized");
        Ok(store)
    }

    /// Flushes the vector index to disk; a no-op if the store has no
    /// backing path (i.e. `in_memory`).
    pub fn checkpoint(&self) -> Result<()> {
        match self.vectors.save() {
            Ok(()) => Ok(()),
            Err(Error::Index(msg)) if msg.contains("no path set") => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn embedding_dimensions(&self) -> usize {
        self.vectors.config().dimensions
    }
}
