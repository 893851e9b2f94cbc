//! SQLite-backed prompt storage paired with an HNSW vector index.

pub mod error;
pub mod store;
pub mod vector;

pub use error::{Error, Result};
pub use store::{EmbeddingStats, SearchFilter, SemanticSearchResult, Store};
pub use vector::{IndexConfig, MetricType, VectorIndex, VectorSearchResult};
