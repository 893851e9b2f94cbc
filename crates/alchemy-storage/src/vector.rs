//! HNSW vector index over prompt embeddings, backed by `usearch`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use usearch::ffi::{IndexOptions, MetricKind, ScalarKind};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MetricType {
    #[default]
    Cosine,
    L2,
    InnerProduct,
}

impl MetricType {
    fn to_usearch(self) -> MetricKind {
        match self {
            MetricType::Cosine => MetricKind::Cos,
            MetricType::L2 => MetricKind::L2sq,
            MetricType::InnerProduct => MetricKind::IP,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub dimensions: usize,
    pub metric: MetricType,
    pub connectivity: usize,
    pub expansion_add: usize,
    pub expansion_search: usize,
    pub capacity: usize,
}

impl IndexConfig {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            metric: MetricType::Cosine,
            connectivity: 16,
            expansion_add: 128,
            expansion_search: 64,
            capacity: 10_000,
        }
    }

    fn to_usearch_options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimensions,
            metric: self.metric.to_usearch(),
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub prompt_id: Uuid,
    /// Similarity in `[0, 1]` for cosine, monotonically decreasing with
    /// distance for the other two metrics.
    pub score: f32,
    pub distance: f32,
}

/// HNSW index over prompt embeddings, keyed by prompt id.
pub struct VectorIndex {
    index: usearch::Index,
    id_to_key: RwLock<HashMap<Uuid, u64>>,
    key_to_id: RwLock<HashMap<u64, Uuid>>,
    next_key: AtomicU64,
    config: IndexConfig,
    path: Option<PathBuf>,
}

impl VectorIndex {
    pub fn new(config: IndexConfig) -> Result<Self> {
        let index = usearch::Index::new(&config.to_usearch_options())
            .map_err(|e| Error::Index(format!("failed to create index: {e}")))?;
        index
            .reserve(config.capacity)
            .map_err(|e| Error::Index(format!("failed to reserve capacity: {e}")))?;

        info!(
            dims = config.dimensions,
            metric = ?config.metric,
            capacity = config.capacity,
            "created vector index"
        );

        Ok(Self {
            index,
            id_to_key: RwLock::new(HashMap::new()),
            key_to_id: RwLock::new(HashMap::new()),
            next_key: AtomicU64::new(1),
            config,
            path: None,
        })
    }

    /// Opens a persisted index at `path`, or creates a fresh one if no
    /// index file exists there yet.
    pub fn open(path: &Path, config: IndexConfig) -> Result<Self> {
        let index_path = path.with_extension("usearch");
        let mapping_path = path.with_extension("mapping.json");

        if index_path.exists() && mapping_path.exists() {
            info!(path = %index_path.display(), "loading existing vector index");
            return Self::load(&index_path, &mapping_path, config);
        }

        let mut index = Self::new(config)?;
        index.path = Some(path.to_path_buf());
        Ok(index)
    }

    fn load(index_path: &Path, mapping_path: &Path, config: IndexConfig) -> Result<Self> {
        let index = usearch::Index::new(&config.to_usearch_options())
            .map_err(|e| Error::Index(format!("failed to create index: {e}")))?;

        let path_str = index_path
            .to_str()
            .ok_or_else(|| Error::Index("invalid path encoding for index".to_string()))?;
        index.load(path_str).map_err(|e| Error::Index(format!("failed to load index: {e}")))?;

        let mapping_content = std::fs::read_to_string(mapping_path)?;
        let mapping: IdMapping = serde_json::from_str(&mapping_content)?;

        let id_to_key: HashMap<Uuid, u64> = mapping.mappings.iter().cloned().collect();
        let key_to_id: HashMap<u64, Uuid> =
            mapping.mappings.into_iter().map(|(k, v)| (v, k)).collect();
        let next_key = mapping.next_key;

        info!(count = id_to_key.len(), path = %index_path.display(), "loaded vector index");

        Ok(Self {
            index,
            id_to_key: RwLock::new(id_to_key),
            key_to_id: RwLock::new(key_to_id),
            next_key: AtomicU64::new(next_key),
            config,
            path: Some(index_path.with_extension("")),
        })
    }

    #[instrument(skip(self))]
    pub fn save(&self) -> Result<()> {
        let path =
            self.path.as_ref().ok_or_else(|| Error::Index("no path set for index".to_string()))?;

        let index_path = path.with_extension("usearch");
        let mapping_path = path.with_extension("mapping.json");

        let index_path_str = index_path
            .to_str()
            .ok_or_else(|| Error::Index("invalid path encoding for index".to_string()))?;
        self.index
            .save(index_path_str)
            .map_err(|e| Error::Index(format!("failed to save index: {e}")))?;

        let id_to_key = self.id_to_key.read().unwrap_or_else(|e| e.into_inner());
        let mapping = IdMapping {
            mappings: id_to_key.iter().map(|(k, v)| (*k, *v)).collect(),
            next_key: self.next_key.load(Ordering::SeqCst),
        };

        std::fs::write(&mapping_path, serde_json::to_string_pretty(&mapping)?)?;
        info!(count = id_to_key.len(), path = %index_path.display(), "saved vector index");
        Ok(())
    }

    #[instrument(skip(self, vector), fields(id = %id, len = vector.len()))]
    pub fn add(&self, id: Uuid, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimensions {
            return Err(Error::DimensionMismatch { expected: self.config.dimensions, actual: vector.len() });
        }

        {
            let id_to_key = self.id_to_key.read().unwrap_or_else(|e| e.into_inner());
            if id_to_key.contains_key(&id) {
                return Err(Error::AlreadyExists(id.to_string()));
            }
        }

        let key = self.next_key.fetch_add(1, Ordering::SeqCst);

        if self.index.size() >= self.index.capacity() {
            let new_cap = std::cmp::max(self.index.capacity() * 2, 64);
            self.index
                .reserve(new_cap)
                .map_err(|e| Error::Index(format!("failed to expand capacity: {e}")))?;
        }

        self.index.add(key, vector).map_err(|e| Error::Index(format!("failed to add vector: {e}")))?;

        {
            let mut id_to_key = self.id_to_key.write().unwrap_or_else(|e| e.into_inner());
            let mut key_to_id = self.key_to_id.write().unwrap_or_else(|e| e.into_inner());
            id_to_key.insert(id, key);
            key_to_id.insert(key, id);
        }

        debug!(id = %id, key, "added vector");
        Ok(())
    }

    /// Replaces the vector for `id`, or inserts it if absent.
    pub fn update(&self, id: Uuid, vector: &[f32]) -> Result<()> {
        if self.contains(id) {
            self.remove(id)?;
        }
        self.add(id, vector)
    }

    pub fn remove(&self, id: Uuid) -> Result<()> {
        let key = {
            let id_to_key = self.id_to_key.read().unwrap_or_else(|e| e.into_inner());
            *id_to_key.get(&id).ok_or_else(|| Error::NotFound(id.to_string()))?
        };

        self.index.remove(key).map_err(|e| Error::Index(format!("failed to remove vector: {e}")))?;

        {
            let mut id_to_key = self.id_to_key.write().unwrap_or_else(|e| e.into_inner());
            let mut key_to_id = self.key_to_id.write().unwrap_or_else(|e| e.into_inner());
            id_to_key.remove(&id);
            key_to_id.remove(&key);
        }

        debug!(id = %id, "removed vector");
        Ok(())
    }

    #[instrument(skip(self, query), fields(len = query.len(), top_k))]
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>> {
        if query.len() != self.config.dimensions {
            return Err(Error::DimensionMismatch { expected: self.config.dimensions, actual: query.len() });
        }

        let results = self
            .index
            .search(query, top_k)
            .map_err(|e| Error::Index(format!("search failed: {e}")))?;

        let key_to_id = self.key_to_id.read().unwrap_or_else(|e| e.into_inner());
        let out = results
            .keys
            .iter()
            .zip(results.distances.iter())
            .filter_map(|(key, distance)| {
                let id = key_to_id.get(key)?;
                let score = match self.config.metric {
                    MetricType::Cosine => 1.0 - distance,
                    MetricType::L2 => 1.0 / (1.0 + distance),
                    MetricType::InnerProduct => *distance,
                };
                Some(VectorSearchResult { prompt_id: *id, score, distance: *distance })
            })
            .collect();

        Ok(out)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.id_to_key.read().unwrap_or_else(|e| e.into_inner()).contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.id_to_key.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.id_to_key.read().unwrap_or_else(|e| e.into_inner()).keys().copied().collect()
    }

    pub fn clear(&self) -> Result<()> {
        let keys: Vec<u64> = self.key_to_id.read().unwrap_or_else(|e| e.into_inner()).keys().copied().collect();
        for key in keys {
            if let Err(e) = self.index.remove(key) {
                warn!(key, error = %e, "failed to remove key during clear");
            }
        }
        self.id_to_key.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.key_to_id.write().unwrap_or_else(|e| e.into_inner()).clear();
        info!("cleared vector index");
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IdMapping {
    mappings: Vec<(Uuid, u64)>,
    next_key: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> VectorIndex {
        VectorIndex::new(IndexConfig::new(4)).unwrap()
    }

    #[test]
    fn add_and_search_returns_nearest_first() {
        let idx = index();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        idx.add(a, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        idx.add(b, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        idx.add(c, &[0.9, 0.1, 0.0, 0.0]).unwrap();

        let results = idx.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results[0].prompt_id, a);
    }

    #[test]
    fn remove_drops_from_index() {
        let idx = index();
        let id = Uuid::new_v4();
        idx.add(id, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(idx.contains(id));
        idx.remove(id).unwrap();
        assert!(!idx.contains(id));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let idx = index();
        let result = idx.add(Uuid::new_v4(), &[1.0, 0.0, 0.0]);
        assert!(matches!(result, Err(Error::DimensionMismatch { expected: 4, actual: 3 })));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let idx = index();
        let id = Uuid::new_v4();
        idx.add(id, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(matches!(idx.add(id, &[0.0, 1.0, 0.0, 0.0]), Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn update_replaces_existing_vector() {
        let idx = index();
        let id = Uuid::new_v4();
        idx.add(id, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        idx.update(id, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        let results = idx.search(&[0.0, 1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].prompt_id, id);
    }
}
