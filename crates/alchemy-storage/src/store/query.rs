use alchemy_core::{Interaction, InteractionAction, Phase, Prompt};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::Store;
use crate::error::Result;

/// A prompt returned from semantic search, paired with its similarity
/// to the query embedding.
#[derive(Debug, Clone)]
pub struct SemanticSearchResult {
    pub prompt: Prompt,
    pub similarity: f32,
}

/// Narrows a `search_prompts` call to a subset of stored prompts.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub session_id: Option<Uuid>,
    pub phase: Option<Phase>,
    pub tags: Vec<String>,
}

/// Counts of embedded vs. un-embedded prompts, for observability.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddingStats {
    pub total_prompts: u64,
    pub embedded_prompts: u64,
    pub indexed_vectors: u64,
}

impl Store {
    /// Finds the `limit` prompts whose embeddings are most similar to
    /// `query_embedding`, applying `filter` as a post-search narrowing
    /// pass (the HNSW index itself is not filter-aware).
    pub async fn semantic_search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SemanticSearchResult>> {
        // Over-fetch so filtering afterward still leaves `limit` results
        // when a filter excludes some of the nearest neighbors.
        let fetch_n = (limit * 4).max(limit);
        let hits = self.vectors.search(query_embedding, fetch_n)?;

        let mut out = Vec::with_capacity(limit);
        for hit in hits {
            if out.len() >= limit {
                break;
            }
            let Some(prompt) = self.get_prompt(hit.prompt_id).await? else { continue };
            if !Self::matches_filter(&prompt, filter) {
                continue;
            }
            out.push(SemanticSearchResult { prompt, similarity: hit.score });
        }
        Ok(out)
    }

    /// Lists prompts matching `filter` with no similarity ranking,
    /// ordered most-recent first; for browsing rather than search.
    pub async fn filtered_prompts(&self, filter: &SearchFilter, limit: usize) -> Result<Vec<Prompt>> {
        let candidates = match filter.session_id {
            Some(session_id) => self.get_prompts_by_session(session_id).await?,
            None => self.list_recent_prompts(limit * 4).await?,
        };

        Ok(candidates
            .into_iter()
            .filter(|p| Self::matches_filter(p, filter))
            .take(limit)
            .collect())
    }

    async fn list_recent_prompts(&self, limit: usize) -> Result<Vec<Prompt>> {
        let rows = sqlx::query(
            "SELECT id, session_id, phase, content, original_input, tags,
                    embedding, embedding_model, embedding_dim,
                    generation_provider, generation_model, processing_ms,
                    input_tokens, output_tokens, total_tokens, cost,
                    temperature, max_tokens, actual_tokens, score,
                    context_snippets, created_at, updated_at
             FROM prompts ORDER BY created_at DESC LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_prompt).collect()
    }

    fn matches_filter(prompt: &Prompt, filter: &SearchFilter) -> bool {
        if let Some(session_id) = filter.session_id {
            if prompt.session_id != session_id {
                return false;
            }
        }
        if let Some(phase) = filter.phase {
            if prompt.phase != phase {
                return false;
            }
        }
        if !filter.tags.is_empty() && !filter.tags.iter().any(|t| prompt.tags.contains(t)) {
            return false;
        }
        true
    }

    /// Reports how much of the store's content is embedded and indexed;
    /// a gap between `total_prompts` and `indexed_vectors` usually means
    /// embeddings were added after `migrate_legacy_embeddings` last ran,
    /// or the embedding provider was unavailable at generation time.
    pub async fn embedding_stats(&self) -> Result<EmbeddingStats> {
        let total_prompts = self.prompt_count().await?;
        let row = sqlx::query("SELECT COUNT(*) as n FROM prompts WHERE embedding IS NOT NULL")
            .fetch_one(&self.pool)
            .await?;
        let embedded_prompts = sqlx::Row::try_get::<i64, _>(&row, "n")? as u64;

        Ok(EmbeddingStats {
            total_prompts,
            embedded_prompts,
            indexed_vectors: self.vectors.len() as u64,
        })
    }

    /// Scans for prompts with a stored embedding that never made it into
    /// the vector index (e.g. the index file was deleted, or a prior
    /// run crashed between the SQLite write and the index write) and
    /// backfills them. Returns how many were reindexed.
    pub async fn reindex_missing_embeddings(&self) -> Result<u64> {
        let rows = sqlx::query(
            "SELECT id, embedding FROM prompts WHERE embedding IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut reindexed = 0u64;
        for row in rows {
            let id_str: String = sqlx::Row::try_get(&row, "id")?;
            let Ok(id) = Uuid::parse_str(&id_str) else { continue };
            if self.vectors.contains(id) {
                continue;
            }
            let embedding_json: String = sqlx::Row::try_get(&row, "embedding")?;
            let embedding: Vec<f32> = serde_json::from_str(&embedding_json)?;
            if embedding.len() != self.embedding_dimensions() {
                continue;
            }
            self.vectors.add(id, &embedding)?;
            reindexed += 1;
        }
        Ok(reindexed)
    }

    /// For every prompt whose `(embedding_model, embedding_dim)` disagrees
    /// with `(target_model, target_dim)`, clears its vector from both
    /// SQLite and the vector index so the engine re-embeds it on next
    /// touch. Idempotent: a prompt already at the target is left alone.
    /// Processes in batches of `batch_size` so a large migration doesn't
    /// hold one giant transaction open.
    pub async fn migrate_legacy_embeddings(
        &self,
        target_model: &str,
        target_dim: usize,
        batch_size: usize,
    ) -> Result<u64> {
        let batch_size = batch_size.max(1);
        let mut cleared = 0u64;

        loop {
            let rows = sqlx::query(
                "SELECT id FROM prompts
                 WHERE embedding IS NOT NULL
                   AND (embedding_model IS NOT ?1 OR embedding_dim IS NOT ?2)
                 LIMIT ?3",
            )
            .bind(target_model)
            .bind(target_dim as i64)
            .bind(batch_size as i64)
            .fetch_all(&self.pool)
            .await?;

            if rows.is_empty() {
                break;
            }

            for row in &rows {
                let id_str: String = sqlx::Row::try_get(row, "id")?;
                let Ok(id) = Uuid::parse_str(&id_str) else { continue };

                sqlx::query(
                    "UPDATE prompts SET embedding = NULL, embedding_model = NULL, embedding_dim = NULL WHERE id = ?1",
                )
                .bind(&id_str)
                .execute(&self.pool)
                .await?;

                if self.vectors.contains(id) {
                    self.vectors.remove(id)?;
                }
                cleared += 1;
            }

            if rows.len() < batch_size {
                break;
            }
        }

        Ok(cleared)
    }

    /// Prompts ordered by mean effectiveness, then usage count, then
    /// recency — the ranking `historical_score` and history enhancement
    /// both draw from.
    pub async fn get_high_quality_historical(&self, limit: usize) -> Result<Vec<Prompt>> {
        let rows = sqlx::query(
            "SELECT p.id, p.session_id, p.phase, p.content, p.original_input, p.tags,
                    p.embedding, p.embedding_model, p.embedding_dim,
                    p.generation_provider, p.generation_model, p.processing_ms,
                    p.input_tokens, p.output_tokens, p.total_tokens, p.cost,
                    p.temperature, p.max_tokens, p.actual_tokens, p.score,
                    p.context_snippets, p.created_at, p.updated_at
             FROM prompts p
             JOIN (
                 SELECT prompt_id, AVG(effectiveness) as effectiveness_avg, COUNT(*) as usage_count
                 FROM usage_analytics GROUP BY prompt_id
             ) a ON a.prompt_id = p.id
             ORDER BY a.effectiveness_avg DESC, a.usage_count DESC, p.created_at DESC
             LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_prompt).collect()
    }

    /// Every interaction recorded at or after `since`, oldest first; the
    /// learning engine's watermark query.
    pub async fn interactions_since(&self, since: DateTime<Utc>) -> Result<Vec<Interaction>> {
        let rows = sqlx::query(
            "SELECT id, prompt_id, session_id, action, rating, created_at
             FROM interactions WHERE created_at >= ?1 ORDER BY created_at",
        )
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id")?;
                let prompt_id: String = row.try_get("prompt_id")?;
                let session_id: String = row.try_get("session_id")?;
                let action: String = row.try_get("action")?;
                let created_at: String = row.try_get("created_at")?;
                Ok(Interaction {
                    id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
                    prompt_id: Uuid::parse_str(&prompt_id).unwrap_or_else(|_| Uuid::nil()),
                    session_id: Uuid::parse_str(&session_id).unwrap_or_else(|_| Uuid::nil()),
                    action: InteractionAction::from_str_lossy(&action),
                    rating: row.try_get::<Option<i64>, _>("rating")?.map(|r| r as u8),
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .collect()
    }
}
