use std::collections::HashSet;

use alchemy_core::{
    Interaction, InteractionAction, Phase, Prompt, Relationship, RelationshipKind, UsageAnalytics,
};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::Store;
use crate::error::Result;

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

impl Store {
    // ── Prompts ─────────────────────────────────────────────────

    /// Inserts a prompt and, if it carries an embedding, adds it to the
    /// vector index too. Both writes happen before returning so callers
    /// never observe a prompt that's in SQLite but unsearchable.
    ///
    /// Rejects an embedding whose length doesn't match the store's
    /// configured dimension before touching either table, so a mismatched
    /// write leaves the store byte-for-byte unchanged.
    pub async fn insert_prompt(&self, prompt: &Prompt) -> Result<()> {
        if let Some(embedding) = &prompt.embedding {
            let expected = self.embedding_dimensions();
            if embedding.len() != expected {
                return Err(crate::error::Error::DimensionMismatch { expected, actual: embedding.len() });
            }
        }

        let tags_str = prompt.tags.iter().cloned().collect::<Vec<_>>().join(",");
        let embedding_json = match &prompt.embedding {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };
        let context_snippets_json = serde_json::to_string(&prompt.context_snippets)?;

        sqlx::query(
            "INSERT OR REPLACE INTO prompts
             (id, session_id, phase, content, original_input, tags,
              embedding, embedding_model, embedding_dim,
              generation_provider, generation_model, processing_ms,
              input_tokens, output_tokens, total_tokens, cost,
              temperature, max_tokens, actual_tokens, score,
              context_snippets, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
        )
        .bind(prompt.id.to_string())
        .bind(prompt.session_id.to_string())
        .bind(prompt.phase.to_string())
        .bind(&prompt.content)
        .bind(&prompt.original_input)
        .bind(tags_str)
        .bind(embedding_json)
        .bind(&prompt.embedding_model)
        .bind(prompt.embedding_dim.map(|d| d as i64))
        .bind(&prompt.model_metadata.generation_provider)
        .bind(&prompt.model_metadata.generation_model)
        .bind(prompt.model_metadata.processing_ms as i64)
        .bind(prompt.model_metadata.input_tokens as i64)
        .bind(prompt.model_metadata.output_tokens as i64)
        .bind(prompt.model_metadata.total_tokens as i64)
        .bind(prompt.model_metadata.cost)
        .bind(prompt.temperature)
        .bind(prompt.max_tokens as i64)
        .bind(prompt.actual_tokens as i64)
        .bind(prompt.score)
        .bind(context_snippets_json)
        .bind(prompt.created_at.to_rfc3339())
        .bind(prompt.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        if let Some(embedding) = &prompt.embedding {
            if self.vectors.contains(prompt.id) {
                self.vectors.update(prompt.id, embedding)?;
            } else {
                self.vectors.add(prompt.id, embedding)?;
            }
        }

        Ok(())
    }

    pub async fn get_prompt(&self, id: Uuid) -> Result<Option<Prompt>> {
        let row = sqlx::query(
            "SELECT id, session_id, phase, content, original_input, tags,
                    embedding, embedding_model, embedding_dim,
                    generation_provider, generation_model, processing_ms,
                    input_tokens, output_tokens, total_tokens, cost,
                    temperature, max_tokens, actual_tokens, score,
                    context_snippets, created_at, updated_at
             FROM prompts WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_prompt).transpose()
    }

    pub async fn get_prompts_by_session(&self, session_id: Uuid) -> Result<Vec<Prompt>> {
        let rows = sqlx::query(
            "SELECT id, session_id, phase, content, original_input, tags,
                    embedding, embedding_model, embedding_dim,
                    generation_provider, generation_model, processing_ms,
                    input_tokens, output_tokens, total_tokens, cost,
                    temperature, max_tokens, actual_tokens, score,
                    context_snippets, created_at, updated_at
             FROM prompts WHERE session_id = ?1 ORDER BY created_at",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_prompt).collect()
    }

    pub async fn get_prompts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Prompt>> {
        let mut prompts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(prompt) = self.get_prompt(*id).await? {
                prompts.push(prompt);
            }
        }
        Ok(prompts)
    }

    pub async fn prompt_count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) as n FROM prompts").fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    pub(crate) fn row_to_prompt(row: &sqlx::sqlite::SqliteRow) -> Result<Prompt> {
        let phase_str: String = row.try_get("phase")?;
        let tags_str: String = row.try_get("tags")?;
        let embedding_json: Option<String> = row.try_get("embedding")?;
        let embedding: Option<Vec<f32>> =
            embedding_json.map(|s| serde_json::from_str(&s)).transpose()?;
        let context_snippets_json: String = row.try_get("context_snippets")?;
        let context_snippets: Vec<String> =
            serde_json::from_str(&context_snippets_json).unwrap_or_default();
        let created_str: String = row.try_get("created_at")?;
        let updated_str: String = row.try_get("updated_at")?;

        Ok(Prompt {
            id: parse_uuid(&row.try_get::<String, _>("id")?),
            session_id: parse_uuid(&row.try_get::<String, _>("session_id")?),
            phase: phase_str.parse().unwrap_or(Phase::PrimaMateria),
            content: row.try_get("content")?,
            original_input: row.try_get("original_input")?,
            tags: if tags_str.is_empty() {
                HashSet::new()
            } else {
                tags_str.split(',').map(|s| s.trim().to_string()).collect()
            },
            embedding,
            embedding_model: row.try_get("embedding_model")?,
            embedding_dim: row.try_get::<Option<i64>, _>("embedding_dim")?.map(|d| d as usize),
            model_metadata: alchemy_core::ModelMetadata {
                generation_provider: row.try_get("generation_provider")?,
                generation_model: row.try_get("generation_model")?,
                embedding_model: row.try_get("embedding_model")?,
                processing_ms: row.try_get::<i64, _>("processing_ms")? as u64,
                input_tokens: row.try_get::<i64, _>("input_tokens")? as u32,
                output_tokens: row.try_get::<i64, _>("output_tokens")? as u32,
                total_tokens: row.try_get::<i64, _>("total_tokens")? as u32,
                cost: row.try_get("cost")?,
            },
            temperature: row.try_get("temperature")?,
            max_tokens: row.try_get::<i64, _>("max_tokens")? as u32,
            actual_tokens: row.try_get::<i64, _>("actual_tokens")? as u32,
            score: row.try_get("score")?,
            context_snippets,
            created_at: parse_rfc3339(&created_str),
            updated_at: parse_rfc3339(&updated_str),
        })
    }

    // ── Interactions ────────────────────────────────────────────

    pub async fn insert_interaction(&self, interaction: &Interaction) -> Result<()> {
        sqlx::query(
            "INSERT INTO interactions (id, prompt_id, session_id, action, rating, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(interaction.id.to_string())
        .bind(interaction.prompt_id.to_string())
        .bind(interaction.session_id.to_string())
        .bind(interaction.action.to_string())
        .bind(interaction.rating.map(|r| r as i64))
        .bind(interaction.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_interactions_for_prompt(&self, prompt_id: Uuid) -> Result<Vec<Interaction>> {
        let rows = sqlx::query(
            "SELECT id, prompt_id, session_id, action, rating, created_at
             FROM interactions WHERE prompt_id = ?1 ORDER BY created_at",
        )
        .bind(prompt_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let action_str: String = row.try_get("action")?;
                let created_str: String = row.try_get("created_at")?;
                Ok(Interaction {
                    id: parse_uuid(&row.try_get::<String, _>("id")?),
                    prompt_id: parse_uuid(&row.try_get::<String, _>("prompt_id")?),
                    session_id: parse_uuid(&row.try_get::<String, _>("session_id")?),
                    action: InteractionAction::from_str_lossy(&action_str),
                    rating: row.try_get::<Option<i64>, _>("rating")?.map(|r| r as u8),
                    created_at: parse_rfc3339(&created_str),
                })
            })
            .collect()
    }

    // ── Relationships ───────────────────────────────────────────

    /// Records a relationship edge, validating both endpoints exist and
    /// `strength` is in `[0,1]` before writing; `(source, target, kind)`
    /// uniqueness is enforced by the table's unique index.
    pub async fn track_relationship(&self, relationship: &Relationship) -> Result<()> {
        if !(0.0..=1.0).contains(&relationship.strength) {
            return Err(crate::error::Error::InvalidArgument(format!(
                "relationship strength {} is out of range [0,1]",
                relationship.strength
            )));
        }
        if self.get_prompt(relationship.source_id).await?.is_none() {
            return Err(crate::error::Error::NotFound(format!(
                "prompt '{}'",
                relationship.source_id
            )));
        }
        if self.get_prompt(relationship.target_id).await?.is_none() {
            return Err(crate::error::Error::NotFound(format!(
                "prompt '{}'",
                relationship.target_id
            )));
        }
        self.insert_relationship(relationship).await
    }

    pub async fn insert_relationship(&self, relationship: &Relationship) -> Result<()> {
        sqlx::query(
            "INSERT INTO relationships (id, source_id, target_id, kind, strength, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(relationship.id.to_string())
        .bind(relationship.source_id.to_string())
        .bind(relationship.target_id.to_string())
        .bind(relationship.kind.to_string())
        .bind(relationship.strength)
        .bind(relationship.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_relationships_from(&self, source_id: Uuid) -> Result<Vec<Relationship>> {
        let rows = sqlx::query(
            "SELECT id, source_id, target_id, kind, strength, created_at
             FROM relationships WHERE source_id = ?1 ORDER BY created_at",
        )
        .bind(source_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_relationship).collect()
    }

    pub async fn get_relationships_to(&self, target_id: Uuid) -> Result<Vec<Relationship>> {
        let rows = sqlx::query(
            "SELECT id, source_id, target_id, kind, strength, created_at
             FROM relationships WHERE target_id = ?1 ORDER BY created_at",
        )
        .bind(target_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_relationship).collect()
    }

    fn row_to_relationship(row: &sqlx::sqlite::SqliteRow) -> Result<Relationship> {
        let kind_str: String = row.try_get("kind")?;
        let created_str: String = row.try_get("created_at")?;
        Ok(Relationship {
            id: parse_uuid(&row.try_get::<String, _>("id")?),
            source_id: parse_uuid(&row.try_get::<String, _>("source_id")?),
            target_id: parse_uuid(&row.try_get::<String, _>("target_id")?),
            kind: RelationshipKind::from_str_lossy(&kind_str),
            strength: row.try_get("strength")?,
            created_at: parse_rfc3339(&created_str),
        })
    }

    // ── Usage analytics ─────────────────────────────────────────

    /// Records one per-use effectiveness observation for a prompt.
    pub async fn record_usage(&self, usage: &UsageAnalytics) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_analytics
             (id, prompt_id, session_id, effectiveness, user_feedback, context, used_in_generation, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(usage.id.to_string())
        .bind(usage.prompt_id.to_string())
        .bind(usage.session_id.to_string())
        .bind(usage.effectiveness)
        .bind(usage.user_feedback.map(|r| r as i64))
        .bind(&usage.context)
        .bind(usage.used_in_generation as i64)
        .bind(usage.generated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mean `effectiveness` recorded for `prompt_id` across every use, or
    /// `None` if it has never been used. The ranker's `historical_score`
    /// falls back to `0.5` on `None`.
    pub async fn average_effectiveness(&self, prompt_id: Uuid) -> Result<Option<f32>> {
        let row = sqlx::query("SELECT AVG(effectiveness) as avg_effectiveness FROM usage_analytics WHERE prompt_id = ?1")
            .bind(prompt_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<Option<f64>, _>("avg_effectiveness")?.map(|v| v as f32))
    }
}
