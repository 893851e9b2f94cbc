use super::Store;
use crate::error::Result;

impl Store {
    pub(crate) async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS prompts (
                id                  TEXT PRIMARY KEY,
                session_id          TEXT NOT NULL,
                phase               TEXT NOT NULL,
                content             TEXT NOT NULL,
                original_input      TEXT NOT NULL,
                tags                TEXT NOT NULL DEFAULT '',
                embedding           BLOB,
                embedding_model     TEXT,
                embedding_dim       INTEGER,
                generation_provider TEXT NOT NULL,
                generation_model    TEXT NOT NULL,
                processing_ms       INTEGER NOT NULL DEFAULT 0,
                input_tokens        INTEGER NOT NULL DEFAULT 0,
                output_tokens       INTEGER NOT NULL DEFAULT 0,
                total_tokens        INTEGER NOT NULL DEFAULT 0,
                cost                REAL NOT NULL DEFAULT 0.0,
                temperature         REAL NOT NULL DEFAULT 0.7,
                max_tokens          INTEGER NOT NULL DEFAULT 0,
                actual_tokens       INTEGER NOT NULL DEFAULT 0,
                score               REAL,
                context_snippets    TEXT NOT NULL DEFAULT '[]',
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_prompts_session ON prompts(session_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_prompts_phase ON prompts(phase)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS interactions (
                id          TEXT PRIMARY KEY,
                prompt_id   TEXT NOT NULL REFERENCES prompts(id),
                session_id  TEXT NOT NULL,
                action      TEXT NOT NULL,
                rating      INTEGER,
                created_at  TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_interactions_prompt ON interactions(prompt_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS relationships (
                id          TEXT PRIMARY KEY,
                source_id   TEXT NOT NULL REFERENCES prompts(id),
                target_id   TEXT NOT NULL REFERENCES prompts(id),
                kind        TEXT NOT NULL,
                strength    REAL NOT NULL,
                created_at  TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_relationships_unique ON relationships(source_id, target_id, kind)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS usage_analytics (
                id                  TEXT PRIMARY KEY,
                prompt_id           TEXT NOT NULL REFERENCES prompts(id),
                session_id          TEXT NOT NULL,
                effectiveness       REAL NOT NULL,
                user_feedback       INTEGER,
                context             TEXT,
                used_in_generation  INTEGER NOT NULL DEFAULT 0,
                generated_at        TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_usage_analytics_prompt ON usage_analytics(prompt_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
