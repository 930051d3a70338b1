//! Template repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateTemplate, Template, UpdateTemplate};
use outreach_common::types::TemplateId;

/// Template repository
#[derive(Clone)]
pub struct TemplateRepository {
    pool: PgPool,
}

impl TemplateRepository {
    /// Create a new template repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new template
    pub async fn create(&self, input: CreateTemplate) -> Result<Template, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, Template>(
            r#"
            INSERT INTO templates (id, name, body, media_kind, media_ref, media_unique_ref, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.body)
        .bind(input.media_kind.map(|k| k.to_string()))
        .bind(&input.media_ref)
        .bind(&input.media_unique_ref)
        .bind(input.created_by)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a template by ID
    pub async fn get(&self, id: TemplateId) -> Result<Option<Template>, sqlx::Error> {
        sqlx::query_as::<_, Template>("SELECT * FROM templates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List active templates, newest first
    pub async fn list_active(&self) -> Result<Vec<Template>, sqlx::Error> {
        sqlx::query_as::<_, Template>(
            "SELECT * FROM templates WHERE is_active = TRUE ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Update a template
    pub async fn update(
        &self,
        id: TemplateId,
        input: UpdateTemplate,
    ) -> Result<Option<Template>, sqlx::Error> {
        sqlx::query_as::<_, Template>(
            r#"
            UPDATE templates SET
                name = COALESCE($2, name),
                body = COALESCE($3, body),
                media_kind = COALESCE($4, media_kind),
                media_ref = COALESCE($5, media_ref),
                media_unique_ref = COALESCE($6, media_unique_ref),
                updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.body)
        .bind(input.media_kind.map(|k| k.to_string()))
        .bind(&input.media_ref)
        .bind(&input.media_unique_ref)
        .fetch_optional(&self.pool)
        .await
    }

    /// Soft-delete a template
    ///
    /// Historical campaigns keep a valid foreign reference; hard delete is
    /// not exposed.
    pub async fn soft_delete(&self, id: TemplateId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE templates SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
