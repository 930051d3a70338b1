//! Report receiver repository - named digest address lists

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ReportReceiver, ReportReceiverList};
use outreach_common::types::IdentifierKind;

/// Report receiver repository
#[derive(Clone)]
pub struct ReportReceiverRepository {
    pool: PgPool,
}

impl ReportReceiverRepository {
    /// Create a new report receiver repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a receiver list
    pub async fn create_list(&self, name: &str) -> Result<ReportReceiverList, sqlx::Error> {
        sqlx::query_as::<_, ReportReceiverList>(
            "INSERT INTO report_receiver_lists (id, name) VALUES ($1, $2) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a receiver list by ID
    pub async fn get_list(&self, id: Uuid) -> Result<Option<ReportReceiverList>, sqlx::Error> {
        sqlx::query_as::<_, ReportReceiverList>(
            "SELECT * FROM report_receiver_lists WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Active receiver lists, newest first
    pub async fn list_lists(&self) -> Result<Vec<ReportReceiverList>, sqlx::Error> {
        sqlx::query_as::<_, ReportReceiverList>(
            "SELECT * FROM report_receiver_lists WHERE is_active = TRUE ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Rename a receiver list
    pub async fn rename_list(
        &self,
        id: Uuid,
        name: &str,
    ) -> Result<Option<ReportReceiverList>, sqlx::Error> {
        sqlx::query_as::<_, ReportReceiverList>(
            r#"
            UPDATE report_receiver_lists SET name = $2, updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
    }

    /// Soft-delete a receiver list
    pub async fn soft_delete_list(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE report_receiver_lists SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Add a receiver to a list unless the identifier is already present
    pub async fn add_receiver(
        &self,
        list_id: Uuid,
        identifier: &str,
        kind: IdentifierKind,
    ) -> Result<Option<ReportReceiver>, sqlx::Error> {
        let existing = sqlx::query_as::<_, ReportReceiver>(
            "SELECT * FROM report_receivers WHERE list_id = $1 AND identifier = $2",
        )
        .bind(list_id)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        if existing.is_some() {
            return Ok(None);
        }

        let receiver = sqlx::query_as::<_, ReportReceiver>(
            r#"
            INSERT INTO report_receivers (id, list_id, identifier, identifier_kind)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(list_id)
        .bind(identifier)
        .bind(kind.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(receiver))
    }

    /// Active receivers of one list, newest first
    pub async fn receivers_by_list(
        &self,
        list_id: Uuid,
    ) -> Result<Vec<ReportReceiver>, sqlx::Error> {
        sqlx::query_as::<_, ReportReceiver>(
            r#"
            SELECT * FROM report_receivers
            WHERE list_id = $1 AND is_active = TRUE
            ORDER BY created_at DESC
            "#,
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Soft-delete a receiver
    pub async fn soft_delete_receiver(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE report_receivers SET is_active = FALSE WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Every active receiver across all lists
    pub async fn all_active(&self) -> Result<Vec<ReportReceiver>, sqlx::Error> {
        sqlx::query_as::<_, ReportReceiver>(
            "SELECT * FROM report_receivers WHERE is_active = TRUE",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Record the resolved chat id for an identifier
    pub async fn set_chat_id(&self, identifier: &str, chat_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE report_receivers SET chat_id = $2 WHERE identifier = $1")
            .bind(identifier)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
