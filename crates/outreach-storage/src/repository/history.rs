//! Sending history repository

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateSendingHistory, ErrorStat, LastSend, SendingHistory};
use outreach_common::types::{CampaignId, TemplateId};

/// Sending history repository
#[derive(Clone)]
pub struct HistoryRepository {
    pool: PgPool,
}

impl HistoryRepository {
    /// Create a new history repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one ledger entry
    pub async fn append(
        &self,
        input: CreateSendingHistory,
    ) -> Result<SendingHistory, sqlx::Error> {
        sqlx::query_as::<_, SendingHistory>(
            r#"
            INSERT INTO sending_history (
                id, campaign_id, recipient_identifier, normalized_identifier,
                success, outcome_kind, detail, message_ref
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.campaign_id)
        .bind(&input.recipient_identifier)
        .bind(&input.normalized_identifier)
        .bind(input.success)
        .bind(input.outcome_kind.map(|k| k.to_string()))
        .bind(&input.detail)
        .bind(input.message_ref)
        .fetch_one(&self.pool)
        .await
    }

    /// Full ledger of a campaign in send order
    pub async fn list_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<SendingHistory>, sqlx::Error> {
        sqlx::query_as::<_, SendingHistory>(
            "SELECT * FROM sending_history WHERE campaign_id = $1 ORDER BY sent_at ASC, id ASC",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Most recent successful send of a template to a normalized identifier,
    /// across all campaigns
    pub async fn find_last_successful_send(
        &self,
        template_id: TemplateId,
        normalized: &str,
    ) -> Result<Option<LastSend>, sqlx::Error> {
        sqlx::query_as::<_, LastSend>(
            r#"
            SELECT c.id AS campaign_id, c.code AS campaign_code, h.sent_at
            FROM sending_history h
            JOIN campaigns c ON h.campaign_id = c.id
            WHERE c.template_id = $1
              AND h.normalized_identifier = $2
              AND h.success = TRUE
            ORDER BY h.sent_at DESC
            LIMIT 1
            "#,
        )
        .bind(template_id)
        .bind(normalized)
        .fetch_optional(&self.pool)
        .await
    }

    /// Failure counts per outcome kind within a period, most frequent first
    pub async fn error_statistics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ErrorStat>, sqlx::Error> {
        sqlx::query_as::<_, ErrorStat>(
            r#"
            SELECT h.outcome_kind, COUNT(h.id) AS count
            FROM sending_history h
            JOIN campaigns c ON h.campaign_id = c.id
            WHERE h.success = FALSE
              AND h.outcome_kind <> 'duplicate'
              AND c.created_at >= $1 AND c.created_at <= $2
            GROUP BY h.outcome_kind
            ORDER BY COUNT(h.id) DESC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
    }
}
