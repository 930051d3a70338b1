//! Campaign repository

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Campaign, CreateCampaign};
use outreach_common::types::{CampaignId, CampaignStatus, OwnerId};

/// Campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new campaign in `pending` status
    pub async fn create(&self, input: CreateCampaign) -> Result<Campaign, sqlx::Error> {
        let id = Uuid::new_v4();
        let code = generate_code();

        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (id, code, owner_id, template_id, delay_seconds, max_recipients)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&code)
        .bind(input.owner_id)
        .bind(input.template_id)
        .bind(input.delay_seconds)
        .bind(input.max_recipients)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a campaign by ID
    pub async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get a campaign by its human-readable code
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
    }

    /// List campaigns for an owner, newest first
    pub async fn list_by_owner(
        &self,
        owner_id: OwnerId,
        limit: i64,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE owner_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Claim a pending campaign for execution
    ///
    /// Compare-and-set so concurrent dispatch cycles cannot pick up the
    /// same campaign twice.
    pub async fn claim_pending(&self, id: CampaignId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET status = 'processing', started_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Update campaign status
    pub async fn update_status(
        &self,
        id: CampaignId,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let started_at = if status == CampaignStatus::Processing {
            Some(Utc::now())
        } else {
            None
        };

        let completed_at = if status.is_terminal() {
            Some(Utc::now())
        } else {
            None
        };

        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                status = $2,
                started_at = COALESCE($3, started_at),
                completed_at = COALESCE($4, completed_at)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(started_at)
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await
    }

    /// Set total recipients count
    pub async fn set_total_recipients(
        &self,
        id: CampaignId,
        total: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE campaigns SET total_recipients = $2 WHERE id = $1")
            .bind(id)
            .bind(total)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist final counters as a single update
    pub async fn update_stats(
        &self,
        id: CampaignId,
        total: i32,
        sent: i32,
        failed: i32,
        duplicates: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE campaigns SET
                total_recipients = $2,
                sent_successfully = $3,
                sent_failed = $4,
                duplicates_count = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(total)
        .bind(sent)
        .bind(failed)
        .bind(duplicates)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get pending campaigns ready to dispatch, oldest first
    pub async fn pending_ready(&self, limit: i64) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE status = 'pending' ORDER BY created_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Campaigns created within the given day, newest first
    pub async fn campaigns_for_day(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE created_at >= $1 AND created_at <= $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
    }

    /// Hard-fail campaigns left in `processing` by a previous process
    ///
    /// Counters are recomputed from the history rows that did commit, so the
    /// terminal accounting stays consistent with the ledger.
    pub async fn fail_orphaned_processing(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns c SET
                status = 'failed',
                completed_at = NOW(),
                sent_successfully = h.sent,
                sent_failed = h.failed,
                duplicates_count = h.duplicates
            FROM (
                SELECT
                    campaign_id,
                    COUNT(*) FILTER (WHERE success) AS sent,
                    COUNT(*) FILTER (WHERE NOT success AND outcome_kind <> 'duplicate') AS failed,
                    COUNT(*) FILTER (WHERE outcome_kind = 'duplicate') AS duplicates
                FROM sending_history
                GROUP BY campaign_id
            ) h
            WHERE c.id = h.campaign_id AND c.status = 'processing'
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Orphans with no history rows at all are failed with zero counters.
        let empty = sqlx::query(
            "UPDATE campaigns SET status = 'failed', completed_at = NOW() WHERE status = 'processing'",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() + empty.rows_affected())
    }
}

/// Generate a human-readable campaign code
fn generate_code() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("SND-{}", hex[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_shape() {
        let code = generate_code();
        assert!(code.starts_with("SND-"));
        assert_eq!(code.len(), 12);
        assert!(code[4..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
