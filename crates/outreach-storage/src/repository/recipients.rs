//! Recipient repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateRecipient, Recipient};
use outreach_common::types::{CampaignId, RecipientId};

/// Recipient repository
#[derive(Clone)]
pub struct RecipientRepository {
    pool: PgPool,
}

impl RecipientRepository {
    /// Create a new recipient repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the recipients of a campaign in one transaction
    pub async fn create_batch(
        &self,
        campaign_id: CampaignId,
        entries: Vec<CreateRecipient>,
    ) -> Result<Vec<Recipient>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(entries.len());

        for entry in entries {
            let recipient = sqlx::query_as::<_, Recipient>(
                r#"
                INSERT INTO recipients (id, campaign_id, identifier, normalized, kind)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(campaign_id)
            .bind(&entry.identifier)
            .bind(&entry.normalized)
            .bind(entry.kind.to_string())
            .fetch_one(&mut *tx)
            .await?;

            created.push(recipient);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// List recipients of a campaign in insertion order
    pub async fn list_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<Recipient>, sqlx::Error> {
        sqlx::query_as::<_, Recipient>(
            "SELECT * FROM recipients WHERE campaign_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Duplicate-flagged recipients of a campaign
    pub async fn duplicates_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<Recipient>, sqlx::Error> {
        sqlx::query_as::<_, Recipient>(
            r#"
            SELECT * FROM recipients
            WHERE campaign_id = $1 AND is_duplicate = TRUE
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Flag a recipient as a duplicate of an earlier campaign
    pub async fn mark_duplicate(
        &self,
        id: RecipientId,
        previous_campaign_id: CampaignId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE recipients SET is_duplicate = TRUE, previous_campaign_id = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(previous_campaign_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
