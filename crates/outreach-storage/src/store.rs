//! Engine-facing storage capability
//!
//! The execution engine never touches `sqlx` directly: it runs against the
//! `CampaignStore` trait, implemented here over the Postgres repositories
//! and by in-memory fakes in the engine's tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::DatabasePool;
use crate::models::{
    Campaign, CreateCampaign, CreateRecipient, CreateSendingHistory, ErrorStat, LastSend,
    Recipient, ReportReceiver, SendingHistory, Template,
};
use crate::repository::{
    CampaignRepository, HistoryRepository, RecipientRepository, ReportReceiverRepository,
    TemplateRepository,
};
use outreach_common::types::{CampaignId, CampaignStatus, RecipientId, TemplateId};
use outreach_common::Error;

/// Result alias for store operations
pub type StoreResult<T> = Result<T, Error>;

/// Storage capability consumed by the campaign execution engine
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn get_template(&self, id: TemplateId) -> StoreResult<Option<Template>>;

    async fn create_campaign(&self, input: CreateCampaign) -> StoreResult<Campaign>;

    async fn get_campaign(&self, id: CampaignId) -> StoreResult<Option<Campaign>>;

    /// Atomically move a `pending` campaign to `processing`; false when the
    /// campaign was not pending (already claimed or terminal)
    async fn claim_pending(&self, id: CampaignId) -> StoreResult<bool>;

    async fn update_status(&self, id: CampaignId, status: CampaignStatus) -> StoreResult<()>;

    async fn set_total_recipients(&self, id: CampaignId, total: i32) -> StoreResult<()>;

    /// Persist final counters as one atomic update
    async fn update_stats(
        &self,
        id: CampaignId,
        total: i32,
        sent: i32,
        failed: i32,
        duplicates: i32,
    ) -> StoreResult<()>;

    async fn add_recipients(
        &self,
        campaign_id: CampaignId,
        entries: Vec<CreateRecipient>,
    ) -> StoreResult<Vec<Recipient>>;

    async fn list_recipients(&self, campaign_id: CampaignId) -> StoreResult<Vec<Recipient>>;

    async fn duplicates_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> StoreResult<Vec<Recipient>>;

    async fn mark_recipient_duplicate(
        &self,
        id: RecipientId,
        previous_campaign_id: CampaignId,
    ) -> StoreResult<()>;

    async fn append_history(&self, input: CreateSendingHistory) -> StoreResult<()>;

    async fn history_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> StoreResult<Vec<SendingHistory>>;

    /// Most recent successful send of a template to a normalized identifier,
    /// across all campaigns
    async fn find_last_successful_send(
        &self,
        template_id: TemplateId,
        normalized: &str,
    ) -> StoreResult<Option<LastSend>>;

    async fn pending_campaigns(&self, limit: i64) -> StoreResult<Vec<Campaign>>;

    async fn campaigns_for_day(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Campaign>>;

    async fn error_statistics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<ErrorStat>>;

    async fn active_report_receivers(&self) -> StoreResult<Vec<ReportReceiver>>;
}

/// Postgres-backed `CampaignStore`
#[derive(Clone)]
pub struct PgCampaignStore {
    templates: TemplateRepository,
    campaigns: CampaignRepository,
    recipients: RecipientRepository,
    history: HistoryRepository,
    report_receivers: ReportReceiverRepository,
}

impl PgCampaignStore {
    /// Create a new Postgres store over a shared pool
    pub fn new(db_pool: &DatabasePool) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            templates: TemplateRepository::new(pool.clone()),
            campaigns: CampaignRepository::new(pool.clone()),
            recipients: RecipientRepository::new(pool.clone()),
            history: HistoryRepository::new(pool.clone()),
            report_receivers: ReportReceiverRepository::new(pool),
        }
    }

    /// Hard-fail campaigns left in `processing` by a previous process
    pub async fn fail_orphaned_processing(&self) -> StoreResult<u64> {
        self.campaigns
            .fail_orphaned_processing()
            .await
            .map_err(db_err)
    }
}

fn db_err(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

#[async_trait]
impl CampaignStore for PgCampaignStore {
    async fn get_template(&self, id: TemplateId) -> StoreResult<Option<Template>> {
        self.templates.get(id).await.map_err(db_err)
    }

    async fn create_campaign(&self, input: CreateCampaign) -> StoreResult<Campaign> {
        self.campaigns.create(input).await.map_err(db_err)
    }

    async fn get_campaign(&self, id: CampaignId) -> StoreResult<Option<Campaign>> {
        self.campaigns.get(id).await.map_err(db_err)
    }

    async fn claim_pending(&self, id: CampaignId) -> StoreResult<bool> {
        self.campaigns.claim_pending(id).await.map_err(db_err)
    }

    async fn update_status(&self, id: CampaignId, status: CampaignStatus) -> StoreResult<()> {
        self.campaigns
            .update_status(id, status)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn set_total_recipients(&self, id: CampaignId, total: i32) -> StoreResult<()> {
        self.campaigns
            .set_total_recipients(id, total)
            .await
            .map_err(db_err)
    }

    async fn update_stats(
        &self,
        id: CampaignId,
        total: i32,
        sent: i32,
        failed: i32,
        duplicates: i32,
    ) -> StoreResult<()> {
        self.campaigns
            .update_stats(id, total, sent, failed, duplicates)
            .await
            .map_err(db_err)
    }

    async fn add_recipients(
        &self,
        campaign_id: CampaignId,
        entries: Vec<CreateRecipient>,
    ) -> StoreResult<Vec<Recipient>> {
        self.recipients
            .create_batch(campaign_id, entries)
            .await
            .map_err(db_err)
    }

    async fn list_recipients(&self, campaign_id: CampaignId) -> StoreResult<Vec<Recipient>> {
        self.recipients
            .list_by_campaign(campaign_id)
            .await
            .map_err(db_err)
    }

    async fn duplicates_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> StoreResult<Vec<Recipient>> {
        self.recipients
            .duplicates_by_campaign(campaign_id)
            .await
            .map_err(db_err)
    }

    async fn mark_recipient_duplicate(
        &self,
        id: RecipientId,
        previous_campaign_id: CampaignId,
    ) -> StoreResult<()> {
        self.recipients
            .mark_duplicate(id, previous_campaign_id)
            .await
            .map_err(db_err)
    }

    async fn append_history(&self, input: CreateSendingHistory) -> StoreResult<()> {
        self.history.append(input).await.map_err(db_err)?;
        Ok(())
    }

    async fn history_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> StoreResult<Vec<SendingHistory>> {
        self.history
            .list_by_campaign(campaign_id)
            .await
            .map_err(db_err)
    }

    async fn find_last_successful_send(
        &self,
        template_id: TemplateId,
        normalized: &str,
    ) -> StoreResult<Option<LastSend>> {
        self.history
            .find_last_successful_send(template_id, normalized)
            .await
            .map_err(db_err)
    }

    async fn pending_campaigns(&self, limit: i64) -> StoreResult<Vec<Campaign>> {
        self.campaigns.pending_ready(limit).await.map_err(db_err)
    }

    async fn campaigns_for_day(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Campaign>> {
        self.campaigns
            .campaigns_for_day(start, end)
            .await
            .map_err(db_err)
    }

    async fn error_statistics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<ErrorStat>> {
        self.history
            .error_statistics(start, end)
            .await
            .map_err(db_err)
    }

    async fn active_report_receivers(&self) -> StoreResult<Vec<ReportReceiver>> {
        self.report_receivers.all_active().await.map_err(db_err)
    }
}
