//! Database models

use chrono::{DateTime, Utc};
use outreach_common::types::{
    CampaignId, CampaignStatus, IdentifierKind, MediaKind, OutcomeKind, OwnerId, RecipientId,
    TemplateId,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Message template model
///
/// Soft-deleted templates (`is_active = false`) are excluded from selection
/// but stay referable from historical campaigns.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub body: String,
    pub media_kind: Option<String>,
    pub media_ref: Option<String>,
    pub media_unique_ref: Option<String>,
    pub created_by: OwnerId,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Get media kind enum
    pub fn media_kind_enum(&self) -> Option<MediaKind> {
        self.media_kind.as_deref().and_then(|k| k.parse().ok())
    }
}

/// Create template input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplate {
    pub name: String,
    pub body: String,
    pub media_kind: Option<MediaKind>,
    pub media_ref: Option<String>,
    pub media_unique_ref: Option<String>,
    pub created_by: OwnerId,
}

/// Update template input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTemplate {
    pub name: Option<String>,
    pub body: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub media_ref: Option<String>,
    pub media_unique_ref: Option<String>,
}

/// Campaign model - one bulk-send run
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    /// Human-readable campaign code, e.g. `SND-1A2B3C4D`
    pub code: String,
    pub owner_id: OwnerId,
    pub template_id: TemplateId,
    pub status: String,
    pub delay_seconds: i32,
    pub max_recipients: Option<i32>,
    pub total_recipients: i32,
    pub sent_successfully: i32,
    pub sent_failed: i32,
    pub duplicates_count: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }
}

/// Create campaign input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub owner_id: OwnerId,
    pub template_id: TemplateId,
    pub delay_seconds: i32,
    pub max_recipients: Option<i32>,
}

/// Recipient model - one addressable target attached to a campaign
///
/// `is_duplicate` and `previous_campaign_id` are the only fields mutated
/// after creation, set once by the duplicate detector during execution.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub campaign_id: CampaignId,
    /// Identifier exactly as supplied by the operator
    pub identifier: String,
    /// Canonical key used for duplicate matching
    pub normalized: String,
    pub kind: String,
    pub is_duplicate: bool,
    pub previous_campaign_id: Option<CampaignId>,
    pub created_at: DateTime<Utc>,
}

impl Recipient {
    /// Get identifier kind enum
    pub fn kind_enum(&self) -> Option<IdentifierKind> {
        self.kind.parse().ok()
    }
}

/// Create recipient input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipient {
    pub identifier: String,
    pub normalized: String,
    pub kind: IdentifierKind,
}

/// Sending history model - append-only ledger entry per attempted delivery
///
/// Duplicate skips are recorded too, with outcome kind `duplicate`; rows are
/// never mutated after insertion.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SendingHistory {
    pub id: uuid::Uuid,
    pub campaign_id: CampaignId,
    pub recipient_identifier: String,
    pub normalized_identifier: String,
    pub success: bool,
    pub outcome_kind: Option<String>,
    pub detail: Option<String>,
    pub message_ref: Option<i64>,
    pub sent_at: DateTime<Utc>,
}

impl SendingHistory {
    /// Get outcome kind enum
    pub fn outcome_kind_enum(&self) -> Option<OutcomeKind> {
        self.outcome_kind.as_deref().and_then(|k| k.parse().ok())
    }
}

/// Create sending history input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSendingHistory {
    pub campaign_id: CampaignId,
    pub recipient_identifier: String,
    pub normalized_identifier: String,
    pub success: bool,
    pub outcome_kind: Option<OutcomeKind>,
    pub detail: Option<String>,
    pub message_ref: Option<i64>,
}

/// Most recent successful send of a template to a normalized identifier
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LastSend {
    pub campaign_id: CampaignId,
    pub campaign_code: String,
    pub sent_at: DateTime<Utc>,
}

/// Failure count per outcome kind over a reporting period
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ErrorStat {
    pub outcome_kind: Option<String>,
    pub count: i64,
}

/// Report receiver list model - named set of digest addresses
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ReportReceiverList {
    pub id: uuid::Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Report receiver model - one digest address
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ReportReceiver {
    pub id: uuid::Uuid,
    pub list_id: uuid::Uuid,
    pub identifier: String,
    pub identifier_kind: String,
    /// Resolved chat id, filled in once the address has been seen
    pub chat_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
