//! Cross-campaign duplicate detection
//!
//! A recipient is a duplicate when the same template already reached the
//! same normalized identifier successfully in any prior campaign. Detection
//! reads the sending history, so duplicate skips recorded there keep the
//! picture complete even though no send occurred.

use chrono::{DateTime, Utc};
use outreach_common::types::{CampaignId, TemplateId};
use outreach_common::Result;
use outreach_storage::CampaignStore;
use std::sync::Arc;

/// Outcome of a duplicate check
#[derive(Debug, Clone, Default)]
pub struct DuplicateInfo {
    pub is_duplicate: bool,
    pub previous_campaign_id: Option<CampaignId>,
    pub previous_campaign_code: Option<String>,
    pub previous_time: Option<DateTime<Utc>>,
}

/// Duplicate detector over the sending history
#[derive(Clone)]
pub struct DuplicateChecker {
    store: Arc<dyn CampaignStore>,
}

impl DuplicateChecker {
    /// Create a checker over a store
    pub fn new(store: Arc<dyn CampaignStore>) -> Self {
        Self { store }
    }

    /// Check whether a normalized identifier already received this template
    pub async fn check(
        &self,
        template_id: TemplateId,
        normalized: &str,
    ) -> Result<DuplicateInfo> {
        let last = self
            .store
            .find_last_successful_send(template_id, normalized)
            .await?;

        Ok(match last {
            Some(send) => DuplicateInfo {
                is_duplicate: true,
                previous_campaign_id: Some(send.campaign_id),
                previous_campaign_code: Some(send.campaign_code),
                previous_time: Some(send.sent_at),
            },
            None => DuplicateInfo::default(),
        })
    }
}
