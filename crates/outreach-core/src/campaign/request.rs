//! Campaign request assembly
//!
//! Whatever collects the inputs (an admin console, a bot conversation, a
//! script) produces one immutable `CampaignRequest`; the engine consumes it
//! atomically and assumes nothing about how it was put together.

use outreach_common::types::{OwnerId, TemplateId};
use outreach_common::{Error, Result};

/// Immutable input for one campaign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignRequest {
    pub owner_id: OwnerId,
    pub template_id: TemplateId,
    /// Raw recipient list, still to be normalized
    pub recipients_text: String,
    /// Inter-send delay in seconds
    pub delay_seconds: u32,
    /// Optional cap on how many recipients are attempted
    pub max_recipients: Option<u32>,
}

impl CampaignRequest {
    /// Start building a request
    pub fn builder(owner_id: OwnerId, template_id: TemplateId) -> CampaignRequestBuilder {
        CampaignRequestBuilder {
            owner_id,
            template_id,
            recipients_text: None,
            delay_seconds: None,
            max_recipients: None,
        }
    }
}

/// Step-by-step builder for `CampaignRequest`
#[derive(Debug, Clone)]
pub struct CampaignRequestBuilder {
    owner_id: OwnerId,
    template_id: TemplateId,
    recipients_text: Option<String>,
    delay_seconds: Option<u32>,
    max_recipients: Option<u32>,
}

impl CampaignRequestBuilder {
    /// Set the raw recipient list
    pub fn recipients(mut self, text: impl Into<String>) -> Self {
        self.recipients_text = Some(text.into());
        self
    }

    /// Set the inter-send delay
    pub fn delay_seconds(mut self, seconds: u32) -> Self {
        self.delay_seconds = Some(seconds);
        self
    }

    /// Cap the number of recipients attempted
    pub fn max_recipients(mut self, max: u32) -> Self {
        self.max_recipients = Some(max);
        self
    }

    /// Finalize the request
    ///
    /// `default_delay` fills in the pacing delay when the operator did not
    /// choose one.
    pub fn build(self, default_delay: u32) -> Result<CampaignRequest> {
        let recipients_text = self
            .recipients_text
            .ok_or(Error::EmptyRecipientList)?;

        if recipients_text.trim().is_empty() {
            return Err(Error::EmptyRecipientList);
        }

        if let Some(0) = self.max_recipients {
            return Err(Error::Validation(
                "max_recipients must be positive".to_string(),
            ));
        }

        Ok(CampaignRequest {
            owner_id: self.owner_id,
            template_id: self.template_id,
            recipients_text,
            delay_seconds: self.delay_seconds.unwrap_or(default_delay),
            max_recipients: self.max_recipients,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn builder_fills_default_delay() {
        let template_id = Uuid::new_v4();
        let request = CampaignRequest::builder(10, template_id)
            .recipients("@alice @bob")
            .build(5)
            .unwrap();

        assert_eq!(request.delay_seconds, 5);
        assert_eq!(request.max_recipients, None);
    }

    #[test]
    fn builder_keeps_explicit_values() {
        let template_id = Uuid::new_v4();
        let request = CampaignRequest::builder(10, template_id)
            .recipients("@alice")
            .delay_seconds(30)
            .max_recipients(50)
            .build(5)
            .unwrap();

        assert_eq!(request.delay_seconds, 30);
        assert_eq!(request.max_recipients, Some(50));
    }

    #[test]
    fn builder_rejects_missing_or_blank_recipients() {
        let template_id = Uuid::new_v4();
        assert!(CampaignRequest::builder(10, template_id).build(5).is_err());
        assert!(CampaignRequest::builder(10, template_id)
            .recipients("   ")
            .build(5)
            .is_err());
    }

    #[test]
    fn builder_rejects_zero_cap() {
        let template_id = Uuid::new_v4();
        assert!(CampaignRequest::builder(10, template_id)
            .recipients("@alice")
            .max_recipients(0)
            .build(5)
            .is_err());
    }
}
