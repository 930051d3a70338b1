//! Campaign reporting
//!
//! Per-campaign owner reports rendered at terminal transitions, and the
//! daily cross-campaign digest delivered to configured receiver lists.
//! Delivery is best-effort throughout: a failed report never changes a
//! campaign's status.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, NaiveTime, TimeZone, Utc};
use outreach_common::types::{OutcomeKind, OwnerId, TemplateId};
use outreach_common::Result;
use outreach_storage::{Campaign, CampaignStore, ErrorStat, SendingHistory, Template};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Best-effort text delivery to an owner or digest receiver
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Deliver to a known numeric identity
    async fn deliver_text(&self, owner: OwnerId, text: &str) -> Result<()>;

    /// Deliver to a receiver known only by identifier (e.g. a public name)
    async fn deliver_to_identifier(&self, identifier: &str, text: &str) -> Result<()> {
        let _ = text;
        Err(outreach_common::Error::Validation(format!(
            "receiver {} has no resolved identity",
            identifier
        )))
    }
}

/// How many duplicates or failures are listed before truncating
const REPORT_LIST_LIMIT: usize = 10;

/// Render the owner's report for one terminal campaign
pub fn render_personal_report(
    campaign: &Campaign,
    template: &Template,
    history: &[SendingHistory],
    duplicates: &[String],
) -> String {
    let time_range = match (campaign.started_at, campaign.completed_at) {
        (Some(start), Some(end)) => format!(
            "{} - {} ({})",
            start.format("%H:%M"),
            end.format("%H:%M"),
            start.format("%d.%m.%Y"),
        ),
        (Some(start), None) => format!("{}", start.format("%H:%M (%d.%m.%Y)")),
        _ => "not started".to_string(),
    };

    let mut report = format!(
        "CAMPAIGN REPORT {code}\n\
         \n\
         Template: \"{template}\"\n\
         Run time: {time_range}\n\
         \n\
         STATISTICS:\n\
         Delivered: {sent} of {total}\n\
         Failed: {failed}\n\
         Duplicates skipped: {dup}",
        code = campaign.code,
        template = template.name,
        time_range = time_range,
        sent = campaign.sent_successfully,
        total = campaign.total_recipients,
        failed = campaign.sent_failed,
        dup = campaign.duplicates_count,
    );

    let failed: Vec<&SendingHistory> = history
        .iter()
        .filter(|h| !h.success && h.outcome_kind.as_deref() != Some("duplicate"))
        .collect();
    if !failed.is_empty() {
        report.push_str("\n\nFAILED RECIPIENTS:");
        for entry in failed.iter().take(REPORT_LIST_LIMIT) {
            let reason = entry
                .outcome_kind_enum()
                .unwrap_or(OutcomeKind::Unknown)
                .describe();
            let _ = write!(report, "\n- {} ({})", entry.recipient_identifier, reason);
        }
        if failed.len() > REPORT_LIST_LIMIT {
            let _ = write!(report, "\n... and {} more", failed.len() - REPORT_LIST_LIMIT);
        }
    }

    if !duplicates.is_empty() {
        let mut shown = duplicates
            .iter()
            .take(REPORT_LIST_LIMIT)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if duplicates.len() > REPORT_LIST_LIMIT {
            let _ = write!(shown, ", ... and {} more", duplicates.len() - REPORT_LIST_LIMIT);
        }
        let _ = write!(
            report,
            "\n\nDUPLICATES (not redelivered):\n{}",
            shown
        );
    }

    report
}

/// Render the cross-campaign digest for one day
pub fn render_summary_report(
    campaigns: &[Campaign],
    templates: &HashMap<TemplateId, Template>,
    error_stats: &[ErrorStat],
    date: DateTime<Utc>,
) -> String {
    let date_str = date.format("%d.%m.%Y");

    if campaigns.is_empty() {
        return format!(
            "DAILY CAMPAIGN SUMMARY - {}\n\nNo campaigns ran on this day.",
            date_str
        );
    }

    let mut report = format!(
        "DAILY CAMPAIGN SUMMARY - {}\n\nCampaigns: {}\n",
        date_str,
        campaigns.len()
    );

    for (idx, campaign) in campaigns.iter().enumerate() {
        let template_name = templates
            .get(&campaign.template_id)
            .map(|t| t.name.as_str())
            .unwrap_or("unknown template");
        let _ = write!(
            report,
            "\n{}. {} - template \"{}\"\n   recipients: {} | delivered: {} | failed: {} | duplicates: {}",
            idx + 1,
            campaign.code,
            template_name,
            campaign.total_recipients,
            campaign.sent_successfully,
            campaign.sent_failed,
            campaign.duplicates_count,
        );
    }

    let total: i32 = campaigns.iter().map(|c| c.total_recipients).sum();
    let sent: i32 = campaigns.iter().map(|c| c.sent_successfully).sum();
    let failed: i32 = campaigns.iter().map(|c| c.sent_failed).sum();
    let duplicates: i32 = campaigns.iter().map(|c| c.duplicates_count).sum();

    let _ = write!(
        report,
        "\n\nTOTALS:\nUnique recipients: {}\nDelivered: {}\nFailures: {}\nDuplicates skipped: {}",
        total - duplicates,
        sent,
        failed,
        duplicates,
    );

    if !error_stats.is_empty() {
        report.push_str("\n\nTOP FAILURE CAUSES:");
        for (idx, stat) in error_stats.iter().take(3).enumerate() {
            let reason = stat
                .outcome_kind
                .as_deref()
                .and_then(|k| k.parse::<OutcomeKind>().ok())
                .unwrap_or(OutcomeKind::Unknown)
                .describe();
            let _ = write!(report, "\n{}. {} - {}", idx + 1, reason, stat.count);
        }
    }

    report
}

/// Periodic worker delivering the daily digest to every active receiver
pub struct DigestWorker {
    store: Arc<dyn CampaignStore>,
    sink: Arc<dyn ReportSink>,
    deliver_at: NaiveTime,
}

impl DigestWorker {
    /// Create a digest worker firing at a local time of day
    pub fn new(
        store: Arc<dyn CampaignStore>,
        sink: Arc<dyn ReportSink>,
        deliver_at: NaiveTime,
    ) -> Self {
        Self {
            store,
            sink,
            deliver_at,
        }
    }

    /// Run the digest loop
    pub async fn run(&self) {
        info!(
            deliver_at = %self.deliver_at.format("%H:%M"),
            "Digest worker started"
        );

        loop {
            sleep(self.until_next_fire()).await;

            match self.deliver_digest_for(Utc::now()).await {
                Ok(delivered) => info!(delivered, "Daily digest delivered"),
                Err(e) => error!("Digest delivery failed: {}", e),
            }

            // step past the firing minute before rescheduling
            sleep(Duration::from_secs(60)).await;
        }
    }

    fn until_next_fire(&self) -> Duration {
        let now = Local::now();
        let today_fire = now.date_naive().and_time(self.deliver_at);
        let next = if now.naive_local() < today_fire {
            today_fire
        } else {
            today_fire + chrono::Duration::days(1)
        };

        (next - now.naive_local())
            .to_std()
            .unwrap_or(Duration::from_secs(60))
    }

    /// Build and deliver the digest covering the given day
    ///
    /// Returns how many receivers got the report; unaddressable receivers
    /// are skipped with a warning, and individual delivery failures do not
    /// stop the fan-out.
    pub async fn deliver_digest_for(&self, date: DateTime<Utc>) -> Result<usize> {
        let start = Utc
            .with_ymd_and_hms(date.year(), date.month(), date.day(), 0, 0, 0)
            .single()
            .unwrap_or(date);
        let end = start + chrono::Duration::days(1) - chrono::Duration::milliseconds(1);

        let campaigns = self.store.campaigns_for_day(start, end).await?;
        let error_stats = self.store.error_statistics(start, end).await?;

        let mut templates = HashMap::new();
        for campaign in &campaigns {
            if templates.contains_key(&campaign.template_id) {
                continue;
            }
            if let Some(template) = self.store.get_template(campaign.template_id).await? {
                templates.insert(campaign.template_id, template);
            }
        }

        let report = render_summary_report(&campaigns, &templates, &error_stats, date);

        let receivers = self.store.active_report_receivers().await?;
        if receivers.is_empty() {
            info!("No digest receivers configured");
            return Ok(0);
        }

        let mut delivered = 0usize;
        for receiver in receivers {
            let result = match receiver.chat_id {
                Some(chat_id) => self.sink.deliver_text(chat_id, &report).await,
                None => self.sink.deliver_to_identifier(&receiver.identifier, &report).await,
            };

            match result {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    identifier = %receiver.identifier,
                    "Digest delivery to receiver failed: {}",
                    e
                ),
            }
        }

        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::testutil::{template, CollectingSink, MemoryStore};
    use outreach_common::types::CampaignStatus;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn campaign_row(code: &str, total: i32, sent: i32, failed: i32, dup: i32) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            code: code.to_string(),
            owner_id: 10,
            template_id: Uuid::new_v4(),
            status: CampaignStatus::Completed.to_string(),
            delay_seconds: 5,
            max_recipients: None,
            total_recipients: total,
            sent_successfully: sent,
            sent_failed: failed,
            duplicates_count: dup,
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    fn failed_row(campaign_id: Uuid, identifier: &str, kind: OutcomeKind) -> SendingHistory {
        SendingHistory {
            id: Uuid::new_v4(),
            campaign_id,
            recipient_identifier: identifier.to_string(),
            normalized_identifier: identifier.to_lowercase(),
            success: false,
            outcome_kind: Some(kind.to_string()),
            detail: None,
            message_ref: None,
            sent_at: Utc::now(),
        }
    }

    #[test]
    fn personal_report_lists_counts_failures_and_duplicates() {
        let campaign = campaign_row("SND-11112222", 5, 2, 2, 1);
        let tpl = template();
        let history = vec![
            failed_row(campaign.id, "@ghost", OutcomeKind::InvalidUser),
            failed_row(campaign.id, "@wall", OutcomeKind::Blocked),
        ];
        let duplicates = vec!["@bob".to_string()];

        let report = render_personal_report(&campaign, &tpl, &history, &duplicates);

        assert!(report.contains("SND-11112222"));
        assert!(report.contains("Delivered: 2 of 5"));
        assert!(report.contains("Failed: 2"));
        assert!(report.contains("Duplicates skipped: 1"));
        assert!(report.contains("@ghost (recipient not found)"));
        assert!(report.contains("@wall (recipient has blocked the sender)"));
        assert!(report.contains("@bob"));
    }

    #[test]
    fn personal_report_truncates_long_duplicate_list() {
        let campaign = campaign_row("SND-33334444", 30, 10, 0, 20);
        let tpl = template();
        let duplicates: Vec<String> = (0..20).map(|i| format!("user{}", i)).collect();

        let report = render_personal_report(&campaign, &tpl, &[], &duplicates);

        assert!(report.contains("user9"));
        assert!(!report.contains("user15"));
        assert!(report.contains("and 10 more"));
    }

    #[test]
    fn summary_report_aggregates_and_ranks_errors() {
        let mut c1 = campaign_row("SND-000000A1", 10, 8, 1, 1);
        let mut c2 = campaign_row("SND-000000A2", 5, 3, 2, 0);
        let tpl = template();
        c1.template_id = tpl.id;
        c2.template_id = tpl.id;
        let templates: HashMap<_, _> = [(tpl.id, tpl.clone())].into_iter().collect();
        let stats = vec![
            ErrorStat {
                outcome_kind: Some("blocked".to_string()),
                count: 2,
            },
            ErrorStat {
                outcome_kind: Some("privacy".to_string()),
                count: 1,
            },
        ];

        let report =
            render_summary_report(&[c1, c2], &templates, &stats, Utc::now());

        assert!(report.contains("Campaigns: 2"));
        assert!(report.contains("Unique recipients: 14"));
        assert!(report.contains("Delivered: 11"));
        assert!(report.contains("Failures: 3"));
        assert!(report.contains("1. recipient has blocked the sender - 2"));
    }

    #[test]
    fn summary_report_for_empty_day() {
        let report =
            render_summary_report(&[], &HashMap::new(), &[], Utc::now());
        assert!(report.contains("No campaigns ran"));
    }

    #[tokio::test]
    async fn digest_fans_out_to_active_receivers() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(CollectingSink::default());

        store.add_receiver(501, "alice_reports");
        store.add_receiver(502, "ops_channel");

        let worker = DigestWorker::new(
            store.clone() as Arc<dyn CampaignStore>,
            sink.clone(),
            NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        );

        let delivered = worker.deliver_digest_for(Utc::now()).await.unwrap();
        assert_eq!(delivered, 2);

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert!(delivered[0].1.contains("DAILY CAMPAIGN SUMMARY"));
    }
}
