//! Campaign state machine
//!
//! Owns the campaign lifecycle (`pending -> processing -> completed|failed`)
//! and drives the per-recipient loop: duplicate check, pacing, delivery,
//! ledger append, counter accounting. Individual failures never stop a run;
//! an account-level anti-flood block aborts it immediately.

use super::duplicates::DuplicateChecker;
use super::executor::{RetryPolicy, SendExecutor};
use super::pacing::Pacer;
use super::request::CampaignRequest;
use crate::recipients::RecipientParser;
use crate::report::{render_personal_report, ReportSink};
use crate::transport::{AccountHealth, SessionPool};
use chrono::Local;
use outreach_common::config::{EngineConfig, SendWindow};
use outreach_common::types::{CampaignId, CampaignStatus, OutcomeKind, OwnerId};
use outreach_storage::{Campaign, CampaignStore, CreateCampaign, CreateRecipient, CreateSendingHistory};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Campaign engine errors
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Campaign not found")]
    NotFound,

    #[error("Template not found")]
    TemplateNotFound,

    #[error("Template is deactivated")]
    TemplateInactive,

    #[error("Campaign is not in pending status")]
    NotPending,

    #[error(transparent)]
    Common(#[from] outreach_common::Error),
}

/// Final accounting of one campaign run
#[derive(Debug, Clone, Serialize)]
pub struct CampaignSummary {
    pub campaign_id: CampaignId,
    pub code: String,
    pub status: CampaignStatus,
    pub total: i32,
    pub sent: i32,
    pub failed: i32,
    pub duplicates: i32,
}

/// Result of a "resend duplicates" request
///
/// Resending is permanently disabled: once delivered, a template is never
/// redelivered to the same recipient.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResendOutcome {
    pub sent: usize,
    pub skipped: usize,
}

/// Campaign execution engine
pub struct CampaignEngine {
    store: Arc<dyn CampaignStore>,
    sessions: Arc<SessionPool>,
    sink: Arc<dyn ReportSink>,
    window: SendWindow,
    parser: RecipientParser,
    duplicates: DuplicateChecker,
    executor: SendExecutor,
}

impl CampaignEngine {
    /// Create an engine over its capabilities
    pub fn new(
        store: Arc<dyn CampaignStore>,
        sessions: Arc<SessionPool>,
        sink: Arc<dyn ReportSink>,
        config: &EngineConfig,
    ) -> Result<Self, CampaignError> {
        let window = config.send_window()?;
        Ok(Self {
            duplicates: DuplicateChecker::new(Arc::clone(&store)),
            executor: SendExecutor::new(RetryPolicy::from_config(config)),
            store,
            sessions,
            sink,
            window,
            parser: RecipientParser::new(),
        })
    }

    /// Assemble a campaign from an immutable request
    ///
    /// Normalizes and validates the recipient list, persists the campaign in
    /// `pending`, and bulk-inserts its recipient rows. Nothing is sent yet.
    pub async fn assemble(&self, request: CampaignRequest) -> Result<Campaign, CampaignError> {
        let template = self
            .store
            .get_template(request.template_id)
            .await?
            .ok_or(CampaignError::TemplateNotFound)?;
        if !template.is_active {
            return Err(CampaignError::TemplateInactive);
        }

        let entries = self.parser.parse_validated(&request.recipients_text)?;

        let mut campaign = self
            .store
            .create_campaign(CreateCampaign {
                owner_id: request.owner_id,
                template_id: request.template_id,
                delay_seconds: request.delay_seconds as i32,
                max_recipients: request.max_recipients.map(|m| m as i32),
            })
            .await?;

        let total = entries.len() as i32;
        self.store
            .add_recipients(
                campaign.id,
                entries
                    .into_iter()
                    .map(|e| CreateRecipient {
                        identifier: e.original,
                        normalized: e.normalized,
                        kind: e.kind,
                    })
                    .collect(),
            )
            .await?;
        self.store.set_total_recipients(campaign.id, total).await?;
        campaign.total_recipients = total;

        info!(
            campaign = %campaign.code,
            recipients = total,
            "Campaign assembled"
        );

        Ok(campaign)
    }

    /// Execute a pending campaign to a terminal state
    pub async fn execute(&self, id: CampaignId) -> Result<CampaignSummary, CampaignError> {
        let campaign = self
            .store
            .get_campaign(id)
            .await?
            .ok_or(CampaignError::NotFound)?;
        if campaign.status_enum() != Some(CampaignStatus::Pending) {
            return Err(CampaignError::NotPending);
        }
        let template = self
            .store
            .get_template(campaign.template_id)
            .await?
            .ok_or(CampaignError::TemplateNotFound)?;

        // Session acquisition failures leave the campaign pending so a later
        // dispatch cycle can retry.
        let transport = self.sessions.acquire(campaign.owner_id).await?;

        let now = Local::now().time();
        if !self.window.contains(now) {
            warn!(
                campaign = %campaign.code,
                time = %now.format("%H:%M"),
                "Launch refused outside the allowed send window"
            );
            self.store.update_status(id, CampaignStatus::Failed).await?;
            self.deliver_best_effort(
                campaign.owner_id,
                &format!(
                    "Campaign {} refused: sending is allowed between {} and {}.",
                    campaign.code,
                    self.window.start.format("%H:%M"),
                    self.window.end.format("%H:%M"),
                ),
            )
            .await;
            return self.summary(id).await;
        }

        if !self.store.claim_pending(id).await? {
            return Err(CampaignError::NotPending);
        }

        info!(campaign = %campaign.code, "Campaign execution started");

        // Pre-flight probe: an account already under the platform's
        // anti-flood restriction must not attempt a single send.
        let restricted = match transport.probe_health().await {
            Ok(AccountHealth::Restricted) => true,
            Ok(AccountHealth::Healthy) => false,
            Err(e) => {
                if super::executor::classify(&e).is_fatal() {
                    true
                } else {
                    warn!(campaign = %campaign.code, "Account probe failed: {}", e);
                    false
                }
            }
        };
        if restricted {
            error!(
                campaign = %campaign.code,
                "Sending account is restricted, refusing to start"
            );
            self.store.update_status(id, CampaignStatus::Failed).await?;
            self.deliver_best_effort(
                campaign.owner_id,
                &format!(
                    "Campaign {} cancelled: the sending account is currently \
                     restricted by the platform. Wait for the restriction to \
                     lift before launching again.",
                    campaign.code
                ),
            )
            .await;
            return self.summary(id).await;
        }

        let mut recipients = self.store.list_recipients(id).await?;
        if let Some(max) = campaign.max_recipients {
            let max = max.max(0) as usize;
            if recipients.len() > max {
                info!(
                    campaign = %campaign.code,
                    cap = max,
                    listed = recipients.len(),
                    "Applying recipient cap"
                );
                recipients.truncate(max);
            }
        }

        let total = recipients.len() as i32;
        let mut pacer = Pacer::new(Duration::from_secs(campaign.delay_seconds.max(0) as u64));
        let mut sent = 0i32;
        let mut failed = 0i32;
        let mut duplicates = 0i32;
        let mut aborted = false;

        for recipient in &recipients {
            let dup = self
                .duplicates
                .check(campaign.template_id, &recipient.normalized)
                .await?;

            if dup.is_duplicate {
                debug!(
                    campaign = %campaign.code,
                    identifier = %recipient.identifier,
                    "Skipping duplicate"
                );
                if let Some(prev) = dup.previous_campaign_id {
                    self.store.mark_recipient_duplicate(recipient.id, prev).await?;
                }
                let note = match &dup.previous_campaign_code {
                    Some(code) => format!("already sent in campaign {}", code),
                    None => "already sent in an earlier campaign".to_string(),
                };
                self.store
                    .append_history(CreateSendingHistory {
                        campaign_id: id,
                        recipient_identifier: recipient.identifier.clone(),
                        normalized_identifier: recipient.normalized.clone(),
                        success: false,
                        outcome_kind: Some(OutcomeKind::Duplicate),
                        detail: Some(note),
                        message_ref: None,
                    })
                    .await?;
                duplicates += 1;
                continue;
            }

            pacer.pace().await;
            let outcome = self
                .executor
                .attempt(transport.as_ref(), recipient, &template)
                .await;
            pacer.note_sent();

            self.store
                .append_history(CreateSendingHistory {
                    campaign_id: id,
                    recipient_identifier: recipient.identifier.clone(),
                    normalized_identifier: recipient.normalized.clone(),
                    success: outcome.success,
                    outcome_kind: outcome.kind,
                    detail: outcome.detail.clone(),
                    message_ref: outcome.message_ref,
                })
                .await?;

            if outcome.success {
                sent += 1;
            } else {
                failed += 1;
            }

            if outcome.is_fatal() {
                error!(
                    campaign = %campaign.code,
                    sent,
                    failed,
                    "Anti-flood block detected, aborting campaign"
                );
                aborted = true;
                break;
            }
        }

        // Terminal commit: counters in one update, then the status flip.
        // Partial progress after an abort is preserved, not rolled back.
        self.store
            .update_stats(id, total, sent, failed, duplicates)
            .await?;
        let status = if aborted {
            CampaignStatus::Failed
        } else {
            CampaignStatus::Completed
        };
        self.store.update_status(id, status).await?;

        info!(
            campaign = %campaign.code,
            status = %status,
            sent,
            failed,
            duplicates,
            "Campaign finished"
        );

        if aborted {
            self.deliver_best_effort(
                campaign.owner_id,
                &format!(
                    "Campaign {} aborted: the sending account was restricted \
                     by the platform (anti-flood). Delivered before the stop: \
                     {}, failures: {}. Increase the send interval and wait \
                     before launching again.",
                    campaign.code, sent, failed
                ),
            )
            .await;
        }

        self.send_personal_report(id, campaign.owner_id).await;

        self.summary(id).await
    }

    /// Resend a campaign's duplicate-skipped recipients
    ///
    /// Permanently disabled by policy: returns a zero-send outcome without
    /// touching the transport.
    pub async fn resend_duplicates(&self, id: CampaignId) -> Result<ResendOutcome, CampaignError> {
        let campaign = self
            .store
            .get_campaign(id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        warn!(
            campaign = %campaign.code,
            "Resend of duplicates requested; duplicates are never redelivered"
        );

        Ok(ResendOutcome {
            sent: 0,
            skipped: campaign.duplicates_count.max(0) as usize,
        })
    }

    /// Render and deliver the owner's report, best-effort
    async fn send_personal_report(&self, id: CampaignId, owner: OwnerId) {
        let report = async {
            let campaign = self
                .store
                .get_campaign(id)
                .await?
                .ok_or(CampaignError::NotFound)?;
            let template = self
                .store
                .get_template(campaign.template_id)
                .await?
                .ok_or(CampaignError::TemplateNotFound)?;
            let history = self.store.history_for_campaign(id).await?;
            let duplicates: Vec<String> = self
                .store
                .duplicates_for_campaign(id)
                .await?
                .into_iter()
                .map(|r| r.identifier)
                .collect();
            Ok::<_, CampaignError>(render_personal_report(
                &campaign, &template, &history, &duplicates,
            ))
        }
        .await;

        match report {
            Ok(text) => self.deliver_best_effort(owner, &text).await,
            Err(e) => error!("Failed to build campaign report: {}", e),
        }
    }

    async fn deliver_best_effort(&self, owner: OwnerId, text: &str) {
        if let Err(e) = self.sink.deliver_text(owner, text).await {
            error!(owner, "Report delivery failed: {}", e);
        }
    }

    async fn summary(&self, id: CampaignId) -> Result<CampaignSummary, CampaignError> {
        let campaign = self
            .store
            .get_campaign(id)
            .await?
            .ok_or(CampaignError::NotFound)?;
        Ok(summary_of(&campaign))
    }
}

fn summary_of(campaign: &Campaign) -> CampaignSummary {
    CampaignSummary {
        campaign_id: campaign.id,
        code: campaign.code.clone(),
        status: campaign
            .status_enum()
            .unwrap_or(CampaignStatus::Pending),
        total: campaign.total_recipients,
        sent: campaign.sent_successfully,
        failed: campaign.sent_failed,
        duplicates: campaign.duplicates_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::testutil::{
        template, CollectingSink, MemoryStore, ScriptedTransport,
    };
    use crate::transport::{ChatTransport, SessionConnector, TransportError};
    use async_trait::async_trait;
    use outreach_common::config::SessionConfig;
    use outreach_common::Result as CommonResult;
    use pretty_assertions::assert_eq;
    use tokio::time::Instant;

    struct StaticConnector {
        transport: Arc<ScriptedTransport>,
    }

    #[async_trait]
    impl SessionConnector for StaticConnector {
        async fn connect(&self, _owner: OwnerId) -> CommonResult<Arc<dyn ChatTransport>> {
            Ok(self.transport.clone() as Arc<dyn ChatTransport>)
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        transport: Arc<ScriptedTransport>,
        sink: Arc<CollectingSink>,
        engine: CampaignEngine,
    }

    fn harness(transport: ScriptedTransport) -> Harness {
        harness_with_window(transport, "00:00", "23:59")
    }

    fn harness_with_window(
        transport: ScriptedTransport,
        start: &str,
        end: &str,
    ) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(transport);
        let sink = Arc::new(CollectingSink::default());
        let sessions = Arc::new(SessionPool::new(
            Arc::new(StaticConnector {
                transport: transport.clone(),
            }),
            &SessionConfig {
                idle_ttl_secs: 1800,
                sweep_interval_secs: 300,
            },
        ));
        let config = EngineConfig {
            window_start: start.to_string(),
            window_end: end.to_string(),
            ..EngineConfig::default()
        };
        let engine = CampaignEngine::new(
            store.clone() as Arc<dyn CampaignStore>,
            sessions,
            sink.clone(),
            &config,
        )
        .unwrap();

        Harness {
            store,
            transport,
            sink,
            engine,
        }
    }

    async fn assemble(
        h: &Harness,
        template_id: uuid::Uuid,
        recipients: &str,
        delay: u32,
    ) -> Campaign {
        let request = CampaignRequest::builder(10, template_id)
            .recipients(recipients)
            .delay_seconds(delay)
            .build(5)
            .unwrap();
        h.engine.assemble(request).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn two_recipient_scenario_completes() {
        let h = harness(ScriptedTransport::new());
        let template_id = h.store.add_template(template());

        let campaign = assemble(&h, template_id, "111, @alice, 111", 5).await;
        assert_eq!(campaign.total_recipients, 2);

        let summary = h.engine.execute(campaign.id).await.unwrap();

        assert_eq!(summary.status, CampaignStatus::Completed);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.duplicates, 0);
        assert_eq!(h.transport.send_calls(), 2);
        assert_eq!(h.store.history(campaign.id).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn counters_satisfy_invariant_with_mixed_outcomes() {
        let transport = ScriptedTransport::new()
            .failing_send_for("carol", TransportError::Blocked);
        let h = harness(transport);
        let template_id = h.store.add_template(template());

        // earlier campaign delivers to bob so the second one skips him
        let first = assemble(&h, template_id, "bob", 0).await;
        h.engine.execute(first.id).await.unwrap();

        let second = assemble(&h, template_id, "alice bob carol", 0).await;
        let summary = h.engine.execute(second.id).await.unwrap();

        assert_eq!(summary.status, CampaignStatus::Completed);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(
            summary.sent + summary.failed + summary.duplicates,
            summary.total
        );
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_is_skipped_with_back_reference() {
        let h = harness(ScriptedTransport::new());
        let template_id = h.store.add_template(template());

        let first = assemble(&h, template_id, "@bob", 0).await;
        let first_summary = h.engine.execute(first.id).await.unwrap();
        assert_eq!(first_summary.sent, 1);
        assert_eq!(first_summary.duplicates, 0);

        let second = assemble(&h, template_id, "bob", 0).await;
        let second_summary = h.engine.execute(second.id).await.unwrap();

        assert_eq!(second_summary.status, CampaignStatus::Completed);
        assert_eq!(second_summary.sent, 0);
        assert_eq!(second_summary.duplicates, 1);

        // no transport call happened for the duplicate
        assert_eq!(h.transport.send_calls(), 1);

        // the recipient row carries the back-reference
        let rows = h.store.recipients(second.id);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_duplicate);
        assert_eq!(rows[0].previous_campaign_id, Some(first.id));

        // and the skip is documented in the ledger
        let history = h.store.history(second.id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome_kind.as_deref(), Some("duplicate"));
        assert!(!history[0].success);
    }

    #[tokio::test(start_paused = true)]
    async fn peer_flood_aborts_mid_campaign() {
        let transport = ScriptedTransport::new()
            .failing_send_for("user3", TransportError::PeerFlood);
        let h = harness(transport);
        let template_id = h.store.add_template(template());

        let list: Vec<String> = (1..=10).map(|i| format!("user{}", i)).collect();
        let campaign = assemble(&h, template_id, &list.join(" "), 0).await;

        let summary = h.engine.execute(campaign.id).await.unwrap();

        assert_eq!(summary.status, CampaignStatus::Failed);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.duplicates, 0);
        assert_eq!(summary.sent + summary.failed + summary.duplicates, 3);

        // recipients 4..10 were never attempted
        assert_eq!(h.store.history(campaign.id).len(), 3);

        // the owner got an abort alert
        let delivered = h.sink.delivered.lock().unwrap();
        assert!(delivered
            .iter()
            .any(|(owner, text)| *owner == 10 && text.contains("aborted")));
    }

    #[tokio::test(start_paused = true)]
    async fn launch_outside_window_is_refused() {
        // a window no wall-clock time can satisfy
        let h = harness_with_window(ScriptedTransport::new(), "23:59", "00:00");
        let template_id = h.store.add_template(template());

        let campaign = assemble(&h, template_id, "@alice @bob", 0).await;
        let summary = h.engine.execute(campaign.id).await.unwrap();

        assert_eq!(summary.status, CampaignStatus::Failed);
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(h.transport.send_calls(), 0);
        assert!(h.store.history(campaign.id).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn restricted_account_is_refused_preflight() {
        let h = harness(ScriptedTransport::new().restricted());
        let template_id = h.store.add_template(template());

        let campaign = assemble(&h, template_id, "@alice @bob", 0).await;
        let summary = h.engine.execute(campaign.id).await.unwrap();

        assert_eq!(summary.status, CampaignStatus::Failed);
        assert_eq!(h.transport.send_calls(), 0);
        assert!(h.store.history(campaign.id).is_empty());

        let delivered = h.sink.delivered.lock().unwrap();
        assert!(delivered.iter().any(|(_, text)| text.contains("restricted")));
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_skips_duplicates_without_resetting() {
        let h = harness(ScriptedTransport::new());
        let template_id = h.store.add_template(template());

        // seed bob as a duplicate via a no-delay campaign
        let seed = assemble(&h, template_id, "bob", 0).await;
        h.engine.execute(seed.id).await.unwrap();

        // alice (new), bob (duplicate), carol (new) with a 20s delay:
        // no wait before alice, none around bob, one full delay before carol
        let campaign = assemble(&h, template_id, "alice bob carol", 20).await;
        let start = Instant::now();
        let summary = h.engine.execute(campaign.id).await.unwrap();

        assert_eq!(summary.sent, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn recipient_cap_limits_attempts() {
        let h = harness(ScriptedTransport::new());
        let template_id = h.store.add_template(template());

        let request = CampaignRequest::builder(10, template_id)
            .recipients("a b c d e")
            .delay_seconds(0)
            .max_recipients(2)
            .build(5)
            .unwrap();
        let campaign = h.engine.assemble(request).await.unwrap();
        assert_eq!(campaign.total_recipients, 5);

        let summary = h.engine.execute(campaign.id).await.unwrap();

        assert_eq!(summary.status, CampaignStatus::Completed);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.sent, 2);
        assert_eq!(h.transport.send_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn execute_requires_pending_status() {
        let h = harness(ScriptedTransport::new());
        let template_id = h.store.add_template(template());

        let campaign = assemble(&h, template_id, "@alice", 0).await;
        h.engine.execute(campaign.id).await.unwrap();

        // a second run of the same campaign is refused
        assert!(matches!(
            h.engine.execute(campaign.id).await,
            Err(CampaignError::NotPending)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_run_delivers_owner_report() {
        let h = harness(ScriptedTransport::new());
        let template_id = h.store.add_template(template());

        let campaign = assemble(&h, template_id, "@alice", 0).await;
        h.engine.execute(campaign.id).await.unwrap();

        let delivered = h.sink.delivered.lock().unwrap();
        assert!(delivered
            .iter()
            .any(|(owner, text)| *owner == 10 && text.contains(&campaign.code)));
    }

    #[tokio::test(start_paused = true)]
    async fn resend_duplicates_is_a_no_op() {
        let h = harness(ScriptedTransport::new());
        let template_id = h.store.add_template(template());

        let first = assemble(&h, template_id, "bob", 0).await;
        h.engine.execute(first.id).await.unwrap();
        let second = assemble(&h, template_id, "bob", 0).await;
        h.engine.execute(second.id).await.unwrap();

        let sends_before = h.transport.send_calls();
        let outcome = h.engine.resend_duplicates(second.id).await.unwrap();

        assert_eq!(outcome.sent, 0);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(h.transport.send_calls(), sends_before);
    }

    #[tokio::test(start_paused = true)]
    async fn assemble_rejects_inactive_template() {
        let h = harness(ScriptedTransport::new());
        let mut tpl = template();
        tpl.is_active = false;
        let template_id = h.store.add_template(tpl);

        let request = CampaignRequest::builder(10, template_id)
            .recipients("@alice")
            .build(5)
            .unwrap();

        assert!(matches!(
            h.engine.assemble(request).await,
            Err(CampaignError::TemplateInactive)
        ));
    }
}
