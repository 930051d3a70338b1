//! In-memory fakes for engine tests

use crate::report::ReportSink;
use crate::transport::{
    AccountHealth, ChatHandle, ChatTransport, MessagePayload, SentMessage, TransportError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outreach_common::types::{
    CampaignId, CampaignStatus, IdentifierKind, OwnerId, RecipientId, TemplateId,
};
use outreach_common::{Error, Result as CommonResult};
use outreach_storage::{
    Campaign, CampaignStore, CreateCampaign, CreateRecipient, CreateSendingHistory, ErrorStat,
    LastSend, Recipient, ReportReceiver, SendingHistory, StoreResult, Template,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

pub fn template() -> Template {
    Template {
        id: Uuid::new_v4(),
        name: "welcome".to_string(),
        body: "Hello there".to_string(),
        media_kind: None,
        media_ref: None,
        media_unique_ref: None,
        created_by: 10,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn recipient(identifier: &str, normalized: &str, kind: IdentifierKind) -> Recipient {
    Recipient {
        id: Uuid::new_v4(),
        campaign_id: Uuid::new_v4(),
        identifier: identifier.to_string(),
        normalized: normalized.to_string(),
        kind: kind.to_string(),
        is_duplicate: false,
        previous_campaign_id: None,
        created_at: Utc::now(),
    }
}

/// Transport fake with scripted failures and call accounting
pub struct ScriptedTransport {
    resolve_calls: AtomicUsize,
    resolve_failure: Mutex<Option<TransportError>>,
    send_failures: Mutex<Vec<TransportError>>,
    send_failures_by_key: Mutex<HashMap<String, TransportError>>,
    sent: Mutex<Vec<(ChatHandle, MessagePayload)>>,
    joined: Mutex<Vec<String>>,
    health: Mutex<AccountHealth>,
    next_message_id: AtomicI64,
    failed_attempts: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            resolve_calls: AtomicUsize::new(0),
            resolve_failure: Mutex::new(None),
            send_failures: Mutex::new(Vec::new()),
            send_failures_by_key: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            joined: Mutex::new(Vec::new()),
            health: Mutex::new(AccountHealth::Healthy),
            next_message_id: AtomicI64::new(1),
            failed_attempts: AtomicUsize::new(0),
        }
    }

    pub fn failing_resolve(self, err: TransportError) -> Self {
        *self.resolve_failure.lock().unwrap() = Some(err);
        self
    }

    /// Queue failures consumed by successive sends; once drained, sends succeed
    pub fn failing_sends(self, errs: Vec<TransportError>) -> Self {
        *self.send_failures.lock().unwrap() = errs;
        self
    }

    /// Fail every send addressed to this handle key (name or numeric id)
    pub fn failing_send_for(self, key: &str, err: TransportError) -> Self {
        self.send_failures_by_key
            .lock()
            .unwrap()
            .insert(key.to_string(), err);
        self
    }

    pub fn restricted(self) -> Self {
        *self.health.lock().unwrap() = AccountHealth::Restricted;
        self
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.sent.lock().unwrap().len() + self.failed_attempts.load(Ordering::SeqCst)
    }

    pub fn sent_handles(&self) -> Vec<ChatHandle> {
        self.sent.lock().unwrap().iter().map(|(h, _)| h.clone()).collect()
    }

    pub fn sent_payloads(&self) -> Vec<MessagePayload> {
        self.sent.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn joined_hashes(&self) -> Vec<String> {
        self.joined.lock().unwrap().clone()
    }

    fn handle_key(handle: &ChatHandle) -> String {
        match handle {
            ChatHandle::Id(id) => id.to_string(),
            ChatHandle::Name(name) => name.clone(),
        }
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn resolve(&self, name: &str) -> Result<ChatHandle, TransportError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.resolve_failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(ChatHandle::Name(name.to_string()))
    }

    async fn join_invite(&self, hash: &str) -> Result<ChatHandle, TransportError> {
        self.joined.lock().unwrap().push(hash.to_string());
        Ok(ChatHandle::Id(-1_000_000))
    }

    async fn send(
        &self,
        handle: &ChatHandle,
        payload: &MessagePayload,
    ) -> Result<SentMessage, TransportError> {
        {
            let mut queued = self.send_failures.lock().unwrap();
            if !queued.is_empty() {
                self.failed_attempts.fetch_add(1, Ordering::SeqCst);
                return Err(queued.remove(0));
            }
        }

        if let Some(err) = self
            .send_failures_by_key
            .lock()
            .unwrap()
            .get(&Self::handle_key(handle))
            .cloned()
        {
            self.failed_attempts.fetch_add(1, Ordering::SeqCst);
            return Err(err);
        }

        self.sent
            .lock()
            .unwrap()
            .push((handle.clone(), payload.clone()));
        Ok(SentMessage {
            id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn enumerate_members(&self, _group: &ChatHandle) -> Result<Vec<i64>, TransportError> {
        Ok(Vec::new())
    }

    async fn probe_health(&self) -> Result<AccountHealth, TransportError> {
        Ok(*self.health.lock().unwrap())
    }
}

/// Report sink collecting delivered texts
#[derive(Default)]
pub struct CollectingSink {
    pub delivered: Mutex<Vec<(OwnerId, String)>>,
}

#[async_trait]
impl ReportSink for CollectingSink {
    async fn deliver_text(&self, owner: OwnerId, text: &str) -> CommonResult<()> {
        self.delivered
            .lock()
            .unwrap()
            .push((owner, text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    templates: HashMap<TemplateId, Template>,
    campaigns: HashMap<CampaignId, Campaign>,
    recipients: Vec<Recipient>,
    history: Vec<SendingHistory>,
    receivers: Vec<ReportReceiver>,
    codes: u32,
}

/// In-memory `CampaignStore`
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_template(&self, template: Template) -> TemplateId {
        let id = template.id;
        self.state.lock().unwrap().templates.insert(id, template);
        id
    }

    pub fn add_receiver(&self, chat_id: i64, identifier: &str) {
        self.state.lock().unwrap().receivers.push(ReportReceiver {
            id: Uuid::new_v4(),
            list_id: Uuid::new_v4(),
            identifier: identifier.to_string(),
            identifier_kind: IdentifierKind::Username.to_string(),
            chat_id: Some(chat_id),
            is_active: true,
            created_at: Utc::now(),
        });
    }

    pub fn campaign(&self, id: CampaignId) -> Campaign {
        self.state.lock().unwrap().campaigns[&id].clone()
    }

    pub fn history(&self, campaign_id: CampaignId) -> Vec<SendingHistory> {
        self.state
            .lock()
            .unwrap()
            .history
            .iter()
            .filter(|h| h.campaign_id == campaign_id)
            .cloned()
            .collect()
    }

    pub fn recipients(&self, campaign_id: CampaignId) -> Vec<Recipient> {
        self.state
            .lock()
            .unwrap()
            .recipients
            .iter()
            .filter(|r| r.campaign_id == campaign_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CampaignStore for MemoryStore {
    async fn get_template(&self, id: TemplateId) -> StoreResult<Option<Template>> {
        Ok(self.state.lock().unwrap().templates.get(&id).cloned())
    }

    async fn create_campaign(&self, input: CreateCampaign) -> StoreResult<Campaign> {
        let mut state = self.state.lock().unwrap();
        state.codes += 1;
        let campaign = Campaign {
            id: Uuid::new_v4(),
            code: format!("SND-{:08X}", state.codes),
            owner_id: input.owner_id,
            template_id: input.template_id,
            status: CampaignStatus::Pending.to_string(),
            delay_seconds: input.delay_seconds,
            max_recipients: input.max_recipients,
            total_recipients: 0,
            sent_successfully: 0,
            sent_failed: 0,
            duplicates_count: 0,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        state.campaigns.insert(campaign.id, campaign.clone());
        Ok(campaign)
    }

    async fn get_campaign(&self, id: CampaignId) -> StoreResult<Option<Campaign>> {
        Ok(self.state.lock().unwrap().campaigns.get(&id).cloned())
    }

    async fn claim_pending(&self, id: CampaignId) -> StoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        match state.campaigns.get_mut(&id) {
            Some(c) if c.status == CampaignStatus::Pending.to_string() => {
                c.status = CampaignStatus::Processing.to_string();
                c.started_at = Some(Utc::now());
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(Error::NotFound("campaign".to_string())),
        }
    }

    async fn update_status(&self, id: CampaignId, status: CampaignStatus) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.campaigns.get_mut(&id) {
            c.status = status.to_string();
            if status == CampaignStatus::Processing {
                c.started_at = Some(Utc::now());
            }
            if status.is_terminal() {
                c.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn set_total_recipients(&self, id: CampaignId, total: i32) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.campaigns.get_mut(&id) {
            c.total_recipients = total;
        }
        Ok(())
    }

    async fn update_stats(
        &self,
        id: CampaignId,
        total: i32,
        sent: i32,
        failed: i32,
        duplicates: i32,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.campaigns.get_mut(&id) {
            c.total_recipients = total;
            c.sent_successfully = sent;
            c.sent_failed = failed;
            c.duplicates_count = duplicates;
        }
        Ok(())
    }

    async fn add_recipients(
        &self,
        campaign_id: CampaignId,
        entries: Vec<CreateRecipient>,
    ) -> StoreResult<Vec<Recipient>> {
        let mut state = self.state.lock().unwrap();
        let mut created = Vec::new();
        for entry in entries {
            let recipient = Recipient {
                id: Uuid::new_v4(),
                campaign_id,
                identifier: entry.identifier,
                normalized: entry.normalized,
                kind: entry.kind.to_string(),
                is_duplicate: false,
                previous_campaign_id: None,
                created_at: Utc::now(),
            };
            state.recipients.push(recipient.clone());
            created.push(recipient);
        }
        Ok(created)
    }

    async fn list_recipients(&self, campaign_id: CampaignId) -> StoreResult<Vec<Recipient>> {
        Ok(self.recipients(campaign_id))
    }

    async fn duplicates_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> StoreResult<Vec<Recipient>> {
        Ok(self
            .recipients(campaign_id)
            .into_iter()
            .filter(|r| r.is_duplicate)
            .collect())
    }

    async fn mark_recipient_duplicate(
        &self,
        id: RecipientId,
        previous_campaign_id: CampaignId,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(r) = state.recipients.iter_mut().find(|r| r.id == id) {
            r.is_duplicate = true;
            r.previous_campaign_id = Some(previous_campaign_id);
        }
        Ok(())
    }

    async fn append_history(&self, input: CreateSendingHistory) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.history.push(SendingHistory {
            id: Uuid::new_v4(),
            campaign_id: input.campaign_id,
            recipient_identifier: input.recipient_identifier,
            normalized_identifier: input.normalized_identifier,
            success: input.success,
            outcome_kind: input.outcome_kind.map(|k| k.to_string()),
            detail: input.detail,
            message_ref: input.message_ref,
            sent_at: Utc::now(),
        });
        Ok(())
    }

    async fn history_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> StoreResult<Vec<SendingHistory>> {
        Ok(self.history(campaign_id))
    }

    async fn find_last_successful_send(
        &self,
        template_id: TemplateId,
        normalized: &str,
    ) -> StoreResult<Option<LastSend>> {
        let state = self.state.lock().unwrap();
        let mut last: Option<LastSend> = None;
        for h in &state.history {
            if !h.success || h.normalized_identifier != normalized {
                continue;
            }
            let Some(campaign) = state.campaigns.get(&h.campaign_id) else {
                continue;
            };
            if campaign.template_id != template_id {
                continue;
            }
            if last.as_ref().map_or(true, |l| h.sent_at >= l.sent_at) {
                last = Some(LastSend {
                    campaign_id: campaign.id,
                    campaign_code: campaign.code.clone(),
                    sent_at: h.sent_at,
                });
            }
        }
        Ok(last)
    }

    async fn pending_campaigns(&self, limit: i64) -> StoreResult<Vec<Campaign>> {
        let state = self.state.lock().unwrap();
        let mut pending: Vec<Campaign> = state
            .campaigns
            .values()
            .filter(|c| c.status == CampaignStatus::Pending.to_string())
            .cloned()
            .collect();
        pending.sort_by_key(|c| c.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn campaigns_for_day(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Campaign>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .campaigns
            .values()
            .filter(|c| c.created_at >= start && c.created_at <= end)
            .cloned()
            .collect())
    }

    async fn error_statistics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<ErrorStat>> {
        let state = self.state.lock().unwrap();
        let mut counts: HashMap<Option<String>, i64> = HashMap::new();
        for h in &state.history {
            if h.success || h.outcome_kind.as_deref() == Some("duplicate") {
                continue;
            }
            let Some(campaign) = state.campaigns.get(&h.campaign_id) else {
                continue;
            };
            if campaign.created_at < start || campaign.created_at > end {
                continue;
            }
            *counts.entry(h.outcome_kind.clone()).or_default() += 1;
        }
        let mut stats: Vec<ErrorStat> = counts
            .into_iter()
            .map(|(outcome_kind, count)| ErrorStat {
                outcome_kind,
                count,
            })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(stats)
    }

    async fn active_report_receivers(&self) -> StoreResult<Vec<ReportReceiver>> {
        Ok(self.state.lock().unwrap().receivers.clone())
    }
}
