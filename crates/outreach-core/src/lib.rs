//! Outreach Core - Campaign execution engine
//!
//! This crate turns a (template, recipient set, pacing policy) tuple into a
//! sequence of paced, fault-tolerant, duplicate-aware send attempts: recipient
//! normalization, cross-campaign duplicate detection, outcome classification,
//! campaign lifecycle, and owner/digest reporting.

pub mod campaign;
pub mod recipients;
pub mod report;
pub mod transport;

pub use campaign::{
    CampaignDispatcher, CampaignEngine, CampaignError, CampaignRequest, CampaignRequestBuilder,
    CampaignSummary, DuplicateChecker, DuplicateInfo, Pacer, RetryPolicy, SendExecutor,
    SendOutcome,
};
pub use recipients::{RecipientEntry, RecipientParser, MAX_RECIPIENTS};
pub use report::{render_personal_report, render_summary_report, DigestWorker, ReportSink};
pub use transport::{
    AccountHealth, ChatHandle, ChatTransport, MessagePayload, SentMessage, SessionConnector,
    SessionPool, TransportError,
};
