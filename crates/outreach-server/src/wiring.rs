//! Default capability implementations
//!
//! The chat platform adapter is deployment-specific and injected at this
//! seam. Until one is wired in, sessions cannot be opened - assembled
//! campaigns stay pending and are retried by the dispatcher - and reports
//! land in the structured log.

use async_trait::async_trait;
use outreach_common::types::OwnerId;
use outreach_common::{Error, Result};
use outreach_core::{ChatTransport, ReportSink, SessionConnector};
use std::sync::Arc;
use tracing::info;

/// Session connector placeholder for the platform adapter integration point
pub struct UnconfiguredConnector;

#[async_trait]
impl SessionConnector for UnconfiguredConnector {
    async fn connect(&self, owner_id: OwnerId) -> Result<Arc<dyn ChatTransport>> {
        Err(Error::Session(format!(
            "no chat platform adapter configured (owner {})",
            owner_id
        )))
    }
}

/// Report sink writing owner reports to the log
pub struct LogReportSink;

#[async_trait]
impl ReportSink for LogReportSink {
    async fn deliver_text(&self, owner: OwnerId, text: &str) -> Result<()> {
        info!(owner, report = %text, "Report delivered to log");
        Ok(())
    }

    async fn deliver_to_identifier(&self, identifier: &str, text: &str) -> Result<()> {
        info!(identifier, report = %text, "Report delivered to log");
        Ok(())
    }
}
