//! Campaign dispatcher
//!
//! Polls for pending campaigns and runs each as its own task. The engine's
//! compare-and-set claim keeps a campaign from being picked up twice, so
//! overlapping dispatch cycles are harmless.

use super::engine::{CampaignEngine, CampaignError};
use anyhow::Result;
use outreach_common::config::DispatcherConfig;
use outreach_storage::CampaignStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

/// Dispatches pending campaigns onto the engine
pub struct CampaignDispatcher {
    store: Arc<dyn CampaignStore>,
    engine: Arc<CampaignEngine>,
    poll_interval: Duration,
    claim_batch: i64,
}

impl CampaignDispatcher {
    /// Create a dispatcher
    pub fn new(
        store: Arc<dyn CampaignStore>,
        engine: Arc<CampaignEngine>,
        config: &DispatcherConfig,
    ) -> Self {
        Self {
            store,
            engine,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            claim_batch: config.claim_batch,
        }
    }

    /// Run the dispatch loop
    pub async fn run(&self) {
        let mut ticker = interval(self.poll_interval);
        let mut running: Vec<JoinHandle<()>> = Vec::new();

        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Campaign dispatcher started"
        );

        loop {
            ticker.tick().await;
            running.retain(|handle| !handle.is_finished());

            match self.spawn_pending().await {
                Ok(mut handles) => running.append(&mut handles),
                Err(e) => error!("Dispatch cycle failed: {}", e),
            }
        }
    }

    /// Run one dispatch cycle and wait for the spawned campaigns to finish
    pub async fn dispatch_once(&self) -> Result<usize> {
        let handles = self.spawn_pending().await?;
        let count = handles.len();
        for handle in handles {
            let _ = handle.await;
        }
        Ok(count)
    }

    async fn spawn_pending(&self) -> Result<Vec<JoinHandle<()>>> {
        let pending = self.store.pending_campaigns(self.claim_batch).await?;
        let mut handles = Vec::with_capacity(pending.len());

        for campaign in pending {
            let engine = Arc::clone(&self.engine);
            let code = campaign.code.clone();

            handles.push(tokio::spawn(async move {
                match engine.execute(campaign.id).await {
                    Ok(summary) => info!(
                        campaign = %summary.code,
                        status = %summary.status,
                        sent = summary.sent,
                        failed = summary.failed,
                        duplicates = summary.duplicates,
                        "Campaign run finished"
                    ),
                    // claimed by an overlapping cycle in the meantime
                    Err(CampaignError::NotPending) => {
                        debug!(campaign = %code, "Campaign already claimed")
                    }
                    Err(e) => error!(campaign = %code, "Campaign run failed: {}", e),
                }
            }));
        }

        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::testutil::{template, CollectingSink, MemoryStore, ScriptedTransport};
    use crate::campaign::CampaignRequest;
    use crate::transport::{ChatTransport, SessionConnector, SessionPool};
    use async_trait::async_trait;
    use outreach_common::config::{EngineConfig, SessionConfig};
    use outreach_common::types::{CampaignStatus, OwnerId};
    use outreach_common::Result as CommonResult;

    struct StaticConnector {
        transport: Arc<ScriptedTransport>,
    }

    #[async_trait]
    impl SessionConnector for StaticConnector {
        async fn connect(&self, _owner: OwnerId) -> CommonResult<Arc<dyn ChatTransport>> {
            Ok(self.transport.clone() as Arc<dyn ChatTransport>)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_runs_pending_campaigns_to_terminal() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new());
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
            window_start: "00:00".to_string(),
            window_end: "23:59".to_string(),
            ..EngineConfig::default()
        };
        let engine = Arc::new(
            CampaignEngine::new(
                store.clone() as Arc<dyn CampaignStore>,
                sessions,
                Arc::new(CollectingSink::default()),
                &config,
            )
            .unwrap(),
        );

        let template_id = store.add_template(template());
        let request = CampaignRequest::builder(10, template_id)
            .recipients("@alice @bob")
            .delay_seconds(0)
            .build(5)
            .unwrap();
        let campaign = engine.assemble(request).await.unwrap();

        let dispatcher = CampaignDispatcher::new(
            store.clone() as Arc<dyn CampaignStore>,
            engine,
            &DispatcherConfig::default(),
        );

        let dispatched = dispatcher.dispatch_once().await.unwrap();
        assert_eq!(dispatched, 1);

        let row = store.campaign(campaign.id);
        assert_eq!(row.status_enum(), Some(CampaignStatus::Completed));
        assert_eq!(row.sent_successfully, 2);

        // nothing left to dispatch
        assert_eq!(dispatcher.dispatch_once().await.unwrap(), 0);
    }
}
