//! Outreach - campaign daemon entry point

mod wiring;

use anyhow::Result;
use outreach_common::config::Config;
use outreach_core::{CampaignDispatcher, CampaignEngine, DigestWorker, ReportSink, SessionPool};
use outreach_storage::{CampaignStore, DatabasePool, PgCampaignStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wiring::{LogReportSink, UnconfiguredConnector};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting Outreach campaign daemon...");

    let config = Config::load()?;

    let db_pool = DatabasePool::new(&config.database).await?;
    db_pool.migrate().await?;

    let store = Arc::new(PgCampaignStore::new(&db_pool));

    // Crash recovery: campaigns left mid-run by a previous process are
    // hard-failed with counters recomputed from their committed history.
    let orphaned = store.fail_orphaned_processing().await?;
    if orphaned > 0 {
        warn!(orphaned, "Failed campaigns orphaned by a previous run");
    }

    let sessions = Arc::new(SessionPool::new(
        Arc::new(UnconfiguredConnector),
        &config.sessions,
    ));
    let sink: Arc<dyn ReportSink> = Arc::new(LogReportSink);

    let engine = Arc::new(CampaignEngine::new(
        store.clone() as Arc<dyn CampaignStore>,
        sessions.clone(),
        sink.clone(),
        &config.engine,
    )?);

    let dispatcher = Arc::new(CampaignDispatcher::new(
        store.clone() as Arc<dyn CampaignStore>,
        engine,
        &config.dispatcher,
    ));

    let dispatcher_handle = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.run().await;
        })
    };

    let digest_handle = if config.digest.enabled {
        let worker = DigestWorker::new(
            store.clone() as Arc<dyn CampaignStore>,
            sink.clone(),
            config.digest.delivery_time()?,
        );
        Some(tokio::spawn(async move {
            worker.run().await;
        }))
    } else {
        info!("Daily digest disabled");
        None
    };

    let sweep_handle = {
        let sessions = sessions.clone();
        let sweep_interval = Duration::from_secs(config.sessions.sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            loop {
                ticker.tick().await;
                sessions.evict_idle().await;
            }
        })
    };

    info!("Outreach started");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    dispatcher_handle.abort();
    sweep_handle.abort();
    if let Some(handle) = digest_handle {
        handle.abort();
    }

    sessions.shutdown().await;

    info!("Outreach shutdown complete");

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,outreach=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();
}
