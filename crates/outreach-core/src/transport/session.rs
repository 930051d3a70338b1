//! Transport session pool
//!
//! One long-lived authenticated session per owner, shared by that owner's
//! campaigns and membership enumeration. Sessions are created lazily on
//! first acquire, evicted after sitting idle, and torn down on shutdown.

use super::ChatTransport;
use async_trait::async_trait;
use outreach_common::config::SessionConfig;
use outreach_common::types::OwnerId;
use outreach_common::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

/// Opens an authenticated transport session for an owner
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, owner_id: OwnerId) -> Result<Arc<dyn ChatTransport>>;
}

struct SessionEntry {
    transport: Arc<dyn ChatTransport>,
    last_used: Instant,
}

/// Pool of per-owner transport sessions
pub struct SessionPool {
    connector: Arc<dyn SessionConnector>,
    sessions: RwLock<HashMap<OwnerId, SessionEntry>>,
    idle_ttl: Duration,
}

impl SessionPool {
    /// Create a pool over a connector
    pub fn new(connector: Arc<dyn SessionConnector>, config: &SessionConfig) -> Self {
        Self {
            connector,
            sessions: RwLock::new(HashMap::new()),
            idle_ttl: Duration::from_secs(config.idle_ttl_secs),
        }
    }

    /// Acquire the owner's session, connecting lazily on first use
    pub async fn acquire(&self, owner_id: OwnerId) -> Result<Arc<dyn ChatTransport>> {
        {
            let mut sessions = self.sessions.write().await;
            if let Some(entry) = sessions.get_mut(&owner_id) {
                entry.last_used = Instant::now();
                return Ok(Arc::clone(&entry.transport));
            }
        }

        debug!(owner_id, "Opening transport session");
        let transport = self.connector.connect(owner_id).await?;

        let mut sessions = self.sessions.write().await;
        // A concurrent acquire may have connected first; keep the existing
        // session and drop ours.
        let entry = sessions.entry(owner_id).or_insert_with(|| SessionEntry {
            transport: Arc::clone(&transport),
            last_used: Instant::now(),
        });
        entry.last_used = Instant::now();

        Ok(Arc::clone(&entry.transport))
    }

    /// Drop sessions idle longer than the configured TTL
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let ttl = self.idle_ttl;
        sessions.retain(|_, entry| entry.last_used.elapsed() < ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "Evicted idle transport sessions");
        }
        evicted
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the pool holds no sessions
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop every session
    pub async fn shutdown(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        info!(count, "Transport sessions closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{
        AccountHealth, ChatHandle, MessagePayload, SentMessage, TransportError,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullTransport;

    #[async_trait]
    impl ChatTransport for NullTransport {
        async fn resolve(&self, _name: &str) -> std::result::Result<ChatHandle, TransportError> {
            Ok(ChatHandle::Id(1))
        }

        async fn join_invite(&self, _hash: &str) -> std::result::Result<ChatHandle, TransportError> {
            Ok(ChatHandle::Id(1))
        }

        async fn send(
            &self,
            _handle: &ChatHandle,
            _payload: &MessagePayload,
        ) -> std::result::Result<SentMessage, TransportError> {
            Ok(SentMessage { id: 1 })
        }

        async fn enumerate_members(
            &self,
            _group: &ChatHandle,
        ) -> std::result::Result<Vec<i64>, TransportError> {
            Ok(Vec::new())
        }

        async fn probe_health(&self) -> std::result::Result<AccountHealth, TransportError> {
            Ok(AccountHealth::Healthy)
        }
    }

    struct CountingConnector {
        connects: AtomicUsize,
    }

    #[async_trait]
    impl SessionConnector for CountingConnector {
        async fn connect(&self, _owner_id: OwnerId) -> Result<Arc<dyn ChatTransport>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullTransport))
        }
    }

    fn pool_with_counter(idle_ttl_secs: u64) -> (SessionPool, Arc<CountingConnector>) {
        let connector = Arc::new(CountingConnector {
            connects: AtomicUsize::new(0),
        });
        let pool = SessionPool::new(
            connector.clone(),
            &SessionConfig {
                idle_ttl_secs,
                sweep_interval_secs: 60,
            },
        );
        (pool, connector)
    }

    #[tokio::test]
    async fn acquire_connects_once_per_owner() {
        let (pool, connector) = pool_with_counter(1800);

        pool.acquire(7).await.unwrap();
        pool.acquire(7).await.unwrap();
        pool.acquire(8).await.unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(pool.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_evicted() {
        let (pool, connector) = pool_with_counter(10);

        pool.acquire(7).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        pool.acquire(8).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        let evicted = pool.evict_idle().await;

        // owner 7 is past the TTL, owner 8 is not
        assert_eq!(evicted, 1);
        assert_eq!(pool.len().await, 1);

        // re-acquiring owner 7 reconnects
        pool.acquire(7).await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn shutdown_clears_pool() {
        let (pool, _) = pool_with_counter(1800);
        pool.acquire(1).await.unwrap();
        pool.acquire(2).await.unwrap();

        pool.shutdown().await;
        assert!(pool.is_empty().await);
    }
}
