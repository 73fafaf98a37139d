//! Catalog cache with TTL and single-flight refresh
//!
//! At most one upstream listing is in flight at any time. Callers that find the
//! cache stale while a refresh is running await that same refresh. The refresh
//! runs on its own task, so it completes and populates the cache even when
//! every waiting caller has gone away.

use futures::future::{BoxFuture, FutureExt, Shared};
use owui_core::{Agent, UpstreamError};
use owui_upstream::SharedUpstream;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

type RefreshFuture = Shared<BoxFuture<'static, Result<Arc<CacheEntry>, UpstreamError>>>;

/// One successful catalog fetch
#[derive(Debug)]
pub struct CacheEntry {
    pub agents: Vec<Agent>,
    pub fetched_at: Instant,
}

impl CacheEntry {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from a fresh entry
    pub hits: u64,
    /// Started a refresh
    pub misses: u64,
    /// Joined a refresh someone else started
    pub shared: u64,
    pub refreshes: u64,
    pub failed_refreshes: u64,
    /// Stale entry returned because the refresh failed
    pub stale_served: u64,
}

/// Point-in-time view for health reporting
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub agent_count: usize,
    pub age: Option<Duration>,
    pub ttl: Duration,
    pub refreshing: bool,
    pub stats: CacheStats,
}

#[derive(Default)]
struct CacheState {
    entry: Option<Arc<CacheEntry>>,
    inflight: Option<RefreshFuture>,
    invalidated: bool,
    stats: CacheStats,
}

struct Inner {
    upstream: SharedUpstream,
    ttl: Duration,
    state: Mutex<CacheState>,
}

/// Cloneable handle; clones share one cache
#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<Inner>,
}

impl CatalogCache {
    pub fn new(upstream: SharedUpstream, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                upstream,
                ttl,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Unfiltered catalog, refreshed from upstream when stale
    ///
    /// A failed refresh falls back to the previous entry if there is one.
    pub async fn get_agents(&self) -> Result<Vec<Agent>, UpstreamError> {
        let refresh = {
            let mut state = self.inner.state.lock().await;

            if let Some(entry) = &state.entry {
                if !state.invalidated && !entry.is_stale(self.inner.ttl) {
                    let agents = entry.agents.clone();
                    state.stats.hits += 1;
                    return Ok(agents);
                }
            }

            match &state.inflight {
                Some(inflight) => {
                    let inflight = inflight.clone();
                    state.stats.shared += 1;
                    inflight
                }
                None => {
                    let inflight = self.start_refresh();
                    state.inflight = Some(inflight.clone());
                    state.stats.misses += 1;
                    inflight
                }
            }
        };

        match refresh.await {
            Ok(entry) => Ok(entry.agents.clone()),
            Err(err) => {
                let mut state = self.inner.state.lock().await;
                match &state.entry {
                    Some(entry) => {
                        let agents = entry.agents.clone();
                        state.stats.stale_served += 1;
                        warn!(
                            "Catalog refresh failed ({}), serving stale catalog of {} agents",
                            err,
                            agents.len()
                        );
                        Ok(agents)
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// Force the next read to refresh; the current entry stays as fallback
    pub async fn invalidate(&self) {
        let mut state = self.inner.state.lock().await;
        state.invalidated = true;
        debug!("Catalog cache invalidated");
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.state.lock().await.stats.clone()
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        let state = self.inner.state.lock().await;
        CacheSnapshot {
            agent_count: state.entry.as_ref().map_or(0, |e| e.agents.len()),
            age: state.entry.as_ref().map(|e| e.age()),
            ttl: self.inner.ttl,
            refreshing: state.inflight.is_some(),
            stats: state.stats.clone(),
        }
    }

    fn start_refresh(&self) -> RefreshFuture {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(Arc::clone(&self.inner).refresh());

        async move {
            match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    // The task died before it could clear its own slot.
                    inner.state.lock().await.inflight = None;
                    Err(UpstreamError::server_error(format!(
                        "catalog refresh task failed: {}",
                        join_err
                    )))
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl Inner {
    async fn refresh(self: Arc<Self>) -> Result<Arc<CacheEntry>, UpstreamError> {
        debug!("Refreshing agent catalog from upstream");
        let result = self.upstream.list_models().await;

        let mut state = self.state.lock().await;
        state.inflight = None;

        match result {
            Ok(agents) => {
                let entry = Arc::new(CacheEntry {
                    agents: dedupe(agents),
                    fetched_at: Instant::now(),
                });
                info!("Agent catalog refreshed: {} agents", entry.agents.len());
                state.entry = Some(Arc::clone(&entry));
                state.invalidated = false;
                state.stats.refreshes += 1;
                Ok(entry)
            }
            Err(err) => {
                state.stats.failed_refreshes += 1;
                Err(err)
            }
        }
    }
}

/// First occurrence of an id wins
fn dedupe(agents: Vec<Agent>) -> Vec<Agent> {
    let mut seen = HashSet::with_capacity(agents.len());
    agents
        .into_iter()
        .filter(|agent| {
            let fresh = seen.insert(agent.id.clone());
            if !fresh {
                debug!("Dropping duplicate agent id '{}'", agent.id);
            }
            fresh
        })
        .collect()
}
