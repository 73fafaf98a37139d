//! Filtered agent catalog

use owui_core::{Agent, GatewayError, UpstreamError};
use std::sync::Arc;
use tracing::debug;

use crate::cache::CatalogCache;
use crate::filter::FilterPolicy;

/// Catalog view that only ever exposes agents the policy allows
#[derive(Clone)]
pub struct AgentCatalog {
    cache: CatalogCache,
    policy: Arc<FilterPolicy>,
}

impl AgentCatalog {
    pub fn new(cache: CatalogCache, policy: FilterPolicy) -> Self {
        Self {
            cache,
            policy: Arc::new(policy),
        }
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    /// Allowed agents in upstream order
    pub async fn list(&self) -> Result<Vec<Agent>, UpstreamError> {
        let agents = self.cache.get_agents().await?;
        Ok(self.policy.filter(&agents))
    }

    /// Resolve an agent id. Denied ids fail before any upstream traffic.
    pub async fn find(&self, agent_id: &str) -> Result<Agent, GatewayError> {
        self.policy.check(agent_id)?;

        let agents = self.list().await?;
        match agents.iter().find(|agent| agent.id == agent_id) {
            Some(agent) => Ok(agent.clone()),
            None => {
                debug!("Agent '{}' not in filtered catalog", agent_id);
                let available: Vec<&str> = agents.iter().map(|a| a.id.as_str()).collect();
                Err(GatewayError::agent_not_found(agent_id, &available))
            }
        }
    }

    /// Resolve an agent id for display. Filtered-out ids are simply absent,
    /// so they report `NotFound` without touching upstream.
    pub async fn describe(&self, agent_id: &str) -> Result<Agent, GatewayError> {
        if !self.policy.is_allowed(agent_id) {
            debug!("Agent '{}' hidden by filter policy", agent_id);
            return Err(GatewayError::NotFound(format!(
                "Agent '{}' is not available",
                agent_id
            )));
        }
        self.find(agent_id).await
    }
}
